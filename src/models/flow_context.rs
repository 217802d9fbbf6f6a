//! Flow 上下文
//!
//! 标识页面属于哪个 Flow、哪个子模块、第几步。既作为调用方传入的描述，
//! 也作为 flow_context 操作记录的结构化 value 上线。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flow 逻辑地址
///
/// 字段都可能缺失：调用方可能只给出部分信息，服务端历史数据里也存在 `null`。
/// 序列化时缺失字段输出为 `null`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowContext {
    #[serde(default)]
    pub flow_id: Option<String>,
    #[serde(default)]
    pub submodule_id: Option<String>,
    #[serde(default)]
    pub step_index: Option<u32>,
    #[serde(default)]
    pub page_id: Option<String>,
}

impl FlowContext {
    pub fn new(flow_id: impl Into<String>, submodule_id: impl Into<String>, step_index: u32) -> Self {
        Self {
            flow_id: Some(flow_id.into()),
            submodule_id: Some(submodule_id.into()),
            step_index: Some(step_index),
            page_id: None,
        }
    }

    pub fn with_page_id(mut self, page_id: impl Into<String>) -> Self {
        self.page_id = Some(page_id.into());
        self
    }

    /// flowId / submoduleId 非空且 stepIndex 已定义
    pub fn is_complete(&self) -> bool {
        non_empty(&self.flow_id) && non_empty(&self.submodule_id) && self.step_index.is_some()
    }

    /// 规范化：空字符串视为缺失
    pub fn normalized(&self) -> Self {
        Self {
            flow_id: self.flow_id.clone().filter(|s| !s.is_empty()),
            submodule_id: self.submodule_id.clone().filter(|s| !s.is_empty()),
            step_index: self.step_index,
            page_id: self.page_id.clone().filter(|s| !s.is_empty()),
        }
    }

    /// 宽松地从 JSON 值解析
    ///
    /// 只接受对象；字符串 value 会先尝试按 JSON 解析。stepIndex 接受数字或数字字符串。
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                flow_id: map.get("flowId").and_then(value_as_string),
                submodule_id: map.get("submoduleId").and_then(value_as_string),
                step_index: map.get("stepIndex").and_then(value_as_index),
                page_id: map.get("pageId").and_then(value_as_string),
            }),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(parsed @ Value::Object(_)) => Self::from_value(&parsed),
                _ => None,
            },
            _ => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn value_as_index(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_keeps_nulls() {
        let ctx = FlowContext::new("g7a-001", "g7-experiment", 0);
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(
            value,
            json!({
                "flowId": "g7a-001",
                "submoduleId": "g7-experiment",
                "stepIndex": 0,
                "pageId": null
            })
        );
    }

    #[test]
    fn test_from_value_accepts_json_string() {
        let raw = json!(r#"{"flowId":"f1","submoduleId":"m1","stepIndex":"3"}"#);
        let ctx = FlowContext::from_value(&raw).unwrap();
        assert_eq!(ctx.flow_id.as_deref(), Some("f1"));
        assert_eq!(ctx.step_index, Some(3));
        assert!(ctx.is_complete());
    }

    #[test]
    fn test_from_value_rejects_plain_text() {
        assert!(FlowContext::from_value(&json!("not json")).is_none());
        assert!(FlowContext::from_value(&json!(42)).is_none());
    }

    #[test]
    fn test_incomplete_context() {
        let mut ctx = FlowContext::new("f1", "", 1);
        assert!(!ctx.is_complete());
        ctx.submodule_id = Some("m1".into());
        ctx.step_index = None;
        assert!(!ctx.is_complete());
    }
}
