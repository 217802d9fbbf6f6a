use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::flow_context::FlowContext;

/// 操作记录的 value
///
/// flow_context 事件携带结构化对象，其余事件一律是字符串。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationValue {
    Text(String),
    FlowContextPayload(FlowContext),
}

impl OperationValue {
    pub fn is_text(&self) -> bool {
        matches!(self, OperationValue::Text(_))
    }

    pub fn as_flow_context(&self) -> Option<&FlowContext> {
        match self {
            OperationValue::FlowContextPayload(ctx) => Some(ctx),
            OperationValue::Text(_) => None,
        }
    }
}

impl Default for OperationValue {
    fn default() -> Self {
        OperationValue::Text(String::new())
    }
}

impl From<&str> for OperationValue {
    fn from(value: &str) -> Self {
        OperationValue::Text(value.to_string())
    }
}

impl From<String> for OperationValue {
    fn from(value: String) -> Self {
        OperationValue::Text(value)
    }
}

/// 操作记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    /// 1 起始的序号；校验时缺失会被补齐
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    pub target_element: String,
    pub event_type: String,
    #[serde(default)]
    pub value: OperationValue,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
}

/// 答案记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    pub target_element: String,
    pub value: String,
}

/// 页面提交记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mark {
    pub page_number: String,
    pub page_desc: String,
    pub operation_list: Vec<OperationRecord>,
    pub answer_list: Vec<AnswerRecord>,
    pub begin_time: String,
    pub end_time: String,
    /// 目前始终为空
    #[serde(default)]
    pub img_list: Vec<Value>,
}

/// 松散类型的 Mark 输入
///
/// 页面组件收集到的原始数据，字段可以是任意 JSON；由 mark builder 规范化。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkInput {
    pub page_number: Value,
    pub page_desc: Value,
    pub operation_list: Value,
    pub answer_list: Value,
    pub begin_time: Value,
    pub end_time: Value,
    pub img_list: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mark_json_shape() {
        let mark = Mark {
            page_number: "3".into(),
            page_desc: "材料阅读".into(),
            operation_list: vec![OperationRecord {
                code: Some(1),
                target_element: "next".into(),
                event_type: "click".into(),
                value: OperationValue::Text(String::new()),
                time: "2024-01-01 10:00:00".into(),
                page_id: None,
            }],
            answer_list: vec![],
            begin_time: "2024-01-01 09:59:00".into(),
            end_time: "2024-01-01 10:00:00".into(),
            img_list: vec![],
        };

        let value = serde_json::to_value(&mark).unwrap();
        assert_eq!(value["pageNumber"], "3");
        assert_eq!(value["operationList"][0]["eventType"], "click");
        assert_eq!(value["operationList"][0]["code"], 1);
        assert!(value["operationList"][0].get("pageId").is_none());
        assert_eq!(value["imgList"], json!([]));
    }

    #[test]
    fn test_operation_value_untagged() {
        let text: OperationValue = serde_json::from_value(json!("A")).unwrap();
        assert_eq!(text, OperationValue::Text("A".into()));

        let ctx: OperationValue =
            serde_json::from_value(json!({"flowId": "f1", "submoduleId": "m1", "stepIndex": 1}))
                .unwrap();
        assert_eq!(
            ctx.as_flow_context().and_then(|c| c.step_index),
            Some(1)
        );
    }
}
