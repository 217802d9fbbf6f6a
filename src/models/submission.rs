use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::mark::Mark;

/// 考生/会话标识，每次提交都必须非空
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionContext {
    pub batch_code: String,
    pub exam_no: String,
}

impl SubmissionContext {
    pub fn new(batch_code: impl Into<String>, exam_no: impl Into<String>) -> Self {
        Self {
            batch_code: batch_code.into(),
            exam_no: exam_no.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.batch_code.trim().is_empty() && !self.exam_no.trim().is_empty()
    }
}

/// 上线载荷：batchCode + examNo + mark(JSON 字符串)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub batch_code: String,
    pub exam_no: String,
    pub mark: Mark,
}

impl SubmissionPayload {
    pub fn new(context: &SubmissionContext, mark: Mark) -> Self {
        Self {
            batch_code: context.batch_code.clone(),
            exam_no: context.exam_no.clone(),
            mark,
        }
    }

    /// mark 字段序列化为 JSON 字符串
    pub fn mark_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.mark)
    }
}

/// 采集服务响应 `{code, msg, obj?}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectorResponse {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub obj: Option<Value>,
}

impl CollectorResponse {
    pub fn ok() -> Self {
        Self {
            code: Some(200),
            msg: Some("success".to_string()),
            obj: None,
        }
    }

    pub fn with_code(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            msg: Some(msg.into()),
            obj: None,
        }
    }

    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or("")
    }
}
