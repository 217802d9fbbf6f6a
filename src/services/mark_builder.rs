//! Mark 构建 - 业务能力层
//!
//! 把页面收集到的松散数据规范化为完整类型的 [`Mark`]。没有错误路径：
//! 任何输入都会得到结构完整的 Mark，是否合法交给校验器判断。

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::models::{
    is_flow_context, AnswerRecord, FlowContext, Mark, MarkInput, OperationRecord, OperationValue,
};

/// 时间戳格式 `YYYY-MM-DD HH:MM:SS`（本地时区）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(time: DateTime<Local>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// 当前本地时间
pub fn now_timestamp() -> String {
    format_timestamp(Local::now())
}

/// 构建 Mark
///
/// - 标量统一转为字符串，`null` 转为空串
/// - operationList / answerList 不是数组时视为空
/// - 每条记录的 code 按 1 起始的位置重新编号
/// - 时间字段不是非空字符串时填入当前时间
pub fn build_mark(input: &MarkInput) -> Mark {
    Mark {
        page_number: string_or_empty(&input.page_number),
        page_desc: string_or_empty(&input.page_desc),
        operation_list: as_slice(&input.operation_list)
            .iter()
            .enumerate()
            .map(|(index, op)| normalize_operation(op, index))
            .collect(),
        answer_list: as_slice(&input.answer_list)
            .iter()
            .enumerate()
            .map(|(index, answer)| normalize_answer(answer, index))
            .collect(),
        begin_time: normalize_time(&input.begin_time),
        end_time: normalize_time(&input.end_time),
        img_list: as_slice(&input.img_list).to_vec(),
    }
}

/// 任意 JSON 值转字符串；对象和数组输出为 JSON 文本
pub fn string_or_empty(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// 时间字段：非空字符串原样保留，否则填入当前时间
pub fn normalize_time(value: &Value) -> String {
    match value {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        _ => now_timestamp(),
    }
}

fn as_slice(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        _ => &[],
    }
}

fn field<'a>(record: &'a Value, name: &str) -> &'a Value {
    record.get(name).unwrap_or(&Value::Null)
}

fn normalize_operation(record: &Value, index: usize) -> OperationRecord {
    let event_type = string_or_empty(field(record, "eventType"));
    let raw_value = field(record, "value");

    let value = if is_flow_context(&event_type) {
        match FlowContext::from_value(raw_value) {
            Some(ctx) => OperationValue::FlowContextPayload(ctx),
            None => OperationValue::Text(string_or_empty(raw_value)),
        }
    } else {
        OperationValue::Text(string_or_empty(raw_value))
    };

    let page_id = match field(record, "pageId") {
        Value::Null => None,
        other => Some(string_or_empty(other)),
    };

    OperationRecord {
        code: Some(sequential_code(index)),
        target_element: string_or_empty(field(record, "targetElement")),
        event_type,
        value,
        time: normalize_time(field(record, "time")),
        page_id,
    }
}

fn normalize_answer(record: &Value, index: usize) -> AnswerRecord {
    AnswerRecord {
        code: Some(sequential_code(index)),
        target_element: string_or_empty(field(record, "targetElement")),
        value: string_or_empty(field(record, "value")),
    }
}

pub(crate) fn sequential_code(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}
