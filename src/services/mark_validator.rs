//! Mark 校验 - 业务能力层
//!
//! 上线前的最后一道结构检查，遇到第一个违规项即返回错误。

use crate::error::ValidationError;
use crate::models::{is_flow_context, is_known_event_type, Mark};
use crate::services::mark_builder::sequential_code;

/// 校验 Mark
///
/// 依次检查：必填字段非空；每条操作记录的 eventType 属于词表、time 非空、
/// code 等于位置序号；flow_context 记录的 value 必须是对象；每条答案的 code
/// 等于位置序号。缺失的 code 会被就地补齐，已存在但错误的 code 直接报错。
pub fn validate_mark(mark: &mut Mark) -> Result<(), ValidationError> {
    let required = [
        ("pageNumber", &mark.page_number),
        ("pageDesc", &mark.page_desc),
        ("beginTime", &mark.begin_time),
        ("endTime", &mark.end_time),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyField { field });
        }
    }

    for (index, operation) in mark.operation_list.iter_mut().enumerate() {
        if operation.event_type.trim().is_empty() {
            return Err(ValidationError::MissingEventType { index });
        }
        if !is_known_event_type(&operation.event_type) {
            return Err(ValidationError::UnknownEventType {
                index,
                event_type: operation.event_type.clone(),
            });
        }
        if operation.time.trim().is_empty() {
            return Err(ValidationError::EmptyTime { index });
        }

        ensure_sequential_code("operationList", &mut operation.code, index)?;

        if is_flow_context(&operation.event_type) && operation.value.is_text() {
            return Err(ValidationError::FlowContextNotObject { index });
        }
    }

    for (index, answer) in mark.answer_list.iter_mut().enumerate() {
        ensure_sequential_code("answerList", &mut answer.code, index)?;
    }

    Ok(())
}

fn ensure_sequential_code(
    list: &'static str,
    code: &mut Option<u32>,
    index: usize,
) -> Result<(), ValidationError> {
    let expected = sequential_code(index);
    match *code {
        None => {
            *code = Some(expected);
            Ok(())
        }
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(ValidationError::CodeMismatch {
            list,
            index,
            expected,
            actual,
        }),
    }
}
