//! pageDesc 前缀编解码
//!
//! Flow 模式下的提交在 pageDesc 前追加 `[flowId/submoduleId/stepIndex] `，
//! 供只读 pageDesc 的旧分析脚本区分来源。

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use crate::models::FlowContext;

const PREFIX_PATTERN: &str = r"^\[([^/]+)/([^/]+)/(\d+)\]";
const FULL_PATTERN: &str = r"^\[([^/]+)/([^/]+)/(\d+)\]\s*(.*)$";

/// 从 pageDesc 解析出的 Flow 信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFlowContext {
    pub flow_id: String,
    pub submodule_id: String,
    pub step_index: u32,
    pub original_desc: String,
}

fn prefix_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PREFIX_PATTERN).ok()).as_ref()
}

fn full_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FULL_PATTERN).ok()).as_ref()
}

/// 为 pageDesc 追加 Flow 前缀
///
/// 没有上下文时原样返回；上下文不完整时记录警告并原样返回。
/// 已带前缀的描述会先去掉旧前缀，重复提交不会叠加。
///
/// ```
/// use assessment_runtime::models::FlowContext;
/// use assessment_runtime::services::page_desc::enhance_page_desc;
///
/// let ctx = FlowContext::new("g7a-mix-001", "g7-experiment", 0);
/// assert_eq!(
///     enhance_page_desc("问题1页面", Some(&ctx)),
///     "[g7a-mix-001/g7-experiment/0] 问题1页面"
/// );
/// ```
pub fn enhance_page_desc(desc: &str, flow_context: Option<&FlowContext>) -> String {
    let Some(ctx) = flow_context else {
        return desc.to_string();
    };

    let (Some(flow_id), Some(submodule_id), Some(step_index)) = (
        ctx.flow_id.as_deref().filter(|s| !s.is_empty()),
        ctx.submodule_id.as_deref().filter(|s| !s.is_empty()),
        ctx.step_index,
    ) else {
        warn!("[PageDesc] Flow 上下文不完整，跳过 pageDesc 增强: {:?}", ctx);
        return desc.to_string();
    };

    let base = match extract_flow_context(desc) {
        Some(existing) => existing.original_desc,
        None => desc.to_string(),
    };

    format!("[{}/{}/{}] {}", flow_id, submodule_id, step_index, base)
}

/// 从带前缀的 pageDesc 提取 Flow 信息，不匹配时返回 `None`
pub fn extract_flow_context(desc: &str) -> Option<ExtractedFlowContext> {
    let caps = full_regex()?.captures(desc)?;

    Some(ExtractedFlowContext {
        flow_id: caps.get(1)?.as_str().to_string(),
        submodule_id: caps.get(2)?.as_str().to_string(),
        step_index: caps.get(3)?.as_str().parse().ok()?,
        original_desc: caps.get(4).map(|m| m.as_str()).unwrap_or("").to_string(),
    })
}

/// pageDesc 是否带 Flow 前缀
pub fn has_flow_context(desc: &str) -> bool {
    prefix_regex().is_some_and(|re| re.is_match(desc))
}
