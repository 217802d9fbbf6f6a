//! 交互事件词表
//!
//! 只追加、不删除。校验器以此作为 eventType 白名单。

use phf::phf_set;
use serde::{Deserialize, Serialize};

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageEnter,
    PageExit,
    PageSubmitSuccess,
    PageSubmitFailed,
    /// Flow 上下文标记，value 为结构化对象
    FlowContext,
    Click,
    /// 前置条件未满足时被拦截的点击
    ClickBlocked,
    Input,
    InputBlur,
    RadioSelect,
    CheckboxCheck,
    CheckboxUncheck,
    ModalOpen,
    ModalClose,
    ViewMaterial,
    TimerStart,
    TimerStop,
    SimulationTimingStarted,
    SimulationRunResult,
    SimulationOperation,
    QuestionnaireAnswer,
    SessionExpired,
    NetworkError,
    ReadingComplete,
    AutoSubmit,
    AutoSubmitFinal,
}

/// 全部合法的 eventType 线上取值
static EVENT_TYPE_NAMES: phf::Set<&'static str> = phf_set! {
    "page_enter",
    "page_exit",
    "page_submit_success",
    "page_submit_failed",
    "flow_context",
    "click",
    "click_blocked",
    "input",
    "input_blur",
    "radio_select",
    "checkbox_check",
    "checkbox_uncheck",
    "modal_open",
    "modal_close",
    "view_material",
    "timer_start",
    "timer_stop",
    "simulation_timing_started",
    "simulation_run_result",
    "simulation_operation",
    "questionnaire_answer",
    "session_expired",
    "network_error",
    "reading_complete",
    "auto_submit",
    "auto_submit_final",
};

impl EventKind {
    pub const ALL: [EventKind; 26] = [
        EventKind::PageEnter,
        EventKind::PageExit,
        EventKind::PageSubmitSuccess,
        EventKind::PageSubmitFailed,
        EventKind::FlowContext,
        EventKind::Click,
        EventKind::ClickBlocked,
        EventKind::Input,
        EventKind::InputBlur,
        EventKind::RadioSelect,
        EventKind::CheckboxCheck,
        EventKind::CheckboxUncheck,
        EventKind::ModalOpen,
        EventKind::ModalClose,
        EventKind::ViewMaterial,
        EventKind::TimerStart,
        EventKind::TimerStop,
        EventKind::SimulationTimingStarted,
        EventKind::SimulationRunResult,
        EventKind::SimulationOperation,
        EventKind::QuestionnaireAnswer,
        EventKind::SessionExpired,
        EventKind::NetworkError,
        EventKind::ReadingComplete,
        EventKind::AutoSubmit,
        EventKind::AutoSubmitFinal,
    ];

    /// 线上传输使用的名称
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::PageEnter => "page_enter",
            EventKind::PageExit => "page_exit",
            EventKind::PageSubmitSuccess => "page_submit_success",
            EventKind::PageSubmitFailed => "page_submit_failed",
            EventKind::FlowContext => "flow_context",
            EventKind::Click => "click",
            EventKind::ClickBlocked => "click_blocked",
            EventKind::Input => "input",
            EventKind::InputBlur => "input_blur",
            EventKind::RadioSelect => "radio_select",
            EventKind::CheckboxCheck => "checkbox_check",
            EventKind::CheckboxUncheck => "checkbox_uncheck",
            EventKind::ModalOpen => "modal_open",
            EventKind::ModalClose => "modal_close",
            EventKind::ViewMaterial => "view_material",
            EventKind::TimerStart => "timer_start",
            EventKind::TimerStop => "timer_stop",
            EventKind::SimulationTimingStarted => "simulation_timing_started",
            EventKind::SimulationRunResult => "simulation_run_result",
            EventKind::SimulationOperation => "simulation_operation",
            EventKind::QuestionnaireAnswer => "questionnaire_answer",
            EventKind::SessionExpired => "session_expired",
            EventKind::NetworkError => "network_error",
            EventKind::ReadingComplete => "reading_complete",
            EventKind::AutoSubmit => "auto_submit",
            EventKind::AutoSubmitFinal => "auto_submit_final",
        }
    }

    /// 从线上名称解析
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// eventType 是否属于事件词表
pub fn is_known_event_type(name: &str) -> bool {
    EVENT_TYPE_NAMES.contains(name)
}

/// eventType 是否为 flow_context
pub fn is_flow_context(name: &str) -> bool {
    name == EventKind::FlowContext.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_set() {
        assert_eq!(EVENT_TYPE_NAMES.len(), EventKind::ALL.len());
        for kind in EventKind::ALL {
            assert!(is_known_event_type(kind.as_str()), "{} 不在词表中", kind);
            assert_eq!(EventKind::from_wire(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_event_type() {
        assert!(!is_known_event_type("double_click"));
        assert!(!is_known_event_type(""));
        assert_eq!(EventKind::from_wire("Click"), None);
    }

    #[test]
    fn test_serde_uses_wire_name() {
        let json = serde_json::to_string(&EventKind::ClickBlocked).unwrap();
        assert_eq!(json, "\"click_blocked\"");
    }
}
