//! 计时器默认配置
//!
//! 每种计时器类型的默认时长与预警阈值，以及按模块覆盖的配置。

use serde::Serialize;
use tracing::warn;

use super::keys::TimerKind;
use crate::config::Config;

/// 一种计时器的时长与预警阈值（秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerProfile {
    pub duration_secs: u64,
    pub warning_secs: u64,
    pub critical_secs: u64,
}

impl TimerProfile {
    pub const fn new(duration_secs: u64, warning_secs: u64, critical_secs: u64) -> Self {
        Self {
            duration_secs,
            warning_secs,
            critical_secs,
        }
    }

    /// 只覆盖时长，阈值沿用当前值
    pub const fn with_duration(self, duration_secs: u64) -> Self {
        Self {
            duration_secs,
            ..self
        }
    }

    pub fn level(&self, remaining_secs: u64) -> TimerLevel {
        timer_level(remaining_secs, self.warning_secs, self.critical_secs)
    }
}

impl TimerKind {
    pub fn default_profile(self) -> TimerProfile {
        match self {
            TimerKind::Task => TimerProfile::new(40 * 60, 5 * 60, 60),
            TimerKind::Questionnaire => TimerProfile::new(10 * 60, 3 * 60, 60),
            TimerKind::Notice => TimerProfile::new(40, 20, 10),
        }
    }
}

/// 子模块类型对应的计时器类型；未知类型按主任务处理
pub fn kind_for_submodule(submodule_type: &str) -> TimerKind {
    match submodule_type {
        "experiment" => TimerKind::Task,
        "questionnaire" => TimerKind::Questionnaire,
        "notice" | "experiment-intro" | "questionnaire-intro" => TimerKind::Notice,
        other => {
            warn!("[TimerDefaults] 未知的子模块类型 {}，按 task 处理", other);
            TimerKind::Task
        }
    }
}

/// 子模块类型的计时配置
pub fn profile_for_submodule(submodule_type: &str) -> TimerProfile {
    kind_for_submodule(submodule_type).default_profile()
}

/// 某个模块下三类计时器的配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModuleTimerConfig {
    pub task: TimerProfile,
    pub questionnaire: TimerProfile,
    pub notice: TimerProfile,
}

impl Default for ModuleTimerConfig {
    fn default() -> Self {
        Self {
            task: TimerKind::Task.default_profile(),
            questionnaire: TimerKind::Questionnaire.default_profile(),
            notice: TimerKind::Notice.default_profile(),
        }
    }
}

impl ModuleTimerConfig {
    pub fn profile(&self, kind: TimerKind) -> TimerProfile {
        match kind {
            TimerKind::Task => self.task,
            TimerKind::Questionnaire => self.questionnaire,
            TimerKind::Notice => self.notice,
        }
    }
}

/// 按模块 ID 取计时配置，未登记的模块使用默认值
pub fn module_timer_config(module_id: &str) -> ModuleTimerConfig {
    let base = ModuleTimerConfig::default();
    match module_id {
        "grade-4" => ModuleTimerConfig {
            task: TimerProfile::new(45 * 60, 5 * 60, 60),
            ..base
        },
        "grade-7" | "grade-7-tracking" => ModuleTimerConfig {
            task: TimerProfile::new(40 * 60, 5 * 60, 60),
            questionnaire: TimerProfile::new(10 * 60, 3 * 60, 60),
            ..base
        },
        "g7-experiment" | "g7-tracking-experiment" => ModuleTimerConfig {
            task: base.task.with_duration(30 * 60),
            ..base
        },
        "g7-questionnaire" => ModuleTimerConfig {
            questionnaire: base.questionnaire.with_duration(10 * 60),
            ..base
        },
        "g7-tracking-questionnaire" => ModuleTimerConfig {
            questionnaire: TimerProfile::new(8 * 60, 2 * 60, 60),
            ..base
        },
        "g4-experiment" => ModuleTimerConfig {
            task: base.task.with_duration(45 * 60),
            ..base
        },
        _ => base,
    }
}

/// 启动计时器时使用的默认时长，可由配置覆盖
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerDurations {
    pub task_secs: u64,
    pub questionnaire_secs: u64,
    pub notice_secs: u64,
}

impl Default for TimerDurations {
    fn default() -> Self {
        Self {
            task_secs: TimerKind::Task.default_profile().duration_secs,
            questionnaire_secs: TimerKind::Questionnaire.default_profile().duration_secs,
            notice_secs: TimerKind::Notice.default_profile().duration_secs,
        }
    }
}

impl TimerDurations {
    pub fn from_config(config: &Config) -> Self {
        Self {
            task_secs: config.task_duration_secs,
            questionnaire_secs: config.questionnaire_duration_secs,
            notice_secs: config.notice_duration_secs,
        }
    }

    pub fn for_kind(&self, kind: TimerKind) -> u64 {
        match kind {
            TimerKind::Task => self.task_secs,
            TimerKind::Questionnaire => self.questionnaire_secs,
            TimerKind::Notice => self.notice_secs,
        }
    }
}

/// 已用时间百分比，取值 0..=100
pub fn progress_percent(remaining_secs: u64, duration_secs: u64) -> f64 {
    if duration_secs == 0 {
        return 0.0;
    }
    let elapsed = duration_secs.saturating_sub(remaining_secs) as f64;
    (elapsed / duration_secs as f64 * 100.0).clamp(0.0, 100.0)
}

/// 剩余时间所处的提示等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerLevel {
    Normal,
    Warning,
    Critical,
    Complete,
}

pub fn timer_level(remaining_secs: u64, warning_secs: u64, critical_secs: u64) -> TimerLevel {
    if remaining_secs == 0 {
        TimerLevel::Complete
    } else if remaining_secs <= critical_secs {
        TimerLevel::Critical
    } else if remaining_secs < warning_secs {
        TimerLevel::Warning
    } else {
        TimerLevel::Normal
    }
}
