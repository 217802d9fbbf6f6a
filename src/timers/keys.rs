//! 计时器持久化键名
//!
//! - `timer.<type>.*` : 各类型计时器自己的状态
//! - `core.timer/timeoutFired.<scope>` : 按 scope 的一次性超时标记

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::infrastructure::KeyValueStore;

/// 计时器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// 主任务
    Task,
    /// 问卷
    Questionnaire,
    /// 注意事项
    Notice,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [TimerKind::Task, TimerKind::Questionnaire, TimerKind::Notice];

    pub fn as_str(self) -> &'static str {
        match self {
            TimerKind::Task => "task",
            TimerKind::Questionnaire => "questionnaire",
            TimerKind::Notice => "notice",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }

    /// 未指定 scope 时使用的默认值
    pub fn default_scope(self) -> &'static str {
        match self {
            TimerKind::Task => "timer.task",
            TimerKind::Questionnaire => "timer.questionnaire",
            TimerKind::Notice => "timer.notice",
        }
    }

    pub fn keys(self) -> TimerKeys {
        TimerKeys::new(self)
    }
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个计时器类型的全部键名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerKeys {
    pub start: String,
    pub remaining: String,
    pub duration: String,
    pub paused: String,
    /// 旧版按类型记录的超时标记
    pub timeout_handled: String,
    pub scope: String,
}

impl TimerKeys {
    pub fn new(kind: TimerKind) -> Self {
        let prefix = format!("timer.{}", kind.as_str());
        Self {
            start: format!("{}.startTime", prefix),
            remaining: format!("{}.remaining", prefix),
            duration: format!("{}.duration", prefix),
            paused: format!("{}.paused", prefix),
            timeout_handled: format!("{}.timeoutHandled", prefix),
            scope: format!("{}.scope", prefix),
        }
    }

    pub fn all(&self) -> [&str; 6] {
        [
            &self.start,
            &self.remaining,
            &self.duration,
            &self.paused,
            &self.timeout_handled,
            &self.scope,
        ]
    }
}

/// 规范化 scope：去掉首尾空白，内部连续空白替换为 `-`，为空时回退到默认值
pub fn normalize_scope(candidate: Option<&str>, fallback: &str) -> String {
    let collapsed = candidate
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join("-"))
        .unwrap_or_default();
    if collapsed.is_empty() {
        fallback.to_string()
    } else {
        collapsed
    }
}

/// scope 超时标记的键名；scope 规范化后为空时返回 `None`
pub fn scope_flag_key(scope: &str) -> Option<String> {
    let normalized = scope.split_whitespace().collect::<Vec<_>>().join("-");
    if normalized.is_empty() {
        None
    } else {
        Some(format!("core.timer/timeoutFired.{}", normalized))
    }
}

pub fn is_scope_handled(store: &dyn KeyValueStore, scope: &str) -> bool {
    scope_flag_key(scope)
        .and_then(|key| store.get(&key))
        .is_some_and(|v| v == "true")
}

pub fn mark_scope_handled(store: &dyn KeyValueStore, scope: &str) {
    if let Some(key) = scope_flag_key(scope) {
        if let Err(e) = store.set(&key, "true") {
            warn!("[TimerKeys] 写入 scope 超时标记失败 ({}): {}", scope, e);
        }
    }
}

pub fn clear_scope_flag(store: &dyn KeyValueStore, scope: &str) {
    if let Some(key) = scope_flag_key(scope) {
        if let Err(e) = store.remove(&key) {
            warn!("[TimerKeys] 清理 scope 超时标记失败 ({}): {}", scope, e);
        }
    }
}

/// 清除计时器存储；`kind` 为 `None` 时清除全部类型
pub fn clear_timer_storage(store: &dyn KeyValueStore, kind: Option<TimerKind>) {
    let kinds: Vec<TimerKind> = match kind {
        Some(kind) => vec![kind],
        None => TimerKind::ALL.to_vec(),
    };
    for kind in kinds {
        for key in kind.keys().all() {
            if let Err(e) = store.remove(key) {
                warn!("[TimerKeys] 清理 {} 失败: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryStore;

    #[test]
    fn test_key_layout() {
        let keys = TimerKind::Questionnaire.keys();
        assert_eq!(keys.start, "timer.questionnaire.startTime");
        assert_eq!(keys.timeout_handled, "timer.questionnaire.timeoutHandled");
        assert_eq!(
            scope_flag_key("g7 experiment  step 2").as_deref(),
            Some("core.timer/timeoutFired.g7-experiment-step-2")
        );
        assert_eq!(scope_flag_key("   "), None);
    }

    #[test]
    fn test_normalize_scope() {
        assert_eq!(normalize_scope(Some("  a  b "), "timer.task"), "a-b");
        assert_eq!(normalize_scope(Some("   "), "timer.task"), "timer.task");
        assert_eq!(normalize_scope(None, "timer.notice"), "timer.notice");
    }

    #[test]
    fn test_scope_flags_and_clear() {
        let store = MemoryStore::new();
        mark_scope_handled(&store, "flow 1");
        assert!(is_scope_handled(&store, "flow-1"));
        clear_scope_flag(&store, "flow 1");
        assert!(!is_scope_handled(&store, "flow 1"));

        store.set("timer.task.remaining", "10").unwrap();
        store.set("timer.notice.remaining", "5").unwrap();
        clear_timer_storage(&store, Some(TimerKind::Task));
        assert_eq!(store.get("timer.task.remaining"), None);
        assert_eq!(store.get("timer.notice.remaining").as_deref(), Some("5"));
        clear_timer_storage(&store, None);
        assert!(store.keys().is_empty());
    }
}
