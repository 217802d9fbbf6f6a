//! 计时器状态机与离线补偿
//!
//! 这里只有纯函数：状态转移、单次 tick、恢复时的离线时间扣减。
//! 读写存储和调度都在 [`super::manager`] 中完成。

use serde::{Deserialize, Serialize};

use super::keys::TimerKeys;
use crate::infrastructure::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerPhase {
    #[default]
    Idle,
    Running,
    Paused,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Start,
    Pause,
    Resume,
    Expire,
    Stop,
    Reset,
}

/// 状态转移；`None` 表示该事件在当前状态下无效
pub fn transition(phase: TimerPhase, event: TimerEvent) -> Option<TimerPhase> {
    use TimerEvent::*;
    use TimerPhase::*;

    match (phase, event) {
        (_, Start) => Some(Running),
        (_, Reset) => Some(Idle),
        (_, Expire) => Some(TimedOut),
        (Running, Pause) => Some(Paused),
        (Paused, Resume) => Some(Running),
        (Running | Idle, Stop) => Some(Idle),
        (Paused, Stop) => Some(Paused),
        (TimedOut, Stop) => Some(TimedOut),
        (Idle | Paused | TimedOut, Pause) => None,
        (Idle | Running | TimedOut, Resume) => None,
    }
}

/// 持久化的计时器字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedTimer {
    pub start_timestamp_ms: i64,
    pub remaining_secs: u64,
    pub duration_secs: u64,
    pub paused: bool,
}

impl PersistedTimer {
    /// 从存储读取；start / remaining / duration 任一缺失或无法解析时视为没有状态
    pub fn load(store: &dyn KeyValueStore, keys: &TimerKeys) -> Option<Self> {
        let start_timestamp_ms = store.get(&keys.start)?.trim().parse().ok()?;
        let remaining_secs = store.get(&keys.remaining)?.trim().parse().ok()?;
        let duration_secs = store.get(&keys.duration)?.trim().parse().ok()?;
        let paused = store.get(&keys.paused).is_some_and(|v| v == "true");

        Some(Self {
            start_timestamp_ms,
            remaining_secs,
            duration_secs,
            paused,
        })
    }
}

/// 恢复时的离线补偿结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// 距 startTimestamp 经过的整秒数
    pub elapsed_since_start: u64,
    /// 上次持久化时已经扣掉的秒数
    pub accounted: u64,
    /// 额外需要扣掉的离线秒数
    pub offline_elapsed: u64,
    pub remaining: u64,
}

/// 计算恢复后的剩余时间
///
/// 只扣除超出 `duration - savedRemaining` 的那部分墙钟时间：
/// `offline = max(0, elapsed - (duration - saved))`，`remaining = max(0, saved - offline)`。
/// 时钟回拨时 elapsed 按 0 计。
pub fn reconcile(now_ms: i64, persisted: &PersistedTimer) -> Reconciliation {
    let saved = persisted.remaining_secs.min(persisted.duration_secs);
    let elapsed_since_start =
        u64::try_from(now_ms.saturating_sub(persisted.start_timestamp_ms) / 1000).unwrap_or(0);
    let accounted = persisted.duration_secs.saturating_sub(saved);
    let offline_elapsed = elapsed_since_start.saturating_sub(accounted);

    Reconciliation {
        elapsed_since_start,
        accounted,
        offline_elapsed,
        remaining: saved.saturating_sub(offline_elapsed),
    }
}

/// 单次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 扣减一秒；`exhausted` 表示这一秒之后归零
    Counted { remaining: u64, exhausted: bool },
    /// tick 前就已经为 0
    Expired,
}

pub fn tick(remaining: u64) -> TickOutcome {
    match remaining {
        0 => TickOutcome::Expired,
        n => TickOutcome::Counted {
            remaining: n - 1,
            exhausted: n == 1,
        },
    }
}
