//! 计时器入口
//!
//! 每种类型只保留一个 [`TimerManager`] 实例，页面通过这里拿到同一个计时器。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::defaults::TimerDurations;
use super::keys::{clear_scope_flag, TimerKind};
use super::manager::{StartOptions, TimerDebugInfo, TimerManager};
use crate::infrastructure::{Clock, KeyValueStore};

pub struct TimerRegistry {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    durations: TimerDurations,
    instances: Mutex<HashMap<TimerKind, TimerManager>>,
}

impl TimerRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            durations: TimerDurations::default(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// 覆盖 `start_*` 使用的默认时长
    pub fn with_durations(mut self, durations: TimerDurations) -> Self {
        self.durations = durations;
        self
    }

    pub fn durations(&self) -> TimerDurations {
        self.durations
    }

    /// 取某类型的计时器，首次访问时创建并从存储恢复
    pub fn get(&self, kind: TimerKind) -> TimerManager {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        instances
            .entry(kind)
            .or_insert_with(|| {
                info!("[TimerRegistry] 创建 {} 计时器", kind);
                TimerManager::new(kind, self.store.clone(), self.clock.clone())
            })
            .clone()
    }

    fn start(&self, kind: TimerKind, duration_secs: Option<u64>, options: StartOptions) -> TimerManager {
        let timer = self.get(kind);
        timer.start(
            duration_secs.unwrap_or_else(|| self.durations.for_kind(kind)),
            options,
        );
        timer
    }

    pub fn start_task(&self, duration_secs: Option<u64>, options: StartOptions) -> TimerManager {
        self.start(TimerKind::Task, duration_secs, options)
    }

    pub fn start_questionnaire(
        &self,
        duration_secs: Option<u64>,
        options: StartOptions,
    ) -> TimerManager {
        self.start(TimerKind::Questionnaire, duration_secs, options)
    }

    pub fn start_notice(&self, duration_secs: Option<u64>, options: StartOptions) -> TimerManager {
        self.start(TimerKind::Notice, duration_secs, options)
    }

    fn live(&self) -> Vec<TimerManager> {
        let instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        instances.values().cloned().collect()
    }

    /// 重置所有已创建的计时器
    pub fn reset_all(&self) {
        for timer in self.live() {
            timer.reset();
        }
        info!("[TimerRegistry] 已重置全部计时器");
    }

    pub fn stop_all(&self) {
        for timer in self.live() {
            timer.stop();
        }
    }

    pub fn debug_info(&self) -> BTreeMap<TimerKind, TimerDebugInfo> {
        self.live()
            .into_iter()
            .map(|timer| (timer.kind(), timer.debug_info()))
            .collect()
    }

    /// 清除某个 scope 的超时标记，使其可以再次触发
    pub fn clear_timeout_scope(&self, scope: &str) {
        clear_scope_flag(self.store.as_ref(), scope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{ManualClock, MemoryStore};

    fn registry() -> (TimerRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        (TimerRegistry::new(store.clone(), clock), store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_is_memoized() {
        let (registry, _) = registry();
        let a = registry.start_notice(None, StartOptions::new());
        let b = registry.get(TimerKind::Notice);
        assert_eq!(b.duration(), 40);
        a.pause();
        assert!(b.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_durations() {
        let (registry, _) = registry();
        let registry = registry.with_durations(TimerDurations {
            task_secs: 90,
            ..TimerDurations::default()
        });
        assert_eq!(registry.start_task(None, StartOptions::new()).duration(), 90);
        assert_eq!(
            registry
                .start_questionnaire(Some(15), StartOptions::new())
                .duration(),
            15
        );
        assert_eq!(registry.debug_info().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_timeout_scope() {
        let (registry, store) = registry();
        store.set("core.timer/timeoutFired.flow-a", "true").unwrap();
        registry.clear_timeout_scope("flow a");
        assert_eq!(store.get("core.timer/timeoutFired.flow-a"), None);
    }
}
