//! 单类型倒计时器
//!
//! 每秒扣减一次剩余时间并写回存储；重新加载时按离线时间补偿。
//! 超时回调对同一 scope 只会触发一次，即使跨越进程重启。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::keys::{
    clear_scope_flag, is_scope_handled, mark_scope_handled, normalize_scope, TimerKeys, TimerKind,
};
use super::state::{reconcile, tick, transition, PersistedTimer, TickOutcome, TimerEvent, TimerPhase};
use crate::infrastructure::{Clock, KeyValueStore};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// 超时回调；返回错误或 panic 都只会被记录
pub type TimeoutCallback = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// tick 监听器，参数为扣减后的剩余秒数
pub type TickListener = Arc<dyn Fn(u64) + Send + Sync>;

/// 注册回调后返回的句柄，用于注销
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// `start` 的可选参数
#[derive(Default)]
pub struct StartOptions {
    pub on_timeout: Option<TimeoutCallback>,
    pub scope: Option<String>,
    pub force: bool,
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_timeout<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.on_timeout = Some(Box::new(callback));
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

impl std::fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartOptions")
            .field("on_timeout", &self.on_timeout.is_some())
            .field("scope", &self.scope)
            .field("force", &self.force)
            .finish()
    }
}

/// 调试快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerDebugInfo {
    pub kind: TimerKind,
    pub phase: TimerPhase,
    pub is_running: bool,
    pub is_paused: bool,
    pub is_timeout: bool,
    pub remaining: u64,
    pub duration: u64,
    pub start_timestamp: Option<i64>,
    pub timeout_callbacks: usize,
    pub tick_listeners: usize,
    pub scope: String,
    pub scope_handled: bool,
}

struct Runtime {
    phase: TimerPhase,
    scope: String,
    timeout_callbacks: Vec<(ListenerId, TimeoutCallback)>,
    tick_listeners: Vec<(ListenerId, TickListener)>,
    ticker: Option<JoinHandle<()>>,
    /// 每次启动/停止递增，旧 ticker 据此自行退出
    generation: u64,
    next_listener_id: u64,
}

impl Runtime {
    fn new(scope: String) -> Self {
        Self {
            phase: TimerPhase::Idle,
            scope,
            timeout_callbacks: Vec::new(),
            tick_listeners: Vec::new(),
            ticker: None,
            generation: 0,
            next_listener_id: 0,
        }
    }

    fn next_id(&mut self) -> ListenerId {
        self.next_listener_id += 1;
        ListenerId(self.next_listener_id)
    }

    fn apply(&mut self, event: TimerEvent) {
        if let Some(next) = transition(self.phase, event) {
            self.phase = next;
        }
    }
}

struct Inner {
    kind: TimerKind,
    keys: TimerKeys,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    runtime: Mutex<Runtime>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, key: &str, value: impl ToString) {
        if let Err(e) = self.store.set(key, &value.to_string()) {
            warn!("[Timer:{}] 写入 {} 失败: {}", self.kind, key, e);
        }
    }

    fn forget(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!("[Timer:{}] 删除 {} 失败: {}", self.kind, key, e);
        }
    }

    fn read_u64(&self, key: &str) -> u64 {
        self.store
            .get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    fn legacy_handled(&self) -> bool {
        self.store
            .get(&self.keys.timeout_handled)
            .is_some_and(|v| v == "true")
    }

    /// 切换 scope：清掉上一个 scope 和新 scope 的旧标记
    fn apply_scope(&self, rt: &mut Runtime, candidate: Option<&str>) {
        let previous = rt.scope.clone();
        let next = normalize_scope(candidate.or(Some(previous.as_str())), self.kind.default_scope());

        if previous != next {
            clear_scope_flag(self.store.as_ref(), &previous);
        }
        rt.scope = next;
        self.persist(&self.keys.scope, &rt.scope);
        clear_scope_flag(self.store.as_ref(), &rt.scope);
        self.forget(&self.keys.timeout_handled);
    }

    fn stop_ticking(&self, rt: &mut Runtime) {
        rt.generation += 1;
        if let Some(handle) = rt.ticker.take() {
            handle.abort();
        }
    }
}

/// 单类型倒计时器句柄，克隆后共享同一状态
#[derive(Clone)]
pub struct TimerManager {
    inner: Arc<Inner>,
}

impl TimerManager {
    /// 创建计时器并从存储恢复状态
    ///
    /// 存在未暂停的持久化状态时会补偿离线时间并继续计时，需要在 tokio 运行时内调用。
    pub fn new(kind: TimerKind, store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let keys = kind.keys();
        let scope = normalize_scope(store.get(&keys.scope).as_deref(), kind.default_scope());
        let manager = Self {
            inner: Arc::new(Inner {
                kind,
                keys,
                store,
                clock,
                runtime: Mutex::new(Runtime::new(scope)),
            }),
        };
        manager.restore();
        manager
    }

    fn restore(&self) {
        let inner = &self.inner;
        let mut rt = inner.lock();
        inner.persist(&inner.keys.scope, &rt.scope);

        let Some(persisted) = PersistedTimer::load(inner.store.as_ref(), &inner.keys) else {
            debug!("[Timer:{}] 没有可恢复的状态", inner.kind);
            return;
        };

        if persisted.paused {
            rt.phase = TimerPhase::Paused;
            info!(
                "[Timer:{}] 恢复为暂停状态，剩余 {}s",
                inner.kind, persisted.remaining_secs
            );
            return;
        }

        let result = reconcile(inner.clock.now_millis(), &persisted);
        info!(
            "[Timer:{}] 恢复计时: 已过 {}s, 已计 {}s, 离线 {}s, 剩余 {}s",
            inner.kind,
            result.elapsed_since_start,
            result.accounted,
            result.offline_elapsed,
            result.remaining
        );
        inner.persist(&inner.keys.remaining, result.remaining);

        if result.remaining > 0 {
            rt.apply(TimerEvent::Start);
            self.start_ticking(&mut rt);
        } else {
            drop(rt);
            self.handle_timeout();
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.inner.kind
    }

    /// 启动计时
    ///
    /// 已在运行且未指定 `force` 时只登记回调，不重启。
    pub fn start(&self, duration_secs: u64, options: StartOptions) {
        let StartOptions {
            on_timeout,
            scope,
            force,
        } = options;
        let inner = &self.inner;
        let mut rt = inner.lock();

        if let Some(callback) = on_timeout {
            let id = rt.next_id();
            rt.timeout_callbacks.push((id, callback));
        }

        if rt.phase == TimerPhase::Running && !force {
            warn!("[Timer:{}] 计时器已在运行，忽略 start", inner.kind);
            return;
        }

        inner.stop_ticking(&mut rt);
        inner.apply_scope(&mut rt, scope.as_deref());

        inner.persist(&inner.keys.start, inner.clock.now_millis());
        inner.persist(&inner.keys.remaining, duration_secs);
        inner.persist(&inner.keys.duration, duration_secs);
        inner.persist(&inner.keys.paused, false);

        info!(
            "[Timer:{}] 开始计时 {}s (scope: {})",
            inner.kind, duration_secs, rt.scope
        );
        rt.apply(TimerEvent::Start);
        self.start_ticking(&mut rt);
    }

    /// 停止 tick，保留持久化状态
    pub fn stop(&self) {
        let mut rt = self.inner.lock();
        self.inner.stop_ticking(&mut rt);
        rt.apply(TimerEvent::Stop);
        debug!("[Timer:{}] 已停止", self.inner.kind);
    }

    pub fn pause(&self) {
        let inner = &self.inner;
        let mut rt = inner.lock();
        if rt.phase != TimerPhase::Running {
            warn!("[Timer:{}] 未在运行，无法暂停", inner.kind);
            return;
        }
        inner.stop_ticking(&mut rt);
        inner.persist(&inner.keys.paused, true);
        rt.apply(TimerEvent::Pause);
        info!(
            "[Timer:{}] 已暂停，剩余 {}s",
            inner.kind,
            inner.read_u64(&inner.keys.remaining)
        );
    }

    /// 从暂停恢复，以当前时间重新锚定起点
    pub fn resume(&self) {
        let inner = &self.inner;
        let mut rt = inner.lock();

        let paused = inner
            .store
            .get(&inner.keys.paused)
            .is_some_and(|v| v == "true");
        if !paused {
            warn!("[Timer:{}] 未处于暂停状态，无法恢复", inner.kind);
            return;
        }

        let remaining = inner.read_u64(&inner.keys.remaining);
        if remaining == 0 {
            warn!("[Timer:{}] 剩余时间为 0，直接按超时处理", inner.kind);
            drop(rt);
            self.handle_timeout();
            return;
        }

        inner.persist(&inner.keys.paused, false);
        inner.persist(&inner.keys.start, inner.clock.now_millis());
        rt.phase = TimerPhase::Paused;
        rt.apply(TimerEvent::Resume);
        info!("[Timer:{}] 恢复计时，剩余 {}s", inner.kind, remaining);
        self.start_ticking(&mut rt);
    }

    /// 停止并清除全部状态、回调和监听器
    pub fn reset(&self) {
        let inner = &self.inner;
        let mut rt = inner.lock();
        inner.stop_ticking(&mut rt);

        for key in inner.keys.all() {
            inner.forget(key);
        }
        clear_scope_flag(inner.store.as_ref(), &rt.scope);

        rt.scope = inner.kind.default_scope().to_string();
        inner.persist(&inner.keys.scope, &rt.scope);
        rt.timeout_callbacks.clear();
        rt.tick_listeners.clear();
        rt.apply(TimerEvent::Reset);
        info!("[Timer:{}] 已重置", inner.kind);
    }

    /// 处理超时；本 scope 已处理过时返回 `false` 且不调用回调
    pub fn handle_timeout(&self) -> bool {
        let inner = &self.inner;
        let callbacks = {
            let mut rt = inner.lock();
            inner.stop_ticking(&mut rt);
            rt.apply(TimerEvent::Expire);

            if is_scope_handled(inner.store.as_ref(), &rt.scope) || inner.legacy_handled() {
                info!(
                    "[Timer:{}] scope {} 的超时已处理过，跳过",
                    inner.kind, rt.scope
                );
                return false;
            }

            mark_scope_handled(inner.store.as_ref(), &rt.scope);
            inner.persist(&inner.keys.timeout_handled, true);
            info!("[Timer:{}] ⏰ 计时结束 (scope: {})", inner.kind, rt.scope);
            std::mem::take(&mut rt.timeout_callbacks)
        };

        for (id, callback) in callbacks {
            match catch_unwind(AssertUnwindSafe(callback)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("[Timer:{}] 超时回调 {:?} 出错: {}", inner.kind, id, e),
                Err(_) => error!("[Timer:{}] 超时回调 {:?} panic", inner.kind, id),
            }
        }
        true
    }

    fn start_ticking(&self, rt: &mut Runtime) {
        self.inner.stop_ticking(rt);
        let generation = rt.generation;

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                error!("[Timer:{}] 当前没有 tokio 运行时，无法计时", self.inner.kind);
                return;
            }
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        rt.ticker = Some(handle.spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !(TimerManager { inner }).run_tick(generation) {
                    break;
                }
            }
        }));
    }

    /// 执行一次 tick，返回是否继续
    fn run_tick(&self, generation: u64) -> bool {
        let inner = &self.inner;
        let (remaining, exhausted, listeners) = {
            let rt = inner.lock();
            if rt.generation != generation || rt.phase != TimerPhase::Running {
                return false;
            }
            match tick(inner.read_u64(&inner.keys.remaining)) {
                TickOutcome::Expired => {
                    drop(rt);
                    self.handle_timeout();
                    return false;
                }
                TickOutcome::Counted {
                    remaining,
                    exhausted,
                } => {
                    inner.persist(&inner.keys.remaining, remaining);
                    let listeners: Vec<TickListener> =
                        rt.tick_listeners.iter().map(|(_, l)| l.clone()).collect();
                    (remaining, exhausted, listeners)
                }
            }
        };

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(remaining))).is_err() {
                error!("[Timer:{}] tick 监听器 panic", inner.kind);
            }
        }

        if exhausted {
            self.handle_timeout();
            return false;
        }
        true
    }

    pub fn on_timeout<F>(&self, callback: F) -> ListenerId
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let mut rt = self.inner.lock();
        let id = rt.next_id();
        rt.timeout_callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn off_timeout(&self, id: ListenerId) -> bool {
        let mut rt = self.inner.lock();
        let before = rt.timeout_callbacks.len();
        rt.timeout_callbacks.retain(|(existing, _)| *existing != id);
        rt.timeout_callbacks.len() != before
    }

    pub fn on_tick<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let mut rt = self.inner.lock();
        let id = rt.next_id();
        rt.tick_listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn off_tick(&self, id: ListenerId) -> bool {
        let mut rt = self.inner.lock();
        let before = rt.tick_listeners.len();
        rt.tick_listeners.retain(|(existing, _)| *existing != id);
        rt.tick_listeners.len() != before
    }

    pub fn remaining(&self) -> u64 {
        self.inner.read_u64(&self.inner.keys.remaining)
    }

    pub fn duration(&self) -> u64 {
        self.inner.read_u64(&self.inner.keys.duration)
    }

    pub fn phase(&self) -> TimerPhase {
        self.inner.lock().phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == TimerPhase::Running
    }

    pub fn is_paused(&self) -> bool {
        self.inner
            .store
            .get(&self.inner.keys.paused)
            .is_some_and(|v| v == "true")
    }

    /// 旧版标记或当前 scope 的标记任一存在即视为已超时
    pub fn is_timeout(&self) -> bool {
        let scope = self.scope();
        self.inner.legacy_handled() || is_scope_handled(self.inner.store.as_ref(), &scope)
    }

    pub fn scope(&self) -> String {
        self.inner.lock().scope.clone()
    }

    pub fn debug_info(&self) -> TimerDebugInfo {
        let inner = &self.inner;
        let rt = inner.lock();
        let scope_handled = is_scope_handled(inner.store.as_ref(), &rt.scope);
        TimerDebugInfo {
            kind: inner.kind,
            phase: rt.phase,
            is_running: rt.phase == TimerPhase::Running,
            is_paused: self.is_paused(),
            is_timeout: scope_handled || inner.legacy_handled(),
            remaining: inner.read_u64(&inner.keys.remaining),
            duration: inner.read_u64(&inner.keys.duration),
            start_timestamp: inner
                .store
                .get(&inner.keys.start)
                .and_then(|v| v.trim().parse().ok()),
            timeout_callbacks: rt.timeout_callbacks.len(),
            tick_listeners: rt.tick_listeners.len(),
            scope: rt.scope.clone(),
            scope_handled,
        }
    }
}

impl std::fmt::Debug for TimerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerManager")
            .field("kind", &self.inner.kind)
            .field("phase", &self.phase())
            .finish()
    }
}
