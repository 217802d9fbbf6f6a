use assessment_runtime::infrastructure::{KeyValueStore, ManualClock, MemoryStore};
use assessment_runtime::timers::{
    clear_timer_storage, StartOptions, TimerKind, TimerManager, TimerPhase, TimerRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const T0: i64 = 1_700_000_000_000;

fn fixture() -> (Arc<MemoryStore>, Arc<ManualClock>) {
    (Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(T0)))
}

fn counter() -> (Arc<AtomicUsize>, impl FnOnce() -> anyhow::Result<()> + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = count.clone();
    (count, move || {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_monotonic_countdown_and_single_timeout() {
    let (store, clock) = fixture();
    let timer = TimerManager::new(TimerKind::Notice, store.clone(), clock);

    let ticks = Arc::new(Mutex::new(Vec::new()));
    let sink = ticks.clone();
    timer.on_tick(move |remaining| sink.lock().unwrap().push(remaining));

    let (fired, on_timeout) = counter();
    timer.start(5, StartOptions::new().on_timeout(on_timeout));

    sleep_ms(2_500).await;
    assert_eq!(timer.remaining(), 3);
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    sleep_ms(3_000).await;
    assert_eq!(*ticks.lock().unwrap(), vec![4, 3, 2, 1, 0]);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(timer.phase(), TimerPhase::TimedOut);
    assert!(timer.is_timeout());

    sleep_ms(10_000).await;
    assert_eq!(ticks.lock().unwrap().len(), 5);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.get("core.timer/timeoutFired.timer.notice").as_deref(),
        Some("true")
    );
}

#[tokio::test(start_paused = true)]
async fn test_handle_timeout_is_exactly_once() {
    let (store, clock) = fixture();
    let timer = TimerManager::new(TimerKind::Task, store, clock);
    let (fired, on_timeout) = counter();
    timer.start(100, StartOptions::new().scope("g7 flow").on_timeout(on_timeout));

    assert!(timer.handle_timeout());
    assert!(!timer.handle_timeout());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(timer.scope(), "g7-flow");
}

#[tokio::test(start_paused = true)]
async fn test_offline_gap_is_charged_once() {
    let (store, clock) = fixture();
    let keys = TimerKind::Questionnaire.keys();
    store.set(&keys.start, &T0.to_string()).unwrap();
    store.set(&keys.remaining, "500").unwrap();
    store.set(&keys.duration, "600").unwrap();
    store.set(&keys.paused, "false").unwrap();

    // 距启动 150 秒，其中 100 秒已经扣过
    clock.set(T0 + 150_000);
    let timer = TimerManager::new(TimerKind::Questionnaire, store.clone(), clock);

    assert_eq!(timer.remaining(), 450);
    assert_eq!(timer.phase(), TimerPhase::Running);

    sleep_ms(1_500).await;
    assert_eq!(timer.remaining(), 449);
    assert_eq!(store.get(&keys.remaining).as_deref(), Some("449"));
}

#[tokio::test(start_paused = true)]
async fn test_expired_while_offline_times_out_on_restore() {
    let (store, clock) = fixture();
    let keys = TimerKind::Task.keys();
    store.set(&keys.start, &T0.to_string()).unwrap();
    store.set(&keys.remaining, "30").unwrap();
    store.set(&keys.duration, "600").unwrap();

    clock.set(T0 + 3_600_000);
    let timer = TimerManager::new(TimerKind::Task, store, clock);

    assert_eq!(timer.remaining(), 0);
    assert_eq!(timer.phase(), TimerPhase::TimedOut);
    assert!(timer.is_timeout());
    assert!(!timer.handle_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_reload_does_not_refire_same_scope() {
    let (store, clock) = fixture();
    let first = TimerManager::new(TimerKind::Notice, store.clone(), clock.clone());
    let (fired, on_timeout) = counter();
    first.start(2, StartOptions::new().scope("notice-1").on_timeout(on_timeout));

    sleep_ms(2_500).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // 模拟页面刷新
    let reloaded = TimerManager::new(TimerKind::Notice, store.clone(), clock);
    let (refired, on_timeout) = counter();
    reloaded.on_timeout(on_timeout);

    assert_eq!(reloaded.scope(), "notice-1");
    assert!(reloaded.is_timeout());
    assert!(!reloaded.handle_timeout());
    assert_eq!(refired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_new_scope_rearms_timeout() {
    let (store, clock) = fixture();
    let timer = TimerManager::new(TimerKind::Task, store.clone(), clock);

    let (first, on_timeout) = counter();
    timer.start(1, StartOptions::new().scope("step-1").on_timeout(on_timeout));
    sleep_ms(1_500).await;
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.get("core.timer/timeoutFired.step-1").as_deref(),
        Some("true")
    );

    let (second, on_timeout) = counter();
    timer.start(1, StartOptions::new().scope("step-2").on_timeout(on_timeout));
    assert_eq!(store.get("core.timer/timeoutFired.step-1"), None);
    assert!(!timer.is_timeout());

    sleep_ms(1_500).await;
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(first.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume() {
    let (store, clock) = fixture();
    let timer = TimerManager::new(TimerKind::Task, store.clone(), clock.clone());
    timer.start(10, StartOptions::new());

    sleep_ms(3_500).await;
    timer.pause();
    assert_eq!(timer.remaining(), 7);
    assert!(timer.is_paused());
    assert_eq!(timer.phase(), TimerPhase::Paused);

    sleep_ms(10_000).await;
    assert_eq!(timer.remaining(), 7);

    // 暂停状态跨刷新保持
    clock.advance_secs(600);
    let reloaded = TimerManager::new(TimerKind::Task, store.clone(), clock.clone());
    assert_eq!(reloaded.phase(), TimerPhase::Paused);
    assert_eq!(reloaded.remaining(), 7);

    timer.resume();
    assert!(!timer.is_paused());
    assert_eq!(timer.phase(), TimerPhase::Running);
    assert_eq!(
        store.get("timer.task.startTime").as_deref(),
        Some((T0 + 600_000).to_string().as_str())
    );

    sleep_ms(2_100).await;
    assert_eq!(timer.remaining(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_force_restart() {
    let (store, clock) = fixture();
    let timer = TimerManager::new(TimerKind::Questionnaire, store, clock);
    timer.start(600, StartOptions::new());
    sleep_ms(2_500).await;

    timer.start(30, StartOptions::new().force(true));
    assert_eq!(timer.duration(), 30);
    assert_eq!(timer.remaining(), 30);

    sleep_ms(1_500).await;
    assert_eq!(timer.remaining(), 29);
}

#[tokio::test(start_paused = true)]
async fn test_reset_clears_everything() {
    let (store, clock) = fixture();
    let timer = TimerManager::new(TimerKind::Task, store.clone(), clock);
    let (fired, on_timeout) = counter();
    timer.start(3, StartOptions::new().scope("flow-x").on_timeout(on_timeout));
    timer.on_tick(|_| {});
    sleep_ms(1_500).await;

    timer.reset();
    assert_eq!(timer.phase(), TimerPhase::Idle);
    assert_eq!(timer.scope(), "timer.task");
    assert_eq!(store.get("timer.task.remaining"), None);
    assert_eq!(store.get("timer.task.startTime"), None);
    assert_eq!(store.get("timer.task.scope").as_deref(), Some("timer.task"));

    let info = timer.debug_info();
    assert_eq!(info.timeout_callbacks, 0);
    assert_eq!(info.tick_listeners, 0);

    sleep_ms(5_000).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(store.get("timer.task.remaining"), None);
}

#[tokio::test(start_paused = true)]
async fn test_failing_callbacks_are_isolated() {
    let (store, clock) = fixture();
    let timer = TimerManager::new(TimerKind::Notice, store, clock);

    let ticks = Arc::new(AtomicUsize::new(0));
    let tick_count = ticks.clone();
    timer.on_tick(|_| panic!("tick listener exploded"));
    timer.on_tick(move |_| {
        tick_count.fetch_add(1, Ordering::SeqCst);
    });

    timer.on_timeout(|| panic!("timeout callback exploded"));
    timer.on_timeout(|| anyhow::bail!("timeout callback failed"));
    let (fired, on_timeout) = counter();
    timer.start(3, StartOptions::new().on_timeout(on_timeout));

    sleep_ms(3_500).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(timer.phase(), TimerPhase::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_registry_shares_instances() {
    let (store, clock) = fixture();
    let registry = TimerRegistry::new(store.clone(), clock);

    let task = registry.start_task(None, StartOptions::new());
    let notice = registry.start_notice(Some(20), StartOptions::new());
    assert_eq!(task.duration(), 2400);
    assert_eq!(notice.duration(), 20);

    sleep_ms(1_500).await;
    assert_eq!(registry.get(TimerKind::Task).remaining(), 2399);

    registry.stop_all();
    sleep_ms(3_000).await;
    assert_eq!(task.remaining(), 2399);
    assert_eq!(task.phase(), TimerPhase::Idle);

    let info = registry.debug_info();
    assert_eq!(info.len(), 2);
    assert_eq!(info[&TimerKind::Notice].remaining, 19);

    registry.reset_all();
    assert_eq!(store.get("timer.task.duration"), None);
    assert_eq!(store.get("timer.notice.duration"), None);
}

#[tokio::test(start_paused = true)]
async fn test_clear_timer_storage() {
    let (store, clock) = fixture();
    let registry = TimerRegistry::new(store.clone(), clock);
    registry.start_questionnaire(None, StartOptions::new());
    registry.start_notice(None, StartOptions::new());
    registry.stop_all();

    clear_timer_storage(store.as_ref(), Some(TimerKind::Notice));
    assert_eq!(store.get("timer.notice.remaining"), None);
    assert_eq!(store.get("timer.questionnaire.remaining").as_deref(), Some("600"));
}

#[tokio::test(start_paused = true)]
async fn test_start_clears_leftover_flag_of_new_scope() {
    let (store, clock) = fixture();
    store.set("core.timer/timeoutFired.step-9", "true").unwrap();
    store.set("timer.task.timeoutHandled", "true").unwrap();

    let timer = TimerManager::new(TimerKind::Task, store.clone(), clock);
    let (fired, on_timeout) = counter();
    timer.start(2, StartOptions::new().scope("step-9").on_timeout(on_timeout));

    assert_eq!(store.get("core.timer/timeoutFired.step-9"), None);
    assert_eq!(store.get("timer.task.timeoutHandled"), None);
    assert!(!timer.is_timeout());

    sleep_ms(2_500).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(timer.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_resume_with_nothing_left_times_out() {
    let (store, clock) = fixture();
    let keys = TimerKind::Questionnaire.keys();
    store.set(&keys.start, &T0.to_string()).unwrap();
    store.set(&keys.remaining, "0").unwrap();
    store.set(&keys.duration, "600").unwrap();
    store.set(&keys.paused, "true").unwrap();

    let timer = TimerManager::new(TimerKind::Questionnaire, store, clock);
    assert_eq!(timer.phase(), TimerPhase::Paused);

    let (fired, on_timeout) = counter();
    timer.on_timeout(on_timeout);
    timer.resume();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(timer.phase(), TimerPhase::TimedOut);
    assert!(timer.is_timeout());
}
