//! 计时器 - 持久化倒计时
//!
//! - `keys`: 存储键名与 scope 标记
//! - `state`: 状态机、tick、离线补偿（纯函数）
//! - `manager`: 单类型计时器
//! - `registry`: 按类型复用的入口
//! - `defaults`: 默认时长与预警阈值

pub mod defaults;
pub mod keys;
pub mod manager;
pub mod registry;
pub mod state;

pub use defaults::{
    kind_for_submodule, module_timer_config, profile_for_submodule, progress_percent, timer_level,
    ModuleTimerConfig, TimerDurations, TimerLevel, TimerProfile,
};
pub use keys::{clear_timer_storage, normalize_scope, scope_flag_key, TimerKind};
pub use manager::{ListenerId, StartOptions, TimeoutCallback, TimerDebugInfo, TimerManager};
pub use registry::TimerRegistry;
pub use state::{reconcile, Reconciliation, TimerPhase};
