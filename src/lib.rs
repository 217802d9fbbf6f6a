//! # Assessment Runtime
//!
//! 测评页面的提交与计时核心
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持久化键值存储（`KeyValueStore`）与时钟（`Clock`）
//! - `clients/` - 采集服务客户端（`MarkTransport`）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 单个页面数据的处理能力
//! - `build_mark` / `validate_mark` - Mark 规范化与校验
//! - `enhance_page_desc` - pageDesc 的 Flow 前缀编解码
//! - `TerminalSessionHandler` - 会话过期的终态处理
//!
//! ### ③ 计时器（Timers）
//! - `timers/` - 持久化倒计时，支持离线补偿与按 scope 的一次性超时
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - `PageSubmission`：构建 → 注入 → 校验 → 带退避的提交
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/` - 补交程序：恢复计时器、逐个提交待补交草稿
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod timers;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{CollectorClient, MarkTransport};
pub use config::Config;
pub use error::{AppError, AppResult, SubmitError, TransportError, ValidationError};
pub use infrastructure::{Clock, FileStore, KeyValueStore, ManualClock, MemoryStore, SystemClock};
pub use models::{FlowContext, Mark, MarkInput, SubmissionContext, SubmissionPayload};
pub use orchestrator::{App, ReplayStats};
pub use timers::{StartOptions, TimerKind, TimerManager, TimerRegistry};
pub use workflow::{PageSubmission, SubmissionOptions, SubmitOverrides};
