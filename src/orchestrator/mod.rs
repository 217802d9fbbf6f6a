//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 装配存储、传输和计时器，调度待补交草稿，输出全局统计。
//!
//! ## 层次关系
//!
//! ```text
//! draft_replay::App (处理 Vec<PageDraft>)
//!     ↓
//! workflow::PageSubmission (处理单个页面)
//!     ↓
//! services (能力层：build / validate / pageDesc / 会话过期)
//!     ↓
//! clients + infrastructure (采集服务、存储、时钟)
//! ```

pub mod draft_replay;

pub use draft_replay::{App, ReplayStats};
