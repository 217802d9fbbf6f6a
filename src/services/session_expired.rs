//! 会话过期处理 - 业务能力层
//!
//! 终态处理：提示用户、清空本地持久化状态、强制回到入口。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::SubmitError;
use crate::infrastructure::KeyValueStore;

/// 会话过期时展示给用户的提示
pub const SESSION_EXPIRED_NOTICE: &str = "您的登录会话已过期，请重新登录";

/// 会话过期处理器
pub trait SessionExpiredHandler: Send + Sync {
    fn handle(&self, error: &SubmitError);
}

impl<F> SessionExpiredHandler for F
where
    F: Fn(&SubmitError) + Send + Sync,
{
    fn handle(&self, error: &SubmitError) {
        self(error)
    }
}

type UiAction = Arc<dyn Fn(&str) + Send + Sync>;

/// 默认的终态处理器
///
/// 三个步骤互相独立，任何一步失败都不会阻止后续步骤。
pub struct TerminalSessionHandler {
    store: Option<Arc<dyn KeyValueStore>>,
    entry_url: String,
    notify: UiAction,
    redirect: UiAction,
}

impl TerminalSessionHandler {
    pub fn new(entry_url: impl Into<String>) -> Self {
        Self {
            store: None,
            entry_url: entry_url.into(),
            notify: Arc::new(|msg| error!("[SessionExpired] {}", msg)),
            redirect: Arc::new(|url| info!("[SessionExpired] 跳转到入口: {}", url)),
        }
    }

    /// 过期时需要清空的本地存储
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 自定义用户提示（默认写 error 日志）
    pub fn with_notifier(mut self, notify: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.notify = Arc::new(notify);
        self
    }

    /// 自定义跳转动作（默认写 info 日志）
    pub fn with_redirect(mut self, redirect: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.redirect = Arc::new(redirect);
        self
    }
}

impl SessionExpiredHandler for TerminalSessionHandler {
    fn handle(&self, reason: &SubmitError) {
        error!("[SessionExpired] 会话已过期，执行统一登出流程: {}", reason);

        if catch_unwind(AssertUnwindSafe(|| (self.notify)(SESSION_EXPIRED_NOTICE))).is_err() {
            warn!("[SessionExpired] 无法弹出提示");
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                error!("[SessionExpired] 清理本地缓存时出错: {}", e);
            }
        }

        if catch_unwind(AssertUnwindSafe(|| (self.redirect)(&self.entry_url))).is_err() {
            error!("[SessionExpired] 重定向到入口失败");
        }
    }
}
