//! 页面提交流程 - 流程层
//!
//! 核心职责：把页面收集到的数据变成一次可靠的上报
//!
//! 流程顺序：
//! 1. 解析考生上下文、构建 Mark
//! 2. 注入 flow_context 操作、增强 pageDesc
//! 3. 校验 → onBefore
//! 4. 按 1s / 2s / 4s 退避重试提交；会话过期立即终止

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{error, field, info, info_span, warn, Instrument, Span};

use crate::clients::MarkTransport;
use crate::config::Config;
use crate::infrastructure::KeyValueStore;
use crate::error::{is_session_expired_message, SubmitError, TransportError};
use crate::models::{
    is_flow_context, CollectorResponse, EventKind, FlowContext, Mark, MarkInput, OperationRecord,
    OperationValue, SubmissionContext, SubmissionPayload,
};
use crate::services::mark_builder::sequential_code;
use crate::services::{
    build_mark, enhance_page_desc, now_timestamp, validate_mark, SessionExpiredHandler,
    TerminalSessionHandler,
};

/// 默认退避间隔
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

type UserContextFn = Arc<dyn Fn() -> Option<SubmissionContext> + Send + Sync>;
type BuildMarkFn = Arc<dyn Fn() -> Option<MarkInput> + Send + Sync>;
type FlowContextFn = Arc<dyn Fn() -> Option<FlowContext> + Send + Sync>;
type BeforeHook = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type AfterHook = Arc<dyn Fn(&CollectorResponse, &SubmissionPayload) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&SubmitError) + Send + Sync>;

/// 单次提交的覆盖项
#[derive(Debug, Clone, Default)]
pub struct SubmitOverrides {
    pub mark: Option<MarkInput>,
    pub user_context: Option<SubmissionContext>,
    pub flow_context: Option<FlowContext>,
}

impl SubmitOverrides {
    pub fn with_mark(mut self, mark: MarkInput) -> Self {
        self.mark = Some(mark);
        self
    }

    pub fn with_user_context(mut self, context: SubmissionContext) -> Self {
        self.user_context = Some(context);
        self
    }

    pub fn with_flow_context(mut self, flow: FlowContext) -> Self {
        self.flow_context = Some(flow);
        self
    }
}

/// 提交流程的配置
pub struct SubmissionOptions {
    user_context: Option<SubmissionContext>,
    get_user_context: Option<UserContextFn>,
    build_mark: Option<BuildMarkFn>,
    get_flow_context: Option<FlowContextFn>,
    on_before: Option<BeforeHook>,
    on_after: Option<AfterHook>,
    on_error: Option<ErrorHook>,
    session_expired: Arc<dyn SessionExpiredHandler>,
    transport: Arc<dyn MarkTransport>,
    retry_delays: Vec<Duration>,
    allow_proceed_on_failure_in_dev: bool,
    dev_mode: bool,
}

impl SubmissionOptions {
    pub fn new(transport: Arc<dyn MarkTransport>) -> Self {
        Self {
            user_context: None,
            get_user_context: None,
            build_mark: None,
            get_flow_context: None,
            on_before: None,
            on_after: None,
            on_error: None,
            session_expired: Arc::new(TerminalSessionHandler::new("/")),
            transport,
            retry_delays: RETRY_DELAYS.to_vec(),
            allow_proceed_on_failure_in_dev: false,
            dev_mode: false,
        }
    }

    /// 按配置设置开发模式开关和会话过期处理
    ///
    /// 会话过期时清空 `store` 并跳转到 `config.entry_url`。
    /// `new` 构建的默认处理器没有存储，只做通知和跳转。
    pub fn from_config(
        config: &Config,
        transport: Arc<dyn MarkTransport>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let mut options = Self::new(transport);
        options.dev_mode = config.dev_mode;
        options.allow_proceed_on_failure_in_dev = config.allow_proceed_on_failure_in_dev;
        options.session_expired = Arc::new(
            TerminalSessionHandler::new(config.entry_url.clone()).with_store(store),
        );
        options
    }

    pub fn user_context(mut self, context: SubmissionContext) -> Self {
        self.user_context = Some(context);
        self
    }

    /// 每次提交时调用；优先于固定的 `user_context`
    pub fn get_user_context<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<SubmissionContext> + Send + Sync + 'static,
    {
        self.get_user_context = Some(Arc::new(f));
        self
    }

    pub fn build_mark<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<MarkInput> + Send + Sync + 'static,
    {
        self.build_mark = Some(Arc::new(f));
        self
    }

    pub fn get_flow_context<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<FlowContext> + Send + Sync + 'static,
    {
        self.get_flow_context = Some(Arc::new(f));
        self
    }

    /// 提交前钩子，返回错误时整个提交中止
    pub fn on_before<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_before = Some(Arc::new(move || -> BoxFuture<'static, anyhow::Result<()>> {
            Box::pin(f())
        }));
        self
    }

    pub fn on_after<F>(mut self, f: F) -> Self
    where
        F: Fn(&CollectorResponse, &SubmissionPayload) + Send + Sync + 'static,
    {
        self.on_after = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubmitError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn session_expired_handler(mut self, handler: impl SessionExpiredHandler + 'static) -> Self {
        self.session_expired = Arc::new(handler);
        self
    }

    /// 覆盖退避间隔；列表长度即最大尝试次数
    pub fn retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn dev_mode(mut self, enabled: bool) -> Self {
        self.dev_mode = enabled;
        self
    }

    pub fn allow_proceed_on_failure_in_dev(mut self, enabled: bool) -> Self {
        self.allow_proceed_on_failure_in_dev = enabled;
        self
    }
}

/// 单次尝试的结果分类
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Accepted(CollectorResponse),
    /// 可重试的失败
    Failed(SubmitError),
    /// 会话过期，立即终止
    SessionExpired(SubmitError),
}

/// 把传输结果归类
///
/// 缺少 code 或 code 为 200 视为成功；401 或带会话过期特征的消息视为会话过期。
pub fn classify_response(result: Result<CollectorResponse, TransportError>) -> AttemptOutcome {
    match result {
        Ok(response) => match response.code {
            None | Some(200) => AttemptOutcome::Accepted(response),
            Some(401) => AttemptOutcome::SessionExpired(SubmitError::SessionExpired {
                message: non_empty_or(response.message(), "会话已过期"),
            }),
            Some(code) => {
                let msg = non_empty_or(response.message(), &format!("提交失败（{}）", code));
                if is_session_expired_message(&msg) {
                    AttemptOutcome::SessionExpired(SubmitError::SessionExpired { message: msg })
                } else {
                    AttemptOutcome::Failed(SubmitError::Business { code, msg })
                }
            }
        },
        Err(e) if e.is_session_expired() => {
            AttemptOutcome::SessionExpired(SubmitError::SessionExpired { message: e.message })
        }
        Err(e) => AttemptOutcome::Failed(SubmitError::Transport { message: e.message }),
    }
}

fn non_empty_or(message: &str, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

/// 页面提交器
///
/// - 同一实例同时只允许一次提交
/// - 最近一次错误可查询、可清除
pub struct PageSubmission {
    options: SubmissionOptions,
    submitting: AtomicBool,
    last_error: Mutex<Option<SubmitError>>,
}

/// 提交中标记，离开作用域时自动复位
struct SubmittingGuard<'a>(&'a AtomicBool);

impl<'a> SubmittingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PageSubmission {
    pub fn new(options: SubmissionOptions) -> Self {
        Self {
            options,
            submitting: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<SubmitError> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// 提交当前页面
    ///
    /// 返回 `true` 表示采集服务已接收（或开发模式下允许失败后继续）。
    pub async fn submit(&self, overrides: SubmitOverrides) -> bool {
        let Some(_guard) = SubmittingGuard::acquire(&self.submitting) else {
            warn!("[PageSubmission] 正在提交中，跳过重复请求");
            return false;
        };
        self.clear_error();

        self.run(overrides)
            .instrument(info_span!("page_submission", page = field::Empty))
            .await
    }

    async fn run(&self, overrides: SubmitOverrides) -> bool {
        let payload = match self.prepare(overrides) {
            Ok(payload) => payload,
            Err(e) => {
                error!("[PageSubmission] {}", e);
                self.record_error(e);
                return false;
            }
        };
        Span::current().record("page", payload.mark.page_number.as_str());

        if let Some(hook) = &self.options.on_before {
            if let Err(e) = hook().await {
                error!("[PageSubmission] onBefore 钩子执行失败: {}", e);
                self.record_error(SubmitError::HookFailed(e.to_string()));
                return false;
            }
        }

        self.deliver(&payload).await
    }

    /// 构建、注入、校验，得到待发送的载荷
    fn prepare(&self, overrides: SubmitOverrides) -> Result<SubmissionPayload, SubmitError> {
        let SubmitOverrides {
            mark: mark_override,
            user_context,
            flow_context,
        } = overrides;

        let context = user_context
            .or_else(|| self.resolve_user_context())
            .filter(SubmissionContext::is_complete)
            .ok_or(SubmitError::MissingUserContext)?;

        let input = mark_override
            .or_else(|| self.options.build_mark.as_ref().and_then(|build| build()))
            .ok_or(SubmitError::MissingMark)?;

        let mut mark = build_mark(&input);

        let flow = flow_context.or_else(|| {
            self.options
                .get_flow_context
                .as_ref()
                .and_then(|get| get())
        });
        if let Some(flow) = flow {
            let resolved = inject_flow_context(&mut mark, &flow);
            if !mark.page_desc.is_empty() {
                mark.page_desc = enhance_page_desc(&mark.page_desc, Some(&resolved));
            }
        }

        validate_mark(&mut mark)?;
        Ok(SubmissionPayload::new(&context, mark))
    }

    fn resolve_user_context(&self) -> Option<SubmissionContext> {
        match &self.options.get_user_context {
            Some(get) => get(),
            None => self.options.user_context.clone(),
        }
    }

    async fn deliver(&self, payload: &SubmissionPayload) -> bool {
        let delays = &self.options.retry_delays;
        let total = delays.len();

        for (attempt, delay) in delays.iter().enumerate() {
            info!(
                "[PageSubmission] 发起页面提交 ({}/{}) pageNumber={} pageDesc={}",
                attempt + 1,
                total,
                payload.mark.page_number,
                payload.mark.page_desc
            );

            let result = self.options.transport.submit(payload).await;

            let failure = match classify_response(result) {
                AttemptOutcome::Accepted(response) => {
                    info!("[PageSubmission] ✓ 提交成功");
                    if let Some(hook) = &self.options.on_after {
                        hook(&response, payload);
                    }
                    return true;
                }
                AttemptOutcome::SessionExpired(e) => {
                    error!("[PageSubmission] 会话过期，终止重试");
                    self.options.session_expired.handle(&e);
                    self.record_error(e);
                    return false;
                }
                AttemptOutcome::Failed(e) => e,
            };

            let is_last_attempt = attempt + 1 == total;
            warn!(
                "[PageSubmission] 页面提交失败 ({}/{}): {}",
                attempt + 1,
                total,
                failure
            );

            if is_last_attempt {
                self.record_error(failure);
                if self.options.allow_proceed_on_failure_in_dev && self.options.dev_mode {
                    warn!("[PageSubmission] 开发模式允许失败后继续");
                    return true;
                }
                return false;
            }

            tokio::time::sleep(*delay).await;
        }

        false
    }

    fn record_error(&self, e: SubmitError) {
        if let Some(hook) = &self.options.on_error {
            hook(&e);
        }
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(e);
    }
}

/// 在操作列表中放入 flow_context 记录，返回最终使用的 Flow 信息
///
/// 已有记录时保留其对象值（字符串值按 JSON 解析），解析不出时改用传入的上下文；
/// 没有记录时在末尾追加一条。
pub fn inject_flow_context(mark: &mut Mark, flow: &FlowContext) -> FlowContext {
    let supplied = flow.normalized();

    if let Some(op) = mark
        .operation_list
        .iter_mut()
        .find(|op| is_flow_context(&op.event_type))
    {
        let resolved = match &op.value {
            OperationValue::FlowContextPayload(existing) => existing.clone(),
            OperationValue::Text(text) => {
                FlowContext::from_value(&serde_json::Value::String(text.clone())).unwrap_or_else(
                    || {
                        if !text.is_empty() {
                            warn!("[PageSubmission] 无法解析 flow_context value 字符串");
                        }
                        supplied.clone()
                    },
                )
            }
        };
        op.value = OperationValue::FlowContextPayload(resolved.clone());
        if op.page_id.as_deref().map_or(true, str::is_empty) {
            if let Some(page_id) = &supplied.page_id {
                op.page_id = Some(page_id.clone());
            }
        }
        return resolved;
    }

    mark.operation_list.push(OperationRecord {
        code: Some(sequential_code(mark.operation_list.len())),
        target_element: EventKind::FlowContext.as_str().to_string(),
        event_type: EventKind::FlowContext.as_str().to_string(),
        value: OperationValue::FlowContextPayload(supplied.clone()),
        time: now_timestamp(),
        page_id: supplied.page_id.clone(),
    });
    supplied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerRecord;

    fn mark_with_click() -> Mark {
        Mark {
            page_number: "1".into(),
            page_desc: "注意事项".into(),
            operation_list: vec![OperationRecord {
                code: Some(1),
                target_element: "next".into(),
                event_type: "click".into(),
                value: OperationValue::default(),
                time: "2024-01-01 10:00:00".into(),
                page_id: None,
            }],
            answer_list: vec![AnswerRecord {
                code: Some(1),
                target_element: "q1".into(),
                value: "A".into(),
            }],
            begin_time: "2024-01-01 09:59:00".into(),
            end_time: "2024-01-01 10:00:00".into(),
            img_list: vec![],
        }
    }

    #[test]
    fn test_inject_appends_with_next_code() {
        let mut mark = mark_with_click();
        let flow = FlowContext::new("f1", "m1", 3).with_page_id("p1");
        let resolved = inject_flow_context(&mut mark, &flow);

        assert_eq!(resolved, flow);
        let op = &mark.operation_list[1];
        assert_eq!(op.code, Some(2));
        assert_eq!(op.event_type, "flow_context");
        assert_eq!(op.target_element, "flow_context");
        assert_eq!(op.page_id.as_deref(), Some("p1"));
        assert_eq!(op.value.as_flow_context(), Some(&flow));
    }

    #[test]
    fn test_inject_keeps_existing_object() {
        let mut mark = mark_with_click();
        let existing = FlowContext::new("f-old", "m-old", 1);
        mark.operation_list.push(OperationRecord {
            code: Some(2),
            target_element: "flow_context".into(),
            event_type: "flow_context".into(),
            value: OperationValue::FlowContextPayload(existing.clone()),
            time: "2024-01-01 10:00:00".into(),
            page_id: None,
        });

        let resolved = inject_flow_context(&mut mark, &FlowContext::new("f1", "m1", 0).with_page_id("p9"));
        assert_eq!(resolved, existing);
        assert_eq!(mark.operation_list.len(), 2);
        assert_eq!(mark.operation_list[1].page_id.as_deref(), Some("p9"));
    }

    #[test]
    fn test_inject_parses_string_value() {
        let mut mark = mark_with_click();
        mark.operation_list.push(OperationRecord {
            code: Some(2),
            target_element: "flow_context".into(),
            event_type: "flow_context".into(),
            value: OperationValue::Text(
                r#"{"flowId":"f2","submoduleId":"m2","stepIndex":4}"#.into(),
            ),
            time: "2024-01-01 10:00:00".into(),
            page_id: None,
        });

        let resolved = inject_flow_context(&mut mark, &FlowContext::new("f1", "m1", 0));
        assert_eq!(resolved, FlowContext::new("f2", "m2", 4));
        assert!(!mark.operation_list[1].value.is_text());
    }

    #[test]
    fn test_classify_response() {
        assert!(matches!(
            classify_response(Ok(CollectorResponse::ok())),
            AttemptOutcome::Accepted(_)
        ));
        assert!(matches!(
            classify_response(Ok(CollectorResponse::default())),
            AttemptOutcome::Accepted(_)
        ));
        assert!(matches!(
            classify_response(Ok(CollectorResponse::with_code(401, ""))),
            AttemptOutcome::SessionExpired(_)
        ));
        assert_eq!(
            classify_response(Ok(CollectorResponse::with_code(500, "服务繁忙"))),
            AttemptOutcome::Failed(SubmitError::Business {
                code: 500,
                msg: "服务繁忙".into()
            })
        );
        assert!(matches!(
            classify_response(Ok(CollectorResponse::with_code(403, "请重新登录"))),
            AttemptOutcome::SessionExpired(_)
        ));
        assert!(matches!(
            classify_response(Err(TransportError::http(401, "Unauthorized"))),
            AttemptOutcome::SessionExpired(_)
        ));
        assert_eq!(
            classify_response(Err(TransportError::network("connection reset"))),
            AttemptOutcome::Failed(SubmitError::Transport {
                message: "connection reset".into()
            })
        );
    }
}
