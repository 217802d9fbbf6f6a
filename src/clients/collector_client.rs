/// 采集服务客户端
///
/// 把页面 Mark 以 multipart 表单提交到固定端点
use crate::config::Config;
use crate::error::{ConfigError, TransportError};
use crate::models::{CollectorResponse, SubmissionPayload};
use futures::future::BoxFuture;
use reqwest::multipart::Form;
use std::time::Duration;
use tracing::debug;

/// Mark 传输通道
///
/// 返回 `Ok` 表示拿到了业务层响应（code 可能非 200），`Err` 表示传输层失败。
/// 测试里用内存实现替换真实网络。
pub trait MarkTransport: Send + Sync {
    fn submit<'a>(
        &'a self,
        payload: &'a SubmissionPayload,
    ) -> BoxFuture<'a, Result<CollectorResponse, TransportError>>;
}

/// 基于 reqwest 的采集服务客户端
pub struct CollectorClient {
    http: reqwest::Client,
    url: String,
}

impl CollectorClient {
    /// 创建新的采集客户端
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            url: config.collector_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_form(&self, payload: &SubmissionPayload) -> Result<CollectorResponse, TransportError> {
        let mark_json = payload
            .mark_json()
            .map_err(|e| TransportError::network(format!("mark 序列化失败: {}", e)))?;

        debug!("提交 mark: {}", mark_json);

        let form = Form::new()
            .text("batchCode", payload.batch_code.clone())
            .text("examNo", payload.exam_no.clone())
            .text("mark", mark_json);

        let response = self
            .http
            .post(&self.url)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::network(format!("API请求失败 ({}): {}", self.url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(format!("读取响应失败: {}", e)))?;

        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(TransportError::http(status.as_u16(), message));
        }

        debug!("提交结果: {}", body);

        serde_json::from_str(&body)
            .map_err(|e| TransportError::network(format!("JSON解析失败: {}", e)))
    }
}

impl MarkTransport for CollectorClient {
    fn submit<'a>(
        &'a self,
        payload: &'a SubmissionPayload,
    ) -> BoxFuture<'a, Result<CollectorResponse, TransportError>> {
        Box::pin(self.post_form(payload))
    }
}

/// 从错误响应体里取 msg / message
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("msg")
        .or_else(|| value.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
