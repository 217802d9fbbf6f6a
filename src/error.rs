use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 提交流程错误
    #[error("提交错误: {0}")]
    Submit(#[from] SubmitError),
    /// Mark 校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 本地存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 网络传输错误
    #[error("传输错误: {0}")]
    Transport(#[from] TransportError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// Mark 结构校验错误
///
/// 校验器遇到第一个违规项即返回对应变体
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 必填字符串字段为空
    #[error("[validateMark] 字段 {field} 必须为非空字符串")]
    EmptyField { field: &'static str },
    /// 操作记录缺少 eventType
    #[error("[validateMark] operationList[{index}] 缺少合法的 eventType")]
    MissingEventType { index: usize },
    /// eventType 不在事件词表中
    #[error("[validateMark] operationList[{index}].eventType ({event_type}) 非标准事件类型")]
    UnknownEventType { index: usize, event_type: String },
    /// 操作记录的 time 为空
    #[error("[validateMark] operationList[{index}].time 必须为非空字符串")]
    EmptyTime { index: usize },
    /// 序号与位置不一致
    #[error("[validateMark] {list}[{index}].code 必须为 {expected}，实际为 {actual}")]
    CodeMismatch {
        list: &'static str,
        index: usize,
        expected: u32,
        actual: u32,
    },
    /// flow_context 事件的 value 不是对象
    #[error("[validateMark] operationList[{index}] flow_context 事件的 value 必须为对象")]
    FlowContextNotObject { index: usize },
}

/// 页面提交错误
///
/// 需要 `Clone`：提交器会把最近一次错误保存下来供调用方查询
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// 缺少 batchCode / examNo
    #[error("提交失败：缺少 batchCode/examNo")]
    MissingUserContext,
    /// 既没有 buildMark 也没有 mark 覆盖
    #[error("提交失败：未提供 buildMark 方法或 mark 覆盖")]
    MissingMark,
    /// Mark 校验失败
    #[error("{0}")]
    Validation(#[from] ValidationError),
    /// onBefore 钩子失败
    #[error("onBefore 钩子执行失败: {0}")]
    HookFailed(String),
    /// 会话过期
    #[error("会话已过期: {message}")]
    SessionExpired { message: String },
    /// 业务返回码非 200
    #[error("业务错误 {code}: {msg}")]
    Business { code: i64, msg: String },
    /// 网络请求失败
    #[error("网络请求失败: {message}")]
    Transport { message: String },
}

impl SubmitError {
    /// 是否属于会话过期
    pub fn is_session_expired(&self) -> bool {
        matches!(self, SubmitError::SessionExpired { .. })
    }
}

/// 网络传输错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// HTTP 状态码（如果有）
    pub status: Option<u16>,
    /// 传输层已经识别出的会话过期
    pub session_expired: bool,
}

impl TransportError {
    /// 普通网络错误
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            session_expired: false,
        }
    }

    /// HTTP 状态错误，401 直接标记为会话过期
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: format!("API错误 {}: {}", status, message.into()),
            status: Some(status),
            session_expired: status == 401,
        }
    }

    /// 显式会话过期
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(401),
            session_expired: true,
        }
    }

    /// 是否表示会话过期（显式标记、401 状态或消息特征）
    pub fn is_session_expired(&self) -> bool {
        self.session_expired
            || self.status == Some(401)
            || is_session_expired_message(&self.message)
    }
}

/// 检查错误消息是否带有会话过期特征
pub fn is_session_expired_message(message: &str) -> bool {
    message.contains("401") || message.contains("session已过期") || message.contains("请重新登录")
}

/// 本地存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 读取存储文件失败
    #[error("读取存储文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入存储文件失败
    #[error("写入存储文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 存储文件内容损坏
    #[error("存储文件解析失败 ({path}): {source}")]
    Corrupted {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// HTTP 客户端构建失败
    #[error("HTTP 客户端构建失败: {0}")]
    HttpClient(String),
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON解析失败: {}", err))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
