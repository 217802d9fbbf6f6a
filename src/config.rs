use crate::error::ConfigError;
use std::str::FromStr;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 采集服务基础地址
    pub collector_base_url: String,
    /// 提交端点
    pub collector_endpoint: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 是否处于开发模式
    pub dev_mode: bool,
    /// 开发模式下重试耗尽是否视为成功
    pub allow_proceed_on_failure_in_dev: bool,
    /// 本地持久化文件
    pub storage_path: String,
    /// 待补交草稿目录
    pub pending_folder: String,
    /// 会话过期后跳转的入口地址
    pub entry_url: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- 计时器默认时长（秒） ---
    pub task_duration_secs: u64,
    pub questionnaire_duration_secs: u64,
    pub notice_duration_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collector_base_url: "http://localhost:9002/stu".to_string(),
            collector_endpoint: "/saveHcMark".to_string(),
            request_timeout_secs: 15,
            dev_mode: false,
            allow_proceed_on_failure_in_dev: false,
            storage_path: "runtime_state.json".to_string(),
            pending_folder: "pending_marks".to_string(),
            entry_url: "/".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            task_duration_secs: 40 * 60,
            questionnaire_duration_secs: 10 * 60,
            notice_duration_secs: 40,
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    ///
    /// 已设置但无法解析的值会返回 [`ConfigError::EnvVarParseFailed`]
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            collector_base_url: env_string("COLLECTOR_BASE_URL", default.collector_base_url),
            collector_endpoint: env_string("COLLECTOR_ENDPOINT", default.collector_endpoint),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", default.request_timeout_secs)?,
            dev_mode: std::env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("development"))
                .unwrap_or(default.dev_mode),
            allow_proceed_on_failure_in_dev: env_parse(
                "ALLOW_PROCEED_ON_FAILURE_IN_DEV",
                default.allow_proceed_on_failure_in_dev,
            )?,
            storage_path: env_string("STORAGE_PATH", default.storage_path),
            pending_folder: env_string("PENDING_FOLDER", default.pending_folder),
            entry_url: env_string("ENTRY_URL", default.entry_url),
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging)?,
            output_log_file: env_string("OUTPUT_LOG_FILE", default.output_log_file),
            task_duration_secs: env_parse("TASK_DURATION_SECS", default.task_duration_secs)?,
            questionnaire_duration_secs: env_parse(
                "QUESTIONNAIRE_DURATION_SECS",
                default.questionnaire_duration_secs,
            )?,
            notice_duration_secs: env_parse("NOTICE_DURATION_SECS", default.notice_duration_secs)?,
        })
    }

    /// 完整的提交地址
    pub fn collector_url(&self) -> String {
        let base = self.collector_base_url.trim_end_matches('/');
        if self.collector_endpoint.starts_with('/') {
            format!("{}{}", base, self.collector_endpoint)
        } else {
            format!("{}/{}", base, self.collector_endpoint)
        }
    }
}

fn env_string(var_name: &str, default: String) -> String {
    std::env::var(var_name).unwrap_or(default)
}

fn env_parse<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_url_joins_slashes() {
        let mut config = Config::default();
        assert_eq!(config.collector_url(), "http://localhost:9002/stu/saveHcMark");

        config.collector_base_url = "http://example.com/stu/".to_string();
        config.collector_endpoint = "saveHcMark".to_string();
        assert_eq!(config.collector_url(), "http://example.com/stu/saveHcMark");
    }
}
