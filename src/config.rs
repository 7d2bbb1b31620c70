//! 配置系统
//! 从默认值和环境变量（前缀 CMS_ADMIN_）加载所有配置

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// GraphQL 端点，例如 "http://localhost:3000/graphql"
    pub endpoint: String,
    /// 单次请求超时时间（秒）
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 会话存储方式: file, memory
    pub storage: String,
    /// file 存储时的会话文件路径
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// 刷新令牌操作的 operationName
    pub refresh_operation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AdminConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        settings = settings
            .set_default("api.endpoint", "http://localhost:3000/graphql")?
            .set_default("api.timeout_secs", 30)?
            .set_default("session.storage", "file")?
            .set_default("session.path", ".cms-admin/session.json")?
            .set_default("auth.refresh_operation", "RefreshToken")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        // 从环境变量加载配置（前缀为 CMS_ADMIN_）
        settings = settings.add_source(
            Environment::with_prefix("CMS_ADMIN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AdminConfig = settings.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.api.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Message(format!(
                "Invalid API endpoint: {}. Must be an http(s) URL",
                self.api.endpoint
            )));
        }

        if self.api.timeout_secs == 0 || self.api.timeout_secs > 300 {
            return Err(ConfigError::Message(
                "api.timeout_secs must be between 1 and 300".to_string(),
            ));
        }

        match self.session.storage.to_lowercase().as_str() {
            "memory" => {}
            "file" => {
                if self.session.path.trim().is_empty() {
                    return Err(ConfigError::Message(
                        "session.path is required for file storage".to_string(),
                    ));
                }
            }
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid session storage: {}. Must be one of: file, memory",
                    self.session.storage
                )))
            }
        }

        if self.auth.refresh_operation.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.refresh_operation must not be empty".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }
}
