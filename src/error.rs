//! 统一错误模型
//! 定义客户端所有错误类型，以及面向用户的错误消息

use thiserror::Error;

/// 错误大类，决定拦截器如何处理一次失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 访问令牌失效，可通过刷新恢复
    Unauthorized,
    /// 操作不被允许，与令牌是否有效无关
    Forbidden,
    /// 请求没有到达服务器
    Connectivity,
    /// 本地或服务端的输入校验失败
    Validation,
    Other,
}

/// 客户端错误类型
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("GraphQL error: {0}")]
    GraphQL(String),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// 获取错误大类
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized(_) | ApiError::SessionExpired => ErrorKind::Unauthorized,
            ApiError::Forbidden(_) => ErrorKind::Forbidden,
            ApiError::Connectivity(_) => ErrorKind::Connectivity,
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::GraphQL(_)
            | ApiError::Http { .. }
            | ApiError::Decode(_)
            | ApiError::Storage(_)
            | ApiError::Config(_)
            | ApiError::Internal(_) => ErrorKind::Other,
        }
    }

    /// 对应的 HTTP 状态码（如果有）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) | ApiError::SessionExpired => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::Validation(_) => Some(400),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 获取用户友好的错误消息（不包含传输层细节）
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized(_) => "Authentication failed".to_string(),
            ApiError::Forbidden(_) => {
                "You do not have permission to perform this action".to_string()
            }
            ApiError::Connectivity(_) => {
                "Unable to reach the server, check your network connection".to_string()
            }
            ApiError::Validation(msg) => msg.clone(),
            ApiError::SessionExpired => "Your session has expired, please sign in again".to_string(),
            ApiError::GraphQL(msg) => msg.clone(),
            ApiError::Http { .. } | ApiError::Decode(_) => {
                "The server returned an unexpected response".to_string()
            }
            ApiError::Storage(_) => "Local session storage is unavailable".to_string(),
            ApiError::Config(_) => "Configuration error".to_string(),
            ApiError::Internal(_) => "Internal error".to_string(),
        }
    }
}

/// reqwest 的发送错误都意味着没有拿到响应
impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else if e.is_builder() {
            ApiError::Config(e.to_string())
        } else {
            ApiError::Connectivity(e.to_string())
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(e: config::ConfigError) -> Self {
        ApiError::Config(e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ApiError::Unauthorized("expired".into()).kind(), ErrorKind::Unauthorized);
        assert_eq!(ApiError::SessionExpired.kind(), ErrorKind::Unauthorized);
        assert_eq!(ApiError::Forbidden("no".into()).kind(), ErrorKind::Forbidden);
        assert_eq!(ApiError::Connectivity("down".into()).kind(), ErrorKind::Connectivity);
        assert_eq!(ApiError::Validation("email".into()).kind(), ErrorKind::Validation);
        assert_eq!(ApiError::Decode("eof".into()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Unauthorized(String::new()).status_code(), Some(401));
        assert_eq!(ApiError::Forbidden(String::new()).status_code(), Some(403));
        assert_eq!(
            ApiError::Http { status: 502, message: "bad gateway".into() }.status_code(),
            Some(502)
        );
        assert_eq!(ApiError::Connectivity(String::new()).status_code(), None);
    }

    #[test]
    fn test_user_message_no_transport_details() {
        let error = ApiError::Connectivity("tcp connect error: 127.0.0.1:3000".to_string());
        let message = error.user_message();
        assert!(!message.contains("127.0.0.1"));

        let error = ApiError::Storage("/home/me/.cms-admin/session.json: denied".to_string());
        assert!(!error.user_message().contains("session.json"));
    }
}
