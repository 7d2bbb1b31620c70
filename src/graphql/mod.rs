//! GraphQL 请求/响应封装与失败分类

pub mod operations;
pub mod transport;

pub use transport::HttpTransport;

use crate::error::ApiError;
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 所有拦截器与传输层共用的 future 类型
pub type ResponseFuture = BoxFuture<'static, Result<GraphQLResponse, ApiError>>;

/// GraphQL 请求
///
/// `headers` 是传输元数据（Authorization、x-request-id），不会序列化进请求体。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    pub query: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub variables: Value,
    #[serde(skip)]
    pub headers: HeaderMap,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            operation_name: None,
            query: query.into(),
            variables: Value::Null,
            headers: HeaderMap::new(),
        }
    }

    pub fn operation(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    /// 操作名，用于日志与指标
    pub fn operation_label(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("anonymous")
    }

    /// 请求当前携带的 Bearer 令牌
    pub fn bearer_token(&self) -> Option<&str> {
        crate::auth::middleware::extract_token(&self.headers)
    }

    /// 替换 Authorization 头
    pub fn with_bearer(mut self, token: &str) -> Result<Self, ApiError> {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::Internal("access token is not a valid header value".to_string()))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }
}

/// GraphQL 错误条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLError {
    /// extensions.code，例如 UNAUTHENTICATED
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }

    /// 服务端附带的 HTTP 风格状态码
    ///
    /// 依次查找 `status`、`statusCode`、`response.statusCode`、`originalError.statusCode`。
    pub fn status_hint(&self) -> Option<u16> {
        let ext = self.extensions.as_ref()?;
        let candidates = [
            ext.get("status"),
            ext.get("statusCode"),
            ext.get("response").and_then(|r| r.get("statusCode")),
            ext.get("originalError").and_then(|r| r.get("statusCode")),
        ];
        candidates
            .into_iter()
            .flatten()
            .find_map(|v| v.as_u64())
            .and_then(|v| u16::try_from(v).ok())
    }
}

/// GraphQL 响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLError>>,
}

impl GraphQLResponse {
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    pub fn errors(&self) -> &[GraphQLError] {
        self.errors.as_deref().unwrap_or_default()
    }

    /// 取出顶层字段并反序列化
    pub fn field<T: DeserializeOwned>(self, name: &str) -> Result<T, ApiError> {
        if !self.errors().is_empty() {
            let messages: Vec<&str> = self.errors().iter().map(|e| e.message.as_str()).collect();
            return Err(ApiError::GraphQL(messages.join("; ")));
        }

        let value = self
            .data
            .and_then(|mut data| data.get_mut(name).map(Value::take))
            .filter(|v| !v.is_null())
            .ok_or_else(|| ApiError::Decode(format!("response has no `{}` field", name)))?;

        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// 根据 HTTP 状态与响应体对一次调用分类
///
/// 认证/授权失败转换为错误，交给拦截器处理；其它 GraphQL 错误保留在响应中。
pub fn classify(status: u16, body: Option<GraphQLResponse>) -> Result<GraphQLResponse, ApiError> {
    let first_message = body
        .as_ref()
        .and_then(|b| b.errors().first())
        .map(|e| e.message.clone());

    match status {
        401 => {
            return Err(ApiError::Unauthorized(
                first_message.unwrap_or_else(|| "access token rejected".to_string()),
            ))
        }
        403 => {
            return Err(ApiError::Forbidden(
                first_message.unwrap_or_else(|| "operation not permitted".to_string()),
            ))
        }
        _ => {}
    }

    if let Some(body) = &body {
        for error in body.errors() {
            match (error.code(), error.status_hint()) {
                (Some("UNAUTHENTICATED"), _) | (_, Some(401)) => {
                    return Err(ApiError::Unauthorized(error.message.clone()))
                }
                (Some("FORBIDDEN"), _) | (_, Some(403)) => {
                    return Err(ApiError::Forbidden(error.message.clone()))
                }
                (Some("BAD_USER_INPUT"), _) | (_, Some(400)) if status < 300 => {
                    return Err(ApiError::Validation(error.message.clone()))
                }
                _ => {}
            }
        }
    }

    match body {
        Some(body) if (200..300).contains(&status) => Ok(body),
        Some(body) if body.data.is_some() => Ok(body),
        _ if (200..300).contains(&status) => {
            Err(ApiError::Decode("response body is not a GraphQL response".to_string()))
        }
        _ => Err(ApiError::Http {
            status,
            message: first_message.unwrap_or_else(|| format!("HTTP {}", status)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn error_body(code: &str) -> GraphQLResponse {
        serde_json::from_value(json!({
            "data": null,
            "errors": [{ "message": "denied", "extensions": { "code": code } }]
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_http_status() {
        assert!(matches!(classify(401, None), Err(ApiError::Unauthorized(_))));
        assert!(matches!(classify(403, None), Err(ApiError::Forbidden(_))));
        assert!(matches!(
            classify(502, None),
            Err(ApiError::Http { status: 502, .. })
        ));
    }

    #[test]
    fn test_classify_graphql_codes() {
        assert!(matches!(
            classify(200, Some(error_body("UNAUTHENTICATED"))),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            classify(200, Some(error_body("FORBIDDEN"))),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            classify(200, Some(error_body("BAD_USER_INPUT"))),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_classify_nested_status_code() {
        let body: GraphQLResponse = serde_json::from_value(json!({
            "errors": [{
                "message": "Unauthorized",
                "extensions": { "code": "INTERNAL_SERVER_ERROR", "response": { "statusCode": 401 } }
            }]
        }))
        .unwrap();

        assert!(matches!(classify(200, Some(body)), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_classify_keeps_other_errors() {
        let result = classify(200, Some(error_body("NOT_FOUND"))).unwrap();
        assert_eq!(result.errors().len(), 1);
    }

    #[test]
    fn test_field_extraction() {
        let response = GraphQLResponse::from_data(json!({ "me": { "id": "u1" } }));
        let me: Value = response.field("me").unwrap();
        assert_eq!(me["id"], "u1");

        let response = GraphQLResponse::from_data(json!({ "me": null }));
        assert!(matches!(response.field::<Value>("me"), Err(ApiError::Decode(_))));

        let response = error_body("NOT_FOUND");
        assert!(matches!(response.field::<Value>("me"), Err(ApiError::GraphQL(_))));
    }

    #[test]
    fn test_request_body_skips_headers() {
        let request = GraphQLRequest::new("query Me { me { id } }")
            .operation("Me")
            .with_bearer("abc")
            .unwrap();

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["operationName"], "Me");
        assert!(body.get("headers").is_none());
        assert!(body.get("variables").is_none());
        assert_eq!(request.bearer_token(), Some("abc"));
    }
}
