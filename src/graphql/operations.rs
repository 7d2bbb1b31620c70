//! 认证相关的 GraphQL 操作文档

use super::GraphQLRequest;
use crate::models::auth::LoginCredentials;
use serde_json::json;

pub const LOGIN_OPERATION: &str = "Login";
pub const REFRESH_TOKEN_OPERATION: &str = "RefreshToken";
pub const ME_OPERATION: &str = "Me";

const USER_FIELDS: &str = "id email name role";

/// 登录
pub fn login(credentials: &LoginCredentials) -> GraphQLRequest {
    GraphQLRequest::new(format!(
        "mutation {op}($email: String!, $password: String!) {{ \
           login(email: $email, password: $password) {{ \
             accessToken refreshToken user {{ {fields} }} \
           }} \
         }}",
        op = LOGIN_OPERATION,
        fields = USER_FIELDS,
    ))
    .operation(LOGIN_OPERATION)
    .variables(json!({
        "email": credentials.email,
        "password": credentials.password,
    }))
}

/// 用刷新令牌换取新的令牌对
///
/// `operation_name` 允许后端使用不同的操作名，字段名固定为 `refreshToken`。
pub fn refresh_token(operation_name: &str, refresh_token: &str) -> GraphQLRequest {
    GraphQLRequest::new(format!(
        "mutation {op}($refreshToken: String!) {{ \
           refreshToken(refreshToken: $refreshToken) {{ accessToken refreshToken }} \
         }}",
        op = operation_name,
    ))
    .operation(operation_name)
    .variables(json!({ "refreshToken": refresh_token }))
}

/// 当前登录用户
pub fn me() -> GraphQLRequest {
    GraphQLRequest::new(format!(
        "query {op} {{ me {{ {fields} }} }}",
        op = ME_OPERATION,
        fields = USER_FIELDS,
    ))
    .operation(ME_OPERATION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_token_request() {
        let request = refresh_token(REFRESH_TOKEN_OPERATION, "r-1");
        assert_eq!(request.operation_name.as_deref(), Some("RefreshToken"));
        assert!(request.query.starts_with("mutation RefreshToken("));
        assert_eq!(request.variables["refreshToken"], "r-1");
    }

    #[test]
    fn test_login_request_variables() {
        let credentials = LoginCredentials {
            email: "editor@example.com".to_string(),
            password: "hunter22".to_string(),
        };
        let request = login(&credentials);
        assert_eq!(request.operation_label(), "Login");
        assert_eq!(request.variables["email"], "editor@example.com");
        assert!(request.query.contains("user { id email name role }"));
    }
}
