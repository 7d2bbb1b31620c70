//! Authentication-related models

use super::user::CurrentUser;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login form input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginCredentials {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token pair returned by the login and refresh mutations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login mutation payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<CurrentUser>,
}

impl LoginPayload {
    pub fn token_pair(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Result of a successful sign-in
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: Option<CurrentUser>,
    /// Route the user was on when the previous session ended
    pub resume_route: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_credentials_validation() {
        let valid = LoginCredentials {
            email: "editor@example.com".to_string(),
            password: "secret".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = LoginCredentials {
            email: "editor".to_string(),
            password: "secret".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let empty_password = LoginCredentials {
            email: "editor@example.com".to_string(),
            password: String::new(),
        };
        assert!(empty_password.validate().is_err());
    }

    #[test]
    fn test_login_payload_deserialization() {
        let payload: LoginPayload = serde_json::from_str(
            r#"{"accessToken":"a","refreshToken":"r","user":{"id":"1","email":"e@x.io","name":"Ed","role":"EDITOR"}}"#,
        )
        .unwrap();

        let pair = payload.token_pair();
        assert_eq!(pair.access_token, "a");
        assert_eq!(pair.refresh_token, "r");
        assert_eq!(payload.user.unwrap().role.as_deref(), Some("EDITOR"));
    }
}
