//! 会话管理
//! 访问令牌与刷新令牌要么同时存在，要么同时不存在

use super::jwt::{decode_unverified, AccessClaims};
use crate::{
    error::ApiError,
    models::auth::TokenPair,
    storage::{Storage, ACCESS_TOKEN_KEY, LAST_VISITED_ROUTE_KEY, REFRESH_TOKEN_KEY},
};
use secrecy::{ExposeSecret, Secret, SecretString};
use std::sync::Arc;

/// 当前会话（令牌使用 Secret 包装，防止日志泄露）
#[derive(Debug, Clone)]
pub struct Session {
    access_token: SecretString,
    refresh_token: SecretString,
}

impl Session {
    pub fn new(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: Secret::new(refresh_token),
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    /// 访问令牌中的声明（未验证签名）
    pub fn claims(&self) -> Result<AccessClaims, ApiError> {
        decode_unverified(self.access_token.expose_secret())
    }
}

impl From<&TokenPair> for Session {
    fn from(pair: &TokenPair) -> Self {
        Session::new(pair.access_token.clone(), pair.refresh_token.clone())
    }
}

/// 基于存储的会话访问器
#[derive(Clone)]
pub struct SessionManager {
    storage: Arc<dyn Storage>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// 读取当前会话
    ///
    /// 只剩一个令牌的残缺会话视为不存在，并清除残留的键。
    pub fn current(&self) -> Result<Option<Session>, ApiError> {
        let access = self.storage.get(ACCESS_TOKEN_KEY)?.filter(|t| !t.is_empty());
        let refresh = self.storage.get(REFRESH_TOKEN_KEY)?.filter(|t| !t.is_empty());

        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(Session::new(access, refresh))),
            (None, None) => Ok(None),
            _ => {
                tracing::warn!("Partial session found in storage, discarding it");
                self.clear()?;
                Ok(None)
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.current(), Ok(Some(_)))
    }

    /// 保存新的令牌对；第二个键写入失败时回滚第一个
    pub fn store(&self, pair: &TokenPair) -> Result<(), ApiError> {
        if pair.access_token.is_empty() || pair.refresh_token.is_empty() {
            return Err(ApiError::Decode("token pair is missing a token".to_string()));
        }

        self.storage.set(ACCESS_TOKEN_KEY, &pair.access_token)?;
        if let Err(e) = self.storage.set(REFRESH_TOKEN_KEY, &pair.refresh_token) {
            if let Err(rollback) = self.storage.remove(ACCESS_TOKEN_KEY) {
                tracing::warn!(error = %rollback, "Failed to roll back partial session write");
            }
            return Err(e);
        }

        Ok(())
    }

    /// 销毁会话；保留最近访问的路由，便于重新登录后恢复
    pub fn clear(&self) -> Result<(), ApiError> {
        let access = self.storage.remove(ACCESS_TOKEN_KEY);
        let refresh = self.storage.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }

    pub fn last_visited_route(&self) -> Result<Option<String>, ApiError> {
        self.storage.get(LAST_VISITED_ROUTE_KEY)
    }

    pub fn set_last_visited_route(&self, route: &str) -> Result<(), ApiError> {
        self.storage.set(LAST_VISITED_ROUTE_KEY, route)
    }

    /// 读取并移除最近访问的路由
    pub fn take_last_visited_route(&self) -> Result<Option<String>, ApiError> {
        let route = self.storage.get(LAST_VISITED_ROUTE_KEY)?;
        if route.is_some() {
            self.storage.remove(LAST_VISITED_ROUTE_KEY)?;
        }
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn manager() -> (SessionManager, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (SessionManager::new(storage.clone()), storage)
    }

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        }
    }

    #[test]
    fn test_store_and_read_session() {
        let (session, _) = manager();
        assert!(session.current().unwrap().is_none());

        session.store(&pair("a-1", "r-1")).unwrap();
        let current = session.current().unwrap().unwrap();
        assert_eq!(current.access_token().expose_secret(), "a-1");
        assert_eq!(current.refresh_token().expose_secret(), "r-1");
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_partial_session_is_discarded() {
        let (session, storage) = manager();
        storage.set(ACCESS_TOKEN_KEY, "a-1").unwrap();

        assert!(session.current().unwrap().is_none());
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_store_rejects_incomplete_pair() {
        let (session, storage) = manager();
        assert!(session.store(&pair("a-1", "")).is_err());
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    /// 刷新令牌写入总是失败的存储
    struct RefreshWriteFails(MemoryStorage);

    impl Storage for RefreshWriteFails {
        fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
            if key == REFRESH_TOKEN_KEY {
                return Err(ApiError::Storage("disk full".to_string()));
            }
            self.0.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), ApiError> {
            self.0.remove(key)
        }
    }

    #[test]
    fn test_store_rolls_back_on_partial_write() {
        let storage = Arc::new(RefreshWriteFails(MemoryStorage::new()));
        let session = SessionManager::new(storage.clone());

        let result = session.store(&pair("a-1", "r-1"));

        assert!(matches!(result, Err(ApiError::Storage(_))));
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert!(session.current().unwrap().is_none());
    }

    #[test]
    fn test_clear_keeps_last_visited_route() {
        let (session, _) = manager();
        session.store(&pair("a-1", "r-1")).unwrap();
        session.set_last_visited_route("/articles/7/edit").unwrap();

        session.clear().unwrap();
        assert!(session.current().unwrap().is_none());
        assert_eq!(
            session.take_last_visited_route().unwrap().as_deref(),
            Some("/articles/7/edit")
        );
        assert_eq!(session.last_visited_route().unwrap(), None);
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = Session::new("a-very-secret".to_string(), "r-very-secret".to_string());
        let debug = format!("{:?}", session);
        assert!(!debug.contains("a-very-secret"));
        assert!(!debug.contains("r-very-secret"));
    }
}
