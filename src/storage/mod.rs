//! 客户端本地存储层
//! 以固定字符串键保存会话令牌与最近访问的路由

pub mod file_store;
pub mod memory_store;

pub use file_store::FileStorage;
pub use memory_store::MemoryStorage;

use crate::error::ApiError;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const LAST_VISITED_ROUTE_KEY: &str = "lastVisitedRoute";

/// 键值存储
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ApiError>;
    fn remove(&self, key: &str) -> Result<(), ApiError>;
}
