//! 博客 CMS 管理后台 API 客户端
//! 提供带令牌刷新协调的 GraphQL 拦截器链、会话存储与认证服务

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod graphql;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use client::AdminClient;
pub use error::{ApiError, ErrorKind};
pub use graphql::{GraphQLRequest, GraphQLResponse};
