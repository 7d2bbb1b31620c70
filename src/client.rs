//! 管理后台 API 客户端
//! 组装拦截器链：请求追踪 -> 认证头 -> 令牌刷新协调器 -> 传输层

use crate::{
    auth::{
        AuthHeader, AuthHeaderLayer, GraphQLRefresher, RefreshCoordinator, RefreshLayer,
        RefreshService, Refresher, SessionManager,
    },
    config::AdminConfig,
    error::ApiError,
    graphql::{GraphQLRequest, GraphQLResponse, HttpTransport},
    middleware::{RequestTracing, RequestTracingLayer},
    notify::Notifier,
    storage::Storage,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower::{Layer, Service, ServiceBuilder, ServiceExt};

/// 完整的拦截器链
pub type ServiceStack<T> = RequestTracing<AuthHeader<RefreshService<T>>>;

#[derive(Clone)]
pub struct AdminClient<T = HttpTransport> {
    service: ServiceStack<T>,
    // 登录等匿名操作只经过追踪层，失败不会触发刷新
    unauthenticated: RequestTracing<T>,
    session: SessionManager,
    coordinator: Arc<RefreshCoordinator>,
    notifier: Arc<dyn Notifier>,
}

impl AdminClient<HttpTransport> {
    /// 根据配置创建基于 HTTP 的客户端
    pub fn from_config(
        config: &AdminConfig,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config.api)?;
        Ok(Self::new(
            transport,
            storage,
            notifier,
            &config.auth.refresh_operation,
        ))
    }
}

impl<T> AdminClient<T>
where
    T: Service<GraphQLRequest, Response = GraphQLResponse, Error = ApiError>
        + Clone
        + Send
        + Sync
        + 'static,
    T::Future: Send + 'static,
{
    /// 使用 RefreshToken mutation 刷新令牌
    pub fn new(
        transport: T,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        refresh_operation: &str,
    ) -> Self {
        let refresher = Arc::new(GraphQLRefresher::new(transport.clone(), refresh_operation));
        Self::with_refresher(transport, storage, refresher, notifier, refresh_operation)
    }

    /// 使用自定义刷新实现
    pub fn with_refresher(
        transport: T,
        storage: Arc<dyn Storage>,
        refresher: Arc<dyn Refresher>,
        notifier: Arc<dyn Notifier>,
        refresh_operation: &str,
    ) -> Self {
        let session = SessionManager::new(storage);
        let coordinator = Arc::new(
            RefreshCoordinator::new(session.clone(), refresher, Arc::clone(&notifier))
                .with_refresh_operation(refresh_operation),
        );

        let service = ServiceBuilder::new()
            .layer(RequestTracingLayer)
            .layer(AuthHeaderLayer::new(session.clone()))
            .layer(RefreshLayer::new(Arc::clone(&coordinator)))
            .service(transport.clone());

        Self {
            service,
            unauthenticated: RequestTracingLayer.layer(transport),
            session,
            coordinator,
            notifier,
        }
    }

    /// 经过完整拦截器链执行请求
    pub async fn execute(&self, request: GraphQLRequest) -> Result<GraphQLResponse, ApiError> {
        self.service.clone().oneshot(request).await
    }

    /// 执行请求并取出顶层字段
    pub async fn query<R: DeserializeOwned>(
        &self,
        request: GraphQLRequest,
        field: &str,
    ) -> Result<R, ApiError> {
        self.execute(request).await?.field(field)
    }

    /// 绕过认证与刷新直接发送
    pub async fn execute_unauthenticated(
        &self,
        request: GraphQLRequest,
    ) -> Result<GraphQLResponse, ApiError> {
        self.unauthenticated.clone().oneshot(request).await
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }
}
