//! 令牌刷新协调器
//!
//! 位于拦截器链中传输层之上：访问令牌失效时，无论多少并发请求同时失败，
//! 每一轮只发起一次刷新；刷新成功后按失败顺序重放排队的请求，
//! 刷新失败则丢弃队列并销毁会话。

use super::refresh::{Admission, RefreshQueue, RefreshState, Settlement};
use super::session::SessionManager;
use crate::{
    error::{ApiError, ErrorKind},
    graphql::{operations, GraphQLRequest, GraphQLResponse, ResponseFuture},
    models::auth::TokenPair,
    notify::{Notifier, Severity},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret, SecretString};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tower::{Layer, Service, ServiceExt};
use tracing::{debug, info, warn};

/// 刷新调用
#[async_trait]
pub trait Refresher: Send + Sync {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, ApiError>;
}

/// 通过 RefreshToken mutation 刷新
///
/// 直接使用传输层，不经过协调器，刷新失败不会再触发刷新。
#[derive(Clone)]
pub struct GraphQLRefresher<T> {
    transport: T,
    operation_name: String,
}

impl<T> GraphQLRefresher<T> {
    pub fn new(transport: T, operation_name: impl Into<String>) -> Self {
        Self {
            transport,
            operation_name: operation_name.into(),
        }
    }
}

#[async_trait]
impl<T> Refresher for GraphQLRefresher<T>
where
    T: Service<GraphQLRequest, Response = GraphQLResponse, Error = ApiError>
        + Clone
        + Send
        + Sync
        + 'static,
    T::Future: Send,
{
    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, ApiError> {
        let request = operations::refresh_token(&self.operation_name, refresh_token.expose_secret());
        let response = self.transport.clone().oneshot(request).await?;
        response.field("refreshToken")
    }
}

/// 等待刷新结果的请求
pub struct PendingRequest {
    request: GraphQLRequest,
    respond_to: oneshot::Sender<Result<GraphQLResponse, ApiError>>,
}

enum Recovery {
    /// 令牌已被别的请求刷新过，直接用新令牌重发
    Resend(GraphQLRequest, SecretString),
    Admitted(Admission),
}

pub struct RefreshCoordinator {
    queue: Mutex<RefreshQueue<PendingRequest>>,
    session: SessionManager,
    refresher: Arc<dyn Refresher>,
    notifier: Arc<dyn Notifier>,
    refresh_operation: String,
}

impl RefreshCoordinator {
    pub fn new(
        session: SessionManager,
        refresher: Arc<dyn Refresher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            queue: Mutex::new(RefreshQueue::new()),
            session,
            refresher,
            notifier,
            refresh_operation: operations::REFRESH_TOKEN_OPERATION.to_string(),
        }
    }

    /// 设置刷新操作名，经链路发送的同名操作失败时直接登出
    pub fn with_refresh_operation(mut self, name: impl Into<String>) -> Self {
        self.refresh_operation = name.into();
        self
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn state(&self) -> RefreshState {
        self.lock_queue().state()
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock_queue().is_refreshing()
    }

    /// 正在等待刷新结果的请求数
    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    /// 已开始的刷新轮次
    pub fn waves(&self) -> u64 {
        self.lock_queue().waves()
    }

    fn lock_queue(&self) -> MutexGuard<'_, RefreshQueue<PendingRequest>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_refresh_operation(&self, request: &GraphQLRequest) -> bool {
        request.operation_name.as_deref() == Some(self.refresh_operation.as_str())
    }

    /// 处理内层返回的失败
    pub async fn handle_failure<S>(
        self: Arc<Self>,
        request: GraphQLRequest,
        error: ApiError,
        inner: S,
    ) -> Result<GraphQLResponse, ApiError>
    where
        S: Service<GraphQLRequest, Response = GraphQLResponse, Error = ApiError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        match error.kind() {
            ErrorKind::Unauthorized | ErrorKind::Forbidden if self.is_refresh_operation(&request) => {
                warn!(
                    operation = %request.operation_label(),
                    error = %error,
                    "Refresh operation rejected, ending session"
                );
                self.end_session();
                Err(ApiError::SessionExpired)
            }
            ErrorKind::Unauthorized => self.recover(request, inner).await,
            _ => {
                self.surface(request.operation_label(), &error);
                Err(error)
            }
        }
    }

    /// 禁止与网络失败需要提示用户；授权失败由刷新流程处理，这里忽略
    fn surface(&self, operation: &str, error: &ApiError) {
        match error.kind() {
            ErrorKind::Forbidden => {
                warn!(operation = %operation, "Operation forbidden");
                self.notifier.notify(&error.user_message(), Severity::Warning);
            }
            ErrorKind::Connectivity => {
                warn!(operation = %operation, error = %error, "Server unreachable");
                self.notifier.notify(&error.user_message(), Severity::Error);
            }
            ErrorKind::Unauthorized | ErrorKind::Validation | ErrorKind::Other => {}
        }
    }

    async fn recover<S>(
        self: Arc<Self>,
        request: GraphQLRequest,
        inner: S,
    ) -> Result<GraphQLResponse, ApiError>
    where
        S: Service<GraphQLRequest, Response = GraphQLResponse, Error = ApiError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let recovery = {
            let mut queue = self.lock_queue();
            match self.refreshed_since(&request) {
                Some(token) if !queue.is_refreshing() => Recovery::Resend(request, token),
                _ => Recovery::Admitted(queue.admit(PendingRequest {
                    request,
                    respond_to: tx,
                })),
            }
        };

        match recovery {
            Recovery::Resend(request, token) => {
                debug!(
                    operation = %request.operation_label(),
                    "Access token already refreshed, resending"
                );
                metrics::counter!("graphql_replayed_requests_total").increment(1);
                let operation = request.operation_label().to_string();
                let request = request.with_bearer(token.expose_secret())?;
                let result = inner.oneshot(request).await;
                if let Err(e) = &result {
                    self.surface(&operation, e);
                }
                return result;
            }
            Recovery::Admitted(Admission::StartRefresh) => {
                // 刷新放到独立任务中，调用方放弃等待不会让队列卡在 Refreshing
                tokio::spawn(Arc::clone(&self).run_refresh(inner));
            }
            Recovery::Admitted(Admission::Queued) => {
                debug!("Refresh in progress, request queued");
            }
        }

        rx.await.unwrap_or_else(|_| {
            Err(ApiError::Internal(
                "pending request dropped before the refresh settled".to_string(),
            ))
        })
    }

    /// 请求发出后会话令牌是否已经换过
    fn refreshed_since(&self, request: &GraphQLRequest) -> Option<SecretString> {
        let session = self.session.current().ok().flatten()?;
        let current = session.access_token().expose_secret();
        (request.bearer_token() != Some(current.as_str())).then(|| session.access_token().clone())
    }

    async fn run_refresh<S>(self: Arc<Self>, inner: S)
    where
        S: Service<GraphQLRequest, Response = GraphQLResponse, Error = ApiError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        info!("Access token rejected, refreshing session");

        let outcome = match self.session.current() {
            Ok(Some(session)) => self.refresher.refresh(session.refresh_token()).await,
            Ok(None) => Err(ApiError::SessionExpired),
            Err(e) => Err(e),
        };
        let outcome = outcome.and_then(|pair| {
            self.session.store(&pair)?;
            Ok(pair)
        });

        match outcome {
            Ok(pair) => {
                metrics::counter!("token_refresh_total", "outcome" => "success").increment(1);
                let settlement = self.lock_queue().settle(true);
                info!(pending = settlement.len(), "Session refreshed, replaying queued requests");

                if let Settlement::Replay(pending) = settlement {
                    let token: SecretString = Secret::new(pair.access_token);
                    self.replay(pending, &token, inner).await;
                }
            }
            Err(error) => {
                metrics::counter!("token_refresh_total", "outcome" => "failure").increment(1);
                if error.kind() == ErrorKind::Connectivity {
                    self.surface(&self.refresh_operation, &error);
                }
                // 先销毁会话再回到 Idle，期间到达的失败仍归入本轮被丢弃
                self.end_session();
                let settlement = self.lock_queue().settle(false);
                warn!(
                    error = %error,
                    abandoned = settlement.len(),
                    "Session refresh failed, queued requests abandoned"
                );

                if let Settlement::Abandon(pending) = settlement {
                    for PendingRequest { respond_to, .. } in pending {
                        let _ = respond_to.send(Err(ApiError::SessionExpired));
                    }
                }
            }
        }
    }

    async fn replay<S>(&self, pending: Vec<PendingRequest>, token: &SecretString, inner: S)
    where
        S: Service<GraphQLRequest, Response = GraphQLResponse, Error = ApiError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        for PendingRequest { request, respond_to } in pending {
            debug!(operation = %request.operation_label(), "Replaying request");
            metrics::counter!("graphql_replayed_requests_total").increment(1);

            let operation = request.operation_label().to_string();
            let result = match request.with_bearer(token.expose_secret()) {
                Ok(request) => inner.clone().oneshot(request).await,
                Err(e) => Err(e),
            };
            // 重放再次 401 直接返回，不会开启新一轮刷新
            if let Err(e) = &result {
                self.surface(&operation, e);
            }
            // 调用方已不再等待时结果被丢弃
            let _ = respond_to.send(result);
        }
    }

    /// 销毁会话并通知用户
    fn end_session(&self) {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session storage");
        }
        self.notifier
            .notify(&ApiError::SessionExpired.user_message(), Severity::Warning);
    }
}

/// 把协调器装入拦截器链
#[derive(Clone)]
pub struct RefreshLayer {
    coordinator: Arc<RefreshCoordinator>,
}

impl RefreshLayer {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }
}

impl<S> Layer<S> for RefreshLayer {
    type Service = RefreshService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RefreshService {
            inner,
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

#[derive(Clone)]
pub struct RefreshService<S> {
    inner: S,
    coordinator: Arc<RefreshCoordinator>,
}

impl<S> Service<GraphQLRequest> for RefreshService<S>
where
    S: Service<GraphQLRequest, Response = GraphQLResponse, Error = ApiError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = GraphQLResponse;
    type Error = ApiError;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: GraphQLRequest) -> Self::Future {
        // 取走已就绪的 inner，留一个克隆给下一次调用
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let coordinator = Arc::clone(&self.coordinator);

        Box::pin(async move {
            match inner.call(request.clone()).await {
                Err(error) => coordinator.handle_failure(request, error, inner).await,
                ok => ok,
            }
        })
    }
}
