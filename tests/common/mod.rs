//! 测试公共模块
//! 提供脚本化传输层、刷新桩与预置会话的客户端

#![allow(dead_code)]

use async_trait::async_trait;
use cms_admin::{
    auth::Refresher,
    graphql::{GraphQLRequest, GraphQLResponse, ResponseFuture},
    models::auth::TokenPair,
    notify::{ChannelNotifier, Notification},
    storage::{MemoryStorage, Storage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY},
    AdminClient, ApiError,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tower::Service;

pub const OLD_ACCESS: &str = "old-access";
pub const OLD_REFRESH: &str = "old-refresh";
pub const NEW_ACCESS: &str = "new-access";
pub const NEW_REFRESH: &str = "new-refresh";

type Handler = dyn Fn(&GraphQLRequest) -> Result<GraphQLResponse, ApiError> + Send + Sync;

/// 传输层收到的一次调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: String,
    pub bearer: Option<String>,
}

/// 按脚本应答的传输层，记录每次调用
#[derive(Clone)]
pub struct ScriptedTransport {
    handler: Arc<Handler>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&GraphQLRequest) -> Result<GraphQLResponse, ApiError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 只接受指定访问令牌，其它一律 401
    pub fn accepting(token: &'static str) -> Self {
        Self::new(move |request| {
            if request.bearer_token() == Some(token) {
                Ok(echo(request))
            } else {
                Err(ApiError::Unauthorized("jwt expired".to_string()))
            }
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.operation).collect()
    }
}

impl Service<GraphQLRequest> for ScriptedTransport {
    type Response = GraphQLResponse;
    type Error = ApiError;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: GraphQLRequest) -> Self::Future {
        self.calls.lock().unwrap().push(RecordedCall {
            operation: request.operation_label().to_string(),
            bearer: request.bearer_token().map(str::to_string),
        });
        let result = (self.handler)(&request);
        Box::pin(std::future::ready(result))
    }
}

/// 把操作名与令牌原样放进 data，便于断言
pub fn echo(request: &GraphQLRequest) -> GraphQLResponse {
    GraphQLResponse::from_data(json!({
        "operation": request.operation_label(),
        "token": request.bearer_token(),
    }))
}

pub fn named(operation: &str) -> GraphQLRequest {
    GraphQLRequest::new(format!("query {} {{ __typename }}", operation)).operation(operation)
}

/// 计数的刷新桩
pub struct StubRefresher {
    calls: AtomicUsize,
    failure: Option<fn() -> ApiError>,
}

impl StubRefresher {
    fn with_failure(failure: Option<fn() -> ApiError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failure,
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::with_failure(None)
    }

    /// 刷新令牌被服务端拒绝
    pub fn failing() -> Arc<Self> {
        Self::with_failure(Some(|| ApiError::Forbidden("refresh token revoked".to_string())))
    }

    /// 刷新请求没有到达服务端
    pub fn unreachable() -> Arc<Self> {
        Self::with_failure(Some(|| ApiError::Connectivity("connection reset".to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Refresher for StubRefresher {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(refresh_token.expose_secret(), OLD_REFRESH);

        if let Some(failure) = self.failure {
            return Err(failure());
        }
        Ok(TokenPair {
            access_token: NEW_ACCESS.to_string(),
            refresh_token: NEW_REFRESH.to_string(),
        })
    }
}

/// 预置 old-access / old-refresh 会话的存储
pub fn seeded_storage() -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.set(ACCESS_TOKEN_KEY, OLD_ACCESS).unwrap();
    storage.set(REFRESH_TOKEN_KEY, OLD_REFRESH).unwrap();
    storage
}

pub struct Harness {
    pub client: AdminClient<ScriptedTransport>,
    pub transport: ScriptedTransport,
    pub storage: Arc<MemoryStorage>,
    pub refresher: Arc<StubRefresher>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new(
        transport: ScriptedTransport,
        storage: Arc<MemoryStorage>,
        refresher: Arc<StubRefresher>,
    ) -> Self {
        let (notifier, notifications) = ChannelNotifier::channel();
        let client = AdminClient::with_refresher(
            transport.clone(),
            storage.clone() as Arc<dyn Storage>,
            refresher.clone() as Arc<dyn Refresher>,
            Arc::new(notifier),
            "RefreshToken",
        );

        Self {
            client,
            transport,
            storage,
            refresher,
            notifications,
        }
    }

    /// 取出目前为止的全部通知
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            drained.push(notification);
        }
        drained
    }
}
