//! 认证头注入中间件

use super::session::SessionManager;
use crate::{
    error::ApiError,
    graphql::{GraphQLRequest, GraphQLResponse, ResponseFuture},
};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use secrecy::ExposeSecret;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// 从 Authorization 头提取 Bearer 令牌
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

/// 为没有 Authorization 头的请求附加当前访问令牌
#[derive(Clone)]
pub struct AuthHeaderLayer {
    session: SessionManager,
}

impl AuthHeaderLayer {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }
}

impl<S> Layer<S> for AuthHeaderLayer {
    type Service = AuthHeader<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthHeader {
            inner,
            session: self.session.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthHeader<S> {
    inner: S,
    session: SessionManager,
}

impl<S> AuthHeader<S> {
    fn authorize(&self, request: GraphQLRequest) -> Result<GraphQLRequest, ApiError> {
        if request.headers.contains_key(AUTHORIZATION) {
            return Ok(request);
        }

        match self.session.current() {
            Ok(Some(session)) => request.with_bearer(session.access_token().expose_secret()),
            Ok(None) => Ok(request),
            Err(e) => {
                // 存储不可用时按匿名请求发送，由服务端决定
                tracing::warn!(error = %e, "Failed to read session, sending without credentials");
                Ok(request)
            }
        }
    }
}

impl<S> Service<GraphQLRequest> for AuthHeader<S>
where
    S: Service<GraphQLRequest, Response = GraphQLResponse, Error = ApiError>,
    S::Future: Send + 'static,
{
    type Response = GraphQLResponse;
    type Error = ApiError;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: GraphQLRequest) -> Self::Future {
        match self.authorize(request) {
            Ok(request) => Box::pin(self.inner.call(request)),
            Err(e) => Box::pin(std::future::ready(Err(e))),
        }
    }
}
