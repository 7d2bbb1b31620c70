//! 请求追踪中间件
//! 为每个请求生成 request_id，记录日志与指标

use crate::{
    error::ApiError,
    graphql::{GraphQLRequest, GraphQLResponse, ResponseFuture},
};
use reqwest::header::{HeaderMap, HeaderValue};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTracingLayer;

impl<S> Layer<S> for RequestTracingLayer {
    type Service = RequestTracing<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTracing { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestTracing<S> {
    inner: S,
}

impl<S> Service<GraphQLRequest> for RequestTracing<S>
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

    fn call(&mut self, mut request: GraphQLRequest) -> Self::Future {
        let request_id = extract_or_generate_request_id(&request.headers);
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            request.headers.insert(REQUEST_ID_HEADER, value);
        }
        let operation = request.operation_label().to_string();

        let span = tracing::info_span!(
            "graphql_request",
            request_id = %request_id,
            operation = %operation,
        );

        let future = {
            let _entered = span.enter();
            self.inner.call(request)
        };

        Box::pin(
            async move {
                let start = Instant::now();
                let result = future.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(e) => outcome_label(e),
                };
                metrics::counter!("graphql_requests_total", "outcome" => outcome).increment(1);
                metrics::histogram!("graphql_request_duration_seconds")
                    .record(elapsed.as_secs_f64());

                match &result {
                    Ok(_) => tracing::debug!(
                        operation = %operation,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Request completed"
                    ),
                    Err(e) => tracing::info!(
                        operation = %operation,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "Request failed"
                    ),
                }

                result
            }
            .instrument(span),
        )
    }
}

/// 指标标签使用静态字符串
fn outcome_label(error: &ApiError) -> &'static str {
    match error {
        ApiError::Unauthorized(_) | ApiError::SessionExpired => "unauthorized",
        ApiError::Forbidden(_) => "forbidden",
        ApiError::Connectivity(_) => "connectivity",
        ApiError::Validation(_) => "validation",
        _ => "error",
    }
}

/// 从请求头中提取或生成 request_id
fn extract_or_generate_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
