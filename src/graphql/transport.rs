//! HTTP 传输层
//! 链路最内层：把 GraphQL 请求 POST 到端点并对结果分类

use super::{classify, GraphQLRequest, GraphQLResponse, ResponseFuture};
use crate::{config::ApiConfig, error::ApiError};
use reqwest::Client;
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

/// 基于 reqwest 的 GraphQL 传输
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// 创建新的传输
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("cms-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Service<GraphQLRequest> for HttpTransport {
    type Response = GraphQLResponse;
    type Error = ApiError;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: GraphQLRequest) -> Self::Future {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        Box::pin(async move {
            let response = client
                .post(&endpoint)
                .headers(request.headers.clone())
                .json(&request)
                .send()
                .await?;

            let status = response.status().as_u16();
            let text = response.text().await?;

            // 非 JSON 的错误页（网关 502 等）按无响应体处理
            let body = serde_json::from_str::<GraphQLResponse>(&text).ok();

            debug!(
                operation = %request.operation_label(),
                status,
                "GraphQL response received"
            );

            classify(status, body)
        })
    }
}
