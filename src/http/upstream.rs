//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Hold the pooled hyper client used for every backend call
//! - Enforce connect and whole-exchange deadlines
//! - Classify transport failures for retries and fallbacks
//!
//! # Design Decisions
//! - The deadline covers connect, send, response headers and the full body;
//!   a backend that stalls mid-body times out like one that never answers
//! - Response bodies are buffered under a size cap, so an outcome is only
//!   known once the exchange is complete
//! - Timeouts are distinct from transport errors

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;

use crate::config::TimeoutConfig;
use crate::resilience::FallbackReason;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upstream response body failed: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("upstream response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    /// The connection was never established, so the backend saw nothing.
    pub fn is_connect(&self) -> bool {
        matches!(self, UpstreamError::Transport(e) if e.is_connect())
    }

    pub fn fallback_reason(&self) -> FallbackReason {
        match self {
            UpstreamError::Timeout(_) => FallbackReason::Timeout,
            UpstreamError::Transport(e) => {
                let cancelled = e
                    .source()
                    .and_then(|s| s.downcast_ref::<hyper::Error>())
                    .is_some_and(hyper::Error::is_canceled);
                if cancelled {
                    FallbackReason::Cancelled
                } else {
                    FallbackReason::ConnectionRefused
                }
            }
            UpstreamError::Body(_) | UpstreamError::ResponseTooLarge { .. } => {
                FallbackReason::ConnectionRefused
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    max_response_size: usize,
}

impl Upstream {
    pub fn new(timeouts: &TimeoutConfig, max_response_size: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            timeout: timeouts.upstream(),
            max_response_size,
        }
    }

    /// Send `request` and buffer the whole response within the deadline.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Bytes>, UpstreamError> {
        let limit = self.max_response_size;
        let exchange = async {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let collected = Limited::new(body, limit).collect().await.map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    UpstreamError::ResponseTooLarge { limit }
                } else {
                    UpstreamError::Body(e)
                }
            })?;
            Ok::<_, UpstreamError>(Response::from_parts(parts, collected.to_bytes()))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.timeout)),
        }
    }
}
