//! Gateway error taxonomy.
//!
//! Components report failures through these typed results. Translation into
//! HTTP status codes and bodies happens in exactly one place,
//! `http::response`.
//!
//! Degraded outcomes (breaker open, backend unavailable, backend timeout)
//! are not errors: they produce a fallback response, see
//! `resilience::fallback`.

use std::time::Duration;
use thiserror::Error;

use crate::auth::AuthError;

/// Terminal failures of the request pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing, malformed, invalid or expired credentials (401).
    #[error(transparent)]
    Authentication(#[from] AuthError),

    /// Caller exhausted its bucket (429). Never forwarded.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// No route covers the request path (404).
    #[error("no route for path {0}")]
    RouteNotFound(String),

    /// Request body larger than the configured limit (413).
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The inbound request could not be turned into an upstream request (400).
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Backend answered with a body larger than the gateway will buffer (502).
    #[error("upstream response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },
}

impl GatewayError {
    /// Short, stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Authentication(_) => "authentication",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::RouteNotFound(_) => "route_not_found",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::ResponseTooLarge { .. } => "response_too_large",
        }
    }
}
