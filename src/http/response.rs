//! Response handling and transformation.
//!
//! # Responsibilities
//! - Map gateway errors to status codes and `{error, status}` bodies
//! - Render fallback bodies as 503
//!
//! # Design Decisions
//! - The only place where error variants become HTTP
//! - Rate-limit rejections carry `Retry-After` in whole seconds, rounded up

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;

use crate::auth::AuthError;
use crate::error::GatewayError;
use crate::resilience::FallbackResponse;

/// Error body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

impl ErrorBody {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: status.as_u16(),
        }
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::ResponseTooLarge { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Client-facing message. Never echoes validation internals.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::Authentication(AuthError::MissingHeader) => "Missing Authorization header",
            GatewayError::Authentication(AuthError::MalformedHeader) => "Invalid Authorization header format",
            GatewayError::Authentication(_) => "Invalid or expired token",
            GatewayError::RateLimited { .. } => "Rate limit exceeded",
            GatewayError::RouteNotFound(_) => "No route found",
            GatewayError::PayloadTooLarge { .. } => "Request body too large",
            GatewayError::BadRequest(_) => "Bad request",
            GatewayError::ResponseTooLarge { .. } => "Upstream response too large",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(ErrorBody::new(status, self.public_message()))).into_response();

        match &self {
            GatewayError::RateLimited { retry_after } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(*retry_after)));
            }
            GatewayError::Authentication(_) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            _ => {}
        }
        response
    }
}

impl IntoResponse for FallbackResponse {
    fn into_response(self) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, Json(self)).into_response()
    }
}

/// Whole seconds, rounded up, at least 1.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    let secs = if retry_after.subsec_nanos() > 0 { secs + 1 } else { secs };
    secs.max(1)
}
