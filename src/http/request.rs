//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) and propagate it
//! - Extract the bearer credential
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A caller-supplied `X-Request-Id` is kept as-is

use axum::http::header::{self, HeaderMap, HeaderName};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::auth::AuthError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const BEARER: &str = "bearer ";

/// Layer that stamps a UUID v4 `X-Request-Id` on requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies the request's `X-Request-Id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(&X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

/// The token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let scheme = value.get(..BEARER.len()).ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case(BEARER) {
        return Err(AuthError::MalformedHeader);
    }

    let token = value[BEARER.len()..].trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}
