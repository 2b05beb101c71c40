//! Request shape and size limits.
//!
//! # Responsibilities
//! - Reject paths that a backend would resolve differently than the gateway
//! - Enforce maximum request body size before anything is sent upstream
//!
//! # Design Decisions
//! - Paths are never normalized; `.`/`..` segments (raw or percent-encoded)
//!   and encoded separators are refused outright, so the allowlist, routing
//!   and the backend all see the same path
//! - A declared Content-Length over the limit is rejected without reading
//! - Chunked bodies are read through a length-limited wrapper

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::error::GatewayError;

/// Fail with 400 if `path` contains a dot segment or an encoded separator.
pub fn check_path(path: &str) -> Result<(), GatewayError> {
    let lowered = path.to_ascii_lowercase();
    if lowered.contains("%2f") || lowered.contains("%5c") || lowered.contains('\\') {
        tracing::warn!(path = %path, "Encoded path separator rejected");
        return Err(GatewayError::BadRequest("encoded path separator".to_string()));
    }

    let dot_segment = lowered
        .split('/')
        .map(|segment| segment.replace("%2e", "."))
        .any(|segment| segment == "." || segment == "..");
    if dot_segment {
        tracing::warn!(path = %path, "Dot segment rejected");
        return Err(GatewayError::BadRequest("dot segment in path".to_string()));
    }
    Ok(())
}

/// Buffer `body`, failing with 413 once it exceeds `limit` bytes.
pub async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        tracing::warn!(limit, declared = ?declared, "Declared body length over limit");
        return Err(GatewayError::PayloadTooLarge { limit });
    }

    let collected = Limited::new(body, limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            tracing::warn!(limit, "Payload exceeded buffer limit");
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::BadRequest(format!("failed to read request body: {e}"))
        }
    })?;

    Ok(collected.to_bytes())
}
