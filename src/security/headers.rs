//! Header manipulation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Strip caller-supplied identity headers before injecting verified ones
//! - Append the peer address to X-Forwarded-For
//!
//! # Design Decisions
//! - Identity headers are only ever set from validated claims
//! - Headers named in `Connection` are treated as hop-by-hop too

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::net::IpAddr;

use crate::auth::Claims;

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USERNAME: HeaderName = HeaderName::from_static("x-user-username");
pub const X_USER_ROLES: HeaderName = HeaderName::from_static("x-user-roles");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const IDENTITY_PREFIX: &str = "x-user-";

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Remove every `X-User-*` header supplied by the caller.
pub fn strip_identity(headers: &mut HeaderMap) {
    let spoofed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(IDENTITY_PREFIX))
        .cloned()
        .collect();

    for name in spoofed {
        tracing::debug!(header = %name, "Dropping caller-supplied identity header");
        headers.remove(name);
    }
}

/// Set identity headers from validated claims.
pub fn inject_identity(headers: &mut HeaderMap, claims: &Claims) {
    if let Ok(value) = HeaderValue::from_str(&claims.sub) {
        headers.insert(X_USER_ID, value);
    }
    if let Some(username) = claims.username.as_deref() {
        if let Ok(value) = HeaderValue::from_str(username) {
            headers.insert(X_USERNAME, value);
        }
    }
    if !claims.roles.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&claims.roles_header()) {
            headers.insert(X_USER_ROLES, value);
        }
    }
}

/// Append `peer` to X-Forwarded-For, preserving any existing chain.
pub fn append_forwarded_for(headers: &mut HeaderMap, peer: IpAddr) {
    let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, {peer}"),
        _ => peer.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_and_connection_listed_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session-hint"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session-hint", HeaderValue::from_static("abc"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::ACCEPT));
    }

    #[test]
    fn spoofed_identity_is_replaced_by_claims() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("admin"));
        headers.insert("x-user-roles", HeaderValue::from_static("ADMIN"));
        headers.insert("x-user-username", HeaderValue::from_static("root"));

        strip_identity(&mut headers);
        assert!(headers.is_empty());

        let claims = Claims::new("42", u64::MAX)
            .with_username("alice")
            .with_roles(["USER", "EDITOR"]);
        inject_identity(&mut headers, &claims);

        assert_eq!(headers[X_USER_ID], "42");
        assert_eq!(headers[X_USERNAME], "alice");
        assert_eq!(headers[X_USER_ROLES], "EDITOR,USER");
    }

    #[test]
    fn claims_without_optional_fields_set_only_the_id() {
        let mut headers = HeaderMap::new();
        inject_identity(&mut headers, &Claims::new("7", u64::MAX));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[X_USER_ID], "7");
    }

    #[test]
    fn forwarded_for_chain_is_extended() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1");

        append_forwarded_for(&mut headers, "10.0.0.2".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 10.0.0.2");
    }
}
