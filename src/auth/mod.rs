//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → allowlist.rs (open endpoint? skip authentication)
//!     → http::request (extract "Authorization: Bearer <token>")
//!     → token.rs (HMAC-SHA256 signature, expiry)
//!     → claims.rs (decoded subject, username, roles)
//!     → identity.rs (caller identity used for rate limiting and headers)
//! ```
//!
//! # Design Decisions
//! - Verification is pure and CPU-bound: token + secret + clock
//! - Signatures are compared in constant time
//! - The secret is read once at startup and never mutated
//! - Allowlist uses prefix matching only, never substring containment

pub mod allowlist;
pub mod claims;
pub mod identity;
pub mod token;

use thiserror::Error;

pub use allowlist::OpenEndpoints;
pub use claims::Claims;
pub use identity::CallerIdentity;
pub use token::TokenValidator;

/// Authentication failures. All map to 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a bearer credential")]
    MalformedHeader,

    #[error("invalid token: {0}")]
    InvalidToken(&'static str),

    #[error("token expired")]
    ExpiredToken,
}

impl AuthError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
        }
    }
}
