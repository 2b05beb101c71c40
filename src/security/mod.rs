//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Authenticated (or open) request:
//!     → rate_limit.rs (per-caller token bucket, 429 on empty)
//!     → limits.rs (request body size, 413 on overflow)
//!     → headers.rs (strip spoofed identity, inject verified identity, X-Forwarded-For)
//!     → Pass to circuit breaker and upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input: identity headers come only from validated claims
//! - Rejected requests never reach a backend

pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use rate_limit::{Admission, RateLimiter};
