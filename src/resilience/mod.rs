//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → registry.rs (breaker for the destination service)
//!     → circuit_breaker.rs (permit, or short-circuit when Open)
//!     → On connect failure: retries.rs (retryable? backoff.rs delay)
//!     → Outcome recorded on the permit
//!     → On short-circuit, timeout or refusal: fallback.rs (503 body)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Retries only for idempotent requests, only on connect errors
//! - Circuit breaker prevents cascading failures
//! - Fallbacks are responses, not errors

pub mod backoff;
pub mod circuit_breaker;
pub mod fallback;
pub mod registry;
pub mod retries;

pub use circuit_breaker::{BreakerState, CallOutcome, CallPermit, CircuitBreaker};
pub use fallback::{FallbackReason, FallbackResponder, FallbackResponse};
pub use registry::BreakerRegistry;
pub use retries::RetryPolicy;
