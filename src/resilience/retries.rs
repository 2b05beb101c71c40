//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a failed attempt may be repeated
//! - Provide the jittered backoff before the repeat
//!
//! # Design Decisions
//! - Never retry POST/PATCH (non-idempotent)
//! - Only connection establishment failures are retried; the backend never saw the request
//! - At most one retry, and never for a Half-Open trial call
//! - Timeouts and 5xx responses are final

use axum::http::Method;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Extra attempts beyond the first.
pub const MAX_RETRIES: u32 = 1;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Whether attempt number `attempt` (1-based) may be followed by another.
    pub fn should_retry(&self, method: &Method, connect_error: bool, attempt: u32, trial: bool) -> bool {
        self.config.enabled
            && connect_error
            && !trial
            && attempt <= MAX_RETRIES
            && method.is_idempotent()
    }

    /// Delay before the attempt following `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.config.base_delay_ms, self.config.max_delay_ms)
    }
}
