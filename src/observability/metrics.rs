//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency per service
//! - `gateway_auth_failures_total` (counter): rejected credentials by reason
//! - `gateway_rate_limited_total` (counter): 429s by route class
//! - `gateway_breaker_transitions_total` (counter): breaker state changes
//! - `gateway_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `gateway_fallbacks_total` (counter): degraded replies by service, reason
//! - `gateway_rate_limit_buckets` (gauge): live token buckets
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels for service, status code, reason

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::BreakerState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    ::metrics::describe_counter!("gateway_requests_total", "Requests handled by the gateway");
    ::metrics::describe_histogram!(
        "gateway_request_duration_seconds",
        ::metrics::Unit::Seconds,
        "End-to-end request latency"
    );
    ::metrics::describe_counter!("gateway_auth_failures_total", "Rejected credentials");
    ::metrics::describe_counter!("gateway_rate_limited_total", "Requests rejected by the rate limiter");
    ::metrics::describe_counter!("gateway_breaker_transitions_total", "Circuit breaker state changes");
    ::metrics::describe_gauge!("gateway_breaker_state", "Circuit breaker state (0=closed, 1=open, 2=half-open)");
    ::metrics::describe_counter!("gateway_fallbacks_total", "Fallback responses served");
    ::metrics::describe_gauge!("gateway_rate_limit_buckets", "Live rate-limit buckets");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_failure(reason: &'static str) {
    ::metrics::counter!("gateway_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited(class: &str) {
    ::metrics::counter!("gateway_rate_limited_total", "class" => class.to_string()).increment(1);
}

pub fn record_breaker_transition(service: &str, to: BreakerState) {
    ::metrics::counter!(
        "gateway_breaker_transitions_total",
        "service" => service.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    ::metrics::gauge!("gateway_breaker_state", "service" => service.to_string()).set(to.gauge_value());
}

pub fn record_fallback(service: &str, reason: &'static str) {
    ::metrics::counter!(
        "gateway_fallbacks_total",
        "service" => service.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_bucket_count(count: usize) {
    ::metrics::gauge!("gateway_rate_limit_buckets").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_request("GET", 200, "weather-service", Instant::now());
        record_auth_failure("expired_token");
        record_rate_limited("default");
        record_breaker_transition("weather-service", BreakerState::Open);
        record_fallback("weather-service", "timeout");
        record_bucket_count(3);
    }
}
