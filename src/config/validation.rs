//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing services and classes)
//! - Validate value ranges (capacities > 0, thresholds in (0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::uri::Authority;
use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, DEFAULT_RATE_CLASS};

/// Slowest refill accepted for a rate class (one token per ~17 minutes).
pub const MIN_REFILL_PER_SEC: f64 = 0.001;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("auth.jwt_secret must not be empty")]
    EmptySecret,

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    ZeroConnections,

    #[error("service '{name}' has invalid address '{address}'")]
    InvalidServiceAddress { name: String, address: String },

    #[error("service '{0}' is defined more than once")]
    DuplicateService(String),

    #[error("route '{prefix}' references unknown service '{service}'")]
    UnknownService { prefix: String, service: String },

    #[error("route '{prefix}' references unknown rate class '{class}'")]
    UnknownRateClass { prefix: String, class: String },

    #[error("path prefix '{0}' must start with '/'")]
    InvalidPrefix(String),

    #[error("rate class '{0}' must have capacity > 0 and refill_per_sec >= 0.001")]
    InvalidRateClass(String),

    #[error("rate_limit.classes must define a 'default' class")]
    MissingDefaultClass,

    #[error("circuit_breaker.{0}")]
    InvalidBreaker(&'static str),

    #[error("timeouts.upstream_ms must be greater than zero")]
    ZeroTimeout,

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::EmptySecret);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }

    for prefix in &config.auth.open_endpoints {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix(prefix.clone()));
        }
    }

    let mut services = HashSet::new();
    for service in &config.services {
        if !services.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if service.address.parse::<Authority>().is_err() || service.address.is_empty() {
            errors.push(ValidationError::InvalidServiceAddress {
                name: service.name.clone(),
                address: service.address.clone(),
            });
        }
    }

    if !config.rate_limit.classes.contains_key(DEFAULT_RATE_CLASS) {
        errors.push(ValidationError::MissingDefaultClass);
    }
    for (name, class) in &config.rate_limit.classes {
        // Also rejects NaN and infinities.
        if class.capacity == 0 || !(MIN_REFILL_PER_SEC..=f64::MAX).contains(&class.refill_per_sec) {
            errors.push(ValidationError::InvalidRateClass(name.clone()));
        }
    }

    for route in &config.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix(route.path_prefix.clone()));
        }
        if !services.contains(route.service.as_str()) {
            errors.push(ValidationError::UnknownService {
                prefix: route.path_prefix.clone(),
                service: route.service.clone(),
            });
        }
        if !config.rate_limit.classes.contains_key(&route.rate_class) {
            errors.push(ValidationError::UnknownRateClass {
                prefix: route.path_prefix.clone(),
                class: route.rate_class.clone(),
            });
        }
    }

    let breaker = &config.circuit_breaker;
    if breaker.window_size == 0 {
        errors.push(ValidationError::InvalidBreaker("window_size must be greater than zero"));
    }
    if breaker.minimum_calls == 0 || breaker.minimum_calls > breaker.window_size {
        errors.push(ValidationError::InvalidBreaker(
            "minimum_calls must be in 1..=window_size",
        ));
    }
    if !(breaker.failure_rate_threshold > 0.0 && breaker.failure_rate_threshold <= 1.0) {
        errors.push(ValidationError::InvalidBreaker(
            "failure_rate_threshold must be in (0, 1]",
        ));
    }
    if breaker.half_open_max_calls == 0 {
        errors.push(ValidationError::InvalidBreaker(
            "half_open_max_calls must be greater than zero",
        ));
    }

    if config.timeouts.upstream_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
