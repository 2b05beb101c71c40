//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Name of the rate-limit class every unknown or unset class falls back to.
pub const DEFAULT_RATE_CLASS: &str = "default";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Token verification and open endpoints.
    pub auth: AuthConfig,

    /// Route definitions mapping path prefixes to services.
    pub routes: Vec<RouteConfig>,

    /// Logical service name → network address.
    pub services: Vec<ServiceConfig>,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Per-service circuit breaker tuning.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Pre-shared HMAC-SHA256 secret. Overridden by `GATEWAY_JWT_SECRET`.
    pub jwt_secret: String,

    /// Path prefixes exempt from authentication.
    pub open_endpoints: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            open_endpoints: vec![
                "/api/auth/register".to_string(),
                "/api/auth/login".to_string(),
                "/api/auth/refresh".to_string(),
                "/actuator/health".to_string(),
                "/eureka".to_string(),
            ],
        }
    }
}

/// Route configuration mapping a path prefix to a logical service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Path prefix to match (segment boundary).
    pub path_prefix: String,

    /// Logical service name to forward to.
    pub service: String,

    /// Rate-limit class applied to callers of this route.
    #[serde(default = "default_rate_class")]
    pub rate_class: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

impl RouteConfig {
    pub fn new(path_prefix: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            service: service.into(),
            rate_class: default_rate_class(),
            priority: 0,
        }
    }
}

fn default_rate_class() -> String {
    DEFAULT_RATE_CLASS.to_string()
}

/// Backend service definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Logical service name (e.g., "weather-service").
    pub name: String,

    /// Backend address as `host:port`.
    pub address: String,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Buckets idle for longer than this are evicted.
    pub idle_ttl_secs: u64,

    /// How often the idle bucket sweep runs.
    pub sweep_interval_secs: u64,

    /// Named route classes. Validation requires a `default` entry.
    pub classes: BTreeMap<String, RateClassConfig>,
}

impl RateLimitConfig {
    /// Limits for `class`, falling back to the `default` class.
    pub fn class(&self, class: &str) -> RateClassConfig {
        self.classes
            .get(class)
            .or_else(|| self.classes.get(DEFAULT_RATE_CLASS))
            .copied()
            .unwrap_or_default()
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut classes = BTreeMap::new();
        classes.insert(DEFAULT_RATE_CLASS.to_string(), RateClassConfig::default());
        Self {
            enabled: true,
            idle_ttl_secs: 300,
            sweep_interval_secs: 60,
            classes,
        }
    }
}

/// Token bucket parameters for one route class.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct RateClassConfig {
    /// Bucket capacity (burst size).
    pub capacity: u32,

    /// Tokens added per second.
    pub refill_per_sec: f64,
}

impl Default for RateClassConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            refill_per_sec: 10.0,
        }
    }
}

/// Circuit breaker configuration, applied to every service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes kept in the sliding window.
    pub window_size: usize,

    /// Minimum samples before the failure ratio is evaluated.
    pub minimum_calls: usize,

    /// Failure ratio in (0, 1] at or above which the breaker opens.
    pub failure_rate_threshold: f64,

    /// Time spent OPEN before a trial call is allowed, in milliseconds.
    pub cool_down_ms: u64,

    /// Concurrent trial calls allowed while HALF_OPEN.
    pub half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 0.5,
            cool_down_ms: 30_000,
            half_open_max_calls: 1,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Time allowed for the backend to produce response headers, in milliseconds.
    pub upstream_ms: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn upstream(&self) -> Duration {
        Duration::from_millis(self.upstream_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            upstream_ms: 10_000,
        }
    }
}

/// Retry configuration. At most one retry is ever made.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable the single retry on connection errors.
    pub enabled: bool,

    /// Base delay for the backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_ms: 50,
            max_delay_ms: 500,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Maximum backend response body size in bytes.
    pub max_response_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            max_response_size: 16 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

impl GatewayConfig {
    /// The default service and route layout of the platform.
    pub fn with_platform_defaults(mut self) -> Self {
        self.services = vec![
            ServiceConfig::new("user-service", "127.0.0.1:8091"),
            ServiceConfig::new("weather-service", "127.0.0.1:8092"),
            ServiceConfig::new("financial-service", "127.0.0.1:8093"),
            ServiceConfig::new("news-service", "127.0.0.1:8094"),
        ];
        self.routes = vec![
            RouteConfig::new("/api/auth", "user-service"),
            RouteConfig::new("/api/users", "user-service"),
            RouteConfig::new("/api/weather", "weather-service"),
            RouteConfig::new("/api/stocks", "financial-service"),
            RouteConfig::new("/api/crypto", "financial-service"),
            RouteConfig::new("/api/news", "news-service"),
        ];
        self
    }
}
