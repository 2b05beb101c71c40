//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → service table swapped atomically in the registry
//! ```
//!
//! # Design Decisions
//! - Only the service table is hot-reloadable; the token secret, the open
//!   endpoint allowlist and limiter/breaker tuning are fixed at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_defaults, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, CircuitBreakerConfig, GatewayConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RateClassConfig, RateLimitConfig, RetryConfig, RouteConfig,
    SecurityConfig, ServiceConfig, TimeoutConfig, TlsConfig, DEFAULT_RATE_CLASS,
};
