//! Edge Gateway Library
//!
//! Single ingress point in front of independent backend services. Every
//! request runs the same ordered pipeline: authenticate, rate limit, consult
//! the per-service circuit breaker, then forward or answer with a fallback.

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
