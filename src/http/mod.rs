//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, concurrency limit)
//!     → dispatcher.rs (auth → rate limit → breaker → forward)
//!     → upstream.rs (pooled client, deadlines)
//!     → response.rs (errors and fallbacks to HTTP)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

pub use dispatcher::Dispatcher;
pub use request::X_REQUEST_ID;
pub use response::ErrorBody;
pub use server::HttpServer;
