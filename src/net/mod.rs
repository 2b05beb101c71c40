//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (parse bind address, bind TCP listener)
//!     → tls.rs (optional: load and check PEM material)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - In-flight requests are bounded in the HTTP layer (concurrency limit)
//! - TLS is optional and handled transparently by rustls

pub mod listener;
pub mod tls;
