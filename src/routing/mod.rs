//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route lookup)
//!     → matcher.rs (segment-boundary prefix match)
//!     → Return: matched Route (service, rate class) or NoMatch
//!     → discovery.rs (service name → backend address)
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Sort by priority, then prefix length
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Service addresses can be swapped at runtime via the registry

pub mod discovery;
pub mod matcher;
pub mod router;

pub use discovery::{ServiceRegistry, StaticRegistry};
pub use router::{Route, RouteTable};
