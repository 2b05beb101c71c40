//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Higher priority first, then longer prefix first

use crate::config::RouteConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub matcher: PathPrefixMatcher,
    /// Logical service name.
    pub service: String,
    /// Rate-limit class for callers of this route.
    pub rate_class: String,
    pub priority: u32,
}

/// Ordered, immutable route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile routes from configuration.
    pub fn from_config(configs: Vec<RouteConfig>) -> Self {
        let mut routes: Vec<Route> = configs
            .into_iter()
            .map(|c| Route {
                matcher: PathPrefixMatcher::new(c.path_prefix),
                service: c.service,
                rate_class: c.rate_class,
                priority: c.priority,
            })
            .collect();

        routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.matcher.prefix().len().cmp(&a.matcher.prefix().len()))
        });

        Self { routes }
    }

    /// First route whose prefix covers `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches_path(path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
