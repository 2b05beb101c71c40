//! Open-endpoint allowlist.
//!
//! Paths under these prefixes skip token validation entirely. Matching is
//! prefix-only on path-segment boundaries: `/api/auth/login` exempts
//! `/api/auth/login` and `/api/auth/login/...` but never
//! `/api/auth/loginx` or `/evil/api/auth/login`.

use crate::routing::matcher::PathPrefixMatcher;

/// Route prefixes exempt from authentication. Read-only after startup.
#[derive(Debug, Clone, Default)]
pub struct OpenEndpoints {
    prefixes: Vec<PathPrefixMatcher>,
}

impl OpenEndpoints {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(PathPrefixMatcher::new).collect(),
        }
    }

    /// Returns true if `path` does not require authentication.
    pub fn is_open(&self, path: &str) -> bool {
        self.prefixes.iter().any(|p| p.matches_path(path))
    }
}
