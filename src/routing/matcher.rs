//! Path matching logic.
//!
//! # Responsibilities
//! - Match path prefixes on segment boundaries
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A prefix matches the path itself and anything below it, never a sibling
//!   that merely shares leading characters (`/api/news` vs `/api/newsletter`)
//! - No regex to guarantee O(n) matching

/// Matches the request path against a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing `/` is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.len() > 1 && prefix.ends_with('/') {
            prefix.pop();
        }
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches_path(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}
