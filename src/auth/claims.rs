//! Decoded bearer token payload.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Claims carried by a validated token. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier (user id).
    pub sub: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Role strings. Accepts a JSON array or a comma-separated string.
    #[serde(default, deserialize_with = "deserialize_roles")]
    pub roles: BTreeSet<String>,

    /// Issued-at, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

impl Claims {
    pub fn new(sub: impl Into<String>, exp: u64) -> Self {
        Self {
            sub: sub.into(),
            username: None,
            roles: BTreeSet::new(),
            iat: None,
            exp,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn issued_at(mut self, iat: u64) -> Self {
        self.iat = Some(iat);
        self
    }

    /// Roles joined with commas, the form used in the `X-User-Roles` header.
    pub fn roles_header(&self) -> String {
        self.roles.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RolesRepr {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_roles<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let roles = match Option::<RolesRepr>::deserialize(deserializer)? {
        None => BTreeSet::new(),
        Some(RolesRepr::List(list)) => list.into_iter().collect(),
        Some(RolesRepr::Joined(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect(),
    };
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_accept_array_and_string() {
        let from_array: Claims =
            serde_json::from_str(r#"{"sub":"42","roles":["USER","ADMIN"],"exp":10}"#).unwrap();
        let from_string: Claims =
            serde_json::from_str(r#"{"sub":"42","roles":"USER, ADMIN","exp":10}"#).unwrap();

        assert_eq!(from_array.roles, from_string.roles);
        assert_eq!(from_array.roles_header(), "ADMIN,USER");
    }

    #[test]
    fn optional_fields_default() {
        let claims: Claims = serde_json::from_str(r#"{"sub":"42","exp":10}"#).unwrap();
        assert!(claims.roles.is_empty());
        assert_eq!(claims.username, None);
        assert_eq!(claims.iat, None);
    }

    #[test]
    fn null_roles_are_empty() {
        let claims: Claims =
            serde_json::from_str(r#"{"sub":"42","roles":null,"exp":10}"#).unwrap();
        assert!(claims.roles.is_empty());
    }
}
