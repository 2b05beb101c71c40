//! Caller identity resolution.
//!
//! A caller is either an authenticated subject (from a validated token), a
//! network peer (open endpoints), or anonymous when neither is known. The
//! identity lives only for the duration of one request.

use std::net::IpAddr;

use crate::auth::claims::Claims;

/// Key used when neither a subject nor a peer address is available.
pub const ANONYMOUS_KEY: &str = "anonymous";

/// Who is calling, as far as the gateway can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    /// Authenticated via a bearer token.
    Authenticated(Claims),
    /// Unauthenticated request to an open endpoint, keyed by peer address.
    Peer(IpAddr),
    /// Nothing resolvable.
    Anonymous,
}

impl CallerIdentity {
    /// Identity for a request that skipped authentication.
    pub fn unauthenticated(peer: Option<IpAddr>) -> Self {
        match peer {
            Some(ip) => CallerIdentity::Peer(ip),
            None => CallerIdentity::Anonymous,
        }
    }

    /// Rate-limit key: subject id, else peer address, else `"anonymous"`.
    pub fn key(&self) -> String {
        match self {
            CallerIdentity::Authenticated(claims) => format!("sub:{}", claims.sub),
            CallerIdentity::Peer(ip) => format!("ip:{ip}"),
            CallerIdentity::Anonymous => ANONYMOUS_KEY.to_string(),
        }
    }

    pub fn claims(&self) -> Option<&Claims> {
        match self {
            CallerIdentity::Authenticated(claims) => Some(claims),
            _ => None,
        }
    }
}
