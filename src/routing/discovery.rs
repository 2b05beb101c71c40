//! Service name resolution.
//!
//! # Responsibilities
//! - Resolve a logical service name to a backend address
//! - Accept a new service table on config reload without blocking readers
//!
//! # Design Decisions
//! - One address per service; load balancing across instances is out of scope
//! - The whole table is swapped at once, so readers never see a partial update

use arc_swap::ArcSwap;
use axum::http::uri::Authority;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ServiceConfig;

/// Resolves logical service names to network addresses.
pub trait ServiceRegistry: Send + Sync + std::fmt::Debug {
    fn resolve(&self, service: &str) -> Option<Authority>;

    /// All known services and their addresses.
    fn services(&self) -> Vec<(String, Authority)>;
}

/// Registry backed by the `services` section of the configuration.
#[derive(Debug)]
pub struct StaticRegistry {
    table: ArcSwap<HashMap<String, Authority>>,
}

impl StaticRegistry {
    pub fn from_config(services: &[ServiceConfig]) -> Self {
        Self {
            table: ArcSwap::from_pointee(build_table(services)),
        }
    }

    /// Replace the whole service table.
    pub fn replace(&self, services: &[ServiceConfig]) {
        let table = build_table(services);
        tracing::info!(services = table.len(), "Service table reloaded");
        self.table.store(Arc::new(table));
    }
}

impl ServiceRegistry for StaticRegistry {
    fn resolve(&self, service: &str) -> Option<Authority> {
        self.table.load().get(service).cloned()
    }

    fn services(&self) -> Vec<(String, Authority)> {
        let mut services: Vec<_> = self
            .table
            .load()
            .iter()
            .map(|(name, addr)| (name.clone(), addr.clone()))
            .collect();
        services.sort_by(|a, b| a.0.cmp(&b.0));
        services
    }
}

fn build_table(services: &[ServiceConfig]) -> HashMap<String, Authority> {
    let mut table = HashMap::new();
    for service in services {
        match service.address.parse::<Authority>() {
            Ok(authority) => {
                table.insert(service.name.clone(), authority);
            }
            Err(e) => {
                tracing::warn!(
                    service = %service.name,
                    address = %service.address,
                    error = %e,
                    "Invalid service address, skipping"
                );
            }
        }
    }
    table
}
