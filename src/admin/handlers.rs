use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::admin::AdminState;
use crate::config::RateClassConfig;
use crate::resilience::circuit_breaker::BreakerSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub services: usize,
    pub open_breakers: usize,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub address: String,
}

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub enabled: bool,
    pub buckets: usize,
    pub idle_ttl_secs: u64,
    pub classes: BTreeMap<String, RateClassConfig>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let open_breakers = state
        .breakers
        .snapshot()
        .iter()
        .filter(|b| b.state != crate::resilience::BreakerState::Closed)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        services: state.registry.services().len(),
        open_breakers,
    })
}

pub async fn get_breakers(State(state): State<AdminState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.breakers.snapshot())
}

pub async fn get_rate_limits(State(state): State<AdminState>) -> Json<RateLimitStatus> {
    let config = state.limiter.config();
    Json(RateLimitStatus {
        enabled: config.enabled,
        buckets: state.limiter.bucket_count(),
        idle_ttl_secs: config.idle_ttl_secs,
        classes: config.classes.clone(),
    })
}

pub async fn get_services(State(state): State<AdminState>) -> Json<Vec<ServiceStatus>> {
    Json(
        state
            .registry
            .services()
            .into_iter()
            .map(|(name, address)| ServiceStatus {
                name,
                address: address.to_string(),
            })
            .collect(),
    )
}
