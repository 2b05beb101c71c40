//! Per-service breaker registry.
//!
//! Breakers are created lazily on first use and live for the life of the
//! process. Lookups for different services never block each other.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::CircuitBreakerConfig;
use crate::resilience::circuit_breaker::{BreakerSnapshot, BreakerTransition, CircuitBreaker};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    events: broadcast::Sender<BreakerTransition>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            breakers: DashMap::new(),
            events,
        }
    }

    /// The breaker for `service`, created Closed if absent.
    pub fn get(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(service) {
            return breaker.clone();
        }
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_events(
                    service,
                    self.config.clone(),
                    Some(self.events.clone()),
                ))
            })
            .clone()
    }

    /// Receive every state transition from every breaker.
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerTransition> {
        self.events.subscribe()
    }

    /// Snapshots of all breakers, sorted by service name.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }
}
