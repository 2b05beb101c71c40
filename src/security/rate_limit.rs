//! Per-caller token bucket rate limiting.
//!
//! Buckets are keyed by (caller key, route class) and created lazily, full.
//! Each bucket sits behind its own mutex inside a concurrent map, so callers
//! with different keys never contend and two requests racing for the last
//! token of one bucket are serialized.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::{RateClassConfig, RateLimitConfig, DEFAULT_RATE_CLASS};
use crate::observability::metrics;

/// Upper bound on the advertised wait, whatever the refill rate.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// A single token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, limits: RateClassConfig, now: Instant) -> Admission {
        let capacity = limits.capacity as f64;
        let rate = limits.refill_per_sec;

        // Refill tokens
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Admission {
                allowed: true,
                retry_after: None,
                remaining: self.tokens,
            }
        } else {
            let deficit = 1.0 - self.tokens;
            let wait = Duration::try_from_secs_f64(deficit / rate)
                .unwrap_or(MAX_RETRY_AFTER)
                .min(MAX_RETRY_AFTER);
            Admission {
                allowed: false,
                retry_after: Some(wait),
                remaining: self.tokens,
            }
        }
    }
}

/// Bucket identity: who is calling, under which route class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub caller: String,
    pub class: String,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub allowed: bool,
    /// Time until one token is available; set only on rejection.
    pub retry_after: Option<Duration>,
    /// Tokens left in the bucket after this decision.
    pub remaining: f64,
}

#[derive(Debug)]
struct BucketEntry {
    bucket: Mutex<TokenBucket>,
    last_seen: Mutex<Instant>,
}

/// Shared rate limiter state.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<BucketKey, Arc<BucketEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// Admit or reject one request for `caller` under `class`.
    pub fn admit(&self, caller: &str, class: &str) -> Admission {
        self.admit_at(caller, class, Instant::now())
    }

    /// Same as [`admit`](Self::admit) with an explicit clock reading.
    pub fn admit_at(&self, caller: &str, class: &str, now: Instant) -> Admission {
        if !self.config.enabled {
            return Admission {
                allowed: true,
                retry_after: None,
                remaining: f64::INFINITY,
            };
        }

        let class = self.resolve_class(class);
        let limits = self.config.class(class);
        let key = BucketKey {
            caller: caller.to_string(),
            class: class.to_string(),
        };

        // Clone the entry out so the map shard is unlocked before the bucket is.
        let entry = self
            .buckets
            .entry(key)
            .or_insert_with(|| {
                Arc::new(BucketEntry {
                    bucket: Mutex::new(TokenBucket::new(limits.capacity as f64, now)),
                    last_seen: Mutex::new(now),
                })
            })
            .clone();

        let admission = {
            let mut bucket = entry.bucket.lock().unwrap_or_else(PoisonError::into_inner);
            bucket.try_acquire(limits, now)
        };
        {
            let mut last_seen = entry.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
            if now > *last_seen {
                *last_seen = now;
            }
        }

        if !admission.allowed {
            tracing::debug!(caller = %caller, class = %class, retry_after = ?admission.retry_after, "Bucket empty");
            metrics::record_rate_limited(class);
        }

        admission
    }

    /// Drop buckets untouched for longer than the idle TTL. Returns the number removed.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let ttl = self.config.idle_ttl();
        let before = self.buckets.len();
        self.buckets.retain(|_, entry| {
            // Entries held by an in-flight request are never evicted.
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            let last_seen = *entry.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
            now.saturating_duration_since(last_seen) < ttl
        });
        let evicted = before.saturating_sub(self.buckets.len());
        metrics::record_bucket_count(self.buckets.len());
        evicted
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn resolve_class<'a>(&self, class: &'a str) -> &'a str {
        if self.config.classes.contains_key(class) {
            class
        } else {
            DEFAULT_RATE_CLASS
        }
    }
}

/// Spawn the periodic idle-bucket sweep. Stops when `shutdown` fires.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs(limiter.config().sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = limiter.evict_idle();
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = limiter.bucket_count(), "Evicted idle rate-limit buckets");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Bucket sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}
