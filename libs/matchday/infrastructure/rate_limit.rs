//! Outbound request limiting
//!
//! Sliding 60-second window of request timestamps per upstream host. A denied
//! acquire returns immediately and leaves the window untouched.

use crate::domain::Clock;
use crate::infrastructure::config::RateLimitConfig;
use crate::infrastructure::database::SqlStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

pub const WINDOW_SECS: i64 = 60;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Take a permit for one request to `host`; never blocks waiting for one
    async fn try_acquire(&self, host: &str) -> bool;

    /// Permits left in the current window
    async fn remaining(&self, host: &str) -> u32;
}

#[derive(Debug, Clone)]
struct Limits {
    default_per_minute: u32,
    per_host: HashMap<String, u32>,
}

impl Limits {
    fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            default_per_minute: config.default_per_minute,
            per_host: config.per_host.clone(),
        }
    }

    fn for_host(&self, host: &str) -> u32 {
        self.per_host
            .get(host)
            .copied()
            .unwrap_or(self.default_per_minute)
    }
}

/// In-process limiter; correct for a single gateway instance
pub struct SlidingWindowLimiter {
    limits: Limits,
    clock: Arc<dyn Clock>,
    hits: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_per_minute: u32, clock: Arc<dyn Clock>) -> Self {
        Self::from_config(
            &RateLimitConfig {
                default_per_minute: max_per_minute,
                ..RateLimitConfig::default()
            },
            clock,
        )
    }

    pub fn from_config(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits: Limits::from_config(config),
            clock,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire against an explicit instant
    pub fn try_acquire_at(&self, host: &str, now: DateTime<Utc>) -> bool {
        let limit = self.limits.for_host(host) as usize;
        let mut hits = self.hits.lock();
        let window = hits.entry(host.to_string()).or_default();
        evict_expired(window, now);

        if window.len() < limit {
            window.push_back(now);
            true
        } else {
            debug!(host = %host, limit, "Rate limit window full");
            false
        }
    }

    pub fn remaining_at(&self, host: &str, now: DateTime<Utc>) -> u32 {
        let limit = self.limits.for_host(host) as usize;
        let mut hits = self.hits.lock();
        match hits.get_mut(host) {
            Some(window) => {
                evict_expired(window, now);
                limit.saturating_sub(window.len()) as u32
            }
            None => limit as u32,
        }
    }
}

fn evict_expired(window: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
    let cutoff = now - Duration::seconds(WINDOW_SECS);
    while window.front().is_some_and(|ts| *ts <= cutoff) {
        window.pop_front();
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn try_acquire(&self, host: &str) -> bool {
        self.try_acquire_at(host, self.clock.now())
    }

    async fn remaining(&self, host: &str) -> u32 {
        self.remaining_at(host, self.clock.now())
    }
}

/// Limiter whose window lives in the shared database, so every gateway
/// instance draws from the same budget
pub struct SqlRateLimiter {
    limits: Limits,
    clock: Arc<dyn Clock>,
    store: Arc<SqlStore>,
}

impl SqlRateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<SqlStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits: Limits::from_config(config),
            clock,
            store,
        }
    }
}

#[async_trait]
impl RateLimiter for SqlRateLimiter {
    async fn try_acquire(&self, host: &str) -> bool {
        let limit = self.limits.for_host(host);
        match self
            .store
            .record_hit_if_below(host, limit, self.clock.now(), WINDOW_SECS)
            .await
        {
            Ok(granted) => granted,
            Err(e) => {
                // Store failures deny
                warn!(host = %host, "Rate limiter store unavailable: {}", e);
                false
            }
        }
    }

    async fn remaining(&self, host: &str) -> u32 {
        let limit = self.limits.for_host(host);
        match self
            .store
            .hits_in_window(host, self.clock.now(), WINDOW_SECS)
            .await
        {
            Ok(count) => limit.saturating_sub(count as u32),
            Err(e) => {
                warn!(host = %host, "Rate limiter store unavailable: {}", e);
                0
            }
        }
    }
}
