//! Application Facade
//!
//! Wires configuration into the stores, clients and services the binaries run.

use super::{CacheGateway, LiveMatchPoller, PrecacheScheduler};
use crate::domain::{Clock, SystemClock};
use crate::infrastructure::config::GatewayConfig;
use crate::infrastructure::server::AppState;
use crate::infrastructure::{
    EventBroadcaster, FootballClient, RateLimiter, SlidingWindowLimiter, SqlRateLimiter, SqlStore,
};
use crate::utils::ShutdownManager;
use std::sync::Arc;
use tracing::info;

const BROADCAST_CAPACITY: usize = 256;

/// Shared infrastructure for one process
pub struct MatchdayApp {
    pub config: GatewayConfig,
    pub store: Arc<SqlStore>,
    pub upstream: Arc<FootballClient>,
    pub limiter: Arc<dyn RateLimiter>,
    pub clock: Arc<dyn Clock>,
    pub shutdown: ShutdownManager,
}

impl MatchdayApp {
    /// Connect the database and build the upstream client and limiter
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(SqlStore::new(&config.database).await?);
        let upstream = Arc::new(FootballClient::new(&config.api)?);

        let limiter: Arc<dyn RateLimiter> = if config.rate_limits.shared {
            info!("Using database-backed rate limiter");
            Arc::new(SqlRateLimiter::new(
                &config.rate_limits,
                store.clone(),
                clock.clone(),
            ))
        } else {
            Arc::new(SlidingWindowLimiter::from_config(
                &config.rate_limits,
                clock.clone(),
            ))
        };

        let shutdown = ShutdownManager::new();
        shutdown.spawn_signal_handler();

        Ok(Self {
            config,
            store,
            upstream,
            limiter,
            clock,
            shutdown,
        })
    }

    pub fn gateway(&self) -> CacheGateway {
        CacheGateway::new(
            self.store.clone(),
            self.upstream.clone(),
            self.limiter.clone(),
            self.config.ttl.clone(),
            self.clock.clone(),
        )
        .with_utc_offset(self.config.local_offset())
    }

    pub fn broadcaster(&self) -> EventBroadcaster {
        EventBroadcaster::new(BROADCAST_CAPACITY, self.clock.clone()).with_store(self.store.clone())
    }

    pub fn poller(&self, broadcaster: Arc<EventBroadcaster>) -> LiveMatchPoller {
        LiveMatchPoller::new(
            self.upstream.clone(),
            self.limiter.clone(),
            self.store.clone(),
            self.store.clone(),
            broadcaster,
            self.clock.clone(),
            self.config.ttl.clone(),
            self.config.poller.clone(),
        )
        .with_lease(self.store.clone())
    }

    pub fn precache(&self) -> PrecacheScheduler {
        PrecacheScheduler::new(
            self.store.clone(),
            self.upstream.clone(),
            self.limiter.clone(),
            self.config.ttl.clone(),
            self.clock.clone(),
            self.config.precache.clone(),
        )
        .with_utc_offset(self.config.local_offset())
        .with_shutdown(self.shutdown.clone())
        .with_lease(self.store.clone())
    }

    /// HTTP handler state over `gateway` and `broadcaster`
    pub fn app_state(
        &self,
        gateway: Arc<CacheGateway>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> AppState {
        AppState::new(gateway, self.store.clone(), broadcaster, self.clock.clone())
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
