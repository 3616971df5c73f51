//! Live match polling loop

use super::diff::{DiffEngine, FixtureDiff, FixtureOutcome};
use crate::domain::{
    CacheEntry, CacheStore, Clock, LeaseStore, LiveCandidate, LiveMatchStore, QueryParams,
    StoreError, TtlPolicy, TtlTier,
};
use crate::infrastructure::broadcast::EventBroadcaster;
use crate::infrastructure::client::{decode_live_candidates, UpstreamApi, UpstreamError};
use crate::infrastructure::config::PollerConfig;
use crate::infrastructure::rate_limit::RateLimiter;
use crate::utils::{Heartbeat, ShutdownManager};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const LIVE_ENDPOINT: &str = "fixtures";
pub const POLLER_LEASE: &str = "live_poller";
const HEARTBEAT_SECS: i64 = 300;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("A poll is already running")]
    AlreadyRunning,

    #[error("Poll lease held by another instance")]
    LeaseHeld,

    #[error("Rate limit reached, poll skipped")]
    RateLimited,

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Upstream reported errors: {0}")]
    UpstreamReported(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, PollError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollResult {
    pub updated_count: usize,
    pub ended_count: usize,
    pub events_emitted: usize,
    /// Fixtures dropped as malformed or whose writes failed
    pub skipped: usize,
    /// Fixtures still live after this poll, including ones kept as is
    /// because their record was unreadable
    pub active_count: usize,
}

/// Query for the "all live fixtures" request
pub fn live_params() -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("live".to_string(), "all".to_string());
    params
}

/// Clears the in-flight flag when a poll finishes, even on error
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct LiveMatchPoller {
    upstream: Arc<dyn UpstreamApi>,
    limiter: Arc<dyn RateLimiter>,
    cache: Arc<dyn CacheStore>,
    live_store: Arc<dyn LiveMatchStore>,
    broadcaster: Arc<EventBroadcaster>,
    clock: Arc<dyn Clock>,
    ttl: TtlPolicy,
    config: PollerConfig,
    engine: DiffEngine,
    running: AtomicBool,
    lease: Option<Arc<dyn LeaseStore>>,
    holder: String,
}

impl LiveMatchPoller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        upstream: Arc<dyn UpstreamApi>,
        limiter: Arc<dyn RateLimiter>,
        cache: Arc<dyn CacheStore>,
        live_store: Arc<dyn LiveMatchStore>,
        broadcaster: Arc<EventBroadcaster>,
        clock: Arc<dyn Clock>,
        ttl: TtlPolicy,
        config: PollerConfig,
    ) -> Self {
        Self {
            upstream,
            limiter,
            cache,
            live_store,
            broadcaster,
            clock,
            ttl,
            config,
            engine: DiffEngine::new(),
            running: AtomicBool::new(false),
            lease: None,
            holder: format!("{:016x}", rand::random::<u64>()),
        }
    }

    /// Coordinate with other instances through a leased lock row
    pub fn with_lease(mut self, lease: Arc<dyn LeaseStore>) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn is_polling(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one poll cycle.
    ///
    /// Single-flight: returns [`PollError::AlreadyRunning`] if another call
    /// is in progress on this poller, or [`PollError::LeaseHeld`] if another
    /// instance holds the lease.
    pub async fn poll_once(&self) -> Result<PollResult> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Poll already in progress, skipping");
            return Err(PollError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let Some(lease) = self.lease.clone() else {
            return self.poll_inner().await;
        };

        let now = self.clock.now();
        let expires_at = now + ChronoDuration::seconds(self.config.lease_secs);
        if !lease
            .try_acquire_lease(POLLER_LEASE, &self.holder, now, expires_at)
            .await?
        {
            debug!("Poll lease held elsewhere, skipping");
            return Err(PollError::LeaseHeld);
        }

        let result = self.poll_inner().await;

        if let Err(e) = lease.release_lease(POLLER_LEASE, &self.holder).await {
            warn!("Failed to release poll lease: {}", e);
        }
        result
    }

    async fn poll_inner(&self) -> Result<PollResult> {
        let host = self.upstream.host().to_string();
        if !self.limiter.try_acquire(&host).await {
            warn!(host = %host, "Rate limit reached, skipping live poll");
            return Err(PollError::RateLimited);
        }

        let params = live_params();
        let response = self.upstream.get(LIVE_ENDPOINT, &params).await?;
        let envelope = response.envelope();
        if envelope.has_errors() {
            return Err(PollError::UpstreamReported(envelope.errors.to_string()));
        }

        let now = self.clock.now();
        self.cache_live_payload(params, &response.body, envelope.has_data(), now)
            .await;

        if envelope.response.is_empty() {
            let cleared = self.live_store.clear_snapshots().await?;
            if cleared > 0 {
                info!("No live fixtures, cleared {} snapshots", cleared);
            }
            return Ok(PollResult {
                ended_count: cleared as usize,
                ..PollResult::default()
            });
        }

        let decoded = decode_live_candidates(envelope, now);
        let previous = self.live_store.active_snapshots().await?;
        let outcome = self
            .engine
            .diff(&previous, decoded.candidates, &decoded.skipped_ids, now);

        let applied = join_all(outcome.fixtures.iter().map(|fixture| self.apply(fixture))).await;

        let mut result = PollResult {
            skipped: decoded.skipped,
            ..PollResult::default()
        };
        for (fixture, ok) in outcome.fixtures.iter().zip(applied) {
            if !ok {
                result.skipped += 1;
                continue;
            }
            match fixture.outcome {
                FixtureOutcome::Updated(_) => result.updated_count += 1,
                FixtureOutcome::Ended(_) => result.ended_count += 1,
            }
            result.events_emitted += fixture.events.len();
        }
        result.active_count = result.updated_count + outcome.carried.len();

        info!(
            "Live poll: {} updated, {} ended, {} events, {} skipped",
            result.updated_count, result.ended_count, result.events_emitted, result.skipped
        );
        Ok(result)
    }

    /// Persist one fixture's outcome, then publish its events.
    ///
    /// Nothing is published for a fixture whose write failed; the next poll
    /// diffs it against the old snapshot again.
    async fn apply(&self, fixture: &FixtureDiff) -> bool {
        let written = match &fixture.outcome {
            FixtureOutcome::Updated(candidate) => self.store_candidate(candidate).await,
            FixtureOutcome::Ended(snapshot) => {
                debug!(
                    fixture_id = snapshot.fixture_id,
                    status = %snapshot.status_short,
                    score = %format!("{}-{}", snapshot.home_score, snapshot.away_score),
                    "Fixture finished"
                );
                self.live_store.remove_snapshot(snapshot.fixture_id).await
            }
        };

        if let Err(e) = written {
            warn!(fixture_id = fixture.fixture_id, "Failed to store live fixture: {}", e);
            return false;
        }

        for event in &fixture.events {
            self.broadcaster.publish(&self.config.channel, event);
        }
        true
    }

    async fn store_candidate(
        &self,
        candidate: &LiveCandidate,
    ) -> std::result::Result<(), StoreError> {
        let fixture_id = candidate.snapshot.fixture_id;
        self.live_store.upsert_snapshot(&candidate.snapshot).await?;
        self.live_store
            .replace_events(fixture_id, &candidate.events)
            .await?;
        self.live_store
            .upsert_statistics(&candidate.statistics)
            .await?;
        Ok(())
    }

    /// Gateway reads of live fixtures are served from this entry between polls
    async fn cache_live_payload(
        &self,
        params: QueryParams,
        body: &serde_json::Value,
        has_data: bool,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry::new(
            LIVE_ENDPOINT,
            params,
            body.clone(),
            has_data,
            false,
            self.ttl.seconds(TtlTier::Live),
            now,
        );
        if let Err(e) = self.cache.upsert_entry(&entry).await {
            warn!("Failed to cache live payload: {}", e);
        }
    }

    /// Poll until shutdown, faster while fixtures are live
    pub async fn run(self: Arc<Self>, shutdown: ShutdownManager) {
        info!("========================================");
        info!("Live match poller started");
        info!(
            "Intervals: {}s live / {}s idle, channel '{}'",
            self.config.live_interval_secs, self.config.idle_interval_secs, self.config.channel
        );
        info!("========================================");

        let mut heartbeat = Heartbeat::new("live_poller", HEARTBEAT_SECS, self.clock.now());
        let mut active = 0;

        while shutdown.is_running() {
            let started = Instant::now();
            match self.poll_once().await {
                Ok(result) => {
                    active = result.active_count;
                    heartbeat.record_cycle(result.events_emitted);
                    debug!("Poll took {:.2}s", started.elapsed().as_secs_f64());
                }
                Err(PollError::AlreadyRunning) | Err(PollError::LeaseHeld) => {}
                Err(PollError::RateLimited) => heartbeat.record_failure(),
                Err(e) => {
                    error!("Live poll failed: {}", e);
                    heartbeat.record_failure();
                }
            }
            heartbeat.tick(self.clock.now(), active);

            let interval = if active > 0 {
                self.config.live_interval_secs
            } else {
                self.config.idle_interval_secs
            };
            if !shutdown
                .interruptible_sleep(Duration::from_secs(interval))
                .await
            {
                break;
            }
        }

        info!("Live match poller stopped");
    }
}
