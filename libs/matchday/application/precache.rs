//! Scheduled cache warming for the fixture date/league matrix

use crate::domain::{
    cache_key, CacheEntry, CacheStore, Clock, League, LeaseStore, QueryParams, StoreError,
    TtlPolicy, TtlTier,
};
use crate::infrastructure::client::UpstreamApi;
use crate::infrastructure::config::PrecacheConfig;
use crate::infrastructure::rate_limit::RateLimiter;
use crate::utils::ShutdownManager;
use chrono::{Datelike, Duration as ChronoDuration, FixedOffset, NaiveDate, Offset, Utc, Weekday};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const FIXTURES_ENDPOINT: &str = "fixtures";
pub const PRECACHE_LEASE: &str = "precache";

#[derive(Error, Debug)]
pub enum PrecacheError {
    #[error("Precache lease held by another run")]
    LeaseHeld,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, PrecacheError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeagueCounts {
    pub name: String,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrecacheStats {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Items never attempted because the run was cancelled or hit its deadline
    pub abandoned: usize,
    pub per_league: BTreeMap<i64, LeagueCounts>,
    pub cancelled: bool,
    pub deadline_reached: bool,
    pub duration_secs: f64,
}

impl PrecacheStats {
    fn record(&mut self, league: &League, outcome: ItemOutcome) {
        let counts = self
            .per_league
            .entry(league.id)
            .or_insert_with(|| LeagueCounts {
                name: league.name.clone(),
                ..LeagueCounts::default()
            });
        match outcome {
            ItemOutcome::Cached => {
                self.success += 1;
                counts.success += 1;
            }
            ItemOutcome::Fresh => {
                self.skipped += 1;
                counts.skipped += 1;
            }
            ItemOutcome::Failed => {
                self.failed += 1;
                counts.failed += 1;
            }
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.failed + self.skipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Cached,
    Fresh,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TtlMode {
    /// Lifetime from the distance between the date and today
    ByDayOffset,
    /// The fixed weekend lifetime
    Weekend,
}

#[derive(Debug, Clone)]
struct WorkItem {
    date: NaiveDate,
    offset_days: i64,
    league: League,
}

impl WorkItem {
    fn params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.insert("date".to_string(), self.date.format("%Y-%m-%d").to_string());
        params.insert("league".to_string(), self.league.id.to_string());
        params.insert(
            "season".to_string(),
            self.league.season_for(self.date).to_string(),
        );
        params
    }
}

/// Dates Friday through Sunday of the current or upcoming weekend, from today
pub fn weekend_dates(today: NaiveDate) -> Vec<NaiveDate> {
    let from_monday = i64::from(today.weekday().num_days_from_monday());
    let friday_offset = i64::from(Weekday::Fri.num_days_from_monday());
    let start = if from_monday <= friday_offset {
        today + ChronoDuration::days(friday_offset - from_monday)
    } else {
        today
    };
    let sunday = today + ChronoDuration::days(6 - from_monday);

    start
        .iter_days()
        .take_while(|date| *date <= sunday)
        .collect()
}

pub struct PrecacheScheduler {
    store: Arc<dyn CacheStore>,
    upstream: Arc<dyn UpstreamApi>,
    limiter: Arc<dyn RateLimiter>,
    ttl: TtlPolicy,
    clock: Arc<dyn Clock>,
    config: PrecacheConfig,
    leagues: Vec<League>,
    utc_offset: FixedOffset,
    shutdown: ShutdownManager,
    lease: Option<Arc<dyn LeaseStore>>,
    holder: String,
}

impl PrecacheScheduler {
    pub fn new(
        store: Arc<dyn CacheStore>,
        upstream: Arc<dyn UpstreamApi>,
        limiter: Arc<dyn RateLimiter>,
        ttl: TtlPolicy,
        clock: Arc<dyn Clock>,
        config: PrecacheConfig,
    ) -> Self {
        let leagues = config.leagues();
        Self {
            store,
            upstream,
            limiter,
            ttl,
            clock,
            config,
            leagues,
            utc_offset: Utc.fix(),
            shutdown: ShutdownManager::new(),
            lease: None,
            holder: format!("{:016x}", rand::random::<u64>()),
        }
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Stop between batches once `shutdown` is cancelled
    pub fn with_shutdown(mut self, shutdown: ShutdownManager) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_lease(mut self, lease: Arc<dyn LeaseStore>) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn leagues(&self) -> &[League] {
        &self.leagues
    }

    fn today(&self) -> NaiveDate {
        self.clock
            .now()
            .with_timezone(&self.utc_offset)
            .date_naive()
    }

    /// Warm `[today, today + days_ahead)` plus the configured days back
    pub async fn run(&self, days_ahead: u32, force_refresh: bool) -> Result<PrecacheStats> {
        let today = self.today();
        let mut offsets: Vec<i64> = (0..i64::from(days_ahead)).collect();
        offsets.extend((1..=i64::from(self.config.days_back)).map(|d| -d));

        let dates: Vec<(NaiveDate, i64)> = offsets
            .into_iter()
            .map(|offset| (today + ChronoDuration::days(offset), offset))
            .collect();

        info!(
            "Precache: {} days ahead, {} back, {} leagues{}",
            days_ahead,
            self.config.days_back,
            self.leagues.len(),
            if force_refresh { " (forced)" } else { "" }
        );
        self.run_dates(&dates, force_refresh, TtlMode::ByDayOffset)
            .await
    }

    /// Warm the upcoming Friday to Sunday with the weekend lifetime
    pub async fn run_weekend(&self, force_refresh: bool) -> Result<PrecacheStats> {
        let today = self.today();
        let dates: Vec<(NaiveDate, i64)> = weekend_dates(today)
            .into_iter()
            .map(|date| (date, (date - today).num_days()))
            .collect();

        info!(
            "Weekend precache: {} to {}",
            dates.first().map(|(d, _)| d.to_string()).unwrap_or_default(),
            dates.last().map(|(d, _)| d.to_string()).unwrap_or_default()
        );
        self.run_dates(&dates, force_refresh, TtlMode::Weekend).await
    }

    async fn run_dates(
        &self,
        dates: &[(NaiveDate, i64)],
        force_refresh: bool,
        mode: TtlMode,
    ) -> Result<PrecacheStats> {
        let now = self.clock.now();
        if let Some(lease) = &self.lease {
            let expires_at = now + ChronoDuration::seconds(self.config.lease_secs);
            if !lease
                .try_acquire_lease(PRECACHE_LEASE, &self.holder, now, expires_at)
                .await?
            {
                warn!("Another precache run holds the lease, skipping");
                return Err(PrecacheError::LeaseHeld);
            }
        }

        let items: Vec<WorkItem> = dates
            .iter()
            .flat_map(|(date, offset)| {
                self.leagues.iter().map(move |league| WorkItem {
                    date: *date,
                    offset_days: *offset,
                    league: league.clone(),
                })
            })
            .collect();

        let stats = self.process(items, force_refresh, mode).await;

        if let Some(lease) = &self.lease {
            if let Err(e) = lease.release_lease(PRECACHE_LEASE, &self.holder).await {
                warn!("Failed to release precache lease: {}", e);
            }
        }

        info!("========================================");
        info!("Precache complete in {:.1}s", stats.duration_secs);
        info!(
            "Success: {}, failed: {}, skipped: {}, abandoned: {}",
            stats.success, stats.failed, stats.skipped, stats.abandoned
        );
        for (league_id, counts) in &stats.per_league {
            debug!(
                "  {} ({}): {} ok, {} failed, {} fresh",
                counts.name, league_id, counts.success, counts.failed, counts.skipped
            );
        }
        info!("========================================");

        Ok(stats)
    }

    async fn process(
        &self,
        items: Vec<WorkItem>,
        force_refresh: bool,
        mode: TtlMode,
    ) -> PrecacheStats {
        let started = Instant::now();
        let deadline = Duration::from_secs(self.config.deadline_secs);
        let batch_delay = Duration::from_millis(self.config.batch_delay_ms);
        let batch_size = self.config.batch_size.max(1);

        let mut stats = PrecacheStats::default();
        let batches: Vec<&[WorkItem]> = items.chunks(batch_size).collect();
        let batch_count = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            if !self.shutdown.is_running() {
                info!("Precache cancelled after {} of {} batches", index, batch_count);
                stats.cancelled = true;
                stats.abandoned = items.len() - index * batch_size;
                break;
            }
            if started.elapsed() >= deadline {
                warn!("Precache deadline reached after {} of {} batches", index, batch_count);
                stats.deadline_reached = true;
                stats.abandoned = items.len() - index * batch_size;
                break;
            }

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|item| self.precache_item(item, force_refresh, mode)),
            )
            .await;
            for (item, outcome) in batch.iter().zip(outcomes) {
                stats.record(&item.league, outcome);
            }

            if index + 1 < batch_count {
                self.shutdown.interruptible_sleep(batch_delay).await;
            }
        }

        stats.duration_secs = started.elapsed().as_secs_f64();
        stats
    }

    async fn precache_item(&self, item: &WorkItem, force_refresh: bool, mode: TtlMode) -> ItemOutcome {
        let params = item.params();
        let key = cache_key(FIXTURES_ENDPOINT, &params);

        let existing = match self.store.get_entry(&key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(league = item.league.id, date = %item.date, "Cache read failed: {}", e);
                None
            }
        };
        if !force_refresh && existing.as_ref().is_some_and(|e| e.is_fresh(self.clock.now())) {
            return ItemOutcome::Fresh;
        }

        if !self.acquire_permit().await {
            warn!(league = item.league.id, date = %item.date, "No rate limit permit, giving up");
            return ItemOutcome::Failed;
        }

        let response = match self.upstream.get(FIXTURES_ENDPOINT, &params).await {
            Ok(response) => response,
            Err(e) => {
                warn!(league = item.league.id, date = %item.date, "Fetch failed: {}", e);
                return ItemOutcome::Failed;
            }
        };

        let is_error = response.is_error();
        if is_error && existing.as_ref().is_some_and(|e| e.has_data) {
            // Keep the previous data for the gateway to serve
            warn!(league = item.league.id, date = %item.date, "Upstream reported errors");
            return ItemOutcome::Failed;
        }

        let ttl_seconds = match (is_error, mode) {
            (true, _) => self.ttl.seconds(TtlTier::Error),
            (false, TtlMode::Weekend) => self.ttl.seconds(TtlTier::Weekend),
            (false, TtlMode::ByDayOffset) => self
                .ttl
                .precache_seconds(TtlPolicy::classify_day_offset(item.offset_days)),
        };

        let has_data = response.has_data();
        let entry = CacheEntry::new(
            FIXTURES_ENDPOINT,
            params,
            response.body,
            has_data,
            is_error,
            ttl_seconds,
            self.clock.now(),
        );
        if let Err(e) = self.store.upsert_entry(&entry).await {
            warn!(league = item.league.id, date = %item.date, "Cache write failed: {}", e);
            return ItemOutcome::Failed;
        }

        debug!(
            league = item.league.id,
            date = %item.date,
            has_data,
            ttl = ttl_seconds,
            "Precached"
        );

        if is_error {
            ItemOutcome::Failed
        } else {
            ItemOutcome::Cached
        }
    }

    /// Try for a permit, waiting one batch delay between attempts
    async fn acquire_permit(&self) -> bool {
        let host = self.upstream.host();
        let delay = Duration::from_millis(self.config.batch_delay_ms);

        for attempt in 0..=self.config.max_permit_retries {
            if self.limiter.try_acquire(host).await {
                return true;
            }
            if attempt < self.config.max_permit_retries
                && !self.shutdown.interruptible_sleep(delay).await
            {
                return false;
            }
        }
        false
    }
}
