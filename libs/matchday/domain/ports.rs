//! Storage ports
//!
//! Implemented by the SQLite store and the in-memory store. All writes are
//! upserts, so concurrent writers of the same key resolve last-writer-wins.

use super::{CacheEntry, LiveMatchSnapshot, MatchEvent, MatchStatistics};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Entry for `key`, expired or not
    async fn get_entry(&self, key: &str) -> StoreResult<Option<CacheEntry>>;

    async fn upsert_entry(&self, entry: &CacheEntry) -> StoreResult<()>;
}

#[async_trait]
pub trait LiveMatchStore: Send + Sync {
    async fn active_snapshots(&self) -> StoreResult<Vec<LiveMatchSnapshot>>;

    async fn upsert_snapshot(&self, snapshot: &LiveMatchSnapshot) -> StoreResult<()>;

    /// Delete a snapshot together with its events and statistics
    async fn remove_snapshot(&self, fixture_id: i64) -> StoreResult<()>;

    /// Delete every snapshot, event and statistics row; returns snapshots removed
    async fn clear_snapshots(&self) -> StoreResult<u64>;

    /// Replace the whole timeline of a fixture
    async fn replace_events(&self, fixture_id: i64, events: &[MatchEvent]) -> StoreResult<()>;

    /// Upsert individual timeline records keyed by (fixture, minute, type, player)
    async fn append_events(&self, events: &[MatchEvent]) -> StoreResult<()>;

    /// Timeline of a fixture in elapsed order
    async fn events_for(&self, fixture_id: i64) -> StoreResult<Vec<MatchEvent>>;

    async fn upsert_statistics(&self, statistics: &[MatchStatistics]) -> StoreResult<()>;

    async fn statistics_for(&self, fixture_id: i64) -> StoreResult<Vec<MatchStatistics>>;
}

/// Leased locks so that independently triggered jobs do not overlap
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Take or renew the lease `name` for `holder` until `expires_at`.
    ///
    /// Succeeds when the lease is free, expired at `now`, or already held by
    /// `holder`.
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn release_lease(&self, name: &str, holder: &str) -> StoreResult<()>;
}
