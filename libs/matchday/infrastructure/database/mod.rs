//! SQLite-backed persistence for the cache, live matches, rate-limit hits
//! and job leases

pub mod models;
pub mod schema;

use crate::domain::{
    CacheEntry, CacheStore, LeaseStore, LiveMatchSnapshot, LiveMatchStore, MatchEvent,
    MatchStatistics, StoreError, StoreResult,
};
use crate::infrastructure::config::DatabaseConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

pub use models::{DbCacheEntry, DbLiveMatch, DbMatchEvent, DbMatchStatistics};
pub use schema::{get_schema_version, initialize_schema};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Shared store used by the gateway, the poller and the precache job
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Connect and initialize the schema
    pub async fn new(config: &DatabaseConfig) -> StoreResult<Self> {
        Self::connect(&config.url, config.max_connections).await
    }

    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        info!("Connecting to database: {}", url);

        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `:memory:` opens its own database
        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        schema::initialize_schema(&pool).await?;

        info!("Database initialized successfully");

        Ok(Self { pool })
    }

    // ==================== RATE LIMIT OPERATIONS ====================

    /// Record a request to `host` if fewer than `limit` were recorded in the
    /// trailing window. Returns whether the hit was recorded.
    pub async fn record_hit_if_below(
        &self,
        host: &str,
        limit: u32,
        now: DateTime<Utc>,
        window_secs: i64,
    ) -> StoreResult<bool> {
        let now_ms = now.timestamp_millis();
        let cutoff_ms = (now - Duration::seconds(window_secs)).timestamp_millis();

        // The DELETE takes the write lock, so count-then-insert is serialized
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;

        sqlx::query("DELETE FROM rate_limit_hits WHERE host = ? AND hit_at_ms <= ?")
            .bind(host)
            .bind(cutoff_ms)
            .execute(&mut *tx)
            .await?;

        let (count,) =
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM rate_limit_hits WHERE host = ?")
                .bind(host)
                .fetch_one(&mut *tx)
                .await?;

        if count >= i64::from(limit) {
            tx.commit().await?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO rate_limit_hits (host, hit_at_ms) VALUES (?, ?)")
            .bind(host)
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Requests recorded for `host` inside the trailing window
    pub async fn hits_in_window(
        &self,
        host: &str,
        now: DateTime<Utc>,
        window_secs: i64,
    ) -> StoreResult<i64> {
        let cutoff_ms = (now - Duration::seconds(window_secs)).timestamp_millis();
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM rate_limit_hits WHERE host = ? AND hit_at_ms > ?",
        )
        .bind(host)
        .bind(cutoff_ms)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // ==================== UTILITY ====================

    pub async fn cache_entry_count(&self) -> StoreResult<i64> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM api_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Get database pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CacheStore for SqlStore {
    async fn get_entry(&self, key: &str) -> StoreResult<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, DbCacheEntry>("SELECT * FROM api_cache WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(DbCacheEntry::into_entry).transpose()
    }

    async fn upsert_entry(&self, entry: &CacheEntry) -> StoreResult<()> {
        let row = DbCacheEntry::from_entry(entry)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO api_cache (
                cache_key, endpoint, parameters, response, has_data, is_error,
                ttl_seconds, cached_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.cache_key)
        .bind(&row.endpoint)
        .bind(&row.parameters)
        .bind(&row.response)
        .bind(row.has_data)
        .bind(row.is_error)
        .bind(row.ttl_seconds)
        .bind(&row.cached_at)
        .bind(&row.expires_at)
        .execute(&self.pool)
        .await?;

        debug!(endpoint = %row.endpoint, ttl = row.ttl_seconds, "Cached response");
        Ok(())
    }
}

async fn insert_event(tx: &mut Transaction<'_, Sqlite>, event: &MatchEvent) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO live_match_events (
            fixture_id, time_elapsed, time_extra, team_id, team_name, player_id,
            player_name, assist_id, assist_name, event_type, detail, comments
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.fixture_id)
    .bind(event.time_elapsed)
    .bind(event.time_extra)
    .bind(event.team_id)
    .bind(&event.team_name)
    .bind(event.player_id.unwrap_or(0))
    .bind(&event.player_name)
    .bind(event.assist_id)
    .bind(&event.assist_name)
    .bind(event.event_type.as_str())
    .bind(&event.detail)
    .bind(&event.comments)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl LiveMatchStore for SqlStore {
    async fn active_snapshots(&self) -> StoreResult<Vec<LiveMatchSnapshot>> {
        let rows = sqlx::query_as::<_, DbLiveMatch>("SELECT * FROM live_matches ORDER BY fixture_id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(DbLiveMatch::into_snapshot).collect()
    }

    async fn upsert_snapshot(&self, snapshot: &LiveMatchSnapshot) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO live_matches (
                fixture_id, league_id, league_name, league_season, home_team_id,
                home_team_name, away_team_id, away_team_name, status_long, status_short,
                elapsed_minutes, home_score, away_score, match_date, venue_name,
                venue_city, referee, round, last_updated
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(snapshot.fixture_id)
        .bind(snapshot.league_id)
        .bind(&snapshot.league_name)
        .bind(snapshot.league_season)
        .bind(snapshot.home_team_id)
        .bind(&snapshot.home_team_name)
        .bind(snapshot.away_team_id)
        .bind(&snapshot.away_team_name)
        .bind(&snapshot.status_long)
        .bind(&snapshot.status_short)
        .bind(snapshot.elapsed_minutes)
        .bind(snapshot.home_score)
        .bind(snapshot.away_score)
        .bind(&snapshot.match_date)
        .bind(&snapshot.venue_name)
        .bind(&snapshot.venue_city)
        .bind(&snapshot.referee)
        .bind(&snapshot.round)
        .bind(snapshot.last_updated.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_snapshot(&self, fixture_id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["live_match_events", "live_match_statistics", "live_matches"] {
            sqlx::query(&format!("DELETE FROM {} WHERE fixture_id = ?", table))
                .bind(fixture_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(fixture_id, "Removed live match");
        Ok(())
    }

    async fn clear_snapshots(&self) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM live_match_events")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM live_match_statistics")
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM live_matches")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok(removed)
    }

    async fn replace_events(&self, fixture_id: i64, events: &[MatchEvent]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM live_match_events WHERE fixture_id = ?")
            .bind(fixture_id)
            .execute(&mut *tx)
            .await?;
        for event in events {
            insert_event(&mut tx, event).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn append_events(&self, events: &[MatchEvent]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for event in events {
            insert_event(&mut tx, event).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn events_for(&self, fixture_id: i64) -> StoreResult<Vec<MatchEvent>> {
        let rows = sqlx::query_as::<_, DbMatchEvent>(
            r#"
            SELECT * FROM live_match_events
            WHERE fixture_id = ?
            ORDER BY time_elapsed ASC, COALESCE(time_extra, 0) ASC
            "#,
        )
        .bind(fixture_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MatchEvent::from).collect())
    }

    async fn upsert_statistics(&self, statistics: &[MatchStatistics]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for stats in statistics {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO live_match_statistics (
                    fixture_id, team_id, team_name, statistics, updated_at
                ) VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(stats.fixture_id)
            .bind(stats.team_id)
            .bind(&stats.team_name)
            .bind(serde_json::to_string(&stats.statistics)?)
            .bind(stats.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn statistics_for(&self, fixture_id: i64) -> StoreResult<Vec<MatchStatistics>> {
        let rows = sqlx::query_as::<_, DbMatchStatistics>(
            "SELECT * FROM live_match_statistics WHERE fixture_id = ? ORDER BY team_id",
        )
        .bind(fixture_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(DbMatchStatistics::into_statistics)
            .collect()
    }
}

#[async_trait]
impl LeaseStore for SqlStore {
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO job_leases (name, holder, acquired_at_ms, expires_at_ms)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                holder = excluded.holder,
                acquired_at_ms = excluded.acquired_at_ms,
                expires_at_ms = excluded.expires_at_ms
            WHERE job_leases.expires_at_ms <= ? OR job_leases.holder = excluded.holder
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(now.timestamp_millis())
        .bind(expires_at.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM job_leases WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
