//! Row types for the SQLite tables and their mapping to domain types

use crate::domain::{
    CacheEntry, EventKind, LiveMatchSnapshot, MatchEvent, MatchStatistics, QueryParams, StoreError,
    StoreResult,
};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub(crate) fn parse_timestamp(column: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{} '{}': {}", column, raw, e)))
}

#[derive(Debug, Clone, FromRow)]
pub struct DbCacheEntry {
    pub cache_key: String,
    pub endpoint: String,
    pub parameters: String,
    pub response: String,
    pub has_data: bool,
    pub is_error: bool,
    pub ttl_seconds: i64,
    pub cached_at: String,
    pub expires_at: String,
}

impl DbCacheEntry {
    pub fn from_entry(entry: &CacheEntry) -> StoreResult<Self> {
        Ok(Self {
            cache_key: entry.key.clone(),
            endpoint: entry.endpoint.clone(),
            parameters: serde_json::to_string(&entry.parameters)?,
            response: serde_json::to_string(&entry.response)?,
            has_data: entry.has_data,
            is_error: entry.is_error,
            ttl_seconds: entry.ttl_seconds,
            cached_at: entry.cached_at.to_rfc3339(),
            expires_at: entry.expires_at.to_rfc3339(),
        })
    }

    pub fn into_entry(self) -> StoreResult<CacheEntry> {
        let parameters: QueryParams = serde_json::from_str(&self.parameters)?;
        Ok(CacheEntry {
            key: self.cache_key,
            endpoint: self.endpoint,
            parameters,
            response: serde_json::from_str(&self.response)?,
            has_data: self.has_data,
            is_error: self.is_error,
            ttl_seconds: self.ttl_seconds,
            cached_at: parse_timestamp("cached_at", &self.cached_at)?,
            expires_at: parse_timestamp("expires_at", &self.expires_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbLiveMatch {
    pub fixture_id: i64,
    pub league_id: i64,
    pub league_name: String,
    pub league_season: Option<i32>,
    pub home_team_id: i64,
    pub home_team_name: String,
    pub away_team_id: i64,
    pub away_team_name: String,
    pub status_long: String,
    pub status_short: String,
    pub elapsed_minutes: Option<i32>,
    pub home_score: i32,
    pub away_score: i32,
    pub match_date: String,
    pub venue_name: Option<String>,
    pub venue_city: Option<String>,
    pub referee: Option<String>,
    pub round: Option<String>,
    pub last_updated: String,
}

impl DbLiveMatch {
    pub fn into_snapshot(self) -> StoreResult<LiveMatchSnapshot> {
        Ok(LiveMatchSnapshot {
            fixture_id: self.fixture_id,
            league_id: self.league_id,
            league_name: self.league_name,
            league_season: self.league_season,
            home_team_id: self.home_team_id,
            home_team_name: self.home_team_name,
            away_team_id: self.away_team_id,
            away_team_name: self.away_team_name,
            status_long: self.status_long,
            status_short: self.status_short,
            elapsed_minutes: self.elapsed_minutes,
            home_score: self.home_score,
            away_score: self.away_score,
            match_date: self.match_date,
            venue_name: self.venue_name,
            venue_city: self.venue_city,
            referee: self.referee,
            round: self.round,
            last_updated: parse_timestamp("last_updated", &self.last_updated)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMatchEvent {
    pub fixture_id: i64,
    pub time_elapsed: i32,
    pub time_extra: Option<i32>,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
    /// 0 when upstream did not name a player
    pub player_id: i64,
    pub player_name: Option<String>,
    pub assist_id: Option<i64>,
    pub assist_name: Option<String>,
    pub event_type: String,
    pub detail: Option<String>,
    pub comments: Option<String>,
}

impl From<DbMatchEvent> for MatchEvent {
    fn from(row: DbMatchEvent) -> Self {
        MatchEvent {
            fixture_id: row.fixture_id,
            time_elapsed: row.time_elapsed,
            time_extra: row.time_extra,
            team_id: row.team_id,
            team_name: row.team_name,
            player_id: (row.player_id != 0).then_some(row.player_id),
            player_name: row.player_name,
            assist_id: row.assist_id,
            assist_name: row.assist_name,
            event_type: EventKind::parse(&row.event_type),
            detail: row.detail,
            comments: row.comments,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMatchStatistics {
    pub fixture_id: i64,
    pub team_id: i64,
    pub team_name: Option<String>,
    pub statistics: String,
    pub updated_at: String,
}

impl DbMatchStatistics {
    pub fn into_statistics(self) -> StoreResult<MatchStatistics> {
        Ok(MatchStatistics {
            fixture_id: self.fixture_id,
            team_id: self.team_id,
            team_name: self.team_name,
            statistics: serde_json::from_str(&self.statistics)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}
