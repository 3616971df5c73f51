//! Upstream football API payload types
//!
//! Only the fields the live pipeline reads are typed. Missing or `null`
//! descriptive fields degrade to defaults. A record missing an identifier,
//! its score or its status is rejected so that one bad fixture can be
//! skipped without failing the poll or disturbing its stored state.

use crate::domain::{EventKind, LiveCandidate, LiveMatchSnapshot, MatchEvent, MatchStatistics};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

/// Top-level response envelope shared by every endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub results: Option<i64>,
    #[serde(default)]
    pub errors: serde_json::Value,
    #[serde(default)]
    pub response: Vec<serde_json::Value>,
}

impl ApiEnvelope {
    pub fn has_data(&self) -> bool {
        self.results.map(|n| n > 0).unwrap_or(false) || !self.response.is_empty()
    }

    /// Upstream reports errors as `[]` when fine and as an object or
    /// non-empty array otherwise
    pub fn has_errors(&self) -> bool {
        match &self.errors {
            serde_json::Value::Null => false,
            serde_json::Value::Array(items) => !items.is_empty(),
            serde_json::Value::Object(map) => !map.is_empty(),
            serde_json::Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRecord {
    pub fixture: FixtureInfo,
    pub league: LeagueInfo,
    pub teams: Teams,
    #[serde(default)]
    pub goals: Option<Goals>,
    #[serde(default)]
    pub events: Option<Vec<EventRecord>>,
    #[serde(default)]
    pub statistics: Option<Vec<TeamStatisticsRecord>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureInfo {
    pub id: i64,
    #[serde(default)]
    pub referee: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub venue: Option<VenueInfo>,
    #[serde(default)]
    pub status: Option<StatusInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusInfo {
    #[serde(default)]
    pub long: Option<String>,
    #[serde(default)]
    pub short: Option<String>,
    #[serde(default)]
    pub elapsed: Option<i32>,
    #[serde(default)]
    pub extra: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenueInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueInfo {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub season: Option<i32>,
    #[serde(default)]
    pub round: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Teams {
    pub home: TeamInfo,
    pub away: TeamInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamInfo {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Goals {
    #[serde(default)]
    pub home: Option<i32>,
    #[serde(default)]
    pub away: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventTime {
    #[serde(default)]
    pub elapsed: Option<i32>,
    #[serde(default)]
    pub extra: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub time: Option<EventTime>,
    #[serde(default)]
    pub team: Option<RefInfo>,
    #[serde(default)]
    pub player: Option<RefInfo>,
    #[serde(default)]
    pub assist: Option<RefInfo>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamStatisticsRecord {
    pub team: RefInfo,
    #[serde(default)]
    pub statistics: serde_json::Value,
}

impl EventRecord {
    fn into_match_event(self, fixture_id: i64) -> MatchEvent {
        let team = self.team.unwrap_or_default();
        let player = self.player.unwrap_or_default();
        let assist = self.assist.unwrap_or_default();
        let time = self.time.unwrap_or_default();
        MatchEvent {
            fixture_id,
            time_elapsed: time.elapsed.unwrap_or(0),
            time_extra: time.extra,
            team_id: team.id,
            team_name: team.name,
            player_id: player.id,
            player_name: player.name,
            assist_id: assist.id,
            assist_name: assist.name,
            event_type: EventKind::parse(self.kind.as_deref().unwrap_or("")),
            detail: self.detail,
            comments: self.comments,
        }
    }
}

impl FixtureRecord {
    /// Map an upstream fixture into a diffing candidate
    pub fn into_candidate(self, now: DateTime<Utc>) -> LiveCandidate {
        let fixture_id = self.fixture.id;
        let venue = self.fixture.venue.unwrap_or_default();
        let status = self.fixture.status.unwrap_or_default();
        let goals = self.goals.unwrap_or_default();

        let snapshot = LiveMatchSnapshot {
            fixture_id,
            league_id: self.league.id,
            league_name: self.league.name.unwrap_or_default(),
            league_season: self.league.season,
            home_team_id: self.teams.home.id,
            home_team_name: self.teams.home.name.unwrap_or_default(),
            away_team_id: self.teams.away.id,
            away_team_name: self.teams.away.name.unwrap_or_default(),
            status_long: status.long.unwrap_or_default(),
            status_short: status.short.unwrap_or_default(),
            elapsed_minutes: status.elapsed,
            home_score: goals.home.unwrap_or(0),
            away_score: goals.away.unwrap_or(0),
            match_date: self.fixture.date.unwrap_or_default(),
            venue_name: venue.name,
            venue_city: venue.city,
            referee: self.fixture.referee,
            round: self.league.round,
            last_updated: now,
        };

        let mut events: Vec<MatchEvent> = self
            .events
            .unwrap_or_default()
            .into_iter()
            .map(|record| record.into_match_event(fixture_id))
            .collect();
        events.sort_by_key(|event| event.timeline_key());

        let statistics = self
            .statistics
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| {
                record.team.id.map(|team_id| MatchStatistics {
                    fixture_id,
                    team_id,
                    team_name: record.team.name,
                    statistics: record.statistics,
                    updated_at: now,
                })
            })
            .collect();

        LiveCandidate {
            snapshot,
            events,
            statistics,
        }
    }
}

/// Result of decoding a live response
#[derive(Debug, Clone, Default)]
pub struct LiveDecode {
    pub candidates: Vec<LiveCandidate>,
    /// Fixture ids of skipped records, where the id was readable
    pub skipped_ids: Vec<i64>,
    /// Every skipped record, with or without a readable id
    pub skipped: usize,
}

impl FixtureRecord {
    /// Name of a field the diff cannot do without, if it is absent
    fn missing_field(&self) -> Option<&'static str> {
        let status = self.fixture.status.as_ref();
        if status.and_then(|s| s.short.as_deref()).map_or(true, str::is_empty) {
            return Some("fixture.status.short");
        }
        match &self.goals {
            Some(Goals {
                home: Some(_),
                away: Some(_),
            }) => None,
            _ => Some("goals"),
        }
    }
}

/// Decode every fixture in a live response, skipping malformed or
/// incomplete records.
pub fn decode_live_candidates(envelope: &ApiEnvelope, now: DateTime<Utc>) -> LiveDecode {
    let mut decoded = LiveDecode {
        candidates: Vec::with_capacity(envelope.response.len()),
        ..LiveDecode::default()
    };

    for raw in &envelope.response {
        let reason = match FixtureRecord::deserialize(raw) {
            Ok(record) => match record.missing_field() {
                None => {
                    decoded.candidates.push(record.into_candidate(now));
                    continue;
                }
                Some(field) => format!("missing {}", field),
            },
            Err(e) => e.to_string(),
        };

        decoded.skipped += 1;
        let id = raw.pointer("/fixture/id").and_then(|v| v.as_i64());
        if let Some(id) = id {
            decoded.skipped_ids.push(id);
        }
        warn!(
            fixture_id = %id.map(|id| id.to_string()).unwrap_or_else(|| "unknown".to_string()),
            "Skipping malformed live fixture: {}",
            reason
        );
    }

    decoded
}
