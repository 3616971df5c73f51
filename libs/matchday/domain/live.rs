use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status codes that mean a fixture is currently being played
pub const LIVE_STATUSES: [&str; 7] = ["1H", "2H", "HT", "ET", "P", "BT", "LIVE"];

pub fn is_live_status(status_short: &str) -> bool {
    LIVE_STATUSES.contains(&status_short)
}

/// Most recently known state of a live fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMatchSnapshot {
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
    pub last_updated: DateTime<Utc>,
}

impl LiveMatchSnapshot {
    pub fn is_live(&self) -> bool {
        is_live_status(&self.status_short)
    }

    /// Copy of this snapshot marked as finished
    pub fn finalized(&self, at: DateTime<Utc>) -> Self {
        Self {
            status_short: "FT".to_string(),
            status_long: "Match Finished".to_string(),
            last_updated: at,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Goal,
    Card,
    Subst,
    Var,
    Other(String),
}

impl EventKind {
    /// Parse the upstream `type` field; matching is case-insensitive
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "goal" => EventKind::Goal,
            "card" => EventKind::Card,
            "subst" => EventKind::Subst,
            "var" => EventKind::Var,
            _ => EventKind::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Goal => "Goal",
            EventKind::Card => "Card",
            EventKind::Subst => "subst",
            EventKind::Var => "Var",
            EventKind::Other(raw) => raw,
        }
    }
}

impl From<String> for EventKind {
    fn from(raw: String) -> Self {
        EventKind::parse(&raw)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream timeline record for a fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub fixture_id: i64,
    pub time_elapsed: i32,
    pub time_extra: Option<i32>,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
    pub player_id: Option<i64>,
    pub player_name: Option<String>,
    pub assist_id: Option<i64>,
    pub assist_name: Option<String>,
    pub event_type: EventKind,
    pub detail: Option<String>,
    pub comments: Option<String>,
}

impl MatchEvent {
    /// Ordering key inside a fixture timeline
    pub fn timeline_key(&self) -> (i32, i32) {
        (self.time_elapsed, self.time_extra.unwrap_or(0))
    }

    /// Goals that actually changed the score
    pub fn is_scoring_goal(&self) -> bool {
        self.event_type == EventKind::Goal
            && !matches!(self.detail.as_deref(), Some("Missed Penalty"))
    }
}

/// Per-team statistics blob for a fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub fixture_id: i64,
    pub team_id: i64,
    pub team_name: Option<String>,
    pub statistics: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// A fixture as seen in one live poll, before diffing
#[derive(Debug, Clone, PartialEq)]
pub struct LiveCandidate {
    pub snapshot: LiveMatchSnapshot,
    pub events: Vec<MatchEvent>,
    pub statistics: Vec<MatchStatistics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_status_set() {
        for status in ["1H", "2H", "HT", "ET", "P", "BT", "LIVE"] {
            assert!(is_live_status(status), "{} should be live", status);
        }
        for status in ["NS", "FT", "AET", "PEN", "PST", "CANC", "SUSP"] {
            assert!(!is_live_status(status), "{} should not be live", status);
        }
    }

    #[test]
    fn test_event_kind_parse() {
        assert_eq!(EventKind::parse("Goal"), EventKind::Goal);
        assert_eq!(EventKind::parse("card"), EventKind::Card);
        assert_eq!(EventKind::parse("subst"), EventKind::Subst);
        assert_eq!(
            EventKind::parse("Injury"),
            EventKind::Other("Injury".to_string())
        );
        assert_eq!(EventKind::parse("Other").as_str(), "Other");
    }

    #[test]
    fn test_missed_penalty_is_not_scoring() {
        let mut event = MatchEvent {
            fixture_id: 1,
            time_elapsed: 30,
            time_extra: None,
            team_id: Some(10),
            team_name: None,
            player_id: None,
            player_name: None,
            assist_id: None,
            assist_name: None,
            event_type: EventKind::Goal,
            detail: Some("Penalty".to_string()),
            comments: None,
        };
        assert!(event.is_scoring_goal());
        event.detail = Some("Missed Penalty".to_string());
        assert!(!event.is_scoring_goal());
    }
}
