//! Diff events and broadcast messages
//!
//! Serialized with a `type` tag and `match_id`, which is the shape
//! subscribers of the live channel receive.

use super::live::{EventKind, MatchEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Goal,
    Card,
    StatusChange,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Goal => "goal",
            EventType::Card => "card",
            EventType::StatusChange => "status_change",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalEvent {
    #[serde(rename = "match_id")]
    pub fixture_id: i64,
    pub minute: i32,
    pub extra_minute: Option<i32>,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
    pub player_id: Option<i64>,
    pub player_name: Option<String>,
    pub assist_id: Option<i64>,
    pub assist_name: Option<String>,
    pub detail: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEvent {
    #[serde(rename = "match_id")]
    pub fixture_id: i64,
    pub minute: i32,
    pub extra_minute: Option<i32>,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
    pub player_id: Option<i64>,
    pub player_name: Option<String>,
    /// "Yellow Card", "Red Card", ...
    pub detail: Option<String>,
    pub home_team: String,
    pub away_team: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeEvent {
    #[serde(rename = "match_id")]
    pub fixture_id: i64,
    /// `None` on the first sighting of a fixture
    pub old_status: Option<String>,
    pub new_status: String,
    pub status_long: String,
    pub elapsed: Option<i32>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
}

/// Typed change between two consecutive snapshots of one fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiffEvent {
    Goal(GoalEvent),
    Card(CardEvent),
    StatusChange(StatusChangeEvent),
}

impl DiffEvent {
    pub fn fixture_id(&self) -> i64 {
        match self {
            DiffEvent::Goal(e) => e.fixture_id,
            DiffEvent::Card(e) => e.fixture_id,
            DiffEvent::StatusChange(e) => e.fixture_id,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            DiffEvent::Goal(_) => EventType::Goal,
            DiffEvent::Card(_) => EventType::Card,
            DiffEvent::StatusChange(_) => EventType::StatusChange,
        }
    }

    /// Match minute the event belongs to, used for per-fixture ordering
    pub fn elapsed(&self) -> (i32, i32) {
        match self {
            DiffEvent::Goal(e) => (e.minute, e.extra_minute.unwrap_or(0)),
            DiffEvent::Card(e) => (e.minute, e.extra_minute.unwrap_or(0)),
            DiffEvent::StatusChange(e) => (e.elapsed.unwrap_or(0), 0),
        }
    }

    /// Goals and cards are replayable; status changes are not
    pub fn is_notable(&self) -> bool {
        !matches!(self, DiffEvent::StatusChange(_))
    }

    /// Timeline record mirrored for replay; `None` for status changes
    pub fn as_match_event(&self) -> Option<MatchEvent> {
        let event = match self {
            DiffEvent::Goal(e) => MatchEvent {
                fixture_id: e.fixture_id,
                time_elapsed: e.minute,
                time_extra: e.extra_minute,
                team_id: e.team_id,
                team_name: e.team_name.clone(),
                player_id: e.player_id,
                player_name: e.player_name.clone(),
                assist_id: e.assist_id,
                assist_name: e.assist_name.clone(),
                event_type: EventKind::Goal,
                detail: e.detail.clone(),
                comments: None,
            },
            DiffEvent::Card(e) => MatchEvent {
                fixture_id: e.fixture_id,
                time_elapsed: e.minute,
                time_extra: e.extra_minute,
                team_id: e.team_id,
                team_name: e.team_name.clone(),
                player_id: e.player_id,
                player_name: e.player_name.clone(),
                assist_id: None,
                assist_name: None,
                event_type: EventKind::Card,
                detail: e.detail.clone(),
                comments: None,
            },
            DiffEvent::StatusChange(_) => return None,
        };
        Some(event)
    }
}

/// Envelope handed to subscribers of a named channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub channel: String,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl BroadcastMessage {
    pub fn from_event(
        channel: &str,
        event: &DiffEvent,
        emitted_at: DateTime<Utc>,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            channel: channel.to_string(),
            event_type: event.event_type(),
            payload: serde_json::to_value(event)?,
            emitted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_goal_event_wire_shape() {
        let event = DiffEvent::Goal(GoalEvent {
            fixture_id: 100,
            minute: 23,
            extra_minute: None,
            team_id: Some(1),
            team_name: Some("Home".to_string()),
            player_id: Some(9),
            player_name: Some("Striker".to_string()),
            assist_id: None,
            assist_name: None,
            detail: Some("Normal Goal".to_string()),
            home_team: "Home".to_string(),
            away_team: "Away".to_string(),
            home_score: 1,
            away_score: 0,
        });

        let at = Utc.with_ymd_and_hms(2025, 7, 16, 20, 23, 0).unwrap();
        let message = BroadcastMessage::from_event("live_matches_updates", &event, at).unwrap();

        assert_eq!(message.event_type, EventType::Goal);
        assert_eq!(message.payload["type"], "goal");
        assert_eq!(message.payload["match_id"], 100);
        assert_eq!(message.payload["home_score"], 1);
        assert!(event.is_notable());

        let mirrored = event.as_match_event().unwrap();
        assert_eq!(mirrored.event_type, EventKind::Goal);
        assert_eq!(mirrored.time_elapsed, 23);
        assert_eq!(mirrored.player_id, Some(9));
    }

    #[test]
    fn test_status_change_tag() {
        let event = DiffEvent::StatusChange(StatusChangeEvent {
            fixture_id: 7,
            old_status: Some("1H".to_string()),
            new_status: "HT".to_string(),
            status_long: "Halftime".to_string(),
            elapsed: Some(45),
            home_team: "A".to_string(),
            away_team: "B".to_string(),
            home_score: 0,
            away_score: 0,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "status_change");
        assert_eq!(event.elapsed(), (45, 0));
        assert!(!event.is_notable());
        assert!(event.as_match_event().is_none());
    }
}
