//! Common test utilities for matchday integration tests
//!
//! Scripted upstream and JSON builders shaped like the football API.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use matchday::domain::QueryParams;
use matchday::infrastructure::{SqlStore, UpstreamApi, UpstreamError, UpstreamResponse};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;

pub const HOST: &str = "api.test";

/// Upstream that answers from a queue and records every request
#[derive(Default)]
pub struct MockUpstream {
    replies: Mutex<VecDeque<Result<Value, UpstreamError>>>,
    requests: Mutex<Vec<(String, QueryParams)>>,
    /// Answer with an empty envelope once the queue runs dry
    pub fallback_empty: bool,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never runs out of replies; every request gets one fixture back
    pub fn echoing() -> Self {
        Self {
            fallback_empty: true,
            ..Self::default()
        }
    }

    pub fn reply(&self, body: Value) {
        self.replies.lock().push_back(Ok(body));
    }

    pub fn fail(&self, error: UpstreamError) {
        self.replies.lock().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<(String, QueryParams)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl UpstreamApi for MockUpstream {
    fn host(&self) -> &str {
        HOST
    }

    async fn get(
        &self,
        endpoint: &str,
        params: &QueryParams,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.requests
            .lock()
            .push((endpoint.to_string(), params.clone()));

        match self.replies.lock().pop_front() {
            Some(Ok(body)) => Ok(UpstreamResponse::new(200, body)),
            Some(Err(e)) => Err(e),
            None if self.fallback_empty => Ok(UpstreamResponse::new(
                200,
                envelope(vec![json!({"fixture": {"id": 1}, "params": params})]),
            )),
            None => Err(UpstreamError::Timeout),
        }
    }
}

/// Wednesday 2025-07-16 19:30 UTC
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 16, 19, 30, 0).unwrap()
}

pub async fn memory_store() -> SqlStore {
    SqlStore::connect("sqlite::memory:", 1).await.unwrap()
}

pub fn params(pairs: &[(&str, &str)]) -> QueryParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn envelope(response: Vec<Value>) -> Value {
    json!({
        "get": "fixtures",
        "results": response.len(),
        "errors": [],
        "response": response
    })
}

pub fn error_envelope(message: &str) -> Value {
    json!({"results": 0, "errors": {"requests": message}, "response": []})
}

pub mod fixtures {
    //! Live fixture builders

    use serde_json::{json, Value};

    pub const HOME_ID: i64 = 1;
    pub const AWAY_ID: i64 = 2;

    pub fn live_fixture(
        id: i64,
        status: &str,
        elapsed: i32,
        score: (i32, i32),
        events: Vec<Value>,
    ) -> Value {
        json!({
            "fixture": {
                "id": id,
                "referee": "M. Oliver",
                "date": "2025-07-16T19:00:00+00:00",
                "venue": {"id": 556, "name": "Old Trafford", "city": "Manchester"},
                "status": {"long": status_long(status), "short": status, "elapsed": elapsed}
            },
            "league": {"id": 39, "name": "Premier League", "season": 2025, "round": "Regular Season - 1"},
            "teams": {
                "home": {"id": HOME_ID, "name": "Home FC"},
                "away": {"id": AWAY_ID, "name": "Away FC"}
            },
            "goals": {"home": score.0, "away": score.1},
            "events": events,
            "statistics": [
                {"team": {"id": HOME_ID, "name": "Home FC"},
                 "statistics": [{"type": "Ball Possession", "value": "55%"}]},
                {"team": {"id": AWAY_ID, "name": "Away FC"},
                 "statistics": [{"type": "Ball Possession", "value": "45%"}]}
            ]
        })
    }

    fn status_long(short: &str) -> &'static str {
        match short {
            "1H" => "First Half",
            "HT" => "Halftime",
            "2H" => "Second Half",
            "FT" => "Match Finished",
            _ => "In Progress",
        }
    }

    fn team_name(team_id: i64) -> &'static str {
        if team_id == HOME_ID {
            "Home FC"
        } else {
            "Away FC"
        }
    }

    pub fn goal(minute: i32, team_id: i64, player: (i64, &str), detail: &str) -> Value {
        json!({
            "time": {"elapsed": minute, "extra": null},
            "team": {"id": team_id, "name": team_name(team_id)},
            "player": {"id": player.0, "name": player.1},
            "assist": {"id": null, "name": null},
            "type": "Goal",
            "detail": detail,
            "comments": null
        })
    }

    pub fn card(minute: i32, team_id: i64, player: (i64, &str), detail: &str) -> Value {
        json!({
            "time": {"elapsed": minute, "extra": null},
            "team": {"id": team_id, "name": team_name(team_id)},
            "player": {"id": player.0, "name": player.1},
            "assist": {"id": null, "name": null},
            "type": "Card",
            "detail": detail,
            "comments": "Foul"
        })
    }
}
