//! Route handlers
//!
//! Cached endpoints answer with the upstream payload as-is plus an
//! `x-cache: hit|miss|stale` header.

use super::error::ApiError;
use super::AppState;
use crate::application::{CacheSource, GatewayError, GatewayResponse};
use crate::domain::QueryParams;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const FORCE_REFRESH_PARAM: &str = "forceRefresh";
pub const CACHE_HEADER: &str = "x-cache";

/// Split the refresh flag from the parameters that make up the cache key
pub fn split_force_refresh(raw: HashMap<String, String>) -> (QueryParams, bool) {
    let mut params: QueryParams = raw.into_iter().collect();
    let force = params
        .remove(FORCE_REFRESH_PARAM)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);
    (params, force)
}

/// Merge a JSON object body into the query parameters; body values win
fn merge_body(raw: &mut HashMap<String, String>, body: &Bytes) -> Result<(), ApiError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(());
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
    let Value::Object(fields) = value else {
        return Err(ApiError::bad_request("Body must be a JSON object"));
    };

    for (key, value) in fields {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            other => other.to_string(),
        };
        raw.insert(key, value);
    }
    Ok(())
}

fn error_message(payload: &Value) -> String {
    match payload.get("errors") {
        Some(Value::Object(map)) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}: {}", k, s),
                other => format!("{}: {}", k, other),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join("; "),
        _ => "Upstream returned an error".to_string(),
    }
}

fn cached_response(source: CacheSource, payload: Value) -> Response {
    (StatusCode::OK, [(CACHE_HEADER, source.as_str())], Json(payload)).into_response()
}

fn into_http(result: Result<GatewayResponse, GatewayError>) -> Result<Response, ApiError> {
    match result {
        Ok(response) if response.is_error() && !response.has_data() => {
            Err(ApiError::internal(error_message(response.payload())))
        }
        Ok(response) => Ok(cached_response(response.source, response.entry.response)),
        Err(GatewayError::RateLimited { host, stale }) => match stale {
            Some(entry) if entry.has_data => {
                debug!(endpoint = %entry.endpoint, "Rate limited, serving stale entry");
                Ok(cached_response(CacheSource::Stale, entry.response))
            }
            _ => Err(ApiError::rate_limited(&host)),
        },
        Err(GatewayError::InvalidRequest(message)) => Err(ApiError::bad_request(message)),
        Err(e @ GatewayError::Upstream(_)) => Err(ApiError::internal(e.to_string())),
    }
}

async fn serve_cached(
    state: &AppState,
    endpoint: &str,
    raw: HashMap<String, String>,
) -> Result<Response, ApiError> {
    let (params, force_refresh) = split_force_refresh(raw);
    let result = state.gateway.get(endpoint, params, force_refresh).await;
    if let Err(e) = &result {
        debug!(endpoint = %endpoint, "Gateway error: {}", e);
    }
    into_http(result)
}

/// GET /fixtures
pub async fn fixtures(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    serve_cached(&state, "fixtures", raw).await
}

/// POST /fixtures - parameters from the query string and/or a JSON body
pub async fn fixtures_post(
    State(state): State<Arc<AppState>>,
    Query(mut raw): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    merge_body(&mut raw, &body)?;
    serve_cached(&state, "fixtures", raw).await
}

/// GET /standings
pub async fn standings(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    serve_cached(&state, "standings", raw).await
}

/// GET /teams
pub async fn teams(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    serve_cached(&state, "teams", raw).await
}

/// GET /players
pub async fn players(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    serve_cached(&state, "players", raw).await
}

/// GET /live - active snapshots from the last poll
pub async fn live(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let snapshots = state.live_store.active_snapshots().await.map_err(|e| {
        warn!("Failed to load live snapshots: {}", e);
        ApiError::internal(e.to_string())
    })?;

    Ok(Json(json!({
        "results": snapshots.len(),
        "response": snapshots,
    })))
}

/// GET /fixtures/{id}/events - persisted goals and cards
pub async fn fixture_events(
    State(state): State<Arc<AppState>>,
    Path(fixture_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let events = state.broadcaster.replay(fixture_id).await.map_err(|e| {
        warn!(fixture_id, "Failed to replay events: {}", e);
        ApiError::internal(e.to_string())
    })?;

    Ok(Json(json!({
        "fixture_id": fixture_id,
        "results": events.len(),
        "response": events,
    })))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let now = state.clock.now();
    Json(json!({
        "status": "ok",
        "time": now.to_rfc3339(),
        "uptime_secs": (now - state.started_at).num_seconds().max(0),
        "gateway": state.gateway.stats(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_refresh_is_not_a_key_parameter() {
        let raw: HashMap<String, String> = [
            ("date".to_string(), "2025-07-16".to_string()),
            ("forceRefresh".to_string(), "TRUE".to_string()),
        ]
        .into_iter()
        .collect();

        let (params, force) = split_force_refresh(raw);
        assert!(force);
        assert_eq!(params.len(), 1);
        assert!(!params.contains_key(FORCE_REFRESH_PARAM));

        let (_, force) = split_force_refresh(HashMap::new());
        assert!(!force);
    }

    #[test]
    fn test_merge_body() {
        let mut raw = HashMap::new();
        raw.insert("league".to_string(), "140".to_string());

        merge_body(
            &mut raw,
            &Bytes::from_static(br#"{"league": 39, "season": "2025", "team": null}"#),
        )
        .unwrap();
        assert_eq!(raw["league"], "39");
        assert_eq!(raw["season"], "2025");
        assert!(!raw.contains_key("team"));

        assert!(merge_body(&mut raw, &Bytes::from_static(b"  ")).is_ok());
        assert!(merge_body(&mut raw, &Bytes::from_static(b"[1]")).is_err());
    }

    #[test]
    fn test_error_message_formats() {
        assert_eq!(
            error_message(&json!({"errors": {"token": "Missing API key"}})),
            "token: Missing API key"
        );
        assert_eq!(
            error_message(&json!({"errors": ["a", "b"]})),
            "a; b"
        );
        assert_eq!(error_message(&json!({"errors": []})), "Upstream returned an error");
    }
}
