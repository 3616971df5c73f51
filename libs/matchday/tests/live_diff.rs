//! Integration tests for the live pipeline: poll, diff, persist, broadcast

mod common;

use chrono::Duration;
use common::fixtures::{card, goal, live_fixture, AWAY_ID, HOME_ID};
use common::{envelope, memory_store, start_time, MockUpstream};
use matchday::application::{LiveMatchPoller, PollError};
use matchday::domain::{
    cache_key, BroadcastMessage, CacheStore, EventKind, EventType, LeaseStore, LiveMatchStore,
    ManualClock, QueryParams, TtlPolicy,
};
use matchday::infrastructure::config::PollerConfig;
use matchday::infrastructure::{EventBroadcaster, SlidingWindowLimiter, SqlStore};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

const CHANNEL: &str = "live_matches_updates";

struct Pipeline {
    poller: LiveMatchPoller,
    upstream: Arc<MockUpstream>,
    store: Arc<SqlStore>,
    broadcaster: Arc<EventBroadcaster>,
    clock: Arc<ManualClock>,
}

async fn pipeline(limit: u32) -> Pipeline {
    let clock = Arc::new(ManualClock::new(start_time()));
    let store = Arc::new(memory_store().await);
    let upstream = Arc::new(MockUpstream::new());
    let broadcaster = Arc::new(EventBroadcaster::new(64, clock.clone()).with_store(store.clone()));
    let poller = LiveMatchPoller::new(
        upstream.clone(),
        Arc::new(SlidingWindowLimiter::new(limit, clock.clone())),
        store.clone(),
        store.clone(),
        broadcaster.clone(),
        clock.clone(),
        TtlPolicy::default(),
        PollerConfig::default(),
    )
    .with_lease(store.clone());

    Pipeline {
        poller,
        upstream,
        store,
        broadcaster,
        clock,
    }
}

fn drain(rx: &mut Receiver<BroadcastMessage>) -> Vec<BroadcastMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

#[tokio::test]
async fn test_match_lifecycle() {
    let p = pipeline(100).await;
    let mut rx = p.broadcaster.subscribe(CHANNEL);

    let opener = goal(23, HOME_ID, (9, "Striker"), "Normal Goal");
    let booking = card(31, AWAY_ID, (14, "Defender"), "Yellow Card");

    p.upstream.reply(envelope(vec![live_fixture(500, "1H", 10, (0, 0), vec![])]));
    p.upstream.reply(envelope(vec![live_fixture(
        500,
        "1H",
        33,
        (1, 0),
        vec![opener.clone(), booking.clone()],
    )]));
    p.upstream.reply(envelope(vec![live_fixture(
        500,
        "HT",
        45,
        (1, 0),
        vec![opener.clone(), booking.clone()],
    )]));
    p.upstream.reply(envelope(vec![]));

    // Kick-off: first sighting
    let result = p.poller.poll_once().await.unwrap();
    assert_eq!(result.active_count, 1);
    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event_type, EventType::StatusChange);
    assert!(messages[0].payload["old_status"].is_null());
    assert_eq!(messages[0].payload["new_status"], "1H");

    // Goal and card in elapsed order
    p.clock.advance(Duration::seconds(20));
    let result = p.poller.poll_once().await.unwrap();
    assert_eq!(result.events_emitted, 2);
    let messages = drain(&mut rx);
    assert_eq!(messages[0].event_type, EventType::Goal);
    assert_eq!(messages[0].payload["player_name"], "Striker");
    assert_eq!(messages[0].payload["home_score"], 1);
    assert_eq!(messages[1].event_type, EventType::Card);
    assert_eq!(messages[1].payload["detail"], "Yellow Card");

    // Half time: the old goal and card are not repeated
    p.clock.advance(Duration::seconds(20));
    p.poller.poll_once().await.unwrap();
    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload["old_status"], "1H");
    assert_eq!(messages[0].payload["new_status"], "HT");

    let snapshots = p.store.active_snapshots().await.unwrap();
    assert_eq!(snapshots[0].status_short, "HT");
    assert_eq!(p.store.events_for(500).await.unwrap().len(), 2);
    assert_eq!(p.store.statistics_for(500).await.unwrap().len(), 2);

    // Fixture disappears from the feed
    p.broadcaster.flush().await;
    p.clock.advance(Duration::seconds(20));
    let result = p.poller.poll_once().await.unwrap();
    assert_eq!(result.ended_count, 1);
    assert_eq!(result.active_count, 0);
    assert!(drain(&mut rx).is_empty());
    assert!(p.store.active_snapshots().await.unwrap().is_empty());
    assert!(p.store.events_for(500).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_score_change_without_goal_record() {
    let p = pipeline(100).await;
    let mut rx = p.broadcaster.subscribe(CHANNEL);

    p.upstream.reply(envelope(vec![live_fixture(600, "2H", 60, (0, 0), vec![])]));
    p.upstream.reply(envelope(vec![live_fixture(
        600,
        "2H",
        64,
        (0, 1),
        vec![goal(64, AWAY_ID, (7, "Winger"), "Missed Penalty")],
    )]));

    p.poller.poll_once().await.unwrap();
    drain(&mut rx);
    p.poller.poll_once().await.unwrap();

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event_type, EventType::Goal);
    assert_eq!(messages[0].payload["team_id"], AWAY_ID);
    assert!(messages[0].payload["player_id"].is_null());
    assert_eq!(messages[0].payload["away_score"], 1);
}

#[tokio::test]
async fn test_finished_fixture_emits_final_status() {
    let p = pipeline(100).await;
    let mut rx = p.broadcaster.subscribe(CHANNEL);

    p.upstream.reply(envelope(vec![live_fixture(700, "2H", 89, (2, 2), vec![])]));
    p.upstream.reply(envelope(vec![live_fixture(700, "FT", 90, (2, 2), vec![])]));

    p.poller.poll_once().await.unwrap();
    drain(&mut rx);
    let result = p.poller.poll_once().await.unwrap();

    assert_eq!(result.ended_count, 1);
    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload["new_status"], "FT");
    assert!(p.store.active_snapshots().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_notable_events_replayable_from_database() {
    let p = pipeline(100).await;

    p.upstream.reply(envelope(vec![live_fixture(800, "1H", 5, (0, 0), vec![])]));
    p.upstream.reply(envelope(vec![live_fixture(
        800,
        "1H",
        30,
        (1, 0),
        vec![
            goal(12, HOME_ID, (9, "Striker"), "Penalty"),
            card(28, AWAY_ID, (4, "Keeper"), "Red Card"),
        ],
    )]));

    p.poller.poll_once().await.unwrap();
    p.poller.poll_once().await.unwrap();
    p.broadcaster.flush().await;

    let replay = p.broadcaster.replay(800).await.unwrap();
    assert_eq!(replay.len(), 2);
    assert_eq!(replay[0].event_type, EventKind::Goal);
    assert_eq!(replay[0].time_elapsed, 12);
    assert_eq!(replay[1].event_type, EventKind::Card);
    assert_eq!(replay[1].detail.as_deref(), Some("Red Card"));
}

#[tokio::test]
async fn test_live_payload_cached_for_gateway() {
    let p = pipeline(100).await;
    p.upstream.reply(envelope(vec![live_fixture(900, "1H", 5, (0, 0), vec![])]));

    p.poller.poll_once().await.unwrap();

    let mut params = QueryParams::new();
    params.insert("live".to_string(), "all".to_string());
    let entry = p
        .store
        .get_entry(&cache_key("fixtures", &params))
        .await
        .unwrap()
        .unwrap();
    assert!(entry.has_data);
    assert_eq!(entry.ttl_seconds, 60);
    assert_eq!(entry.response["response"][0]["fixture"]["id"], 900);
}

#[tokio::test]
async fn test_rate_limited_poll_leaves_state_untouched() {
    let p = pipeline(1).await;
    p.upstream.reply(envelope(vec![live_fixture(1000, "1H", 5, (0, 0), vec![])]));

    p.poller.poll_once().await.unwrap();
    let denied = p.poller.poll_once().await;

    assert!(matches!(denied, Err(PollError::RateLimited)));
    assert_eq!(p.upstream.calls(), 1);
    assert_eq!(p.store.active_snapshots().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_lease_blocks_second_instance() {
    let p = pipeline(100).await;
    let now = start_time();
    p.store
        .try_acquire_lease("live_poller", "other-instance", now, now + Duration::seconds(30))
        .await
        .unwrap();

    assert!(matches!(p.poller.poll_once().await, Err(PollError::LeaseHeld)));
    assert_eq!(p.upstream.calls(), 0);

    // Lease expires, this instance takes over
    p.clock.advance(Duration::seconds(31));
    p.upstream.reply(json!({"results": 0, "errors": [], "response": []}));
    assert!(p.poller.poll_once().await.is_ok());
}

#[tokio::test]
async fn test_unreadable_record_keeps_fixture_and_its_baseline() {
    let p = pipeline(100).await;
    let mut rx = p.broadcaster.subscribe(CHANNEL);

    let mut broken = live_fixture(100, "1H", 18, (0, 0), vec![]);
    broken["teams"] = json!(null);

    p.upstream.reply(envelope(vec![live_fixture(100, "1H", 10, (0, 0), vec![])]));
    p.upstream.reply(envelope(vec![broken]));
    p.upstream.reply(envelope(vec![live_fixture(
        100,
        "1H",
        27,
        (1, 0),
        vec![goal(25, HOME_ID, (9, "Striker"), "Normal Goal")],
    )]));

    p.poller.poll_once().await.unwrap();
    drain(&mut rx);

    p.clock.advance(Duration::seconds(20));
    let result = p.poller.poll_once().await.unwrap();
    assert_eq!(result.skipped, 1);
    assert_eq!(result.ended_count, 0);
    assert_eq!(result.active_count, 1);
    assert!(drain(&mut rx).is_empty());

    let kept = p.store.active_snapshots().await.unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].elapsed_minutes, Some(10));
    assert_eq!(p.store.statistics_for(100).await.unwrap().len(), 2);

    // Next readable poll diffs against the kept snapshot
    p.clock.advance(Duration::seconds(20));
    let result = p.poller.poll_once().await.unwrap();
    assert_eq!(result.updated_count, 1);
    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event_type, EventType::Goal);
    assert_eq!(messages[0].payload["minute"], 25);
    assert_eq!(messages[0].payload["player_name"], "Striker");
}

#[tokio::test]
async fn test_missing_score_does_not_replay_goal() {
    let p = pipeline(100).await;
    let mut rx = p.broadcaster.subscribe(CHANNEL);

    let opener = goal(23, HOME_ID, (9, "Striker"), "Normal Goal");
    let mut no_score = live_fixture(200, "1H", 30, (1, 0), vec![opener.clone()]);
    no_score["goals"] = json!({"home": null, "away": null});
    let mut no_status = live_fixture(200, "1H", 32, (1, 0), vec![opener.clone()]);
    no_status["fixture"]["status"] = json!({"elapsed": 32});

    p.upstream.reply(envelope(vec![live_fixture(200, "1H", 10, (0, 0), vec![])]));
    p.upstream.reply(envelope(vec![live_fixture(200, "1H", 24, (1, 0), vec![opener.clone()])]));
    p.upstream.reply(envelope(vec![no_score]));
    p.upstream.reply(envelope(vec![no_status]));
    p.upstream.reply(envelope(vec![live_fixture(200, "1H", 35, (1, 0), vec![opener])]));

    for _ in 0..5 {
        p.poller.poll_once().await.unwrap();
        p.clock.advance(Duration::seconds(20));
    }

    let goals: Vec<BroadcastMessage> = drain(&mut rx)
        .into_iter()
        .filter(|m| m.event_type == EventType::Goal)
        .collect();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].payload["minute"], 23);

    let snapshots = p.store.active_snapshots().await.unwrap();
    assert_eq!(snapshots[0].status_short, "1H");
    assert_eq!((snapshots[0].home_score, snapshots[0].away_score), (1, 0));
    assert_eq!(snapshots[0].elapsed_minutes, Some(35));
}
