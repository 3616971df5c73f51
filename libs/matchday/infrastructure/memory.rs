//! In-memory implementation of the storage ports
//!
//! Used by tests and by single-process deployments that run without a
//! database file.

use crate::domain::{
    CacheEntry, CacheStore, LeaseStore, LiveMatchSnapshot, LiveMatchStore, MatchEvent,
    MatchStatistics, StoreResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;

type EventKey = (i32, String, i64);

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    cache: DashMap<String, CacheEntry>,
    snapshots: DashMap<i64, LiveMatchSnapshot>,
    events: DashMap<i64, Vec<MatchEvent>>,
    statistics: DashMap<(i64, i64), MatchStatistics>,
    leases: Mutex<HashMap<String, Lease>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

fn event_key(event: &MatchEvent) -> EventKey {
    (
        event.time_elapsed,
        event.event_type.as_str().to_string(),
        event.player_id.unwrap_or(0),
    )
}

/// Insert or overwrite by (minute, type, player), keeping timeline order
fn merge_event(timeline: &mut Vec<MatchEvent>, event: MatchEvent) {
    let key = event_key(&event);
    match timeline.iter_mut().find(|existing| event_key(existing) == key) {
        Some(existing) => *existing = event,
        None => timeline.push(event),
    }
    timeline.sort_by_key(|e| e.timeline_key());
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_entry(&self, key: &str) -> StoreResult<Option<CacheEntry>> {
        Ok(self.cache.get(key).map(|entry| entry.clone()))
    }

    async fn upsert_entry(&self, entry: &CacheEntry) -> StoreResult<()> {
        self.cache.insert(entry.key.clone(), entry.clone());
        Ok(())
    }
}

#[async_trait]
impl LiveMatchStore for MemoryStore {
    async fn active_snapshots(&self) -> StoreResult<Vec<LiveMatchSnapshot>> {
        let mut snapshots: Vec<LiveMatchSnapshot> =
            self.snapshots.iter().map(|s| s.value().clone()).collect();
        snapshots.sort_by_key(|s| s.fixture_id);
        Ok(snapshots)
    }

    async fn upsert_snapshot(&self, snapshot: &LiveMatchSnapshot) -> StoreResult<()> {
        self.snapshots.insert(snapshot.fixture_id, snapshot.clone());
        Ok(())
    }

    async fn remove_snapshot(&self, fixture_id: i64) -> StoreResult<()> {
        self.snapshots.remove(&fixture_id);
        self.events.remove(&fixture_id);
        self.statistics.retain(|(fixture, _), _| *fixture != fixture_id);
        Ok(())
    }

    async fn clear_snapshots(&self) -> StoreResult<u64> {
        let removed = self.snapshots.len() as u64;
        self.snapshots.clear();
        self.events.clear();
        self.statistics.clear();
        Ok(removed)
    }

    async fn replace_events(&self, fixture_id: i64, events: &[MatchEvent]) -> StoreResult<()> {
        let mut timeline = Vec::with_capacity(events.len());
        for event in events {
            merge_event(&mut timeline, event.clone());
        }
        self.events.insert(fixture_id, timeline);
        Ok(())
    }

    async fn append_events(&self, events: &[MatchEvent]) -> StoreResult<()> {
        for event in events {
            let mut timeline = self.events.entry(event.fixture_id).or_default();
            merge_event(&mut timeline, event.clone());
        }
        Ok(())
    }

    async fn events_for(&self, fixture_id: i64) -> StoreResult<Vec<MatchEvent>> {
        Ok(self
            .events
            .get(&fixture_id)
            .map(|timeline| timeline.clone())
            .unwrap_or_default())
    }

    async fn upsert_statistics(&self, statistics: &[MatchStatistics]) -> StoreResult<()> {
        for stats in statistics {
            self.statistics
                .insert((stats.fixture_id, stats.team_id), stats.clone());
        }
        Ok(())
    }

    async fn statistics_for(&self, fixture_id: i64) -> StoreResult<Vec<MatchStatistics>> {
        let mut stats: Vec<MatchStatistics> = self
            .statistics
            .iter()
            .filter(|entry| entry.key().0 == fixture_id)
            .map(|entry| entry.value().clone())
            .collect();
        stats.sort_by_key(|s| s.team_id);
        Ok(stats)
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut leases = self.leases.lock();
        let available = match leases.get(name) {
            Some(lease) => lease.expires_at <= now || lease.holder == holder,
            None => true,
        };
        if available {
            leases.insert(
                name.to_string(),
                Lease {
                    holder: holder.to_string(),
                    expires_at,
                },
            );
        }
        Ok(available)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> StoreResult<()> {
        let mut leases = self.leases.lock();
        if leases.get(name).is_some_and(|lease| lease.holder == holder) {
            leases.remove(name);
        }
        Ok(())
    }
}
