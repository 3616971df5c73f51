//! Live match diffing
//!
//! Compares each fixture of a live poll against its previous snapshot and
//! derives goal, card and status-change events. No I/O happens here; the
//! poller persists the outcome and hands the events to the broadcaster.

use crate::domain::{
    CardEvent, DiffEvent, EventKind, GoalEvent, LiveCandidate, LiveMatchSnapshot, MatchEvent,
    StatusChangeEvent,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// What happens to a fixture's stored state after a poll
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureOutcome {
    /// Still live; upsert snapshot, timeline and statistics
    Updated(LiveCandidate),
    /// No longer live; the finalized snapshot leaves the active set
    Ended(LiveMatchSnapshot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDiff {
    pub fixture_id: i64,
    /// In non-decreasing elapsed order
    pub events: Vec<DiffEvent>,
    pub outcome: FixtureOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffOutcome {
    pub fixtures: Vec<FixtureDiff>,
    /// Candidates dropped without effect (duplicates, finished on first sight)
    pub ignored: usize,
    /// Active fixtures whose record was unusable this poll; their stored
    /// state is kept as is
    pub carried: Vec<i64>,
}

impl DiffOutcome {
    pub fn events(&self) -> impl Iterator<Item = &DiffEvent> {
        self.fixtures.iter().flat_map(|f| f.events.iter())
    }

    /// Snapshots that remain in the active set
    pub fn final_snapshots(&self) -> Vec<&LiveMatchSnapshot> {
        self.fixtures
            .iter()
            .filter_map(|f| match &f.outcome {
                FixtureOutcome::Updated(candidate) => Some(&candidate.snapshot),
                FixtureOutcome::Ended(_) => None,
            })
            .collect()
    }

    pub fn updated_count(&self) -> usize {
        self.final_snapshots().len()
    }

    pub fn ended_count(&self) -> usize {
        self.fixtures.len() - self.updated_count()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    pub fn new() -> Self {
        Self
    }

    /// Diff a whole poll against the previously active snapshots.
    ///
    /// Previous fixtures missing from `candidates` end as `FT` without events,
    /// unless they are listed in `skipped`: those were reported but could not
    /// be decoded, so they stay active untouched.
    pub fn diff(
        &self,
        previous: &[LiveMatchSnapshot],
        candidates: Vec<LiveCandidate>,
        skipped: &[i64],
        now: DateTime<Utc>,
    ) -> DiffOutcome {
        let by_id: HashMap<i64, &LiveMatchSnapshot> =
            previous.iter().map(|s| (s.fixture_id, s)).collect();
        let mut seen = HashSet::with_capacity(candidates.len());
        let mut outcome = DiffOutcome::default();

        for candidate in candidates {
            let fixture_id = candidate.snapshot.fixture_id;
            if !seen.insert(fixture_id) {
                warn!(fixture_id, "Duplicate fixture in live poll, ignoring repeat");
                outcome.ignored += 1;
                continue;
            }

            let prev = by_id.get(&fixture_id).copied();
            if prev.is_none() && !candidate.snapshot.is_live() {
                debug!(
                    fixture_id,
                    status = %candidate.snapshot.status_short,
                    "Ignoring fixture first seen outside live statuses"
                );
                outcome.ignored += 1;
                continue;
            }

            outcome.fixtures.push(self.diff_fixture(prev, candidate));
        }

        for snapshot in previous {
            if seen.contains(&snapshot.fixture_id) {
                continue;
            }
            if skipped.contains(&snapshot.fixture_id) {
                debug!(
                    fixture_id = snapshot.fixture_id,
                    "Unreadable live record, keeping previous snapshot"
                );
                outcome.carried.push(snapshot.fixture_id);
            } else {
                debug!(fixture_id = snapshot.fixture_id, "Fixture left the live feed");
                outcome.fixtures.push(FixtureDiff {
                    fixture_id: snapshot.fixture_id,
                    events: Vec::new(),
                    outcome: FixtureOutcome::Ended(snapshot.finalized(now)),
                });
            }
        }

        outcome
    }

    /// Diff one fixture against its previous snapshot, if any
    pub fn diff_fixture(
        &self,
        previous: Option<&LiveMatchSnapshot>,
        candidate: LiveCandidate,
    ) -> FixtureDiff {
        let current = &candidate.snapshot;
        let mut events = Vec::new();

        if let Some(prev) = previous {
            let threshold = prev.elapsed_minutes.unwrap_or(0);
            let after_threshold = |e: &&MatchEvent| e.time_elapsed > threshold;

            if prev.home_score != current.home_score || prev.away_score != current.away_score {
                let goals: Vec<&MatchEvent> = candidate
                    .events
                    .iter()
                    .filter(|e| e.is_scoring_goal())
                    .filter(after_threshold)
                    .collect();

                if goals.is_empty() {
                    events.extend(synthetic_goals(prev, current));
                } else {
                    events.extend(goals.into_iter().map(|e| goal_event(e, current)));
                }
            }

            events.extend(
                candidate
                    .events
                    .iter()
                    .filter(|e| e.event_type == EventKind::Card)
                    .filter(after_threshold)
                    .map(|e| card_event(e, current)),
            );

            if prev.status_short != current.status_short {
                events.push(status_event(Some(&prev.status_short), current));
            }
        } else {
            events.push(status_event(None, current));
        }

        // Stable, so same-minute events keep detection order
        events.sort_by_key(|e| e.elapsed());

        let outcome = if current.is_live() {
            FixtureOutcome::Updated(candidate)
        } else {
            FixtureOutcome::Ended(candidate.snapshot)
        };

        FixtureDiff {
            fixture_id: match &outcome {
                FixtureOutcome::Updated(c) => c.snapshot.fixture_id,
                FixtureOutcome::Ended(s) => s.fixture_id,
            },
            events,
            outcome,
        }
    }
}

fn goal_event(event: &MatchEvent, current: &LiveMatchSnapshot) -> DiffEvent {
    DiffEvent::Goal(GoalEvent {
        fixture_id: current.fixture_id,
        minute: event.time_elapsed,
        extra_minute: event.time_extra,
        team_id: event.team_id,
        team_name: event.team_name.clone(),
        player_id: event.player_id,
        player_name: event.player_name.clone(),
        assist_id: event.assist_id,
        assist_name: event.assist_name.clone(),
        detail: event.detail.clone(),
        home_team: current.home_team_name.clone(),
        away_team: current.away_team_name.clone(),
        home_score: current.home_score,
        away_score: current.away_score,
    })
}

/// Score went up but upstream has not published the goal record yet
fn synthetic_goals(prev: &LiveMatchSnapshot, current: &LiveMatchSnapshot) -> Vec<DiffEvent> {
    let minute = current.elapsed_minutes.unwrap_or(0);
    let sides = [
        (
            current.home_score > prev.home_score,
            current.home_team_id,
            &current.home_team_name,
        ),
        (
            current.away_score > prev.away_score,
            current.away_team_id,
            &current.away_team_name,
        ),
    ];

    sides
        .into_iter()
        .filter(|(scored, _, _)| *scored)
        .map(|(_, team_id, team_name)| {
            DiffEvent::Goal(GoalEvent {
                fixture_id: current.fixture_id,
                minute,
                extra_minute: None,
                team_id: Some(team_id),
                team_name: Some(team_name.clone()),
                player_id: None,
                player_name: None,
                assist_id: None,
                assist_name: None,
                detail: None,
                home_team: current.home_team_name.clone(),
                away_team: current.away_team_name.clone(),
                home_score: current.home_score,
                away_score: current.away_score,
            })
        })
        .collect()
}

fn card_event(event: &MatchEvent, current: &LiveMatchSnapshot) -> DiffEvent {
    DiffEvent::Card(CardEvent {
        fixture_id: current.fixture_id,
        minute: event.time_elapsed,
        extra_minute: event.time_extra,
        team_id: event.team_id,
        team_name: event.team_name.clone(),
        player_id: event.player_id,
        player_name: event.player_name.clone(),
        detail: event.detail.clone(),
        home_team: current.home_team_name.clone(),
        away_team: current.away_team_name.clone(),
    })
}

fn status_event(old_status: Option<&str>, current: &LiveMatchSnapshot) -> DiffEvent {
    DiffEvent::StatusChange(StatusChangeEvent {
        fixture_id: current.fixture_id,
        old_status: old_status.map(str::to_string),
        new_status: current.status_short.clone(),
        status_long: current.status_long.clone(),
        elapsed: current.elapsed_minutes,
        home_team: current.home_team_name.clone(),
        away_team: current.away_team_name.clone(),
        home_score: current.home_score,
        away_score: current.away_score,
    })
}
