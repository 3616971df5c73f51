//! Periodic status logging for long-running loops

use chrono::{DateTime, Duration, Utc};
use tracing::info;

/// Counts loop activity and logs a summary once per interval
pub struct Heartbeat {
    name: &'static str,
    interval: Duration,
    last_beat: DateTime<Utc>,
    cycles: u64,
    events: u64,
    failures: u64,
}

impl Heartbeat {
    pub fn new(name: &'static str, interval_secs: i64, now: DateTime<Utc>) -> Self {
        Self {
            name,
            interval: Duration::seconds(interval_secs),
            last_beat: now,
            cycles: 0,
            events: 0,
            failures: 0,
        }
    }

    pub fn record_cycle(&mut self, events: usize) {
        self.cycles += 1;
        self.events += events as u64;
    }

    pub fn record_failure(&mut self) {
        self.cycles += 1;
        self.failures += 1;
    }

    pub fn should_beat(&self, now: DateTime<Utc>) -> bool {
        now - self.last_beat >= self.interval
    }

    /// Log and reset the counters if the interval has passed.
    ///
    /// Returns whether a beat was logged.
    pub fn tick(&mut self, now: DateTime<Utc>, active: usize) -> bool {
        if !self.should_beat(now) {
            return false;
        }
        info!(
            "[{}] alive: {} cycles, {} events, {} failures, {} active since {}",
            self.name,
            self.cycles,
            self.events,
            self.failures,
            active,
            self.last_beat.format("%H:%M:%S")
        );
        self.last_beat = now;
        self.cycles = 0;
        self.events = 0;
        self.failures = 0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_beats_once_per_interval() {
        let start = Utc.with_ymd_and_hms(2025, 7, 16, 19, 0, 0).unwrap();
        let mut heartbeat = Heartbeat::new("poller", 300, start);
        heartbeat.record_cycle(3);
        heartbeat.record_failure();

        assert!(!heartbeat.tick(start + Duration::seconds(299), 1));
        assert!(heartbeat.tick(start + Duration::seconds(300), 1));
        assert_eq!(heartbeat.cycles, 0);
        assert!(!heartbeat.tick(start + Duration::seconds(301), 1));
    }
}
