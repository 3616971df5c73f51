//! TTL tiers
//!
//! Cache lifetimes shrink the closer the requested data is to "now": a match
//! being played changes every minute, last season's results never change.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TtlTier {
    Live,
    Today,
    Tomorrow,
    Future,
    Past,
    Empty,
    Error,
    Default,
    Weekend,
}

impl TtlTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlTier::Live => "LIVE",
            TtlTier::Today => "TODAY",
            TtlTier::Tomorrow => "TOMORROW",
            TtlTier::Future => "FUTURE",
            TtlTier::Past => "PAST",
            TtlTier::Empty => "EMPTY",
            TtlTier::Error => "ERROR",
            TtlTier::Default => "DEFAULT",
            TtlTier::Weekend => "WEEKEND",
        }
    }
}

impl fmt::Display for TtlTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete lifetimes (seconds) for every tier.
///
/// `future`/`past` apply to gateway reads, `precache_future`/`precache_past`
/// to the precache day-offset breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    pub empty: i64,
    pub error: i64,
    pub future: i64,
    pub past: i64,
    pub default: i64,
    pub live: i64,
    pub today: i64,
    pub tomorrow: i64,
    pub precache_future: i64,
    pub precache_past: i64,
    pub weekend: i64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            empty: 300,
            error: 300,
            future: 1800,
            past: 10_800,
            default: 3600,
            live: 60,
            today: 900,
            tomorrow: 3600,
            precache_future: 21_600,
            precache_past: 86_400,
            weekend: 21_600,
        }
    }
}

impl TtlPolicy {
    /// Gateway-side lifetime for a tier
    pub fn seconds(&self, tier: TtlTier) -> i64 {
        match tier {
            TtlTier::Live => self.live,
            TtlTier::Today => self.today,
            TtlTier::Tomorrow => self.tomorrow,
            TtlTier::Future => self.future,
            TtlTier::Past => self.past,
            TtlTier::Empty => self.empty,
            TtlTier::Error => self.error,
            TtlTier::Default => self.default,
            TtlTier::Weekend => self.weekend,
        }
    }

    /// Precache-side lifetime; only FUTURE and PAST differ from the gateway
    pub fn precache_seconds(&self, tier: TtlTier) -> i64 {
        match tier {
            TtlTier::Future => self.precache_future,
            TtlTier::Past => self.precache_past,
            other => self.seconds(other),
        }
    }

    /// Tier for a gateway fetch outcome
    pub fn classify_request(
        has_data: bool,
        is_error: bool,
        request_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> TtlTier {
        if !has_data {
            return TtlTier::Empty;
        }
        if is_error {
            return TtlTier::Error;
        }
        match request_date {
            Some(date) if date > today => TtlTier::Future,
            Some(date) if date < today => TtlTier::Past,
            _ => TtlTier::Default,
        }
    }

    /// Tier for a precached date, by whole days from today
    pub fn classify_day_offset(offset_days: i64) -> TtlTier {
        match offset_days {
            d if d < 0 => TtlTier::Past,
            0 => TtlTier::Today,
            1 => TtlTier::Tomorrow,
            _ => TtlTier::Future,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let all = [
            ("empty", self.empty),
            ("error", self.error),
            ("future", self.future),
            ("past", self.past),
            ("default", self.default),
            ("live", self.live),
            ("today", self.today),
            ("tomorrow", self.tomorrow),
            ("precache_future", self.precache_future),
            ("precache_past", self.precache_past),
            ("weekend", self.weekend),
        ];
        match all.iter().find(|(_, secs)| *secs <= 0) {
            Some((name, _)) => Err(format!("ttl.{} must be greater than 0", name)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_request_classification() {
        let today = day("2025-07-16");
        assert_eq!(
            TtlPolicy::classify_request(false, false, Some(today), today),
            TtlTier::Empty
        );
        assert_eq!(
            TtlPolicy::classify_request(true, true, Some(today), today),
            TtlTier::Error
        );
        assert_eq!(
            TtlPolicy::classify_request(true, false, Some(day("2025-07-17")), today),
            TtlTier::Future
        );
        assert_eq!(
            TtlPolicy::classify_request(true, false, Some(day("2025-07-15")), today),
            TtlTier::Past
        );
        assert_eq!(
            TtlPolicy::classify_request(true, false, Some(today), today),
            TtlTier::Default
        );
        assert_eq!(
            TtlPolicy::classify_request(true, false, None, today),
            TtlTier::Default
        );
    }

    #[test]
    fn test_day_offset_classification() {
        assert_eq!(TtlPolicy::classify_day_offset(-1), TtlTier::Past);
        assert_eq!(TtlPolicy::classify_day_offset(0), TtlTier::Today);
        assert_eq!(TtlPolicy::classify_day_offset(1), TtlTier::Tomorrow);
        assert_eq!(TtlPolicy::classify_day_offset(2), TtlTier::Future);
        assert_eq!(TtlPolicy::classify_day_offset(6), TtlTier::Future);
    }

    #[test]
    fn test_precache_lifetimes_differ_only_for_distance_tiers() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.precache_seconds(TtlTier::Future), 21_600);
        assert_eq!(policy.seconds(TtlTier::Future), 1800);
        assert_eq!(policy.precache_seconds(TtlTier::Today), policy.seconds(TtlTier::Today));
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        let policy = TtlPolicy {
            live: 0,
            ..TtlPolicy::default()
        };
        assert_eq!(policy.validate().unwrap_err(), "ttl.live must be greater than 0");
        assert!(TtlPolicy::default().validate().is_ok());
    }
}
