//! League catalogue and season resolution

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// How a league numbers its seasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonRule {
    /// Season runs January to December (K League, MLS, Brasileirão, ...)
    CalendarYear,
    /// Season runs August to May and is named after its starting year
    AugustToMay,
    /// UEFA club competitions: qualifiers start in July
    UefaJuly,
}

impl SeasonRule {
    /// Season number that a fixture on `date` belongs to
    pub fn season_for(&self, date: NaiveDate) -> i32 {
        let year = date.year();
        match self {
            SeasonRule::CalendarYear => year,
            SeasonRule::AugustToMay if date.month() >= 8 => year,
            SeasonRule::AugustToMay => year - 1,
            SeasonRule::UefaJuly if date.month() >= 7 => year,
            SeasonRule::UefaJuly => year - 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
    /// 1 = top-5 European leagues, higher numbers are lower priority
    pub tier: u8,
    pub season_rule: SeasonRule,
}

impl League {
    pub fn new(id: i64, name: &str, tier: u8, season_rule: SeasonRule) -> Self {
        Self {
            id,
            name: name.to_string(),
            tier,
            season_rule,
        }
    }

    pub fn season_for(&self, date: NaiveDate) -> i32 {
        self.season_rule.season_for(date)
    }
}

/// Built-in precache list, priority ordered
pub fn default_leagues() -> Vec<League> {
    use SeasonRule::*;

    let mut leagues = vec![
        League::new(39, "Premier League", 1, AugustToMay),
        League::new(140, "La Liga", 1, AugustToMay),
        League::new(135, "Serie A", 1, AugustToMay),
        League::new(78, "Bundesliga", 1, AugustToMay),
        League::new(61, "Ligue 1", 1, AugustToMay),
        League::new(2, "UEFA Champions League", 2, UefaJuly),
        League::new(3, "UEFA Europa League", 2, UefaJuly),
        League::new(848, "UEFA Europa Conference League", 2, UefaJuly),
        League::new(292, "K League 1", 2, CalendarYear),
        League::new(98, "J1 League", 2, CalendarYear),
        League::new(94, "Primeira Liga", 2, AugustToMay),
        League::new(88, "Eredivisie", 2, AugustToMay),
        League::new(40, "Championship", 3, AugustToMay),
        League::new(253, "Major League Soccer", 3, CalendarYear),
        League::new(71, "Serie A (Brazil)", 3, CalendarYear),
        League::new(128, "Liga Profesional Argentina", 3, CalendarYear),
        League::new(307, "Saudi Pro League", 3, AugustToMay),
        League::new(169, "Chinese Super League", 3, CalendarYear),
    ];
    sort_by_priority(&mut leagues);
    leagues
}

/// Stable sort by tier, keeping the given order within a tier
pub fn sort_by_priority(leagues: &mut [League]) {
    leagues.sort_by_key(|league| league.tier);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_august_to_may_boundaries() {
        let rule = SeasonRule::AugustToMay;
        assert_eq!(rule.season_for(day("2025-08-01")), 2025);
        assert_eq!(rule.season_for(day("2026-05-24")), 2025);
        assert_eq!(rule.season_for(day("2025-07-16")), 2024);
    }

    #[test]
    fn test_uefa_cutover_in_july() {
        let rule = SeasonRule::UefaJuly;
        assert_eq!(rule.season_for(day("2025-07-08")), 2025);
        assert_eq!(rule.season_for(day("2025-06-30")), 2024);
    }

    #[test]
    fn test_calendar_year() {
        let rule = SeasonRule::CalendarYear;
        assert_eq!(rule.season_for(day("2025-02-01")), 2025);
        assert_eq!(rule.season_for(day("2025-12-01")), 2025);
    }

    #[test]
    fn test_default_leagues_priority_ordered() {
        let leagues = default_leagues();
        assert!(leagues.windows(2).all(|w| w[0].tier <= w[1].tier));
        assert_eq!(leagues[0].id, 39);
        assert_eq!(leagues.iter().filter(|l| l.tier == 1).count(), 5);
    }
}
