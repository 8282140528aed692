use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(Arc<str>);

impl TeamId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TeamId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TeamId {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Season keyed by its starting year (2020 for 2020/21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeasonId(pub i32);

impl fmt::Display for SeasonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}", self.0, (self.0 + 1).rem_euclid(100))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

pub fn classify_outcome(home_goals: u32, away_goals: u32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Venue {
    #[default]
    Any,
    Home,
    Away,
}

/// A match row as handed over by the ingestion layer, before the ledger
/// has assigned it an id and a season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(default)]
    pub id: Option<u64>,
    pub date: NaiveDate,
    #[serde(default)]
    pub season: Option<SeasonId>,
    #[serde(default)]
    pub matchday: Option<u32>,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_goals: u32,
    pub away_goals: u32,
}

impl MatchRecord {
    pub fn new(
        date: NaiveDate,
        home_team: impl Into<TeamId>,
        away_team: impl Into<TeamId>,
        home_goals: u32,
        away_goals: u32,
    ) -> Self {
        Self {
            id: None,
            date,
            season: None,
            matchday: None,
            home_team: home_team.into(),
            away_team: away_team.into(),
            home_goals,
            away_goals,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_season(mut self, season: SeasonId) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_matchday(mut self, matchday: u32) -> Self {
        self.matchday = Some(matchday);
        self
    }
}

/// A finished match as stored in the ledger. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: u64,
    pub date: NaiveDate,
    pub season: SeasonId,
    pub matchday: Option<u32>,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_goals: u32,
    pub away_goals: u32,
    pub result: Outcome,
}

impl Match {
    pub fn involves(&self, team: &TeamId) -> bool {
        self.home_team == *team || self.away_team == *team
    }

    pub fn is_home(&self, team: &TeamId) -> Option<bool> {
        if *team == self.home_team {
            Some(true)
        } else if *team == self.away_team {
            Some(false)
        } else {
            None
        }
    }

    pub fn opponent(&self, team: &TeamId) -> Option<&TeamId> {
        match self.is_home(team)? {
            true => Some(&self.away_team),
            false => Some(&self.home_team),
        }
    }

    /// Goals (for, against) seen from `team`'s side.
    pub fn goals_for_against(&self, team: &TeamId) -> Option<(u32, u32)> {
        match self.is_home(team)? {
            true => Some((self.home_goals, self.away_goals)),
            false => Some((self.away_goals, self.home_goals)),
        }
    }

    /// League points earned by `team`: 3 for a win, 1 for a draw.
    pub fn points_for(&self, team: &TeamId) -> Option<u32> {
        let (scored, conceded) = self.goals_for_against(team)?;
        Some(match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => 3,
            std::cmp::Ordering::Equal => 1,
            std::cmp::Ordering::Less => 0,
        })
    }

    pub fn matches_venue(&self, team: &TeamId, venue: Venue) -> bool {
        match venue {
            Venue::Any => self.involves(team),
            Venue::Home => self.home_team == *team,
            Venue::Away => self.away_team == *team,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Match {
        Match {
            id: 1,
            date: NaiveDate::from_ymd_opt(2020, 8, 15).unwrap(),
            season: SeasonId(2020),
            matchday: Some(1),
            home_team: TeamId::from("A"),
            away_team: TeamId::from("B"),
            home_goals: 3,
            away_goals: 1,
            result: Outcome::Home,
        }
    }

    #[test]
    fn perspective_helpers() {
        let m = sample();
        let a = TeamId::from("A");
        let b = TeamId::from("B");
        let c = TeamId::from("C");
        assert_eq!(m.goals_for_against(&a), Some((3, 1)));
        assert_eq!(m.goals_for_against(&b), Some((1, 3)));
        assert_eq!(m.points_for(&a), Some(3));
        assert_eq!(m.points_for(&b), Some(0));
        assert_eq!(m.opponent(&b), Some(&a));
        assert_eq!(m.points_for(&c), None);
        assert!(m.matches_venue(&b, Venue::Away));
        assert!(!m.matches_venue(&b, Venue::Home));
    }

    #[test]
    fn classify_outcome_works() {
        assert_eq!(classify_outcome(2, 1), Outcome::Home);
        assert_eq!(classify_outcome(0, 0), Outcome::Draw);
        assert_eq!(classify_outcome(0, 4), Outcome::Away);
    }

    #[test]
    fn season_display_wraps_century() {
        assert_eq!(SeasonId(2020).to_string(), "2020/21");
        assert_eq!(SeasonId(1999).to_string(), "1999/00");
    }

    #[test]
    fn team_ids_order_lexicographically() {
        assert!(TeamId::from("Alaves") < TeamId::from("Betis"));
        assert_eq!(TeamId::from("  Getafe "), TeamId::from("Getafe"));
    }
}
