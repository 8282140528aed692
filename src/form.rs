//! Trailing-window form for a single team.
//!
//! All aggregates here are computed over matches strictly before the cutoff
//! date and average over the matches that actually exist: a team with two
//! matches in a five-match window is summarized over two, never padded.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::history::History;
use crate::matches::{Match, TeamId, Venue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormSummary {
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub points: u32,
    pub goals_scored: u32,
    pub goals_conceded: u32,
}

impl FormSummary {
    fn absorb(&mut self, m: &Match, team: &TeamId) {
        let Some((scored, conceded)) = m.goals_for_against(team) else {
            return;
        };
        self.matches_played += 1;
        self.goals_scored = self.goals_scored.saturating_add(scored);
        self.goals_conceded = self.goals_conceded.saturating_add(conceded);
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => {
                self.wins += 1;
                self.points += 3;
            }
            std::cmp::Ordering::Equal => {
                self.draws += 1;
                self.points += 1;
            }
            std::cmp::Ordering::Less => self.losses += 1,
        }
    }

    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_scored) - i64::from(self.goals_conceded)
    }

    pub fn points_per_match(&self) -> f64 {
        ratio(self.points, self.matches_played)
    }

    pub fn goals_per_match(&self) -> f64 {
        ratio(self.goals_scored, self.matches_played)
    }

    pub fn goals_conceded_per_match(&self) -> f64 {
        ratio(self.goals_conceded, self.matches_played)
    }

    pub fn win_rate(&self) -> f64 {
        ratio(self.wins, self.matches_played)
    }
}

/// `num / den`, or 0 when there is nothing to divide by.
pub(crate) fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.0
    } else {
        f64::from(num) / f64::from(den)
    }
}

pub fn form(
    history: &History<'_>,
    team: &TeamId,
    date: NaiveDate,
    n: usize,
    venue: Venue,
) -> FormSummary {
    let mut out = FormSummary::default();
    for m in history.last_n(team, date, n, venue) {
        out.absorb(m, team);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MomentumBand {
    #[default]
    Unknown,
    Poor,
    Average,
    Good,
    Excellent,
}

impl MomentumBand {
    fn from_score(score: u32, matches: u32) -> Self {
        if matches == 0 {
            return MomentumBand::Unknown;
        }
        match score {
            7.. => MomentumBand::Excellent,
            5..=6 => MomentumBand::Good,
            3..=4 => MomentumBand::Average,
            _ => MomentumBand::Poor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Momentum {
    pub score: u32,
    pub recent_wins: u32,
    pub matches: u32,
    pub per_match: f64,
    pub band: MomentumBand,
}

/// Points collected over the last `n` matches, the short-horizon sibling of
/// [`form`].
pub fn momentum(history: &History<'_>, team: &TeamId, date: NaiveDate, n: usize) -> Momentum {
    let window = form(history, team, date, n, Venue::Any);
    Momentum {
        score: window.points,
        recent_wins: window.wins,
        matches: window.matches_played,
        per_match: window.points_per_match(),
        band: MomentumBand::from_score(window.points, window.matches_played),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoringPatterns {
    pub matches: u32,
    pub avg_goals_scored: f64,
    pub avg_goals_conceded: f64,
    pub clean_sheets: u32,
    pub failed_to_score: u32,
    pub high_scoring_games: u32,
    pub clean_sheet_rate: f64,
    /// Share of matches where both sides scored.
    pub btts_rate: f64,
    /// Share of matches where the team scored at all.
    pub scored_rate: f64,
}

const HIGH_SCORING_TOTAL: u32 = 3;

pub fn scoring_patterns(
    history: &History<'_>,
    team: &TeamId,
    date: NaiveDate,
    n: usize,
) -> ScoringPatterns {
    let mut matches = 0u32;
    let mut scored = 0u32;
    let mut conceded = 0u32;
    let mut clean_sheets = 0u32;
    let mut failed_to_score = 0u32;
    let mut both_scored = 0u32;
    let mut high_scoring_games = 0u32;

    for m in history.last_n(team, date, n, Venue::Any) {
        let Some((gs, gc)) = m.goals_for_against(team) else {
            continue;
        };
        matches += 1;
        scored = scored.saturating_add(gs);
        conceded = conceded.saturating_add(gc);
        if gc == 0 {
            clean_sheets += 1;
        }
        if gs == 0 {
            failed_to_score += 1;
        }
        if gs > 0 && gc > 0 {
            both_scored += 1;
        }
        if gs.saturating_add(gc) >= HIGH_SCORING_TOTAL {
            high_scoring_games += 1;
        }
    }

    ScoringPatterns {
        matches,
        avg_goals_scored: ratio(scored, matches),
        avg_goals_conceded: ratio(conceded, matches),
        clean_sheets,
        failed_to_score,
        high_scoring_games,
        clean_sheet_rate: ratio(clean_sheets, matches),
        btts_rate: ratio(both_scored, matches),
        scored_rate: ratio(matches - failed_to_score, matches),
    }
}
