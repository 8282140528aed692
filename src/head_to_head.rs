use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::form::ratio;
use crate::history::History;
use crate::matches::TeamId;

/// Pairwise record between two teams, seen from team A's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeadToHead {
    pub matches_played: u32,
    pub team_a_wins: u32,
    pub team_b_wins: u32,
    pub draws: u32,
    pub team_a_goals: u32,
    pub team_b_goals: u32,
}

impl HeadToHead {
    /// The same record from team B's side.
    pub fn mirrored(&self) -> Self {
        Self {
            matches_played: self.matches_played,
            team_a_wins: self.team_b_wins,
            team_b_wins: self.team_a_wins,
            draws: self.draws,
            team_a_goals: self.team_b_goals,
            team_b_goals: self.team_a_goals,
        }
    }

    pub fn team_a_win_rate(&self) -> f64 {
        ratio(self.team_a_wins, self.matches_played)
    }

    pub fn team_b_win_rate(&self) -> f64 {
        ratio(self.team_b_wins, self.matches_played)
    }

    pub fn draw_rate(&self) -> f64 {
        ratio(self.draws, self.matches_played)
    }

    pub fn goals_per_match(&self) -> f64 {
        ratio(self.team_a_goals + self.team_b_goals, self.matches_played)
    }
}

pub fn head_to_head(
    history: &History<'_>,
    team_a: &TeamId,
    team_b: &TeamId,
    date: NaiveDate,
    n: usize,
) -> HeadToHead {
    let mut out = HeadToHead::default();
    if team_a == team_b {
        return out;
    }
    for m in history.last_n_between(team_a, team_b, date, n) {
        let Some((a_goals, b_goals)) = m.goals_for_against(team_a) else {
            continue;
        };
        out.matches_played += 1;
        out.team_a_goals += a_goals;
        out.team_b_goals += b_goals;
        match a_goals.cmp(&b_goals) {
            std::cmp::Ordering::Greater => out.team_a_wins += 1,
            std::cmp::Ordering::Less => out.team_b_wins += 1,
            std::cmp::Ordering::Equal => out.draws += 1,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MatchLedger;
    use crate::matches::MatchRecord;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, day).unwrap()
    }

    #[test]
    fn normalizes_to_first_team() {
        let mut ledger = MatchLedger::new();
        for rec in [
            MatchRecord::new(d(8, 15), "A", "B", 3, 1),
            MatchRecord::new(d(8, 22), "C", "A", 0, 0),
            MatchRecord::new(d(9, 19), "B", "A", 2, 0),
            MatchRecord::new(d(10, 3), "A", "B", 1, 1),
        ] {
            ledger.append(rec).unwrap();
        }
        let history = ledger.history();
        let a = TeamId::from("A");
        let b = TeamId::from("B");

        let h = head_to_head(&history, &a, &b, d(12, 1), 10);
        assert_eq!(h.matches_played, 3);
        assert_eq!(h.team_a_wins, 1);
        assert_eq!(h.team_b_wins, 1);
        assert_eq!(h.draws, 1);
        assert_eq!(h.team_a_goals, 4);
        assert_eq!(h.team_b_goals, 4);
        assert!((h.goals_per_match() - 8.0 / 3.0).abs() < 1e-12);

        assert_eq!(head_to_head(&history, &b, &a, d(12, 1), 10), h.mirrored());

        // Window of two keeps the most recent meetings only.
        let recent = head_to_head(&history, &a, &b, d(12, 1), 2);
        assert_eq!(recent.matches_played, 2);
        assert_eq!(recent.team_a_wins, 0);

        // Cutoff is exclusive.
        let early = head_to_head(&history, &a, &b, d(8, 15), 10);
        assert_eq!(early, HeadToHead::default());
        assert_eq!(early.draw_rate(), 0.0);
    }
}
