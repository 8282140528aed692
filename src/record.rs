//! The per-match output row and its flat column view.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::form::{FormSummary, Momentum, MomentumBand, ScoringPatterns};
use crate::head_to_head::HeadToHead;
use crate::matches::{Match, Outcome, SeasonId, TeamId};
use crate::schedule::ScheduleStrength;
use crate::standings::TablePosition;

/// Everything known about one side before kick-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideFeatures {
    pub team: TeamId,
    pub form: FormSummary,
    /// Home side's home form, away side's away form.
    pub venue_form: FormSummary,
    pub standing: TablePosition,
    pub rest_days: i64,
    pub momentum: Momentum,
    pub scoring: ScoringPatterns,
    pub schedule: ScheduleStrength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchLabel {
    pub result: Outcome,
    pub home_goals: u32,
    pub away_goals: u32,
    /// Home minus away.
    pub goal_difference: i64,
    pub total_goals: u32,
}

impl MatchLabel {
    pub fn of(m: &Match) -> Self {
        Self {
            result: m.result,
            home_goals: m.home_goals,
            away_goals: m.away_goals,
            goal_difference: i64::from(m.home_goals) - i64::from(m.away_goals),
            total_goals: m.home_goals.saturating_add(m.away_goals),
        }
    }
}

/// Home minus away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureDeltas {
    pub position_difference: i64,
    pub points_difference: i64,
    pub form_points_difference: i64,
    pub form_goal_diff_difference: i64,
    pub momentum_difference: i64,
    pub rest_difference: i64,
    pub home_advantage: u8,
}

impl FeatureDeltas {
    pub fn between(home: &SideFeatures, away: &SideFeatures) -> Self {
        Self {
            position_difference: i64::from(home.standing.position)
                - i64::from(away.standing.position),
            points_difference: i64::from(home.standing.points) - i64::from(away.standing.points),
            form_points_difference: i64::from(home.form.points) - i64::from(away.form.points),
            form_goal_diff_difference: home.form.goal_difference() - away.form.goal_difference(),
            momentum_difference: i64::from(home.momentum.score) - i64::from(away.momentum.score),
            rest_difference: home.rest_days - away.rest_days,
            home_advantage: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFields {
    pub month: u32,
    /// Monday = 0.
    pub day_of_week: u32,
    pub is_weekend: bool,
}

impl CalendarFields {
    pub fn of(date: NaiveDate) -> Self {
        let weekday = date.weekday();
        Self {
            month: date.month(),
            day_of_week: weekday.num_days_from_monday(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub match_id: u64,
    pub date: NaiveDate,
    pub season: SeasonId,
    pub matchday: Option<u32>,
    pub label: MatchLabel,
    pub home: SideFeatures,
    pub away: SideFeatures,
    pub h2h: HeadToHead,
    pub deltas: FeatureDeltas,
    pub calendar: CalendarFields,
}

fn band_code(band: MomentumBand) -> f64 {
    match band {
        MomentumBand::Unknown => -1.0,
        MomentumBand::Poor => 0.0,
        MomentumBand::Average => 1.0,
        MomentumBand::Good => 2.0,
        MomentumBand::Excellent => 3.0,
    }
}

fn result_code(result: Outcome) -> f64 {
    match result {
        Outcome::Home => 1.0,
        Outcome::Draw => 0.0,
        Outcome::Away => -1.0,
    }
}

fn push_form(out: &mut Vec<(String, f64)>, prefix: &str, form: &FormSummary) {
    let fields = [
        ("matches_played", f64::from(form.matches_played)),
        ("wins", f64::from(form.wins)),
        ("draws", f64::from(form.draws)),
        ("losses", f64::from(form.losses)),
        ("points", f64::from(form.points)),
        ("goals_scored", f64::from(form.goals_scored)),
        ("goals_conceded", f64::from(form.goals_conceded)),
        ("goal_difference", form.goal_difference() as f64),
        ("points_per_match", form.points_per_match()),
        ("goals_per_match", form.goals_per_match()),
        ("goals_conceded_per_match", form.goals_conceded_per_match()),
        ("win_rate", form.win_rate()),
    ];
    for (name, value) in fields {
        out.push((format!("{prefix}_{name}"), value));
    }
}

fn push_side(out: &mut Vec<(String, f64)>, side: &str, f: &SideFeatures) {
    push_form(out, &format!("{side}_form"), &f.form);
    // home_home_* / away_away_*
    push_form(out, &format!("{side}_{side}"), &f.venue_form);

    let s = &f.standing;
    out.push((format!("{side}_league_position"), f64::from(s.position)));
    out.push((format!("{side}_league_points"), f64::from(s.points)));
    out.push((format!("{side}_league_goal_difference"), s.goal_difference as f64));
    out.push((format!("{side}_league_goals_for"), f64::from(s.goals_for)));
    out.push((format!("{side}_league_matches_played"), f64::from(s.matches_played)));

    out.push((format!("{side}_rest_days"), f.rest_days as f64));

    let m = &f.momentum;
    out.push((format!("{side}_momentum_score"), f64::from(m.score)));
    out.push((format!("{side}_momentum_recent_wins"), f64::from(m.recent_wins)));
    out.push((format!("{side}_momentum_per_match"), m.per_match));
    out.push((format!("{side}_momentum_band"), band_code(m.band)));

    let sc = &f.scoring;
    out.push((format!("{side}_scoring_avg_goals_scored"), sc.avg_goals_scored));
    out.push((format!("{side}_scoring_avg_goals_conceded"), sc.avg_goals_conceded));
    out.push((format!("{side}_scoring_clean_sheets"), f64::from(sc.clean_sheets)));
    out.push((format!("{side}_scoring_failed_to_score"), f64::from(sc.failed_to_score)));
    out.push((format!("{side}_scoring_high_scoring_games"), f64::from(sc.high_scoring_games)));
    out.push((format!("{side}_scoring_clean_sheet_rate"), sc.clean_sheet_rate));
    out.push((format!("{side}_scoring_btts_rate"), sc.btts_rate));
    out.push((format!("{side}_scoring_scored_rate"), sc.scored_rate));

    out.push((format!("{side}_sos_opponents"), f64::from(f.schedule.opponents)));
    out.push((format!("{side}_sos_avg_opponent_position"), f.schedule.avg_opponent_position));
    out.push((format!("{side}_sos_avg_opponent_points"), f.schedule.avg_opponent_points));
    out.push((format!("{side}_sos_index"), f.schedule.index));
}

impl FeatureRecord {
    /// Flat numeric view with stable, prefixed column names. Identifying
    /// fields (ids, teams, date) are left out; the label columns come first.
    pub fn columns(&self) -> Vec<(String, f64)> {
        let mut out = Vec::with_capacity(96);
        out.push(("result".to_string(), result_code(self.label.result)));
        out.push(("home_goals".to_string(), f64::from(self.label.home_goals)));
        out.push(("away_goals".to_string(), f64::from(self.label.away_goals)));
        out.push((
            "goal_difference".to_string(),
            self.label.goal_difference as f64,
        ));
        out.push(("total_goals".to_string(), f64::from(self.label.total_goals)));

        push_side(&mut out, "home", &self.home);
        push_side(&mut out, "away", &self.away);

        let h = &self.h2h;
        out.push(("h2h_matches_played".to_string(), f64::from(h.matches_played)));
        out.push(("h2h_home_wins".to_string(), f64::from(h.team_a_wins)));
        out.push(("h2h_away_wins".to_string(), f64::from(h.team_b_wins)));
        out.push(("h2h_draws".to_string(), f64::from(h.draws)));
        out.push(("h2h_home_goals".to_string(), f64::from(h.team_a_goals)));
        out.push(("h2h_away_goals".to_string(), f64::from(h.team_b_goals)));
        out.push(("h2h_home_win_rate".to_string(), h.team_a_win_rate()));
        out.push(("h2h_away_win_rate".to_string(), h.team_b_win_rate()));
        out.push(("h2h_draw_rate".to_string(), h.draw_rate()));
        out.push(("h2h_goals_per_match".to_string(), h.goals_per_match()));

        let d = &self.deltas;
        out.push(("position_difference".to_string(), d.position_difference as f64));
        out.push(("points_difference".to_string(), d.points_difference as f64));
        out.push(("form_points_difference".to_string(), d.form_points_difference as f64));
        out.push((
            "form_goal_diff_difference".to_string(),
            d.form_goal_diff_difference as f64,
        ));
        out.push(("momentum_difference".to_string(), d.momentum_difference as f64));
        out.push(("rest_difference".to_string(), d.rest_difference as f64));
        out.push(("home_advantage".to_string(), f64::from(d.home_advantage)));

        out.push(("month".to_string(), f64::from(self.calendar.month)));
        out.push(("day_of_week".to_string(), f64::from(self.calendar.day_of_week)));
        out.push((
            "is_weekend".to_string(),
            if self.calendar.is_weekend { 1.0 } else { 0.0 },
        ));
        out
    }
}
