//! Season-scoped league tables maintained in ledger order.
//!
//! The engine hands out pre-match positions and defers every result until
//! the pass moves past that date, so fixtures sharing a matchday all see the
//! table as it stood before the matchday. Each processed match leaves its
//! pre-match positions in a [`PositionLog`], which later lookups (strength
//! of schedule) read instead of recomputing old tables.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FeatureError;
use crate::ledger::{MatchLedger, MatchSlot};
use crate::matches::{Match, SeasonId, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StandingsRow {
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub points: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl StandingsRow {
    fn apply(&mut self, scored: u32, conceded: u32) {
        self.matches_played += 1;
        self.goals_for += scored;
        self.goals_against += conceded;
        match scored.cmp(&conceded) {
            Ordering::Greater => {
                self.wins += 1;
                self.points += 3;
            }
            Ordering::Equal => {
                self.draws += 1;
                self.points += 1;
            }
            Ordering::Less => self.losses += 1,
        }
    }

    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }
}

/// One team's place in the table at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TablePosition {
    pub position: u32,
    pub points: u32,
    pub goal_difference: i64,
    pub goals_for: u32,
    pub matches_played: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPositions {
    pub home: TablePosition,
    pub away: TablePosition,
    /// Teams in the season's field when the match was played.
    pub field: u32,
}

impl MatchPositions {
    /// Pre-match position of the side of `m` that is not `team`.
    pub fn opponent_of(&self, m: &Match, team: &TeamId) -> Option<TablePosition> {
        match m.is_home(team)? {
            true => Some(self.away),
            false => Some(self.home),
        }
    }
}

/// Pre-match positions keyed by ledger slot.
#[derive(Debug, Clone, Default)]
pub struct PositionLog {
    entries: HashMap<MatchSlot, MatchPositions>,
}

impl PositionLog {
    pub fn get(&self, slot: MatchSlot) -> Option<&MatchPositions> {
        self.entries.get(&slot)
    }

    pub fn insert(&mut self, slot: MatchSlot, positions: MatchPositions) {
        self.entries.insert(slot, positions);
    }

    pub fn merge(&mut self, other: PositionLog) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub position: u32,
    pub team: TeamId,
    pub row: StandingsRow,
}

fn rank_order(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.row
        .points
        .cmp(&a.row.points)
        .then(b.row.goal_difference().cmp(&a.row.goal_difference()))
        .then(b.row.goals_for.cmp(&a.row.goals_for))
        .then(a.team.cmp(&b.team))
}

#[derive(Debug, Clone, Default)]
struct SeasonTable {
    rows: HashMap<TeamId, StandingsRow>,
    /// Teams observed on dates before the open matchday.
    known: HashSet<TeamId>,
    /// Teams first observed on the open matchday.
    arriving: HashSet<TeamId>,
    open_date: Option<NaiveDate>,
    applied: u64,
    decisive: u64,
    draws: u64,
    ranked: Option<Vec<RankedEntry>>,
    positions: HashMap<TeamId, u32>,
}

impl SeasonTable {
    fn ranked(&mut self) -> &[RankedEntry] {
        if self.ranked.is_none() {
            let mut entries: Vec<RankedEntry> = self
                .rows
                .iter()
                .map(|(team, row)| RankedEntry {
                    position: 0,
                    team: team.clone(),
                    row: *row,
                })
                .collect();
            entries.sort_by(rank_order);
            self.positions.clear();
            for (idx, entry) in entries.iter_mut().enumerate() {
                entry.position = idx as u32 + 1;
                self.positions.insert(entry.team.clone(), entry.position);
            }
            self.ranked = Some(entries);
        }
        self.ranked.as_deref().unwrap_or(&[])
    }

    /// Moves the teams of the open matchday into the settled field.
    fn settle(&mut self) {
        self.known.extend(self.arriving.drain());
        self.open_date = None;
    }

    /// Size of the field seen by `m`: teams settled before its date plus
    /// whichever of its own sides are new.
    fn field_for(&self, m: &Match) -> u32 {
        let new = [&m.home_team, &m.away_team]
            .into_iter()
            .filter(|team| !self.known.contains(*team))
            .count();
        (self.known.len() + new).max(1) as u32
    }

    fn position_of(&mut self, team: &TeamId, field: u32) -> TablePosition {
        self.ranked();
        match (self.positions.get(team), self.rows.get(team)) {
            (Some(&position), Some(row)) => TablePosition {
                position,
                points: row.points,
                goal_difference: row.goal_difference(),
                goals_for: row.goals_for,
                matches_played: row.matches_played,
            },
            // Not in the table yet: bottom of the field.
            _ => TablePosition {
                position: field,
                ..TablePosition::default()
            },
        }
    }

    fn apply(&mut self, result: &PendingResult) {
        self.rows
            .entry(result.home.clone())
            .or_default()
            .apply(result.home_goals, result.away_goals);
        self.rows
            .entry(result.away.clone())
            .or_default()
            .apply(result.away_goals, result.home_goals);
        self.applied += 1;
        if result.home_goals == result.away_goals {
            self.draws += 1;
        } else {
            self.decisive += 1;
        }
        self.ranked = None;
    }

    fn check(&self, season: SeasonId) -> Result<(), FeatureError> {
        let mut played = 0u64;
        let mut points = 0u64;
        let mut goals_for = 0u64;
        let mut goals_against = 0u64;
        for row in self.rows.values() {
            if row.wins + row.draws + row.losses != row.matches_played {
                return Err(FeatureError::Invariant {
                    season,
                    detail: "row results do not add up to matches played".to_string(),
                });
            }
            played += u64::from(row.matches_played);
            points += u64::from(row.points);
            goals_for += u64::from(row.goals_for);
            goals_against += u64::from(row.goals_against);
        }
        if played != 2 * self.applied {
            return Err(FeatureError::Invariant {
                season,
                detail: format!(
                    "{played} team appearances for {} applied matches",
                    self.applied
                ),
            });
        }
        if points != 3 * self.decisive + 2 * self.draws {
            return Err(FeatureError::Invariant {
                season,
                detail: format!(
                    "{points} points for {} decisive and {} drawn matches",
                    self.decisive, self.draws
                ),
            });
        }
        if goals_for != goals_against {
            return Err(FeatureError::Invariant {
                season,
                detail: format!("goals for {goals_for} != goals against {goals_against}"),
            });
        }
        if self.rows.len() > self.known.len() {
            return Err(FeatureError::Invariant {
                season,
                detail: "table holds teams never observed in the season".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct PendingResult {
    season: SeasonId,
    home: TeamId,
    away: TeamId,
    home_goals: u32,
    away_goals: u32,
}

#[derive(Debug, Clone, Default)]
pub struct StandingsEngine {
    seasons: HashMap<SeasonId, SeasonTable>,
    pending: Vec<PendingResult>,
    pending_date: Option<NaiveDate>,
    log: PositionLog,
}

impl StandingsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies deferred results once the pass reaches a later date.
    pub fn advance_to(&mut self, date: NaiveDate) -> Result<(), FeatureError> {
        let Some(pending_date) = self.pending_date else {
            return Ok(());
        };
        match date.cmp(&pending_date) {
            Ordering::Greater => self.flush(),
            Ordering::Equal => Ok(()),
            Ordering::Less => {
                let season = self
                    .pending
                    .first()
                    .map(|p| p.season)
                    .unwrap_or(SeasonId(0));
                Err(FeatureError::Invariant {
                    season,
                    detail: format!("pass went back from {pending_date} to {date}"),
                })
            }
        }
    }

    /// Applies every deferred result and re-checks the touched tables.
    pub fn flush(&mut self) -> Result<(), FeatureError> {
        let mut touched = Vec::new();
        for result in std::mem::take(&mut self.pending) {
            let table = self.seasons.entry(result.season).or_default();
            table.apply(&result);
            if !touched.contains(&result.season) {
                touched.push(result.season);
            }
        }
        self.pending_date = None;
        for season in touched {
            if let Some(table) = self.seasons.get_mut(&season) {
                table.settle();
                table.check(season)?;
            }
        }
        Ok(())
    }

    /// Pre-match positions of both sides of `m`, recorded under `slot`.
    pub fn prematch(&mut self, slot: MatchSlot, m: &Match) -> Result<MatchPositions, FeatureError> {
        self.advance_to(m.date)?;
        let table = self.seasons.entry(m.season).or_default();
        if table.open_date != Some(m.date) {
            table.settle();
            table.open_date = Some(m.date);
        }
        let field = table.field_for(m);
        table.arriving.insert(m.home_team.clone());
        table.arriving.insert(m.away_team.clone());
        let positions = MatchPositions {
            home: table.position_of(&m.home_team, field),
            away: table.position_of(&m.away_team, field),
            field,
        };
        self.log.insert(slot, positions);
        Ok(positions)
    }

    /// Queues the result of `m`; it lands in the table when the pass moves
    /// to a later date.
    pub fn defer_result(&mut self, m: &Match) {
        self.pending.push(PendingResult {
            season: m.season,
            home: m.home_team.clone(),
            away: m.away_team.clone(),
            home_goals: m.home_goals,
            away_goals: m.away_goals,
        });
        self.pending_date = Some(m.date);
    }

    /// [`StandingsEngine::prematch`] followed by [`StandingsEngine::defer_result`].
    pub fn observe(&mut self, slot: MatchSlot, m: &Match) -> Result<MatchPositions, FeatureError> {
        let positions = self.prematch(slot, m)?;
        self.defer_result(m);
        Ok(positions)
    }

    /// Full ranked table of `season` from results applied so far.
    pub fn table(&mut self, season: SeasonId) -> Vec<RankedEntry> {
        self.seasons
            .get_mut(&season)
            .map(|table| table.ranked().to_vec())
            .unwrap_or_default()
    }

    pub fn log(&self) -> &PositionLog {
        &self.log
    }

    pub fn into_log(self) -> PositionLog {
        self.log
    }
}

/// Runs the standings pass alone over one season.
pub fn replay_season(ledger: &MatchLedger, season: SeasonId) -> Result<PositionLog, FeatureError> {
    let mut engine = StandingsEngine::new();
    for &slot in ledger.order() {
        let Some(m) = ledger.get(slot) else {
            continue;
        };
        if m.season != season {
            continue;
        }
        engine.observe(slot, m)?;
    }
    engine.flush()?;
    Ok(engine.into_log())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::MatchRecord;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, day).unwrap()
    }

    fn run(ledger: &MatchLedger) -> StandingsEngine {
        let mut engine = StandingsEngine::new();
        for &slot in ledger.order() {
            let m = ledger.get(slot).unwrap();
            engine.observe(slot, m).unwrap();
        }
        engine.flush().unwrap();
        engine
    }

    #[test]
    fn ties_break_on_team_id_not_insertion_order() {
        let mut ledger = MatchLedger::new();
        // Zulu and Alpha both win 2-0 on the same day; Zulu is ingested first.
        ledger
            .append(MatchRecord::new(d(9, 12), "Zulu", "Mike", 2, 0))
            .unwrap();
        ledger
            .append(MatchRecord::new(d(9, 12), "Alpha", "Kilo", 2, 0))
            .unwrap();
        let mut engine = run(&ledger);
        let table = engine.table(SeasonId(2020));
        let order: Vec<&str> = table.iter().map(|e| e.team.as_str()).collect();
        assert_eq!(order, vec!["Alpha", "Zulu", "Kilo", "Mike"]);
        assert_eq!(table[0].position, 1);
        assert_eq!(table[3].position, 4);
    }

    #[test]
    fn ranks_points_then_goal_difference_then_goals_for() {
        let mut ledger = MatchLedger::new();
        for rec in [
            MatchRecord::new(d(9, 12), "A", "B", 1, 0),
            MatchRecord::new(d(9, 12), "C", "D", 3, 2),
            MatchRecord::new(d(9, 12), "E", "F", 2, 0),
        ] {
            ledger.append(rec).unwrap();
        }
        let mut engine = run(&ledger);
        let order: Vec<String> = engine
            .table(SeasonId(2020))
            .iter()
            .map(|e| e.team.to_string())
            .collect();
        // E: +2. C: +1 with 3 scored. A: +1 with 1 scored.
        assert_eq!(order[..3], ["E", "C", "A"]);
    }

    #[test]
    fn same_day_matches_share_prematch_table() {
        let mut ledger = MatchLedger::new();
        ledger
            .append(MatchRecord::new(d(9, 5), "A", "B", 1, 0))
            .unwrap();
        let second = ledger
            .append(MatchRecord::new(d(9, 12), "A", "C", 4, 0))
            .unwrap();
        let third = ledger
            .append(MatchRecord::new(d(9, 12), "B", "D", 2, 0))
            .unwrap();

        let mut engine = StandingsEngine::new();
        for &slot in ledger.order() {
            engine.observe(slot, ledger.get(slot).unwrap()).unwrap();
        }
        let a_before_second = engine.log().get(second).unwrap().home;
        let b_before_third = engine.log().get(third).unwrap().home;
        assert_eq!(a_before_second.position, 1);
        assert_eq!(a_before_second.points, 3);
        // B lost its only applied match; A's 4-0 on the same day is not visible.
        assert_eq!(b_before_third.position, 2);
        assert_eq!(b_before_third.points, 0);
        // C and D both debut that day; neither counts the other.
        assert_eq!(engine.log().get(second).unwrap().away.position, 3);
        assert_eq!(engine.log().get(third).unwrap().away.position, 3);
    }

    #[test]
    fn absent_team_defaults_to_bottom() {
        let mut ledger = MatchLedger::new();
        ledger
            .append(MatchRecord::new(d(9, 5), "A", "B", 1, 0))
            .unwrap();
        let debut = ledger
            .append(MatchRecord::new(d(9, 12), "C", "D", 0, 0))
            .unwrap();
        let engine = run(&ledger);
        let positions = engine.log().get(debut).unwrap();
        assert_eq!(positions.home.position, 4);
        assert_eq!(positions.home.points, 0);
        assert_eq!(positions.away.position, 4);

        let first = engine.log().get(ledger.order()[0]).unwrap();
        assert_eq!(first.home.position, 2);
        assert_eq!(first.away.position, 2);
    }

    #[test]
    fn debut_default_ignores_same_day_fixtures() {
        let mut crowded = MatchLedger::new();
        crowded
            .append(MatchRecord::new(d(9, 12), "A", "B", 1, 0).with_id(1))
            .unwrap();
        let with_peer = crowded
            .append(MatchRecord::new(d(9, 12), "C", "D", 2, 1).with_id(2))
            .unwrap();
        let mut alone = MatchLedger::new();
        let without_peer = alone
            .append(MatchRecord::new(d(9, 12), "C", "D", 2, 1).with_id(2))
            .unwrap();

        let crowded_engine = run(&crowded);
        let alone_engine = run(&alone);
        let seen = crowded_engine.log().get(with_peer).unwrap();
        assert_eq!(seen, alone_engine.log().get(without_peer).unwrap());
        assert_eq!(seen.home.position, 2);
        assert_eq!(seen.field, 2);
    }

    #[test]
    fn seasons_start_from_an_empty_table() {
        let mut ledger = MatchLedger::new();
        ledger
            .append(MatchRecord::new(d(5, 1), "A", "B", 5, 0))
            .unwrap();
        let opener = ledger
            .append(MatchRecord::new(d(9, 12), "A", "B", 0, 0))
            .unwrap();
        let engine = run(&ledger);
        let positions = engine.log().get(opener).unwrap();
        assert_eq!(positions.home.points, 0);
        assert_eq!(positions.home.matches_played, 0);
    }

    #[test]
    fn corrupted_table_is_fatal() {
        let mut ledger = MatchLedger::new();
        ledger
            .append(MatchRecord::new(d(9, 5), "A", "B", 1, 0))
            .unwrap();
        let mut engine = run(&ledger);
        if let Some(table) = engine.seasons.get_mut(&SeasonId(2020))
            && let Some(row) = table.rows.get_mut(&TeamId::from("A"))
        {
            row.points += 3;
        }
        ledger
            .append(MatchRecord::new(d(9, 12), "A", "B", 0, 0))
            .unwrap();
        let slot = ledger.order()[1];
        engine.observe(slot, ledger.get(slot).unwrap()).unwrap();
        assert!(matches!(
            engine.flush(),
            Err(FeatureError::Invariant { .. })
        ));
    }

    #[test]
    fn going_back_in_time_is_fatal() {
        let mut engine = StandingsEngine::new();
        let mut ledger = MatchLedger::new();
        ledger
            .append(MatchRecord::new(d(9, 12), "A", "B", 1, 0))
            .unwrap();
        engine.observe(0, ledger.get(0).unwrap()).unwrap();
        assert!(engine.advance_to(d(9, 5)).is_err());
    }

    #[test]
    fn replay_matches_full_pass() {
        let mut ledger = MatchLedger::new();
        for rec in [
            MatchRecord::new(d(5, 1), "A", "B", 5, 0),
            MatchRecord::new(d(9, 5), "A", "B", 1, 0),
            MatchRecord::new(d(9, 12), "B", "C", 2, 2),
        ] {
            ledger.append(rec).unwrap();
        }
        let full = run(&ledger);
        let mut merged = replay_season(&ledger, SeasonId(2019)).unwrap();
        merged.merge(replay_season(&ledger, SeasonId(2020)).unwrap());
        assert_eq!(merged.len(), full.log().len());
        for &slot in ledger.order() {
            assert_eq!(merged.get(slot), full.log().get(slot));
        }
    }
}
