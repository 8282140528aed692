use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, TimeDelta};
use tracing::debug;

use crate::error::LedgerError;
use crate::history::{History, TeamHistoryIndex};
use crate::matches::{Match, MatchRecord, SeasonId, TeamId, classify_outcome};
use crate::season::SeasonRule;

/// Position of a match in the ledger arena. Stable for the ledger's lifetime.
pub type MatchSlot = usize;

/// Highest goal count accepted for one side.
pub const MAX_GOALS: u32 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatchKey {
    season: SeasonId,
    home: TeamId,
    away: TeamId,
    date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub appended: usize,
    pub duplicates: usize,
    pub rejected: Vec<LedgerError>,
}

/// Append-only store of finished matches.
///
/// `order` lists arena slots by `(date, match id)`; that is the processing
/// order of every pass, so same-day fixtures are taken in id order.
#[derive(Debug, Clone, Default)]
pub struct MatchLedger {
    season_rule: SeasonRule,
    same_day_tolerance_days: i64,
    matches: Vec<Match>,
    order: Vec<MatchSlot>,
    keys: HashMap<MatchKey, MatchSlot>,
    ids: HashMap<u64, MatchSlot>,
    latest: HashMap<SeasonId, NaiveDate>,
    index: TeamHistoryIndex,
    next_id: u64,
}

impl MatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(season_rule: SeasonRule, same_day_tolerance_days: i64) -> Self {
        Self {
            season_rule,
            same_day_tolerance_days: same_day_tolerance_days.max(0),
            ..Self::default()
        }
    }

    pub fn append(&mut self, record: MatchRecord) -> Result<MatchSlot, LedgerError> {
        let home = record.home_team.clone();
        let away = record.away_team.clone();
        if home.as_str().is_empty() || away.as_str().is_empty() {
            return Err(LedgerError::InvalidMatch {
                id: record.id,
                reason: "empty team identifier".to_string(),
            });
        }
        if home == away {
            return Err(LedgerError::InvalidMatch {
                id: record.id,
                reason: format!("{home} cannot play itself"),
            });
        }
        if record.home_goals > MAX_GOALS || record.away_goals > MAX_GOALS {
            return Err(LedgerError::InvalidMatch {
                id: record.id,
                reason: format!(
                    "score {}-{} exceeds {MAX_GOALS} goals a side",
                    record.home_goals, record.away_goals
                ),
            });
        }

        let season = self.season_rule.assign(record.date, record.season);
        let key = MatchKey {
            season,
            home: home.clone(),
            away: away.clone(),
            date: record.date,
        };
        if let Some(&slot) = self.keys.get(&key) {
            return Err(LedgerError::DuplicateMatch {
                season,
                home,
                away,
                date: record.date,
                existing_id: self.matches[slot].id,
            });
        }

        // A window reaching past the calendar's start admits every date.
        if let Some(&latest) = self.latest.get(&season)
            && let Some(floor) = TimeDelta::try_days(self.same_day_tolerance_days)
                .and_then(|window| latest.checked_sub_signed(window))
            && record.date < floor
        {
            return Err(LedgerError::OutOfOrder {
                season,
                date: record.date,
                latest,
                tolerance_days: self.same_day_tolerance_days,
            });
        }

        let id = record.id.unwrap_or(self.next_id);
        if self.ids.contains_key(&id) {
            return Err(LedgerError::InvalidMatch {
                id: Some(id),
                reason: "match id already used by another fixture".to_string(),
            });
        }

        let m = Match {
            id,
            date: record.date,
            season,
            matchday: record.matchday,
            home_team: home,
            away_team: away,
            home_goals: record.home_goals,
            away_goals: record.away_goals,
            result: classify_outcome(record.home_goals, record.away_goals),
        };

        let slot = self.matches.len();
        self.index.insert(slot, &m);
        self.insert_in_order(slot, &m);
        self.keys.insert(key, slot);
        self.ids.insert(id, slot);
        self.next_id = self.next_id.max(id.saturating_add(1));
        let latest = self.latest.entry(season).or_insert(m.date);
        if m.date > *latest {
            *latest = m.date;
        }
        self.matches.push(m);
        Ok(slot)
    }

    /// Like [`MatchLedger::append`], but a duplicate resolves to the slot of
    /// the match already stored.
    pub fn append_idempotent(&mut self, record: MatchRecord) -> Result<MatchSlot, LedgerError> {
        match self.append(record) {
            Err(LedgerError::DuplicateMatch {
                existing_id,
                home,
                away,
                date,
                ..
            }) => {
                debug!(%home, %away, %date, existing_id, "duplicate match ignored");
                Ok(self.ids[&existing_id])
            }
            other => other,
        }
    }

    /// Appends every record, treating duplicates as no-ops and collecting
    /// the rows that were rejected.
    pub fn ingest<I>(&mut self, records: I) -> IngestSummary
    where
        I: IntoIterator<Item = MatchRecord>,
    {
        let mut summary = IngestSummary::default();
        for record in records {
            match self.append(record) {
                Ok(_) => summary.appended += 1,
                Err(LedgerError::DuplicateMatch { .. }) => summary.duplicates += 1,
                Err(err) => summary.rejected.push(err),
            }
        }
        summary
    }

    fn insert_in_order(&mut self, slot: MatchSlot, m: &Match) {
        let key = (m.date, m.id);
        let matches = &self.matches;
        let pos = self
            .order
            .partition_point(|&s| (matches[s].date, matches[s].id) < key);
        if pos == self.order.len() {
            self.order.push(slot);
        } else {
            self.order.insert(pos, slot);
        }
    }

    /// Date-ascending matches, optionally restricted to one season.
    pub fn iterate(&self, season: Option<SeasonId>) -> impl Iterator<Item = &Match> + '_ {
        self.order
            .iter()
            .map(|&slot| &self.matches[slot])
            .filter(move |m| season.is_none_or(|s| m.season == s))
    }

    pub fn order(&self) -> &[MatchSlot] {
        &self.order
    }

    pub fn get(&self, slot: MatchSlot) -> Option<&Match> {
        self.matches.get(slot)
    }

    pub fn history(&self) -> History<'_> {
        History::new(&self.matches, &self.index)
    }

    pub fn seasons(&self) -> Vec<SeasonId> {
        let seasons: BTreeSet<SeasonId> = self.latest.keys().copied().collect();
        seasons.into_iter().collect()
    }

    pub fn latest_date(&self, season: SeasonId) -> Option<NaiveDate> {
        self.latest.get(&season).copied()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
