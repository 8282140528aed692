//! Per-team ordered views over the ledger.
//!
//! Every view is kept sorted by `(date, match id)` and only grows, so a
//! "before date D" lookup is a `partition_point` followed by a reverse walk.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::matches::{Match, TeamId, Venue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    date: NaiveDate,
    id: u64,
    slot: usize,
}

impl Entry {
    fn key(&self) -> (NaiveDate, u64) {
        (self.date, self.id)
    }
}

#[derive(Debug, Clone, Default)]
struct TeamViews {
    all: Vec<Entry>,
    home: Vec<Entry>,
    away: Vec<Entry>,
}

impl TeamViews {
    fn view(&self, venue: Venue) -> &[Entry] {
        match venue {
            Venue::Any => &self.all,
            Venue::Home => &self.home,
            Venue::Away => &self.away,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TeamHistoryIndex {
    teams: HashMap<TeamId, TeamViews>,
    pairs: HashMap<(TeamId, TeamId), Vec<Entry>>,
}

impl TeamHistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly appended ledger slot in all views it belongs to.
    pub fn insert(&mut self, slot: usize, m: &Match) {
        let entry = Entry {
            date: m.date,
            id: m.id,
            slot,
        };

        let home = self.teams.entry(m.home_team.clone()).or_default();
        insert_sorted(&mut home.all, entry);
        insert_sorted(&mut home.home, entry);

        let away = self.teams.entry(m.away_team.clone()).or_default();
        insert_sorted(&mut away.all, entry);
        insert_sorted(&mut away.away, entry);

        let pair = self
            .pairs
            .entry(pair_key(&m.home_team, &m.away_team))
            .or_default();
        insert_sorted(pair, entry);
    }

    fn view(&self, team: &TeamId, venue: Venue) -> &[Entry] {
        self.teams
            .get(team)
            .map(|views| views.view(venue))
            .unwrap_or(&[])
    }

    fn pair_view(&self, a: &TeamId, b: &TeamId) -> &[Entry] {
        self.pairs
            .get(&pair_key(a, b))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn insert_sorted(view: &mut Vec<Entry>, entry: Entry) {
    if view.last().is_none_or(|last| last.key() <= entry.key()) {
        view.push(entry);
        return;
    }
    let pos = view.partition_point(|e| e.key() < entry.key());
    view.insert(pos, entry);
}

fn strictly_before(view: &[Entry], date: NaiveDate) -> &[Entry] {
    &view[..view.partition_point(|e| e.date < date)]
}

fn pair_key(a: &TeamId, b: &TeamId) -> (TeamId, TeamId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Read access to the index together with the ledger arena it points into.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    matches: &'a [Match],
    index: &'a TeamHistoryIndex,
}

impl<'a> History<'a> {
    pub fn new(matches: &'a [Match], index: &'a TeamHistoryIndex) -> Self {
        Self { matches, index }
    }

    /// Up to `n` matches of `team` dated strictly before `date`, most recent
    /// first, restricted to `venue`.
    pub fn last_n(
        &self,
        team: &TeamId,
        date: NaiveDate,
        n: usize,
        venue: Venue,
    ) -> impl Iterator<Item = &'a Match> + use<'a> {
        let matches = self.matches;
        let view = strictly_before(self.index.view(team, venue), date);
        view.iter().rev().take(n).map(move |e| &matches[e.slot])
    }

    /// Up to `n` meetings between `a` and `b` (either venue) strictly before
    /// `date`, most recent first.
    pub fn last_n_between(
        &self,
        a: &TeamId,
        b: &TeamId,
        date: NaiveDate,
        n: usize,
    ) -> impl Iterator<Item = &'a Match> + use<'a> {
        let matches = self.matches;
        let view = strictly_before(self.index.pair_view(a, b), date);
        view.iter().rev().take(n).map(move |e| &matches[e.slot])
    }

    pub fn last_before(&self, team: &TeamId, date: NaiveDate) -> Option<&'a Match> {
        let matches = self.matches;
        let view = strictly_before(self.index.view(team, Venue::Any), date);
        view.last().map(|e| &matches[e.slot])
    }

    /// Ledger slots of the same query as [`History::last_n`].
    pub fn last_n_slots(
        &self,
        team: &TeamId,
        date: NaiveDate,
        n: usize,
    ) -> impl Iterator<Item = (usize, &'a Match)> + use<'a> {
        let matches = self.matches;
        let view = strictly_before(self.index.view(team, Venue::Any), date);
        view.iter()
            .rev()
            .take(n)
            .map(move |e| (e.slot, &matches[e.slot]))
    }

}
