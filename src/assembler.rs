//! The feature pass: walks the ledger in order, captures pre-match state for
//! every match and hands finished records to a sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::FeatureConfig;
use crate::error::{FeatureError, SkipReason};
use crate::form::{form, momentum, scoring_patterns};
use crate::head_to_head::head_to_head;
use crate::history::History;
use crate::ledger::{MatchLedger, MatchSlot};
use crate::matches::{Match, SeasonId, TeamId, Venue};
use crate::record::{CalendarFields, FeatureDeltas, FeatureRecord, MatchLabel, SideFeatures};
use crate::schedule::{rest_days, strength_of_schedule};
use crate::standings::{PositionLog, StandingsEngine, TablePosition, replay_season};

pub trait FeatureSink {
    fn accept(&mut self, record: FeatureRecord) -> anyhow::Result<()>;
}

impl FeatureSink for Vec<FeatureRecord> {
    fn accept(&mut self, record: FeatureRecord) -> anyhow::Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Adapts a closure into a [`FeatureSink`].
pub struct SinkFn<F>(pub F);

impl<F> FeatureSink for SinkFn<F>
where
    F: FnMut(FeatureRecord) -> anyhow::Result<()>,
{
    fn accept(&mut self, record: FeatureRecord) -> anyhow::Result<()> {
        (self.0)(record)
    }
}

/// Shared stop request, checked between matches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WarmUp,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMatch {
    pub match_id: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub processed: usize,
    pub emitted: usize,
    pub warmup_skipped: usize,
    pub faults: Vec<SkippedMatch>,
    pub cancelled: bool,
}

impl PassSummary {
    pub fn absorb(&mut self, other: PassSummary) {
        self.processed += other.processed;
        self.emitted += other.emitted;
        self.warmup_skipped += other.warmup_skipped;
        self.faults.extend(other.faults);
        self.cancelled |= other.cancelled;
    }
}

/// Resumable single pass over the ledger.
///
/// The assembler owns the standings and remembers which slots it has
/// processed; a later [`FeatureAssembler::run`] continues after the last one
/// as long as that prefix of the ledger order is unchanged.
#[derive(Debug)]
pub struct FeatureAssembler {
    config: FeatureConfig,
    season: Option<SeasonId>,
    standings: StandingsEngine,
    snapshots: Option<Arc<PositionLog>>,
    processed_order: Vec<MatchSlot>,
}

impl FeatureAssembler {
    pub fn new(config: FeatureConfig) -> Result<Self, FeatureError> {
        config.validate()?;
        Ok(Self {
            config,
            season: None,
            standings: StandingsEngine::new(),
            snapshots: None,
            processed_order: Vec::new(),
        })
    }

    /// Restricts the pass (and its warm-up) to one season.
    pub fn scoped_to(mut self, season: SeasonId) -> Self {
        self.season = Some(season);
        self
    }

    /// Reads historical opponent snapshots from `log` instead of the
    /// assembler's own standings log.
    pub fn with_snapshots(mut self, log: Arc<PositionLog>) -> Self {
        self.snapshots = Some(log);
        self
    }

    pub fn cursor(&self) -> usize {
        self.processed_order.len()
    }

    pub fn phase(&self) -> Phase {
        if self.processed_order.len() < self.config.warmup_matches {
            Phase::WarmUp
        } else {
            Phase::Ready
        }
    }

    pub fn standings_mut(&mut self) -> &mut StandingsEngine {
        &mut self.standings
    }

    /// Applies results still deferred at the end of the pass.
    pub fn finish(&mut self) -> Result<(), FeatureError> {
        self.standings.flush()
    }

    fn scoped_order(&self, ledger: &MatchLedger) -> Vec<MatchSlot> {
        match self.season {
            None => ledger.order().to_vec(),
            Some(season) => ledger
                .order()
                .iter()
                .copied()
                .filter(|&slot| ledger.get(slot).is_some_and(|m| m.season == season))
                .collect(),
        }
    }

    pub fn run<S>(
        &mut self,
        ledger: &MatchLedger,
        sink: &mut S,
        cancel: &CancelFlag,
    ) -> Result<PassSummary, FeatureError>
    where
        S: FeatureSink + ?Sized,
    {
        let order = self.scoped_order(ledger);
        let cursor = self.processed_order.len();
        if order.len() < cursor || order[..cursor] != self.processed_order[..] {
            return Err(FeatureError::LedgerPrefixChanged { cursor });
        }

        info!(
            season = ?self.season,
            resume_at = cursor,
            pending = order.len() - cursor,
            "feature pass starting"
        );
        let history = ledger.history();
        let mut summary = PassSummary::default();
        for &slot in &order[cursor..] {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                info!(cursor = self.processed_order.len(), "feature pass cancelled");
                break;
            }
            let Some(m) = ledger.get(slot) else {
                return Err(FeatureError::LedgerPrefixChanged { cursor });
            };
            self.process(&history, slot, m, sink, &mut summary)?;
        }
        info!(
            processed = summary.processed,
            emitted = summary.emitted,
            warmup = summary.warmup_skipped,
            faults = summary.faults.len(),
            "feature pass finished"
        );
        Ok(summary)
    }

    fn process<S>(
        &mut self,
        history: &History<'_>,
        slot: MatchSlot,
        m: &Match,
        sink: &mut S,
        summary: &mut PassSummary,
    ) -> Result<(), FeatureError>
    where
        S: FeatureSink + ?Sized,
    {
        let phase = self.phase();
        let positions = self.standings.prematch(slot, m)?;
        self.standings.defer_result(m);
        self.processed_order.push(slot);
        summary.processed += 1;

        if phase == Phase::WarmUp {
            summary.warmup_skipped += 1;
            return Ok(());
        }

        match self.build(history, m, positions.home, positions.away) {
            Ok(record) => {
                sink.accept(record).map_err(|source| FeatureError::Sink {
                    match_id: m.id,
                    source,
                })?;
                summary.emitted += 1;
            }
            Err(reason) => {
                warn!(match_id = m.id, date = %m.date, %reason, "match skipped");
                summary.faults.push(SkippedMatch {
                    match_id: m.id,
                    reason,
                });
            }
        }
        Ok(())
    }

    fn build(
        &self,
        history: &History<'_>,
        m: &Match,
        home_standing: TablePosition,
        away_standing: TablePosition,
    ) -> Result<FeatureRecord, SkipReason> {
        let home = self.side(history, m, &m.home_team, Venue::Home, home_standing)?;
        let away = self.side(history, m, &m.away_team, Venue::Away, away_standing)?;
        let h2h = head_to_head(
            history,
            &m.home_team,
            &m.away_team,
            m.date,
            self.config.h2h_window,
        );
        Ok(FeatureRecord {
            match_id: m.id,
            date: m.date,
            season: m.season,
            matchday: m.matchday,
            label: MatchLabel::of(m),
            deltas: FeatureDeltas::between(&home, &away),
            home,
            away,
            h2h,
            calendar: CalendarFields::of(m.date),
        })
    }

    fn side(
        &self,
        history: &History<'_>,
        m: &Match,
        team: &TeamId,
        venue: Venue,
        standing: TablePosition,
    ) -> Result<SideFeatures, SkipReason> {
        let cfg = &self.config;
        let date = m.date;
        let snapshots = self
            .snapshots
            .as_deref()
            .unwrap_or_else(|| self.standings.log());
        Ok(SideFeatures {
            team: team.clone(),
            form: form(history, team, date, cfg.form_window, Venue::Any),
            venue_form: form(history, team, date, cfg.venue_form_window, venue),
            standing,
            rest_days: rest_days(history, team, date),
            momentum: momentum(history, team, date, cfg.momentum_window),
            scoring: scoring_patterns(history, team, date, cfg.scoring_window),
            schedule: strength_of_schedule(history, snapshots, team, date, cfg.schedule_window)?,
        })
    }
}

/// Runs the pass with seasons spread over the rayon pool.
///
/// Standings are replayed per season first and the position logs merged, so
/// every season pass can read opponent snapshots from earlier seasons.
/// Warm-up applies to each season on its own. Records come back in ledger
/// order.
pub fn assemble_by_season_parallel(
    ledger: &MatchLedger,
    config: &FeatureConfig,
) -> Result<(Vec<FeatureRecord>, PassSummary), FeatureError> {
    config.validate()?;
    let seasons = ledger.seasons();

    let logs = seasons
        .par_iter()
        .map(|&season| replay_season(ledger, season))
        .collect::<Result<Vec<_>, FeatureError>>()?;
    let mut merged = PositionLog::default();
    for log in logs {
        merged.merge(log);
    }
    let merged = Arc::new(merged);
    debug!(seasons = seasons.len(), snapshots = merged.len(), "standings replayed");

    let passes = seasons
        .par_iter()
        .map(|&season| {
            let mut assembler = FeatureAssembler::new(config.clone())?
                .scoped_to(season)
                .with_snapshots(Arc::clone(&merged));
            let mut records = Vec::new();
            let summary = assembler.run(ledger, &mut records, &CancelFlag::new())?;
            assembler.finish()?;
            Ok((records, summary))
        })
        .collect::<Result<Vec<_>, FeatureError>>()?;

    let mut records = Vec::new();
    let mut summary = PassSummary::default();
    for (season_records, season_summary) in passes {
        records.extend(season_records);
        summary.absorb(season_summary);
    }
    records.sort_by_key(|r| (r.date, r.match_id));
    Ok((records, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::MatchRecord;
    use chrono::NaiveDate;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, day).unwrap()
    }

    fn config(warmup: usize) -> FeatureConfig {
        FeatureConfig {
            warmup_matches: warmup,
            ..FeatureConfig::default()
        }
    }

    fn small_ledger() -> MatchLedger {
        let mut ledger = MatchLedger::new();
        for rec in [
            MatchRecord::new(d(8, 15), "A", "B", 3, 1),
            MatchRecord::new(d(8, 15), "C", "D", 0, 0),
            MatchRecord::new(d(8, 22), "C", "A", 0, 0),
            MatchRecord::new(d(8, 22), "B", "D", 2, 1),
            MatchRecord::new(d(8, 29), "A", "D", 1, 2),
        ] {
            ledger.append(rec).unwrap();
        }
        ledger
    }

    #[test]
    fn warmup_skips_then_emits() {
        let ledger = small_ledger();
        let mut assembler = FeatureAssembler::new(config(2)).unwrap();
        assert_eq!(assembler.phase(), Phase::WarmUp);
        let mut out = Vec::new();
        let summary = assembler.run(&ledger, &mut out, &CancelFlag::new()).unwrap();
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.warmup_skipped, 2);
        assert_eq!(summary.emitted, 3);
        assert_eq!(out.len(), 3);
        assert_eq!(assembler.phase(), Phase::Ready);

        // Standings kept moving during warm-up.
        let first_ready = &out[0];
        assert_eq!(first_ready.home.team.as_str(), "C");
        assert_eq!(first_ready.home.standing.points, 1);
        assert_eq!(first_ready.away.standing.points, 3);
        assert_eq!(first_ready.away.standing.position, 1);
        assert_eq!(first_ready.home.rest_days, 7);
    }

    #[test]
    fn cancel_and_resume_continue_where_stopped() {
        let mut ledger = small_ledger();
        let cancel = CancelFlag::new();
        let mut assembler = FeatureAssembler::new(config(0)).unwrap();
        let mut out = Vec::new();
        let mut seen = 0;
        let mut sink = SinkFn(|record: FeatureRecord| -> anyhow::Result<()> {
            seen += 1;
            if seen == 2 {
                cancel.cancel();
            }
            out.push(record);
            Ok(())
        });
        let first = assembler.run(&ledger, &mut sink, &cancel).unwrap();
        assert!(first.cancelled);
        assert_eq!(first.processed, 2);
        assert_eq!(assembler.cursor(), 2);

        cancel.reset();
        ledger
            .append(MatchRecord::new(d(9, 5), "B", "C", 1, 1))
            .unwrap();
        let mut rest = Vec::new();
        let second = assembler.run(&ledger, &mut rest, &cancel).unwrap();
        assert!(!second.cancelled);
        assert_eq!(second.processed, 4);
        assert_eq!(out.len() + rest.len(), 6);

        let mut fresh = Vec::new();
        FeatureAssembler::new(config(0))
            .unwrap()
            .run(&ledger, &mut fresh, &CancelFlag::new())
            .unwrap();
        let mut resumed = out;
        resumed.extend(rest);
        assert_eq!(resumed, fresh);
    }

    #[test]
    fn resume_refused_when_prefix_changes() {
        let mut ledger = small_ledger();
        let mut assembler = FeatureAssembler::new(config(0)).unwrap();
        assembler
            .run(&ledger, &mut Vec::new(), &CancelFlag::new())
            .unwrap();
        // Earlier season slots in ahead of everything processed.
        ledger
            .append(MatchRecord::new(d(5, 1), "A", "B", 0, 0))
            .unwrap();
        let err = assembler
            .run(&ledger, &mut Vec::new(), &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, FeatureError::LedgerPrefixChanged { cursor: 5 }));
    }

    #[test]
    fn sink_errors_propagate() {
        let ledger = small_ledger();
        let mut assembler = FeatureAssembler::new(config(0)).unwrap();
        let mut sink = SinkFn(|_record: FeatureRecord| -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        });
        let err = assembler
            .run(&ledger, &mut sink, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, FeatureError::Sink { match_id: 0, .. }));
    }

    #[test]
    fn rejects_invalid_config() {
        let bad = FeatureConfig {
            form_window: 0,
            ..FeatureConfig::default()
        };
        assert!(matches!(
            FeatureAssembler::new(bad),
            Err(FeatureError::Config(_))
        ));
    }

    #[test]
    fn missing_snapshot_is_counted_not_fatal() {
        let ledger = small_ledger();
        let mut assembler = FeatureAssembler::new(config(0))
            .unwrap()
            .with_snapshots(Arc::new(PositionLog::default()));
        let mut out = Vec::new();
        let summary = assembler.run(&ledger, &mut out, &CancelFlag::new()).unwrap();
        // Only the two opening fixtures have no earlier meetings to look up.
        assert_eq!(summary.emitted, 2);
        assert_eq!(summary.faults.len(), 3);
        assert!(matches!(
            summary.faults[0].reason,
            SkipReason::MissingSnapshot { .. }
        ));
    }
}
