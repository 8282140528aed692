use chrono::NaiveDate;
use thiserror::Error;

use crate::matches::{SeasonId, TeamId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid match {id:?}: {reason}")]
    InvalidMatch { id: Option<u64>, reason: String },

    #[error(
        "out of order: {date} precedes latest ingested date {latest} of season {season} (tolerance {tolerance_days}d)"
    )]
    OutOfOrder {
        season: SeasonId,
        date: NaiveDate,
        latest: NaiveDate,
        tolerance_days: i64,
    },

    #[error("duplicate match {home} vs {away} on {date} (season {season})")]
    DuplicateMatch {
        season: SeasonId,
        home: TeamId,
        away: TeamId,
        date: NaiveDate,
        existing_id: u64,
    },
}

/// Why a single match was left out of the feature output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("no standings snapshot recorded for match {match_id}")]
    MissingSnapshot { match_id: u64 },
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("standings invariant violated in season {season}: {detail}")]
    Invariant { season: SeasonId, detail: String },

    #[error("ledger prefix changed since the pass stopped at position {cursor}")]
    LedgerPrefixChanged { cursor: usize },

    #[error("feature sink rejected record for match {match_id}")]
    Sink {
        match_id: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer")]
    ZeroWindow { name: &'static str },

    #[error("season rollover month must be within 1..=12, got {0}")]
    RolloverMonth(u32),

    #[error("same-day tolerance must be non-negative, got {0}")]
    NegativeTolerance(i64),
}
