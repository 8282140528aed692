pub mod assembler;
pub mod config;
pub mod error;
pub mod form;
pub mod head_to_head;
pub mod history;
pub mod ledger;
pub mod matches;
pub mod record;
pub mod schedule;
pub mod season;
pub mod source;
pub mod standings;

pub use assembler::{
    CancelFlag, FeatureAssembler, FeatureSink, PassSummary, Phase, SinkFn,
    assemble_by_season_parallel,
};
pub use config::FeatureConfig;
pub use error::{ConfigError, FeatureError, LedgerError, SkipReason};
pub use ledger::MatchLedger;
pub use matches::{Match, MatchRecord, Outcome, SeasonId, TeamId, Venue};
pub use record::FeatureRecord;
