use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use liga_features::{
    CancelFlag, FeatureAssembler, FeatureConfig, FeatureRecord, SinkFn,
    assemble_by_season_parallel, source,
};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let db_path = arg_value("--db")
        .map(PathBuf::from)
        .or_else(source::default_db_path)
        .context("no sqlite path: pass --db or set HIST_DB_PATH")?;
    let league_id = match arg_value("--league-id") {
        Some(raw) => Some(
            raw.trim()
                .parse::<u32>()
                .with_context(|| format!("invalid --league-id {raw}"))?,
        ),
        None => None,
    };
    let config_path = arg_value("--config").map(PathBuf::from);
    let config = FeatureConfig::resolve(config_path.as_deref())?;

    let conn = source::open_db(&db_path)?;
    let records = source::load_match_records(&conn, league_id)?;
    let mut ledger = config.ledger();
    let ingest = ledger.ingest(records);
    for err in ingest.rejected.iter().take(10) {
        warn!(error = %err, "match rejected");
    }
    info!(
        db = %db_path.display(),
        appended = ingest.appended,
        duplicates = ingest.duplicates,
        rejected = ingest.rejected.len(),
        seasons = ledger.seasons().len(),
        "ledger loaded"
    );
    if ledger.is_empty() {
        return Err(anyhow!("no finished matches found in {}", db_path.display()));
    }

    let mut out: Box<dyn Write> = match arg_value("--out") {
        Some(path) => Box::new(BufWriter::new(
            File::create(&path).with_context(|| format!("create {path}"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let summary = if has_flag("--parallel") {
        let (records, summary) = assemble_by_season_parallel(&ledger, &config)?;
        for record in &records {
            write_line(&mut out, record)?;
        }
        summary
    } else {
        let mut assembler = FeatureAssembler::new(config)?;
        let mut sink = SinkFn(|record: FeatureRecord| write_line(&mut out, &record));
        let summary = assembler.run(&ledger, &mut sink, &CancelFlag::new())?;
        assembler.finish()?;
        summary
    };
    out.flush().context("flush feature output")?;

    info!(
        processed = summary.processed,
        emitted = summary.emitted,
        warmup = summary.warmup_skipped,
        faults = summary.faults.len(),
        "features written"
    );
    Ok(())
}

fn write_line(out: &mut dyn Write, record: &FeatureRecord) -> Result<()> {
    let mut row = Map::new();
    row.insert("match_id".to_string(), json!(record.match_id));
    row.insert("date".to_string(), json!(record.date.to_string()));
    row.insert("season".to_string(), json!(record.season.to_string()));
    row.insert("matchday".to_string(), json!(record.matchday));
    row.insert("home_team".to_string(), json!(record.home.team.as_str()));
    row.insert("away_team".to_string(), json!(record.away.team.as_str()));
    for (name, value) in record.columns() {
        row.insert(name, json!(value));
    }
    serde_json::to_writer(&mut *out, &Value::Object(row)).context("encode feature row")?;
    out.write_all(b"\n").context("write feature row")?;
    Ok(())
}

fn arg_value(name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
