//! SQLite match source: reads finished matches from the `matches` table
//! written by the ingestion tooling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, params};
use tracing::warn;

use crate::matches::MatchRecord;
use crate::season::parse_season_label;

pub fn default_db_path() -> Option<PathBuf> {
    std::env::var("HIST_DB_PATH")
        .ok()
        .filter(|val| !val.trim().is_empty())
        .map(PathBuf::from)
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            season TEXT NOT NULL,
            league_id INTEGER NOT NULL,
            round INTEGER NULL,
            utc_time TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            finished INTEGER NOT NULL,
            cancelled INTEGER NOT NULL,
            awarded INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_league ON matches(league_id);
        CREATE INDEX IF NOT EXISTS idx_matches_utc_time ON matches(utc_time);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Calendar date of a stored kick-off: RFC 3339 timestamps are read in UTC,
/// anything else must start with `YYYY-MM-DD`.
pub fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

struct Row {
    match_id: i64,
    season: String,
    round: Option<i64>,
    utc_time: String,
    home_team: String,
    away_team: String,
    home_goals: i64,
    away_goals: i64,
}

impl Row {
    fn into_record(self) -> Result<MatchRecord> {
        let date = parse_match_date(&self.utc_time)
            .ok_or_else(|| anyhow!("unparsable kick-off time {:?}", self.utc_time))?;
        let home_goals = u32::try_from(self.home_goals)
            .with_context(|| format!("home goals {}", self.home_goals))?;
        let away_goals = u32::try_from(self.away_goals)
            .with_context(|| format!("away goals {}", self.away_goals))?;
        let id = u64::try_from(self.match_id).context("negative match id")?;

        let mut record =
            MatchRecord::new(date, self.home_team, self.away_team, home_goals, away_goals)
                .with_id(id);
        if let Some(season) = parse_season_label(&self.season) {
            record = record.with_season(season);
        }
        if let Some(round) = self.round.and_then(|r| u32::try_from(r).ok()) {
            record = record.with_matchday(round);
        }
        Ok(record)
    }
}

/// Finished, scored matches in `(utc_time, match_id)` order, optionally
/// limited to one league. Rows that cannot be turned into a match are
/// logged and left out.
pub fn load_match_records(conn: &Connection, league_id: Option<u32>) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_id, season, round, utc_time,
                home_team, away_team, home_goals, away_goals
            FROM matches
            WHERE (?1 IS NULL OR league_id = ?1)
              AND finished = 1
              AND cancelled = 0
              AND awarded = 0
              AND home_goals IS NOT NULL
              AND away_goals IS NOT NULL
            ORDER BY utc_time ASC, match_id ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map(params![league_id.map(i64::from)], |row| {
            Ok(Row {
                match_id: row.get(0)?,
                season: row.get(1)?,
                round: row.get(2)?,
                utc_time: row.get(3)?,
                home_team: row.get(4)?,
                away_team: row.get(5)?,
                home_goals: row.get(6)?,
                away_goals: row.get(7)?,
            })
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        let row = row.context("decode match row")?;
        let match_id = row.match_id;
        match row.into_record() {
            Ok(record) => out.push(record),
            Err(err) => warn!(match_id, error = %err, "unusable match row"),
        }
    }
    Ok(out)
}

/// Writes one finished match; an existing row with the same id is replaced.
pub fn upsert_match_record(
    conn: &Connection,
    league_id: u32,
    season_label: &str,
    record: &MatchRecord,
) -> Result<()> {
    let id = record
        .id
        .ok_or_else(|| anyhow!("match record without an id cannot be stored"))?;
    conn.execute(
        r#"
        INSERT INTO matches (
            match_id, season, league_id, round, utc_time,
            home_team, away_team, home_goals, away_goals,
            finished, cancelled, awarded, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, 0, 0, ?10)
        ON CONFLICT(match_id) DO UPDATE SET
            season = excluded.season,
            league_id = excluded.league_id,
            round = excluded.round,
            utc_time = excluded.utc_time,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            home_goals = excluded.home_goals,
            away_goals = excluded.away_goals,
            updated_at = excluded.updated_at
        "#,
        params![
            id as i64,
            season_label,
            i64::from(league_id),
            record.matchday.map(i64::from),
            record.date.format("%Y-%m-%d").to_string(),
            record.home_team.as_str(),
            record.away_team.as_str(),
            i64::from(record.home_goals),
            i64::from(record.away_goals),
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("upsert match {id}"))?;
    Ok(())
}
