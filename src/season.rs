use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::matches::SeasonId;

pub const DEFAULT_ROLLOVER_MONTH: u32 = 8;

/// How the ledger decides which season a match belongs to. One rule is
/// chosen per run and applied to every appended match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeasonRule {
    /// Season starts in `rollover_month`; earlier months belong to the
    /// previous year's season. Any season supplied on the input is ignored.
    CalendarMonth { rollover_month: u32 },
    /// Trust the season supplied on the input, falling back to the
    /// calendar rule when it is missing.
    Explicit { fallback_rollover_month: u32 },
}

impl Default for SeasonRule {
    fn default() -> Self {
        SeasonRule::CalendarMonth {
            rollover_month: DEFAULT_ROLLOVER_MONTH,
        }
    }
}

impl SeasonRule {
    pub fn assign(&self, date: NaiveDate, supplied: Option<SeasonId>) -> SeasonId {
        match *self {
            SeasonRule::CalendarMonth { rollover_month } => season_for_date(date, rollover_month),
            SeasonRule::Explicit {
                fallback_rollover_month,
            } => supplied.unwrap_or_else(|| season_for_date(date, fallback_rollover_month)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let month = match *self {
            SeasonRule::CalendarMonth { rollover_month } => rollover_month,
            SeasonRule::Explicit {
                fallback_rollover_month,
            } => fallback_rollover_month,
        };
        if !(1..=12).contains(&month) {
            return Err(ConfigError::RolloverMonth(month));
        }
        Ok(())
    }
}

pub fn season_for_date(date: NaiveDate, rollover_month: u32) -> SeasonId {
    if date.month() >= rollover_month {
        SeasonId(date.year())
    } else {
        SeasonId(date.year() - 1)
    }
}

/// Reads the leading four-digit year out of labels such as "2020/2021",
/// "2020-21" or "2020".
pub fn parse_season_label(raw: &str) -> Option<SeasonId> {
    let mut buf = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            buf.push(ch);
            if buf.len() == 4 {
                return buf.parse::<i32>().ok().map(SeasonId);
            }
        } else if !buf.is_empty() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn august_rollover() {
        let rule = SeasonRule::default();
        assert_eq!(rule.assign(d(2020, 8, 1), None), SeasonId(2020));
        assert_eq!(rule.assign(d(2021, 5, 23), None), SeasonId(2020));
        assert_eq!(rule.assign(d(2020, 7, 31), Some(SeasonId(2020))), SeasonId(2019));
    }

    #[test]
    fn explicit_rule_prefers_supplied_season() {
        let rule = SeasonRule::Explicit {
            fallback_rollover_month: 8,
        };
        assert_eq!(rule.assign(d(2020, 7, 19), Some(SeasonId(2019))), SeasonId(2019));
        assert_eq!(rule.assign(d(2020, 9, 12), None), SeasonId(2020));
    }

    #[test]
    fn rejects_bad_month() {
        let rule = SeasonRule::CalendarMonth { rollover_month: 13 };
        assert_eq!(rule.validate(), Err(ConfigError::RolloverMonth(13)));
    }

    #[test]
    fn parses_labels() {
        assert_eq!(parse_season_label("2020/2021"), Some(SeasonId(2020)));
        assert_eq!(parse_season_label("2019-20"), Some(SeasonId(2019)));
        assert_eq!(parse_season_label("n/a"), None);
    }
}
