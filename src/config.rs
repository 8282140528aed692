use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ledger::MatchLedger;
use crate::season::SeasonRule;

/// Window sizes and pass settings. Every field has a default, so a JSON
/// file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub form_window: usize,
    pub venue_form_window: usize,
    pub h2h_window: usize,
    pub schedule_window: usize,
    pub momentum_window: usize,
    pub scoring_window: usize,
    /// Matches processed (standings updated) before anything is emitted.
    pub warmup_matches: usize,
    pub season_rule: SeasonRule,
    pub same_day_tolerance_days: i64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            form_window: 5,
            venue_form_window: 5,
            h2h_window: 10,
            schedule_window: 5,
            momentum_window: 3,
            scoring_window: 10,
            warmup_matches: 20,
            season_rule: SeasonRule::default(),
            same_day_tolerance_days: 0,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let windows = [
            ("form_window", self.form_window),
            ("venue_form_window", self.venue_form_window),
            ("h2h_window", self.h2h_window),
            ("schedule_window", self.schedule_window),
            ("momentum_window", self.momentum_window),
            ("scoring_window", self.scoring_window),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(ConfigError::ZeroWindow { name });
            }
        }
        if self.same_day_tolerance_days < 0 {
            return Err(ConfigError::NegativeTolerance(self.same_day_tolerance_days));
        }
        self.season_rule.validate()
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read feature config {}", path.display()))?;
        let config: FeatureConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse feature config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from `FEATURES_*` variables. Unset, empty or
    /// unparsable values leave the field alone.
    pub fn apply_env_overrides(&mut self) {
        override_usize("FEATURES_FORM_WINDOW", &mut self.form_window);
        override_usize("FEATURES_VENUE_FORM_WINDOW", &mut self.venue_form_window);
        override_usize("FEATURES_H2H_WINDOW", &mut self.h2h_window);
        override_usize("FEATURES_SCHEDULE_WINDOW", &mut self.schedule_window);
        override_usize("FEATURES_MOMENTUM_WINDOW", &mut self.momentum_window);
        override_usize("FEATURES_SCORING_WINDOW", &mut self.scoring_window);
        override_usize("FEATURES_WARMUP", &mut self.warmup_matches);
        if let Some(days) = opt_env("FEATURES_SAME_DAY_TOLERANCE")
            .and_then(|val| val.trim().parse::<i64>().ok())
        {
            self.same_day_tolerance_days = days;
        }
        if let Some(month) =
            opt_env("FEATURES_ROLLOVER_MONTH").and_then(|val| val.trim().parse::<u32>().ok())
        {
            self.season_rule = match self.season_rule {
                SeasonRule::CalendarMonth { .. } => SeasonRule::CalendarMonth {
                    rollover_month: month,
                },
                SeasonRule::Explicit { .. } => SeasonRule::Explicit {
                    fallback_rollover_month: month,
                },
            };
        }
        if let Some(kind) = opt_env("FEATURES_SEASON_RULE") {
            let month = match self.season_rule {
                SeasonRule::CalendarMonth { rollover_month } => rollover_month,
                SeasonRule::Explicit {
                    fallback_rollover_month,
                } => fallback_rollover_month,
            };
            match kind.trim().to_lowercase().as_str() {
                "calendar" | "calendar_month" => {
                    self.season_rule = SeasonRule::CalendarMonth {
                        rollover_month: month,
                    }
                }
                "explicit" => {
                    self.season_rule = SeasonRule::Explicit {
                        fallback_rollover_month: month,
                    }
                }
                _ => {}
            }
        }
    }

    /// Config file (when given) or defaults, then env overrides, validated.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// An empty ledger using this run's season rule and tolerance.
    pub fn ledger(&self) -> MatchLedger {
        MatchLedger::with_rule(self.season_rule, self.same_day_tolerance_days)
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
}

fn override_usize(key: &str, slot: &mut usize) {
    if let Some(value) = opt_env(key).and_then(|val| val.trim().parse::<usize>().ok()) {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FeatureConfig::default();
        assert_eq!(config.warmup_matches, 20);
        assert_eq!(config.h2h_window, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = FeatureConfig {
            h2h_window: 0,
            ..FeatureConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroWindow { name: "h2h_window" })
        );
        let config = FeatureConfig {
            same_day_tolerance_days: -1,
            ..FeatureConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NegativeTolerance(-1)));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: FeatureConfig = serde_json::from_str(
            r#"{"warmup_matches": 0, "season_rule": {"kind": "explicit", "fallback_rollover_month": 7}}"#,
        )
        .unwrap();
        assert_eq!(config.warmup_matches, 0);
        assert_eq!(config.form_window, 5);
        assert_eq!(
            config.season_rule,
            SeasonRule::Explicit {
                fallback_rollover_month: 7
            }
        );
    }

    #[test]
    fn loads_file() {
        let path = env::temp_dir().join(format!("feature_config_{}.json", std::process::id()));
        fs::write(&path, r#"{"form_window": 6}"#).unwrap();
        let config = FeatureConfig::load_from_file(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(config.form_window, 6);

        let bad = env::temp_dir().join(format!("feature_config_bad_{}.json", std::process::id()));
        fs::write(&bad, r#"{"form_window": 0}"#).unwrap();
        assert!(FeatureConfig::load_from_file(&bad).is_err());
        fs::remove_file(&bad).ok();
    }
}
