use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::AlertTier;

/// Thresholds shared by the four classifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Days without movement before a protocol shows up as WARNING
    #[serde(default = "default_warning_days")]
    pub warning_days: i64,
    #[serde(default = "default_critical_days")]
    pub critical_days: i64,
    #[serde(default = "default_critical_max_days")]
    pub critical_max_days: i64,
    /// Estimated value above which a stalled protocol is a financial alert
    #[serde(default = "default_financial_value")]
    pub financial_value: f64,
    /// Critical protocols per owner that make the owner a bottleneck
    #[serde(default = "default_bottleneck_count")]
    pub bottleneck_count: usize,
    /// Compute a real average for the unassigned group instead of leaving it at 0
    #[serde(default)]
    pub unassigned_average: bool,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warning_days: default_warning_days(),
            critical_days: default_critical_days(),
            critical_max_days: default_critical_max_days(),
            financial_value: default_financial_value(),
            bottleneck_count: default_bottleneck_count(),
            unassigned_average: false,
        }
    }
}

impl AlertThresholds {
    /// Tier for a stall duration, `None` below the warning threshold.
    pub fn tier_for(&self, days_stalled: i64) -> Option<AlertTier> {
        if days_stalled >= self.critical_max_days {
            Some(AlertTier::CriticalMax)
        } else if days_stalled >= self.critical_days {
            Some(AlertTier::Critical)
        } else if days_stalled >= self.warning_days {
            Some(AlertTier::Warning)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warning_days < 0 {
            return Err(ConfigError::InvalidThresholds(
                "warning_days must not be negative".into(),
            ));
        }
        if !(self.warning_days < self.critical_days && self.critical_days < self.critical_max_days)
        {
            return Err(ConfigError::InvalidThresholds(format!(
                "expected warning < critical < critical_max, got {}/{}/{}",
                self.warning_days, self.critical_days, self.critical_max_days
            )));
        }
        if !self.financial_value.is_finite() || self.financial_value < 0.0 {
            return Err(ConfigError::InvalidThresholds(
                "financial_value must be a non-negative number".into(),
            ));
        }
        if self.bottleneck_count == 0 {
            return Err(ConfigError::InvalidThresholds(
                "bottleneck_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: AlertThresholds,
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Reads `path` when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::load_from(path),
            Some(path) => {
                tracing::warn!("config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.thresholds.validate()?;
        Ok(config)
    }
}

// --- Defaults ---

fn default_warning_days() -> i64 {
    30
}
fn default_critical_days() -> i64 {
    45
}
fn default_critical_max_days() -> i64 {
    60
}
fn default_financial_value() -> f64 {
    10_000.0
}
fn default_bottleneck_count() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_practice_policy() {
        let t = AlertThresholds::default();
        assert_eq!((t.warning_days, t.critical_days, t.critical_max_days), (30, 45, 60));
        assert_eq!(t.financial_value, 10_000.0);
        assert_eq!(t.bottleneck_count, 5);
        assert!(!t.unassigned_average);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn tiers_follow_thresholds() {
        let t = AlertThresholds::default();
        assert_eq!(t.tier_for(29), None);
        assert_eq!(t.tier_for(30), Some(AlertTier::Warning));
        assert_eq!(t.tier_for(44), Some(AlertTier::Warning));
        assert_eq!(t.tier_for(45), Some(AlertTier::Critical));
        assert_eq!(t.tier_for(59), Some(AlertTier::Critical));
        assert_eq!(t.tier_for(60), Some(AlertTier::CriticalMax));
        assert_eq!(t.tier_for(400), Some(AlertTier::CriticalMax));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::parse("[thresholds]\nbottleneck_count = 3\n").expect("parse");
        assert_eq!(config.thresholds.bottleneck_count, 3);
        assert_eq!(config.thresholds.warning_days, 30);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(Config::parse("").expect("parse"), Config::default());
    }

    #[test]
    fn rejects_unordered_tiers() {
        let err = Config::parse("[thresholds]\nwarning_days = 50\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThresholds(_)));
    }

    #[test]
    fn rejects_zero_bottleneck() {
        let t = AlertThresholds {
            bottleneck_count: 0,
            ..AlertThresholds::default()
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default(Some(Path::new("/nonexistent/alerts.toml")))
            .expect("defaults");
        assert_eq!(config, Config::default());
    }
}
