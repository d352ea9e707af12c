//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/repscore/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/repscore/` (~/.config/repscore/)
//! - Data: `$XDG_DATA_HOME/repscore/` (~/.local/share/repscore/)
//! - State/Logs: `$XDG_STATE_HOME/repscore/` (~/.local/state/repscore/)
//!
//! Every scoring constant lives here so operators can retune the engine
//! without code changes. A missing file yields the defaults below.

use crate::error::{Error, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Upper bound for any trailing window, in days.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Trust score parameters
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Sentiment bucketing
    #[serde(default)]
    pub sentiment: SentimentConfig,

    /// Geo insight heuristic
    #[serde(default)]
    pub geo_insight: GeoInsightConfig,

    /// Period-over-period windows
    #[serde(default)]
    pub deltas: DeltaConfig,

    /// Daily rollup settings
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Trust score configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Shrinkage strength: pseudo-review count at the global mean
    #[serde(default = "default_prior_weight")]
    pub prior_weight: f64,

    /// Review count at which the volume-confidence term saturates to 1
    #[serde(default = "default_volume_cap")]
    pub volume_cap: u32,

    /// Composite weights
    #[serde(default)]
    pub weights: TrustScoreWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            prior_weight: default_prior_weight(),
            volume_cap: default_volume_cap(),
            weights: TrustScoreWeights::default(),
        }
    }
}

/// Weights of the trust score terms. Must sum to 1.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrustScoreWeights {
    /// Weight of the normalized weighted rating
    #[serde(default = "default_rating_weight")]
    pub rating: f64,
    /// Weight of the response rate
    #[serde(default = "default_response_weight")]
    pub response: f64,
    /// Weight of the volume-confidence term
    #[serde(default = "default_volume_weight")]
    pub volume: f64,
}

impl Default for TrustScoreWeights {
    fn default() -> Self {
        Self {
            rating: default_rating_weight(),
            response: default_response_weight(),
            volume: default_volume_weight(),
        }
    }
}

fn default_prior_weight() -> f64 {
    10.0
}

fn default_volume_cap() -> u32 {
    100
}

fn default_rating_weight() -> f64 {
    0.5
}

fn default_response_weight() -> f64 {
    0.3
}

fn default_volume_weight() -> f64 {
    0.2
}

/// Sentiment bucketing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentConfig {
    /// Scores strictly above this are Positive
    #[serde(default = "default_positive_threshold")]
    pub positive_threshold: f64,

    /// Scores strictly below this are Negative
    #[serde(default = "default_negative_threshold")]
    pub negative_threshold: f64,

    /// Default trailing window for the sentiment distribution
    #[serde(default = "default_sentiment_window_days")]
    pub window_days: u32,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            positive_threshold: default_positive_threshold(),
            negative_threshold: default_negative_threshold(),
            window_days: default_sentiment_window_days(),
        }
    }
}

fn default_positive_threshold() -> f64 {
    0.2
}

fn default_negative_threshold() -> f64 {
    -0.2
}

fn default_sentiment_window_days() -> u32 {
    60
}

/// Geo insight heuristic configuration.
///
/// These are policy constants for an exploratory comparison, not
/// parameters of a statistical test.
#[derive(Debug, Clone, Deserialize)]
pub struct GeoInsightConfig {
    /// Share of locations (by review volume) treated as "high volume"
    #[serde(default = "default_top_pct")]
    pub top_pct: f64,

    /// Share of locations treated as "low volume"
    #[serde(default = "default_bottom_pct")]
    pub bottom_pct: f64,

    /// Sentiment difference needed for a non-neutral verdict
    #[serde(default = "default_geo_threshold")]
    pub threshold: f64,
}

impl Default for GeoInsightConfig {
    fn default() -> Self {
        Self {
            top_pct: default_top_pct(),
            bottom_pct: default_bottom_pct(),
            threshold: default_geo_threshold(),
        }
    }
}

fn default_top_pct() -> f64 {
    0.2
}

fn default_bottom_pct() -> f64 {
    0.5
}

fn default_geo_threshold() -> f64 {
    0.1
}

/// Performance delta windows, in days back from the start of today
#[derive(Debug, Clone, Deserialize)]
pub struct DeltaConfig {
    /// End of the current window
    #[serde(default = "default_current_window_days")]
    pub current_window_days: u32,

    /// End of the previous window
    #[serde(default = "default_previous_window_days")]
    pub previous_window_days: u32,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            current_window_days: default_current_window_days(),
            previous_window_days: default_previous_window_days(),
        }
    }
}

fn default_current_window_days() -> u32 {
    30
}

fn default_previous_window_days() -> u32 {
    60
}

/// Daily rollup configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    /// Timezone used to assign reviews to calendar days: "UTC" or "+HH:MM"
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl AggregationConfig {
    /// Parse the configured timezone into a fixed offset.
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_offset(&self.timezone)
    }
}

fn parse_offset(value: &str) -> Result<FixedOffset> {
    let invalid = || {
        Error::Config(format!(
            "aggregation.timezone must be \"UTC\" or \"+HH:MM\", got {:?}",
            value
        ))
    };

    let value = value.trim();
    if value.eq_ignore_ascii_case("utc") || value == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning the first problem found
    pub fn validate(&self) -> Result<()> {
        let scoring = &self.scoring;
        if !scoring.prior_weight.is_finite() || scoring.prior_weight < 0.0 {
            return Err(Error::Config(
                "scoring.prior_weight must be a non-negative number".to_string(),
            ));
        }
        if scoring.volume_cap == 0 {
            return Err(Error::Config(
                "scoring.volume_cap must be at least 1".to_string(),
            ));
        }

        let w = scoring.weights;
        if [w.rating, w.response, w.volume]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(Error::Config(
                "scoring.weights must be non-negative".to_string(),
            ));
        }
        let sum = w.rating + w.response + w.volume;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "scoring.weights must sum to 1, got {}",
                sum
            )));
        }

        if self.sentiment.negative_threshold > self.sentiment.positive_threshold {
            return Err(Error::Config(
                "sentiment.negative_threshold must not exceed sentiment.positive_threshold"
                    .to_string(),
            ));
        }

        for (name, pct) in [
            ("geo_insight.top_pct", self.geo_insight.top_pct),
            ("geo_insight.bottom_pct", self.geo_insight.bottom_pct),
        ] {
            if !(pct > 0.0 && pct <= 1.0) {
                return Err(Error::Config(format!("{} must be in (0, 1]", name)));
            }
        }
        if !self.geo_insight.threshold.is_finite() || self.geo_insight.threshold < 0.0 {
            return Err(Error::Config(
                "geo_insight.threshold must be non-negative".to_string(),
            ));
        }

        if self.deltas.current_window_days == 0
            || self.deltas.previous_window_days <= self.deltas.current_window_days
        {
            return Err(Error::Config(
                "deltas windows must satisfy 0 < current_window_days < previous_window_days"
                    .to_string(),
            ));
        }

        for (name, days) in [
            ("sentiment.window_days", self.sentiment.window_days),
            ("deltas.current_window_days", self.deltas.current_window_days),
            ("deltas.previous_window_days", self.deltas.previous_window_days),
        ] {
            if days > MAX_WINDOW_DAYS {
                return Err(Error::Config(format!(
                    "{} must be at most {} days, got {}",
                    name, MAX_WINDOW_DAYS, days
                )));
            }
        }

        self.aggregation.offset()?;
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/repscore/config.toml` (~/.config/repscore/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("repscore").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/repscore/` (~/.local/share/repscore/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("repscore")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/repscore/` (~/.local/state/repscore/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("repscore")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/repscore/reputation.db` (~/.local/share/repscore/reputation.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("reputation.db")
    }

    /// Returns the base log file path
    ///
    /// `$XDG_STATE_HOME/repscore/repscore.log`. The daily appender writes
    /// dated files beside it (`repscore.2025-06-01.log`).
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("repscore.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scoring.prior_weight, 10.0);
        assert_eq!(config.scoring.volume_cap, 100);
        assert_eq!(config.sentiment.positive_threshold, 0.2);
        assert_eq!(config.sentiment.negative_threshold, -0.2);
        assert_eq!(config.geo_insight.top_pct, 0.2);
        assert_eq!(config.geo_insight.bottom_pct, 0.5);
        assert_eq!(config.deltas.current_window_days, 30);
        assert_eq!(config.deltas.previous_window_days, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[scoring]
prior_weight = 25.0
volume_cap = 250

[scoring.weights]
rating = 0.6
response = 0.2
volume = 0.2

[geo_insight]
threshold = 0.05

[aggregation]
timezone = "+01:00"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.scoring.prior_weight, 25.0);
        assert_eq!(config.scoring.volume_cap, 250);
        assert_eq!(config.scoring.weights.rating, 0.6);
        assert_eq!(config.geo_insight.threshold, 0.05);
        assert_eq!(config.geo_insight.top_pct, 0.2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.aggregation.offset().unwrap(),
            FixedOffset::east_opt(3600).unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = Config::default();
        config.scoring.weights.volume = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1"));
    }

    #[test]
    fn test_window_order_validated() {
        let mut config = Config::default();
        config.deltas.previous_window_days = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_days_upper_bound() {
        let mut config = Config::default();
        config.deltas.previous_window_days = u32::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sentiment.window_days = MAX_WINDOW_DAYS + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sentiment.window_days"));

        config.sentiment.window_days = MAX_WINDOW_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_geo_pct_bounds() {
        let mut config = Config::default();
        config.geo_insight.bottom_pct = 0.0;
        assert!(config.validate().is_err());
        config.geo_insight.bottom_pct = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_offsets() {
        assert_eq!(parse_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("-05:30").unwrap().local_minus_utc(), -19_800);
        assert!(parse_offset("Europe/Paris").is_err());
        assert!(parse_offset("+25:00").is_err());
    }
}
