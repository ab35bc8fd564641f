//! Configuration for settlement engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settlement engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Ledger configuration (data directory, limits)
    pub ledger: ledger_core::Config,

    /// Billing week convention
    pub week: WeekConfig,

    /// Report output configuration
    pub reports: ReportConfig,

    /// Largest advance accepted by the `settle` runner, in days
    pub max_advance_days: u32,

    /// Default tracing filter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "chocan-settlement".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger: ledger_core::Config::default(),
            week: WeekConfig::default(),
            reports: ReportConfig::default(),
            max_advance_days: 7,
            log_filter: "info".to_string(),
        }
    }
}

/// Billing week convention
///
/// Weekdays accept any form chrono parses ("Friday", "fri"). The end time is
/// `HH:MM:SS` or `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekConfig {
    /// First day of the billing week
    pub start_day: String,

    /// Day the billing week closes
    pub end_day: String,

    /// Time of day the billing week closes
    pub end_time: String,
}

impl Default for WeekConfig {
    fn default() -> Self {
        Self {
            start_day: "Saturday".to_string(),
            end_day: "Friday".to_string(),
            end_time: "23:59:00".to_string(),
        }
    }
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Root directory for report files
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data/reports"),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides on top of the current values
    pub fn apply_env(&mut self) {
        self.ledger.apply_env();

        if let Ok(dir) = std::env::var("SETTLEMENT_REPORTS_DIR") {
            self.reports.output_dir = PathBuf::from(dir);
        }

        if let Ok(filter) = std::env::var("SETTLEMENT_LOG_FILTER") {
            self.log_filter = filter;
        }
    }
}
