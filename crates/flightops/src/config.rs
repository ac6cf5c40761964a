//! Configuration management for flightops.
//!
//! Loaded with figment from defaults, a TOML file, and `FLIGHTOPS_`
//! environment variables, then validated before use.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::alerts::DEFAULT_RECIPIENT_ROLE;
use crate::dashboard::{
    DashboardSettings, RemarkPatterns, DEFAULT_CANCEL_PATTERNS, DEFAULT_DELAY_PATTERNS,
};
use crate::error::{Error, Result};
use crate::model::Role;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "flightops";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "flightops.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLIGHTOPS_`, sections split on `__`)
/// 2. TOML config file at `~/.config/flightops/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Alert routing.
    pub alerts: AlertConfig,
    /// Dashboard rollups.
    pub dashboard: DashboardConfig,
    /// Change notifications.
    pub notify: NotifyConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/flightops/flightops.db`
    pub database_path: Option<PathBuf>,
    /// How long a writer waits for the database lock, in milliseconds.
    pub busy_timeout_ms: u64,
}

/// Alert-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Role that receives threshold alerts.
    pub recipient_role: String,
}

/// Dashboard-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Remark patterns (regex) that mark a flight delayed.
    pub delay_patterns: Vec<String>,
    /// Remark patterns (regex) that mark a flight cancelled.
    pub cancel_patterns: Vec<String>,
    /// Aircraft shown in the utilization ranking.
    pub utilization_limit: usize,
    /// Samples shown in the altitude trend.
    pub trend_points: usize,
}

/// Notification-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Notifications buffered per subscriber before it starts lagging.
    pub channel_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            recipient_role: DEFAULT_RECIPIENT_ROLE.to_string(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            delay_patterns: to_strings(DEFAULT_DELAY_PATTERNS),
            cancel_patterns: to_strings(DEFAULT_CANCEL_PATTERNS),
            utilization_limit: 5,
            trend_points: 18,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

fn to_strings(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(ToString::to_string).collect()
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing, or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("FLIGHTOPS_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.busy_timeout_ms == 0 {
            return Err(invalid("busy_timeout_ms must be greater than 0"));
        }

        if self.alerts.recipient_role.parse::<Role>().is_err() {
            return Err(invalid(format!(
                "recipient_role {:?} is not a known role",
                self.alerts.recipient_role
            )));
        }

        if self.dashboard.utilization_limit == 0 {
            return Err(invalid("utilization_limit must be greater than 0"));
        }
        if self.dashboard.trend_points == 0 {
            return Err(invalid("trend_points must be greater than 0"));
        }
        self.remark_patterns()?;

        if self.notify.channel_capacity == 0 {
            return Err(invalid("channel_capacity must be greater than 0"));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the busy timeout as a Duration.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }

    /// Compile the configured remark patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] for an invalid pattern.
    pub fn remark_patterns(&self) -> Result<RemarkPatterns> {
        RemarkPatterns::new(&self.dashboard.delay_patterns, &self.dashboard.cancel_patterns)
    }

    /// Dashboard knobs with compiled patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] for an invalid pattern.
    pub fn dashboard_settings(&self) -> Result<DashboardSettings> {
        Ok(DashboardSettings {
            patterns: self.remark_patterns()?,
            utilization_limit: self.dashboard.utilization_limit,
            trend_points: self.dashboard.trend_points,
        })
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
