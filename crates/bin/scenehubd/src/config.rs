//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `scenehub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;

use scenehub_app::config::EngineConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Scene engine timing.
    pub scheduler: SchedulerConfig,
    /// Integration toggles.
    pub integrations: IntegrationsConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Scheduler and task timing.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Re-check interval after a task was started or pushed.
    pub poll_interval_ms: u64,
    /// Sleep interval while nothing is queued.
    pub idle_interval_secs: u64,
    /// Upper bound on a single task body.
    pub task_timeout_secs: u64,
    /// How long shutdown waits for running tasks.
    pub shutdown_grace_secs: u64,
    /// Local time at which the next day's timers are arranged.
    pub arrange_at: NaiveTime,
}

/// Per-integration toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Register the virtual/demo devices.
    pub virtual_enabled: bool,
}

impl Config {
    /// Load configuration from `scenehub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("scenehub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SCENEHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("SCENEHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("SCENEHUB_TASK_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.scheduler.task_timeout_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("SCENEHUB_SHUTDOWN_GRACE_SECS") {
            if let Ok(secs) = val.parse() {
                self.scheduler.shutdown_grace_secs = secs;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.scheduler.idle_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "idle_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.scheduler.task_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "task_timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Timing parameters for the scene engine.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_millis(self.scheduler.poll_interval_ms),
            idle_interval: Duration::from_secs(self.scheduler.idle_interval_secs),
            task_timeout: Duration::from_secs(self.scheduler.task_timeout_secs),
            shutdown_grace: Duration::from_secs(self.scheduler.shutdown_grace_secs),
            arrange_at: self.scheduler.arrange_at,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:scenehub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "scenehubd=info,scenehub=info,sqlx=warn".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            poll_interval_ms: 200,
            idle_interval_secs: 300,
            task_timeout_secs: 30,
            shutdown_grace_secs: 5,
            arrange_at: engine.arrange_at,
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.database.url, "sqlite:scenehub.db?mode=rwc");
        assert_eq!(config.scheduler.poll_interval_ms, 200);
        assert_eq!(config.scheduler.task_timeout_secs, 30);
        assert_eq!(
            config.scheduler.arrange_at,
            NaiveTime::from_hms_opt(23, 55, 0).unwrap()
        );
        assert!(config.integrations.virtual_enabled);
    }

    #[test]
    fn should_match_engine_defaults() {
        assert_eq!(Config::default().engine_config(), EngineConfig::default());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scheduler.shutdown_grace_secs, 5);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [scheduler]
            poll_interval_ms = 50
            idle_interval_secs = 60
            task_timeout_secs = 10
            shutdown_grace_secs = 1
            arrange_at = '23:30:00'

            [integrations]
            virtual_enabled = false
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert!(!config.integrations.virtual_enabled);

        let engine = config.engine_config();
        assert_eq!(engine.poll_interval, Duration::from_millis(50));
        assert_eq!(engine.idle_interval, Duration::from_secs(60));
        assert_eq!(engine.task_timeout, Duration::from_secs(10));
        assert_eq!(engine.shutdown_grace, Duration::from_secs(1));
        assert_eq!(engine.arrange_at, NaiveTime::from_hms_opt(23, 30, 0).unwrap());
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [scheduler]
            task_timeout_secs = 5
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scheduler.task_timeout_secs, 5);
        assert_eq!(config.scheduler.poll_interval_ms, 200);
        assert_eq!(config.database.url, "sqlite:scenehub.db?mode=rwc");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.scheduler.idle_interval_secs, 300);
    }

    #[test]
    fn should_reject_zero_task_timeout() {
        let mut config = Config::default();
        config.scheduler.task_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_poll_interval() {
        let mut config = Config::default();
        config.scheduler.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_zero_shutdown_grace() {
        let mut config = Config::default();
        config.scheduler.shutdown_grace_secs = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_return_database_url() {
        let config = Config::default();
        assert_eq!(config.database_url(), "sqlite:scenehub.db?mode=rwc");
    }

    #[test]
    fn should_report_parse_error_for_invalid_arrange_time() {
        let result: Result<Config, _> = toml::from_str("[scheduler]\narrange_at = 'late'");
        assert!(result.is_err());
    }
}
