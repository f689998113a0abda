use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub etl: EtlConfig,
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub serving: ServingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
    /// Directory holding the weekly CSV drops
    pub source_dir: PathBuf,
    /// NFL season the weekly fact tables are scoped to
    pub season: i32,
    /// Daily trigger time, local wall clock ("HH:MM")
    #[serde(default = "default_schedule_time")]
    pub schedule_time: String,
    /// Run ETL synchronously at startup when the store is empty
    #[serde(default = "default_true")]
    pub bootstrap_sync: bool,
    /// Serve from flat CSV files when the relational store is unreachable
    #[serde(default)]
    pub allow_csv_fallback: bool,
}

fn default_schedule_time() -> String {
    "06:00".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    /// Directory holding the trained scorer artifacts (JSON)
    pub model_dir: PathBuf,
    /// Rolling window for the baseline average, in weeks
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    /// Minimum trailing snap share for a teammate absence to matter (0..1)
    #[serde(default = "default_min_snap_share")]
    pub boost_min_snap_share: f64,
    /// Additive lift when the vacated role is QB or RB
    #[serde(default = "default_lift_primary")]
    pub boost_lift_primary: f64,
    /// Additive lift when the vacated role is WR or TE
    #[serde(default = "default_lift_secondary")]
    pub boost_lift_secondary: f64,
    /// Boost never exceeds this fraction of the unboosted estimate
    #[serde(default = "default_max_boost_fraction")]
    pub boost_max_fraction: f64,
}

fn default_rolling_window() -> usize {
    4
}

fn default_min_snap_share() -> f64 {
    0.20
}

fn default_lift_primary() -> f64 {
    2.5
}

fn default_lift_secondary() -> f64 {
    1.5
}

fn default_max_boost_fraction() -> f64 {
    0.15
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServingConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("serving.port", 8080)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("GRIDIRON_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (GRIDIRON_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("GRIDIRON")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.etl.season < 1999 {
            errors.push(format!(
                "season {} predates the stat feeds this service ingests",
                self.etl.season
            ));
        }

        if chrono::NaiveTime::parse_from_str(&self.etl.schedule_time, "%H:%M").is_err() {
            errors.push(format!(
                "schedule_time '{}' is not HH:MM",
                self.etl.schedule_time
            ));
        }

        if self.prediction.rolling_window == 0 {
            errors.push("rolling_window must be at least 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.prediction.boost_min_snap_share) {
            errors.push("boost_min_snap_share must be between 0 and 1".to_string());
        }

        if self.prediction.boost_max_fraction <= 0.0 || self.prediction.boost_max_fraction > 1.0 {
            errors.push("boost_max_fraction must be in (0, 1]".to_string());
        }

        if self.prediction.boost_lift_primary < 0.0 || self.prediction.boost_lift_secondary < 0.0 {
            errors.push("boost lifts must be non-negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                url: "postgres://localhost/gridiron".to_string(),
                max_connections: 5,
            },
            etl: EtlConfig {
                source_dir: PathBuf::from("data"),
                season: 2025,
                schedule_time: "06:00".to_string(),
                bootstrap_sync: true,
                allow_csv_fallback: false,
            },
            prediction: PredictionConfig {
                model_dir: PathBuf::from("models"),
                rolling_window: 4,
                boost_min_snap_share: 0.20,
                boost_lift_primary: 2.5,
                boost_lift_secondary: 1.5,
                boost_max_fraction: 0.15,
            },
            serving: ServingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn bad_schedule_time_rejected() {
        let mut cfg = test_config();
        cfg.etl.schedule_time = "6am".to_string();
        let errs = cfg.validate().unwrap_err();
        assert!(errs.iter().any(|e| e.contains("schedule_time")));
    }

    #[test]
    fn boost_fraction_bounds_enforced() {
        let mut cfg = test_config();
        cfg.prediction.boost_max_fraction = 0.0;
        assert!(cfg.validate().is_err());
        cfg.prediction.boost_max_fraction = 1.5;
        assert!(cfg.validate().is_err());
    }
}
