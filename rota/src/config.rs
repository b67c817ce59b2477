// Configuration management with layered configuration (file, env)

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

/// Engine-level knobs shared by both trigger engines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The single zone cron expressions are evaluated in
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    /// Length of one cycle tick in seconds. One minute in production;
    /// integration tests shrink it. Elapsed counters always account ticks
    /// as minutes.
    #[serde(default = "default_cycle_tick_seconds")]
    pub cycle_tick_seconds: u64,
}

fn default_timezone() -> Tz {
    chrono_tz::UTC
}

fn default_cycle_tick_seconds() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            cycle_tick_seconds: default_cycle_tick_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let config = Config::builder()
            .set_default("engine.timezone", "UTC")?
            .set_default("engine.cycle_tick_seconds", 60u64)?
            .set_default("observability.log_level", "info")?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("ROTA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.cycle_tick_seconds == 0 {
            return Err("engine cycle_tick_seconds must be greater than 0".to_string());
        }
        Ok(())
    }
}
