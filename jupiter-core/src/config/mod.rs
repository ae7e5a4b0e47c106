//! Configuration management for the Jupiter engine
//!
//! Environment-based configuration with defaults, TOML files and
//! validation.

use crate::jupiter::wire::WireFormat;
use crate::logging::{LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

mod error;

pub use error::ConfigError;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine configuration
    pub engine: EngineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Simulation configuration (used by jupiter-sim)
    pub simulation: SimulationConfig,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Check recorded delete text against the document before applying
    pub validate_deletes: bool,

    /// Warn when this many local operations await acknowledgement (0 disables)
    pub max_pending_outgoing: usize,

    /// Encoding used for requests on the wire
    pub wire_format: WireFormat,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

/// Randomized session simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of clients attached to the host
    pub clients: usize,

    /// Local edits generated by each client
    pub operations_per_client: usize,

    /// RNG seed, so failing runs can be replayed
    pub seed: u64,

    /// Upper bound on messages delivered per link in one step
    pub max_batch: usize,

    /// Text every replica starts from
    pub initial_text: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { validate_deletes: true, max_pending_outgoing: 1_000, wire_format: WireFormat::Json }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            clients: 3,
            operations_per_client: 50,
            seed: 42,
            max_batch: 4,
            initial_text: "The quick brown fox jumps over the dog.".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Convert to the logging subsystem's builder
    pub fn to_log_config(&self) -> Result<LogConfig, ConfigError> {
        let level = LogLevel::from_str(&self.level)
            .map_err(|_| ConfigError::InvalidValue(format!("Invalid log level: {}", self.level)))?;
        Ok(LogConfig::new(level)
            .with_timestamp(self.with_timestamp)
            .with_target(self.with_target)
            .json_format(self.json_format))
    }
}

fn parse_env<T: FromStr>(key: &str, what: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(format!("Invalid {}: {}", what, e))),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: JUPITER_<SECTION>_<KEY>
    /// Example: JUPITER_ENGINE_WIRE_FORMAT=binary
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Engine config
        if let Some(v) = parse_env("JUPITER_ENGINE_VALIDATE_DELETES", "delete validation flag")? {
            config.engine.validate_deletes = v;
        }
        if let Some(v) = parse_env("JUPITER_ENGINE_MAX_PENDING_OUTGOING", "pending limit")? {
            config.engine.max_pending_outgoing = v;
        }
        if let Some(v) = parse_env("JUPITER_ENGINE_WIRE_FORMAT", "wire format")? {
            config.engine.wire_format = v;
        }

        // Logging config
        if let Ok(level) = env::var("JUPITER_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(v) = parse_env("JUPITER_LOG_JSON", "JSON flag")? {
            config.logging.json_format = v;
        }

        // Simulation config
        if let Some(v) = parse_env("JUPITER_SIMULATION_CLIENTS", "client count")? {
            config.simulation.clients = v;
        }
        if let Some(v) = parse_env("JUPITER_SIMULATION_SEED", "seed")? {
            config.simulation.seed = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if LogLevel::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        if self.simulation.clients == 0 {
            return Err(ConfigError::ValidationFailed(
                "simulation.clients must be greater than 0".to_string(),
            ));
        }

        if self.simulation.max_batch == 0 {
            return Err(ConfigError::ValidationFailed(
                "simulation.max_batch must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}
