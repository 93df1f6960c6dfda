//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{CacheConfig, ConfigError, EngineConfig, SynthesisConfig};

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Chunked synthesis configuration
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Engine handle configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Audio cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive_counts = [
            ("synthesis.max_unit_chars", self.synthesis.max_unit_chars),
            ("synthesis.stream_max_unit_chars", self.synthesis.stream_max_unit_chars),
            ("synthesis.max_concurrency", self.synthesis.max_concurrency),
            ("synthesis.worker_pool_size", self.synthesis.worker_pool_size),
            ("engine.max_handles", self.engine.max_handles),
            ("cache.capacity", self.cache.capacity),
        ];

        for (field, value) in positive_counts {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        if self.synthesis.fetch_timeout_secs == 0 {
            return Err(invalid("synthesis.fetch_timeout_secs", "must be at least 1 second"));
        }

        if self.engine.sample_rate < 8000 {
            return Err(invalid("engine.sample_rate", "sample rate too low (minimum 8000Hz)"));
        }

        let fraction = self.cache.eviction_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(invalid("cache.eviction_fraction", "must be within (0, 1]"));
        }

        // The maintenance loop shares locks with request traffic
        if self.cache.maintenance_interval_secs < 10 {
            return Err(invalid(
                "cache.maintenance_interval_secs",
                "maintenance interval too short (minimum 10s)",
            ));
        }

        if self.synthesis.worker_pool_size < 2 {
            tracing::warn!(
                "synthesis.worker_pool_size = 1 limits every request to a single unit in flight"
            );
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable permissive CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8880
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_true(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable the Prometheus recorder and `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (`SOULGATE__SECTION__FIELD`)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("SOULGATE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
