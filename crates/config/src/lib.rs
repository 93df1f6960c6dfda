//! Configuration management for the TTS server
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (`SOULGATE__` prefix)
//! - Built-in defaults matching the reference deployment

pub mod pipeline;
pub mod settings;

pub use pipeline::{CacheConfig, EngineBackend, EngineConfig, SynthesisConfig};
pub use settings::{load_settings, ObservabilityConfig, ServerConfig, Settings};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
