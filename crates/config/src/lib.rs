//! Configuration management for the sommelier service
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, `config/{env}.yaml`)
//! - Environment variables (`SOMMELIER__SECTION__KEY`)
//! - Serde defaults for every section

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, EmbeddingProviderKind, EmbeddingSettings,
    GenerationSettings, LlmProviderKind, LlmSettings, MemorySettings, ObservabilityConfig,
    PersistenceConfig, RagConfig, RuntimeEnvironment, ServerConfig, Settings, VectorStoreKind,
    VectorStoreSettings,
};

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

impl From<ConfigError> for sommelier_core::Error {
    fn from(err: ConfigError) -> Self {
        sommelier_core::Error::Configuration(err.to_string())
    }
}
