//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use sommelier_core::{CompletionOptions, GenerationProfile};

use crate::constants::{endpoints, memory, models, persistence, rag, timeouts};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation
    #[default]
    Development,
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Chat completion backend
    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub vector_store: VectorStoreSettings,

    /// Expansion and retrieval
    #[serde(default)]
    pub rag: RagConfig,

    /// Sampling options per generation profile
    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub memory: MemorySettings,

    /// Persistence configuration (ScyllaDB)
    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_rag()?;
        self.validate_generation()?;
        self.validate_memory()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.request_timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if self.environment.is_production()
            && self.server.cors_enabled
            && self.server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured. \
                 This may block legitimate requests."
            );
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if self.llm.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if self.embedding.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding.dimension".to_string(),
                message: "Dimension must be at least 1".to_string(),
            });
        }

        let missing_key = self.llm.api_key.as_deref().map_or(true, str::is_empty);
        if self.environment.is_strict() && self.llm.provider == LlmProviderKind::OpenAI && missing_key
        {
            return Err(ConfigError::InvalidValue {
                field: "llm.api_key".to_string(),
                message: "API key must be set for the OpenAI provider outside development"
                    .to_string(),
            });
        }

        Ok(())
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if rag.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if rag.max_expansions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.max_expansions".to_string(),
                message: "Must be at least 1 (the original query)".to_string(),
            });
        }

        if rag.fingerprint_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.fingerprint_len".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if rag.prompt_chunks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.prompt_chunks".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_generation(&self) -> Result<(), ConfigError> {
        let profiles = [
            ("generation.classification", &self.generation.classification),
            ("generation.expansion", &self.generation.expansion),
            ("generation.search", &self.generation.search),
            ("generation.theory", &self.generation.theory),
            ("generation.conversational", &self.generation.conversational),
        ];

        for (field, options) in profiles {
            if !(0.0..=2.0).contains(&options.temperature) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.temperature", field),
                    message: format!("Must be between 0.0 and 2.0, got {}", options.temperature),
                });
            }
            if !(options.top_p > 0.0 && options.top_p <= 1.0) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.top_p", field),
                    message: format!("Must be in (0.0, 1.0], got {}", options.top_p),
                });
            }
            if options.max_output_tokens == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.max_output_tokens", field),
                    message: "Must be at least 1".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_memory(&self) -> Result<(), ConfigError> {
        if self.memory.recent_turns == 0 || self.memory.top_rated_items == 0 {
            return Err(ConfigError::InvalidValue {
                field: "memory".to_string(),
                message: "recent_turns and top_rated_items must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    timeouts::REQUEST_SECS
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Chat completion provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    #[serde(alias = "gpt")]
    OpenAI,
    #[serde(alias = "local")]
    Ollama,
}

/// Chat completion backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub provider: LlmProviderKind,

    /// Base URL; provider default when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key (falls back to OPENAI_API_KEY)
    #[serde(default = "default_llm_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

fn default_llm_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())
}
fn default_llm_model() -> String {
    std::env::var("OPENAI_MODEL").unwrap_or_else(|_| models::OPENAI_CHAT.to_string())
}
fn default_llm_timeout() -> u64 {
    timeouts::LLM_SECS
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::OpenAI,
            endpoint: None,
            api_key: default_llm_api_key(),
            model: default_llm_model(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

impl LlmSettings {
    /// Configured endpoint or the provider default
    pub fn endpoint_or_default(&self) -> String {
        match (&self.endpoint, self.provider) {
            (Some(endpoint), _) if !endpoint.is_empty() => endpoint.clone(),
            (_, LlmProviderKind::OpenAI) => std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| endpoints::OPENAI_DEFAULT.to_string()),
            (_, LlmProviderKind::Ollama) => endpoints::OLLAMA_DEFAULT.to_string(),
        }
    }
}

/// Embedding provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic hashing embedder (offline, tests)
    #[default]
    Hash,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dim")]
    pub dimension: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u64,
}

fn default_ollama_endpoint() -> String {
    endpoints::OLLAMA_DEFAULT.to_string()
}
fn default_embedding_model() -> String {
    models::OLLAMA_EMBEDDING.to_string()
}
fn default_embedding_dim() -> usize {
    models::EMBEDDING_DIM
}
fn default_embedding_timeout() -> u64 {
    timeouts::EMBEDDING_SECS
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hash,
            endpoint: default_ollama_endpoint(),
            model: default_embedding_model(),
            dimension: default_embedding_dim(),
            timeout_seconds: default_embedding_timeout(),
        }
    }
}

/// Vector index backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// In-process brute-force cosine index
    #[default]
    Memory,
    Qdrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreSettings {
    #[serde(default)]
    pub provider: VectorStoreKind,

    /// Qdrant endpoint URL
    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Qdrant API key (optional, for cloud deployments)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Index the built-in wine catalog at startup
    #[serde(default = "default_true")]
    pub seed_catalog: bool,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_collection() -> String {
    rag::COLLECTION.to_string()
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: VectorStoreKind::Memory,
            endpoint: default_qdrant_endpoint(),
            collection: default_collection(),
            api_key: None,
            seed_catalog: true,
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunks returned by the retriever
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Expansion count, original query included
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,

    /// Prefix length of the dedup fingerprint
    #[serde(default = "default_fingerprint_len")]
    pub fingerprint_len: usize,

    /// Chunks included in the generation prompt
    #[serde(default = "default_prompt_chunks")]
    pub prompt_chunks: usize,
}

fn default_top_k() -> usize {
    rag::TOP_K
}
fn default_max_expansions() -> usize {
    rag::MAX_EXPANSIONS
}
fn default_fingerprint_len() -> usize {
    rag::FINGERPRINT_LEN
}
fn default_prompt_chunks() -> usize {
    rag::PROMPT_CHUNKS
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_expansions: default_max_expansions(),
            fingerprint_len: default_fingerprint_len(),
            prompt_chunks: default_prompt_chunks(),
        }
    }
}

/// Sampling options per LLM call site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_classification_options")]
    pub classification: CompletionOptions,

    #[serde(default = "default_expansion_options")]
    pub expansion: CompletionOptions,

    #[serde(default = "default_search_options")]
    pub search: CompletionOptions,

    #[serde(default = "default_theory_options")]
    pub theory: CompletionOptions,

    #[serde(default = "default_conversational_options")]
    pub conversational: CompletionOptions,
}

fn default_classification_options() -> CompletionOptions {
    CompletionOptions::new(0.1, 100)
}
fn default_expansion_options() -> CompletionOptions {
    CompletionOptions::new(0.5, 300)
}
fn default_search_options() -> CompletionOptions {
    CompletionOptions::new(0.7, 800)
}
fn default_theory_options() -> CompletionOptions {
    CompletionOptions::new(0.3, 1000)
}
fn default_conversational_options() -> CompletionOptions {
    CompletionOptions::new(0.7, 300)
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            classification: default_classification_options(),
            expansion: default_expansion_options(),
            search: default_search_options(),
            theory: default_theory_options(),
            conversational: default_conversational_options(),
        }
    }
}

impl GenerationSettings {
    /// Options for a category's generation profile
    pub fn for_profile(&self, profile: GenerationProfile) -> CompletionOptions {
        match profile {
            GenerationProfile::Search => self.search,
            GenerationProfile::Theory => self.theory,
            GenerationProfile::Conversational => self.conversational,
        }
    }
}

/// Conversation memory bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    #[serde(default = "default_top_rated")]
    pub top_rated_items: usize,
}

fn default_recent_turns() -> usize {
    memory::RECENT_TURNS
}
fn default_top_rated() -> usize {
    memory::TOP_RATED_ITEMS
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            recent_turns: default_recent_turns(),
            top_rated_items: default_top_rated(),
        }
    }
}

/// Persistence configuration for ScyllaDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enable ScyllaDB persistence (false = in-memory only)
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,

    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(|h| h.trim().to_string()).collect())
        .unwrap_or_else(|_| vec![persistence::SCYLLA_HOST.to_string()])
}

fn default_scylla_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| persistence::KEYSPACE.to_string())
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false, // Disabled by default for development
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Expose Prometheus metrics at /metrics
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
/// 1. Environment variables (SOMMELIER__ prefix, `__` separated)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Same as [`load_settings`] with an explicit config directory
pub fn load_settings_from(dir: &str, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name(&format!("{}/default", dir)).required(false));

    if let Some(env_name) = env {
        builder = builder
            .add_source(File::with_name(&format!("{}/{}", dir, env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("SOMMELIER")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.rag.top_k, 5);
        assert_eq!(settings.rag.max_expansions, 4);
        assert_eq!(settings.rag.fingerprint_len, 100);
        assert_eq!(settings.memory.recent_turns, 5);
        assert_eq!(settings.memory.top_rated_items, 3);
        assert_eq!(settings.llm.timeout_seconds, 30);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_generation_profiles() {
        let generation = GenerationSettings::default();
        let theory = generation.for_profile(GenerationProfile::Theory);
        let search = generation.for_profile(GenerationProfile::Search);
        assert!(theory.temperature < search.temperature);
        assert_eq!(search.max_output_tokens, 800);
        assert_eq!(theory.max_output_tokens, 1000);
        assert!(generation.classification.temperature <= 0.1);
    }

    #[test]
    fn test_rag_validation() {
        let mut settings = Settings::default();
        settings.rag.top_k = 0;
        assert!(settings.validate_rag().is_err());
        settings.rag.top_k = 5;

        settings.rag.max_expansions = 0;
        assert!(settings.validate_rag().is_err());
        settings.rag.max_expansions = 4;

        assert!(settings.validate_rag().is_ok());
    }

    #[test]
    fn test_generation_validation() {
        let mut settings = Settings::default();
        settings.generation.search.temperature = 2.5;
        assert!(settings.validate_generation().is_err());
        settings.generation.search.temperature = 0.7;

        settings.generation.theory.top_p = 0.0;
        assert!(settings.validate_generation().is_err());
        settings.generation.theory.top_p = 1.0;

        settings.generation.conversational.max_output_tokens = 0;
        assert!(settings.validate_generation().is_err());
        settings.generation.conversational.max_output_tokens = 300;

        assert!(settings.validate_generation().is_ok());
    }

    #[test]
    fn test_server_validation() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate_server().is_err());
        settings.server.port = 8080;

        settings.server.request_timeout_seconds = 0;
        assert!(settings.validate_server().is_err());
        settings.server.request_timeout_seconds = 30;

        assert!(settings.validate_server().is_ok());
    }

    #[test]
    fn test_production_requires_api_key() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        settings.llm.provider = LlmProviderKind::OpenAI;
        settings.llm.api_key = None;
        assert!(settings.validate_llm().is_err());

        settings.llm.api_key = Some("sk-test".to_string());
        assert!(settings.validate_llm().is_ok());

        settings.llm.api_key = None;
        settings.llm.provider = LlmProviderKind::Ollama;
        assert!(settings.validate_llm().is_ok());
    }

    #[test]
    fn test_endpoint_defaults() {
        let mut llm = LlmSettings {
            provider: LlmProviderKind::Ollama,
            ..LlmSettings::default()
        };
        assert_eq!(llm.endpoint_or_default(), endpoints::OLLAMA_DEFAULT);

        llm.endpoint = Some("http://gpu-box:11434".to_string());
        assert_eq!(llm.endpoint_or_default(), "http://gpu-box:11434");
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.yaml"),
            "rag:\n  top_k: 7\ngeneration:\n  theory:\n    temperature: 0.2\n",
        )
        .unwrap();

        let settings = load_settings_from(dir.path().to_str().unwrap(), None).unwrap();
        assert_eq!(settings.rag.top_k, 7);
        assert_eq!(settings.rag.max_expansions, 4);
        assert_eq!(settings.generation.theory.temperature, 0.2);
        assert_eq!(settings.generation.theory.max_output_tokens, 800);
    }
}
