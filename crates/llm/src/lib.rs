//! LLM integration
//!
//! Features:
//! - OpenAI-compatible and Ollama chat backends
//! - Adapter onto the core `LanguageModel` trait
//! - Factory building the configured provider

pub mod adapter;
pub mod backend;
pub mod factory;

pub use adapter::LanguageModelAdapter;
pub use backend::{
    FinishReason, GenerationResult, LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend,
    OpenAIConfig,
};
pub use factory::{LlmFactory, OfflineModel};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for sommelier_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(ms) => sommelier_core::Error::LlmTimeout(ms),
            other => sommelier_core::Error::Llm(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err: sommelier_core::Error = LlmError::Timeout(30_000).into();
        assert_eq!(err, sommelier_core::Error::LlmTimeout(30_000));

        let err: sommelier_core::Error = LlmError::Api("HTTP 500".into()).into();
        assert!(err.is_llm());
    }
}
