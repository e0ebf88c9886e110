//! Error types shared by every pipeline stage

use thiserror::Error;

/// Pipeline error taxonomy
///
/// Every variant is scoped to a single request. Only `Validation` is meant to
/// reach the caller; the rest are recovered by the stage that observes them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("LLM timed out after {0}ms")]
    LlmTimeout(u64),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Memory store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error should be surfaced to the caller as a rejected request
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Whether the error came from the language model collaborator
    pub fn is_llm(&self) -> bool {
        matches!(self, Error::Llm(_) | Error::LlmTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(Error::Validation("rating".into()).is_validation());
        assert!(!Error::StoreUnavailable("down".into()).is_validation());
        assert!(Error::LlmTimeout(30_000).is_llm());
        assert!(Error::Llm("500".into()).is_llm());
        assert!(!Error::IndexUnavailable("qdrant".into()).is_llm());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::LlmTimeout(250).to_string(),
            "LLM timed out after 250ms"
        );
    }
}
