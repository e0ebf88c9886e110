//! Language Model adapter
//!
//! Bridges the `LlmBackend` trait to the core `LanguageModel` trait so the
//! pipeline only ever sees `Arc<dyn LanguageModel>`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use sommelier_core::{CompletionOptions, Error, LanguageModel, Message, Result};

use crate::backend::LlmBackend;
use crate::LlmError;

/// Wraps any `LlmBackend` (Ollama, OpenAI) as a `LanguageModel`
pub struct LanguageModelAdapter {
    backend: Arc<dyn LlmBackend>,
    model_name: String,
    /// Reported in `Error::LlmTimeout` when the HTTP client times out
    timeout: Duration,
}

impl LanguageModelAdapter {
    /// Create a new adapter wrapping an LlmBackend
    pub fn new<B: LlmBackend + 'static>(backend: B, timeout: Duration) -> Self {
        Self::from_arc(Arc::new(backend), timeout)
    }

    /// Create from an Arc'd backend
    pub fn from_arc(backend: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        let model_name = backend.model_name().to_string();
        Self {
            backend,
            model_name,
            timeout,
        }
    }
}

#[async_trait]
impl LanguageModel for LanguageModelAdapter {
    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<String> {
        match self.backend.generate(messages, options).await {
            Ok(result) => {
                tracing::debug!(
                    model = %self.model_name,
                    tokens = result.tokens,
                    elapsed_ms = result.total_time_ms,
                    finish_reason = ?result.finish_reason,
                    "LLM completion finished"
                );
                Ok(result.text)
            }
            Err(LlmError::Timeout(_)) => {
                Err(Error::LlmTimeout(self.timeout.as_millis() as u64))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FinishReason, GenerationResult};

    struct ScriptedBackend {
        outcome: fn() -> std::result::Result<GenerationResult, LlmError>,
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(
            &self,
            _messages: &[Message],
            _options: &CompletionOptions,
        ) -> std::result::Result<GenerationResult, LlmError> {
            (self.outcome)()
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_adapter_returns_text() {
        let adapter = LanguageModelAdapter::new(
            ScriptedBackend {
                outcome: || {
                    Ok(GenerationResult {
                        text: "WINE_SEARCH".into(),
                        tokens: 2,
                        total_time_ms: 5,
                        finish_reason: FinishReason::Stop,
                    })
                },
            },
            Duration::from_secs(30),
        );

        let text = adapter
            .complete(&[Message::user("hola")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "WINE_SEARCH");
        assert_eq!(adapter.model_name(), "scripted");
    }

    #[tokio::test]
    async fn test_adapter_maps_timeout() {
        let adapter = LanguageModelAdapter::new(
            ScriptedBackend {
                outcome: || Err(LlmError::Timeout(0)),
            },
            Duration::from_secs(30),
        );

        let err = adapter
            .complete(&[Message::user("hola")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, Error::LlmTimeout(30_000));
    }

    #[tokio::test]
    async fn test_adapter_maps_api_error() {
        let adapter = LanguageModelAdapter::new(
            ScriptedBackend {
                outcome: || Err(LlmError::Api("HTTP 503".into())),
            },
            Duration::from_secs(30),
        );

        let err = adapter
            .complete(&[Message::user("hola")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_llm());
    }
}
