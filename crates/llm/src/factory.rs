//! LLM Factory
//!
//! Builds the configured chat backend and wraps it as a core `LanguageModel`.
//!
//! ## Example
//! ```ignore
//! let llm = LlmFactory::create(&settings.llm)?;
//! let answer = llm.complete(&messages, &options).await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use sommelier_config::{LlmProviderKind, LlmSettings};
use sommelier_core::{CompletionOptions, Error, LanguageModel, Message, Result};

use crate::{
    adapter::LanguageModelAdapter,
    backend::{LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend, OpenAIConfig},
    LlmError,
};

/// Factory for creating LLM backends
pub struct LlmFactory;

impl LlmFactory {
    /// Create a raw backend from settings
    pub fn create_backend(
        settings: &LlmSettings,
    ) -> std::result::Result<Arc<dyn LlmBackend>, LlmError> {
        let timeout = Duration::from_secs(settings.timeout_seconds);
        let endpoint = settings.endpoint_or_default();

        match settings.provider {
            LlmProviderKind::OpenAI => {
                let api_key = settings.api_key.clone().unwrap_or_default();
                let config = OpenAIConfig::openai(api_key, settings.model.clone())
                    .with_endpoint(endpoint)
                    .with_timeout(timeout);
                Ok(Arc::new(OpenAIBackend::new(config)?))
            }
            LlmProviderKind::Ollama => {
                let config = LlmConfig {
                    model: settings.model.clone(),
                    endpoint,
                    timeout,
                    ..Default::default()
                };
                Ok(Arc::new(OllamaBackend::new(config)?))
            }
        }
    }

    /// Create a `LanguageModel` from settings
    pub fn create(settings: &LlmSettings) -> std::result::Result<Arc<dyn LanguageModel>, LlmError> {
        let backend = Self::create_backend(settings)?;

        tracing::info!(
            provider = ?settings.provider,
            model = %settings.model,
            timeout_secs = settings.timeout_seconds,
            "Creating LLM backend"
        );

        Ok(Arc::new(LanguageModelAdapter::from_arc(
            backend,
            Duration::from_secs(settings.timeout_seconds),
        )))
    }

    /// Like [`LlmFactory::create`], degrading to [`OfflineModel`] on failure
    pub fn create_or_offline(settings: &LlmSettings) -> Arc<dyn LanguageModel> {
        match Self::create(settings) {
            Ok(llm) => llm,
            Err(e) => {
                tracing::error!(
                    provider = ?settings.provider,
                    error = %e,
                    "LLM backend unavailable, every stage will use its fallback"
                );
                Arc::new(OfflineModel::new(e.to_string()))
            }
        }
    }
}

/// Model used when no backend could be built; every call fails
pub struct OfflineModel {
    reason: String,
}

impl OfflineModel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for OfflineModel {
    async fn complete(&self, _messages: &[Message], _options: &CompletionOptions) -> Result<String> {
        Err(Error::Llm(format!("no LLM backend configured: {}", self.reason)))
    }

    fn model_name(&self) -> &str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: LlmProviderKind, api_key: Option<&str>) -> LlmSettings {
        LlmSettings {
            provider,
            endpoint: None,
            api_key: api_key.map(str::to_string),
            model: "test-model".to_string(),
            timeout_seconds: 30,
        }
    }

    #[test]
    fn test_create_openai() {
        let llm = LlmFactory::create(&settings(LlmProviderKind::OpenAI, Some("sk-test"))).unwrap();
        assert_eq!(llm.model_name(), "test-model");
    }

    #[test]
    fn test_create_ollama_without_key() {
        let llm = LlmFactory::create(&settings(LlmProviderKind::Ollama, None)).unwrap();
        assert_eq!(llm.model_name(), "test-model");
    }

    #[tokio::test]
    async fn test_offline_when_key_missing() {
        let llm = LlmFactory::create_or_offline(&settings(LlmProviderKind::OpenAI, None));
        assert_eq!(llm.model_name(), "offline");
        let err = llm
            .complete(&[Message::user("hola")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_llm());
    }

    #[test]
    fn test_openai_local_endpoint_without_key() {
        let mut s = settings(LlmProviderKind::OpenAI, None);
        s.endpoint = Some("http://localhost:8000/v1".to_string());
        assert!(LlmFactory::create(&s).is_ok());
    }
}
