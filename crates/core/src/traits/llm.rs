//! Language model trait

use async_trait::async_trait;

use crate::{CompletionOptions, Message, Result};

/// Text completion interface
///
/// Implementations:
/// - `OpenAIBackend` - OpenAI-compatible chat completions
/// - `OllamaBackend` - Local Ollama inference
///
/// Failures are `Error::LlmTimeout` or `Error::Llm`. Callers own the timeout
/// and the fallback; implementations must not retry indefinitely.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Complete a chat prompt
    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<String>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoLlm;

    #[async_trait]
    impl LanguageModel for EchoLlm {
        async fn complete(
            &self,
            messages: &[Message],
            _options: &CompletionOptions,
        ) -> Result<String> {
            Ok(messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_mock_llm() {
        let llm = EchoLlm;
        let out = llm
            .complete(&[Message::user("hola")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "hola");
        assert_eq!(llm.model_name(), "echo");
    }
}
