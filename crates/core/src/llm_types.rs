//! LLM request types
//!
//! Common types for talking to chat-completion backends (OpenAI, Ollama).

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options recognized by every completion backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    800
}
fn default_top_p() -> f32 {
    1.0
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            top_p: default_top_p(),
        }
    }
}

impl CompletionOptions {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature: temperature.clamp(0.0, 2.0),
            max_output_tokens,
            top_p: default_top_p(),
        }
    }

    /// Set top-p
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::system("Eres Sumy");
        assert_eq!(msg.role, Role::System);
        assert_eq!(Message::user("hola").role, Role::User);
        assert_eq!(Message::assistant("hola").role.to_string(), "assistant");
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Message::user("hola")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_options_clamp() {
        let opts = CompletionOptions::new(3.5, 100).with_top_p(1.4);
        assert_eq!(opts.temperature, 2.0);
        assert_eq!(opts.top_p, 1.0);
        assert_eq!(opts.max_output_tokens, 100);
    }

    #[test]
    fn test_options_partial_deserialize() {
        let opts: CompletionOptions = serde_json::from_str(r#"{"temperature":0.1}"#).unwrap();
        assert_eq!(opts.temperature, 0.1);
        assert_eq!(opts.max_output_tokens, 800);
        assert_eq!(opts.top_p, 1.0);
    }
}
