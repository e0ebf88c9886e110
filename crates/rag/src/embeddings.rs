//! Deterministic hash embeddings
//!
//! Character-position hashing into a fixed-dimension vector. Needs no model,
//! so it backs offline runs and tests.

use async_trait::async_trait;

use sommelier_config::EmbeddingSettings;
use sommelier_core::{EmbeddingProvider, Result};

/// Embedding configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Embedding dimension
    pub embedding_dim: usize,
    /// Normalize embeddings
    pub normalize: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            embedding_dim: sommelier_config::constants::models::EMBEDDING_DIM,
            normalize: true,
        }
    }
}

impl From<&EmbeddingSettings> for EmbeddingConfig {
    fn from(settings: &EmbeddingSettings) -> Self {
        Self {
            embedding_dim: settings.dimension,
            normalize: true,
        }
    }
}

/// Hash-based embedder (no model required)
#[derive(Debug, Clone, Default)]
pub struct HashEmbedder {
    config: EmbeddingConfig,
}

impl HashEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    /// Embed lowercased text; identical input always yields the identical vector
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let dim = self.config.embedding_dim.max(1);
        let mut embedding = vec![0.0f32; dim];

        for (i, c) in text.to_lowercase().chars().enumerate() {
            let idx = (c as usize + i) % dim;
            embedding[idx] += 1.0;
        }

        if self.config.normalize {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut embedding {
                    *v /= norm;
                }
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_normalized() {
        let embedder = HashEmbedder::default();
        let embedding = embedder.embed_sync("Vino tinto de Rioja");

        assert_eq!(embedding.len(), 1024);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::new(EmbeddingConfig {
            embedding_dim: 64,
            normalize: true,
        });
        let a = embedder.embed("albariño").await.unwrap();
        let b = embedder.embed("albariño").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(embedder.dimension(), 64);
    }

    #[test]
    fn test_empty_text() {
        let embedder = HashEmbedder::default();
        assert!(embedder.embed_sync("").iter().all(|v| *v == 0.0));
    }
}
