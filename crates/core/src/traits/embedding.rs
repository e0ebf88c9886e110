use async_trait::async_trait;

use crate::Result;

/// Text embedding interface
///
/// Implementations must be deterministic for identical input and fail with
/// `Error::EmbeddingUnavailable`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Output dimension
    fn dimension(&self) -> usize;

    /// Name for logging
    fn name(&self) -> &str;
}
