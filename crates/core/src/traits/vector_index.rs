use async_trait::async_trait;

use crate::{Document, Result, ScoredDocument};

/// Vector index over documents
///
/// Results are ordered by cosine distance ascending. Failures are
/// `Error::IndexUnavailable`.
#[async_trait]
pub trait VectorIndex: Send + Sync + 'static {
    /// Insert or replace a document (embedding must be set)
    async fn upsert(&self, document: Document) -> Result<()>;

    /// Top-k nearest neighbours of `vector`
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// Number of indexed documents
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
