//! In-process vector index
//!
//! Brute-force cosine search over documents held behind a `parking_lot`
//! lock. Upserts replace by id.

use async_trait::async_trait;
use parking_lot::RwLock;

use sommelier_core::{Document, Error, Result, ScoredDocument, VectorIndex};

/// Brute-force cosine index
#[derive(Default)]
pub struct InMemoryVectorIndex {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance (`1 - cosine similarity`); zero vectors are maximally distant
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, document: Document) -> Result<()> {
        if document.embedding.is_empty() {
            return Err(Error::IndexUnavailable(format!(
                "document {} has no embedding",
                document.id
            )));
        }

        let mut documents = self.documents.write();
        match documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let documents = self.documents.read();

        let mut scored: Vec<ScoredDocument> = documents
            .iter()
            .filter(|d| d.embedding.len() == vector.len())
            .map(|d| ScoredDocument::new(d.clone(), cosine_distance(vector, &d.embedding)))
            .collect();

        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.documents.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(Document::new("a", "tinto").with_embedding(vec![1.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert(Document::new("b", "blanco").with_embedding(vec![0.0, 1.0]))
            .await
            .unwrap();
        index
            .upsert(Document::new("c", "rosado").with_embedding(vec![0.7, 0.7]))
            .await
            .unwrap();

        let results = index.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.id, "a");
        assert_eq!(results[1].document.id, "c");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(Document::new("a", "v1").with_embedding(vec![1.0]))
            .await
            .unwrap();
        index
            .upsert(Document::new("a", "v2").with_embedding(vec![1.0]))
            .await
            .unwrap();

        assert_eq!(index.len().await.unwrap(), 1);
        let results = index.query(&[1.0], 5).await.unwrap();
        assert_eq!(results[0].document.content, "v2");
    }

    #[tokio::test]
    async fn test_upsert_requires_embedding() {
        let index = InMemoryVectorIndex::new();
        assert!(index.upsert(Document::new("a", "x")).await.is_err());
        assert!(index.is_empty().await.unwrap());
    }
}
