//! Indexed documents and retrieved chunks

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata attached to documents and chunks
pub type Metadata = Map<String, Value>;

/// Document stored in the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document ID
    pub id: String,
    /// Content text
    pub content: String,
    /// Embedding vector
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Document returned by a similarity query, with its cosine distance
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub distance: f32,
}

impl ScoredDocument {
    pub fn new(document: Document, distance: f32) -> Self {
        Self { document, distance }
    }

    /// Similarity as `1 - distance`, clamped to [0, 1]
    pub fn similarity(&self) -> f32 {
        let score = 1.0 - self.distance;
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }
}

/// Snapshot of an indexed document produced for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    /// Similarity in [0, 1]
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
    /// Expansion that produced this chunk
    pub origin_query: String,
}

impl RetrievedChunk {
    /// Copy a scored document out of the index
    pub fn from_scored(scored: ScoredDocument, origin_query: impl Into<String>) -> Self {
        let score = scored.similarity();
        Self {
            content: scored.document.content,
            score,
            metadata: scored.document.metadata,
            origin_query: origin_query.into(),
        }
    }

    /// String metadata value, if present
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Metadata value rendered as display text (strings unquoted, numbers as-is)
    pub fn metadata_text(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_clamped() {
        let doc = Document::new("a", "x");
        assert!((ScoredDocument::new(doc.clone(), 0.1).similarity() - 0.9).abs() < 1e-6);
        assert_eq!(ScoredDocument::new(doc.clone(), 1.7).similarity(), 0.0);
        assert_eq!(ScoredDocument::new(doc.clone(), -0.2).similarity(), 1.0);
        assert_eq!(ScoredDocument::new(doc, f32::NAN).similarity(), 0.0);
    }

    #[test]
    fn test_chunk_snapshot() {
        let doc = Document::new("wine_1", "Vino: Rioja")
            .with_metadata("name", "Rioja Gran Reserva")
            .with_metadata("price", 45.0);
        let chunk = RetrievedChunk::from_scored(ScoredDocument::new(doc, 0.2), "rioja");

        assert!((chunk.score - 0.8).abs() < 1e-6);
        assert_eq!(chunk.origin_query, "rioja");
        assert_eq!(chunk.metadata_str("name"), Some("Rioja Gran Reserva"));
        assert_eq!(chunk.metadata_text("price").as_deref(), Some("45.0"));
        assert!(chunk.metadata_text("missing").is_none());
    }
}
