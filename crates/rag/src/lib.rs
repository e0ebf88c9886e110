//! Retrieval for the sommelier pipeline
//!
//! Features:
//! - Deterministic hash embedder and Ollama embeddings
//! - In-memory cosine index and Qdrant-backed index
//! - LLM query expansion with structured-then-heuristic parsing
//! - Multi-query fan-out retrieval with prefix-fingerprint dedup
//! - Wine catalog documents and source extraction

pub mod catalog;
pub mod embeddings;
pub mod expander;
pub mod memory_index;
pub mod ollama_embeddings;
pub mod retriever;
pub mod vector_store;

pub use catalog::{index_catalog, seed_catalog, sources_from_chunks, Source, WineRecord};
pub use embeddings::{EmbeddingConfig, HashEmbedder};
pub use expander::{parse_expansions, ExpanderConfig, QueryExpander};
pub use memory_index::InMemoryVectorIndex;
pub use ollama_embeddings::{OllamaEmbedder, OllamaEmbeddingConfig};
pub use retriever::{dedup_and_rank, fingerprint, Retriever, RetrieverConfig};
pub use vector_store::{QdrantIndex, VectorStoreConfig};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<RagError> for sommelier_core::Error {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Embedding(_) => sommelier_core::Error::EmbeddingUnavailable(err.to_string()),
            _ => sommelier_core::Error::IndexUnavailable(err.to_string()),
        }
    }
}
