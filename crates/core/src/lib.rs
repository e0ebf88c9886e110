//! Core traits and types for the sommelier pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - Collaborator traits (embeddings, language model, vector index, memory store)
//! - Query categories and the category strategy table
//! - Retrieval, memory and conversation types
//! - Error types

pub mod category;
pub mod document;
pub mod error;
pub mod llm_types;
pub mod memory;
pub mod traits;

pub use category::{
    CategoryStrategy, ClassificationResult, ClassificationSource, GenerationProfile, QueryCategory,
    Route,
};
pub use document::{Document, Metadata, RetrievedChunk, ScoredDocument};
pub use error::{Error, Result};
pub use llm_types::{CompletionOptions, Message, Role};
pub use memory::{
    truncate_words, MemoryStats, Preferences, QueryTurn, Rating, RatedItem, RecognizedPreferences,
    TurnSummary, UserContext, RATING_RANGE,
};
pub use traits::{EmbeddingProvider, LanguageModel, MemoryStore, VectorIndex};
