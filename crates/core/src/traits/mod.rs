//! Collaborator traits for the query pipeline
//!
//! Every external dependency of the pipeline sits behind one of these traits so
//! backends can be swapped by configuration and mocked in tests.
//!
//! ```text
//! EmbeddingProvider: text -> vector
//! LanguageModel:     messages + options -> text
//! VectorIndex:       upsert / top-k cosine query
//! MemoryStore:       per-user turns, ratings, preferences
//! ```

mod embedding;
mod llm;
mod memory_store;
mod vector_index;

pub use embedding::EmbeddingProvider;
pub use llm::LanguageModel;
pub use memory_store::MemoryStore;
pub use vector_index::VectorIndex;
