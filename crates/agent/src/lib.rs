//! Sommelier agent
//!
//! Turns a user query into a grounded answer:
//! - Classification into a closed category set (LLM with keyword fallback)
//! - Category strategy routing (canned reply or expanded retrieval)
//! - Grounded answer generation with a templated degraded path
//! - Per-user conversation memory (turns, ratings, preferences)

pub mod classifier;
pub mod generator;
pub mod memory;
pub mod pipeline;

pub use classifier::{fallback_classify, parse_classification, ClassifierConfig, QueryClassifier};
pub use generator::{templated_answer, AnswerGenerator, GeneratorConfig};
pub use memory::{top_rated, ConversationMemory};
pub use pipeline::{PipelineConfig, PipelineResponse, PipelineState, QueryPipeline};
