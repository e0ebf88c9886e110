//! Application State
//!
//! Shared state across all handlers.

use parking_lot::RwLock;
use std::sync::Arc;

use sommelier_agent::{ConversationMemory, QueryPipeline};
use sommelier_config::Settings;
use sommelier_core::{EmbeddingProvider, LanguageModel, MemoryStore, VectorIndex};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub pipeline: Arc<QueryPipeline>,
    pub llm: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
}

impl AppState {
    pub fn new(
        config: Settings,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        let pipeline = QueryPipeline::from_parts(
            &config,
            llm.clone(),
            embedder.clone(),
            index.clone(),
            store,
        );

        Self {
            config: Arc::new(RwLock::new(config)),
            pipeline: Arc::new(pipeline),
            llm,
            embedder,
            index,
        }
    }

    /// Get a read guard to the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        self.pipeline.memory()
    }
}
