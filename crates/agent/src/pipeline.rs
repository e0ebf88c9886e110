//! Query pipeline
//!
//! One request moves through a fixed set of states:
//!
//! ```text
//! RECEIVED -> CLASSIFIED -> DIRECT --------------\
//!                        \-> EXPANDED_RETRIEVAL --> GENERATED -> PERSISTED -> RESPONDED
//! ```
//!
//! Every stage after classification degrades instead of failing; persisting
//! the turn is best-effort.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use sommelier_config::Settings;
use sommelier_core::{
    ClassificationResult, EmbeddingProvider, Error, LanguageModel, MemoryStore, QueryCategory,
    QueryTurn, Result, RetrievedChunk, Route, UserContext, VectorIndex,
};
use sommelier_rag::{
    sources_from_chunks, ExpanderConfig, QueryExpander, Retriever, RetrieverConfig, Source,
};

use crate::classifier::{ClassifierConfig, QueryClassifier};
use crate::generator::{AnswerGenerator, GeneratorConfig};
use crate::memory::ConversationMemory;

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Received,
    Classified,
    Direct,
    ExpandedRetrieval,
    Generated,
    Persisted,
    Responded,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "RECEIVED",
            PipelineState::Classified => "CLASSIFIED",
            PipelineState::Direct => "DIRECT",
            PipelineState::ExpandedRetrieval => "EXPANDED_RETRIEVAL",
            PipelineState::Generated => "GENERATED",
            PipelineState::Persisted => "PERSISTED",
            PipelineState::Responded => "RESPONDED",
        }
    }

    /// Whether `next` is a legal successor
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Received, Classified)
                | (Classified, Direct)
                | (Classified, ExpandedRetrieval)
                | (Direct, Generated)
                | (ExpandedRetrieval, Generated)
                | (Generated, Persisted)
                | (Persisted, Responded)
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub answer: String,
    pub category: QueryCategory,
    pub confidence: f32,
    pub sources: Vec<Source>,
    pub processing_time_ms: u64,
    pub used_rag: bool,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: sommelier_config::constants::rag::TOP_K,
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            top_k: settings.rag.top_k,
        }
    }
}

/// Tracks the current state of one request
struct Run<'a> {
    request_id: &'a str,
    state: PipelineState,
}

impl<'a> Run<'a> {
    fn new(request_id: &'a str) -> Self {
        Self {
            request_id,
            state: PipelineState::Received,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(request_id = %self.request_id, from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
    }
}

pub struct QueryPipeline {
    classifier: QueryClassifier,
    expander: QueryExpander,
    retriever: Retriever,
    generator: AnswerGenerator,
    memory: Arc<ConversationMemory>,
    config: PipelineConfig,
}

impl QueryPipeline {
    pub fn new(
        classifier: QueryClassifier,
        expander: QueryExpander,
        retriever: Retriever,
        generator: AnswerGenerator,
        memory: Arc<ConversationMemory>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            classifier,
            expander,
            retriever,
            generator,
            memory,
            config,
        }
    }

    /// Wire every stage from settings and collaborators
    pub fn from_parts(
        settings: &Settings,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        Self::new(
            QueryClassifier::new(llm.clone(), ClassifierConfig::from(settings)),
            QueryExpander::new(llm.clone(), ExpanderConfig::from(settings)),
            Retriever::new(embedder, index, RetrieverConfig::from(settings)),
            AnswerGenerator::new(llm, GeneratorConfig::from(settings)),
            Arc::new(ConversationMemory::new(store, settings.memory.clone())),
            PipelineConfig::from(settings),
        )
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    /// Classify only, without retrieval or persistence
    pub async fn classify(&self, query: &str) -> Result<ClassificationResult> {
        let query = validate_query(query)?;
        Ok(self.classifier.classify(query).await)
    }

    /// Answer one query
    ///
    /// Fails only on an empty query; every later stage degrades.
    pub async fn run(
        &self,
        query: &str,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<PipelineResponse> {
        let query = validate_query(query)?;
        let start = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| request_id.clone());
        let mut run = Run::new(&request_id);

        tracing::info!(request_id = %request_id, user_id = %user_id, "Query received");

        let classification = self.classifier.classify(query).await;
        run.advance(PipelineState::Classified);
        tracing::info!(
            request_id = %request_id,
            category = %classification.category,
            confidence = classification.confidence,
            source = ?classification.source,
            "Query classified"
        );

        let strategy = classification.category.strategy();
        let (answer, chunks) = match (strategy.route, strategy.canned_response) {
            (Route::Direct, Some(canned)) => {
                run.advance(PipelineState::Direct);
                run.advance(PipelineState::Generated);
                (canned.to_string(), Vec::new())
            }
            _ => {
                run.advance(PipelineState::ExpandedRetrieval);
                let context = self.context_for(user_id, &request_id).await;
                let chunks = self
                    .retrieve(query, context.as_ref(), &request_id)
                    .await;
                let answer = self
                    .generator
                    .generate(query, &chunks, context.as_ref(), classification.category)
                    .await;
                run.advance(PipelineState::Generated);
                (answer, chunks)
            }
        };

        let sources = sources_from_chunks(self.generator.cited(&chunks));
        let turn = QueryTurn {
            user_id: user_id.to_string(),
            query: query.to_string(),
            category: classification.category,
            answer: answer.clone(),
            cited_item_names: sources.iter().map(|s| s.name.clone()).collect::<BTreeSet<_>>(),
            timestamp: chrono::Utc::now(),
            session_id: session_id.clone(),
        };
        if let Err(e) = self.memory.append_turn(turn).await {
            metrics::counter!("sommelier_persist_failures_total").increment(1);
            tracing::warn!(request_id = %request_id, error = %e, "Failed to persist turn");
        }
        run.advance(PipelineState::Persisted);

        let processing_time_ms = start.elapsed().as_millis() as u64;
        metrics::counter!("sommelier_queries_total", "category" => classification.category.as_str())
            .increment(1);
        metrics::histogram!("sommelier_query_duration_ms").record(processing_time_ms as f64);
        run.advance(PipelineState::Responded);

        tracing::info!(
            request_id = %request_id,
            category = %classification.category,
            sources = sources.len(),
            processing_time_ms,
            "Query answered"
        );

        Ok(PipelineResponse {
            answer,
            category: classification.category,
            confidence: classification.confidence,
            used_rag: !chunks.is_empty(),
            sources,
            processing_time_ms,
            session_id,
        })
    }

    async fn context_for(&self, user_id: &str, request_id: &str) -> Option<UserContext> {
        match self.memory.read_context(user_id).await {
            Ok(context) => Some(context),
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "User context unavailable");
                None
            }
        }
    }

    async fn retrieve(
        &self,
        query: &str,
        context: Option<&UserContext>,
        request_id: &str,
    ) -> Vec<RetrievedChunk> {
        let expansions = self.expander.expand(query, context).await;
        tracing::debug!(request_id = %request_id, expansions = ?expansions, "Query expanded");

        match self.retriever.retrieve(&expansions, self.config.top_k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                metrics::counter!("sommelier_fallbacks_total", "stage" => "retrieval").increment(1);
                tracing::warn!(request_id = %request_id, error = %e, "Retrieval failed");
                Vec::new()
            }
        }
    }
}

fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("query must not be empty".to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use PipelineState::*;
        assert!(Received.can_transition_to(Classified));
        assert!(Classified.can_transition_to(Direct));
        assert!(Classified.can_transition_to(ExpandedRetrieval));
        assert!(Direct.can_transition_to(Generated));
        assert!(Generated.can_transition_to(Persisted));
        assert!(Persisted.can_transition_to(Responded));

        assert!(!Received.can_transition_to(Responded));
        assert!(!Direct.can_transition_to(Persisted));
        assert!(!Responded.can_transition_to(Received));
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(PipelineState::ExpandedRetrieval.to_string(), "EXPANDED_RETRIEVAL");
        let json = serde_json::to_string(&PipelineState::Responded).unwrap();
        assert_eq!(json, "\"RESPONDED\"");
    }

    #[test]
    fn test_validate_query() {
        assert!(validate_query("   ").unwrap_err().is_validation());
        assert_eq!(validate_query("  hola ").unwrap(), "hola");
    }
}
