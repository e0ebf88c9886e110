//! Integration tests for the query pipeline (classify -> retrieve -> generate -> persist)
//!
//! Collaborators are in-process: a scripted language model, the hash
//! embedder over the seed catalog, and the in-memory store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sommelier_agent::QueryPipeline;
use sommelier_config::Settings;
use sommelier_core::{
    CompletionOptions, Document, EmbeddingProvider, Error, LanguageModel, MemoryStats,
    MemoryStore, Message, Preferences, QueryCategory, QueryTurn, Rating, Result, ScoredDocument,
    VectorIndex,
};
use sommelier_persistence::InMemoryMemoryStore;
use sommelier_rag::{
    index_catalog, seed_catalog, EmbeddingConfig, HashEmbedder, InMemoryVectorIndex,
};

/// Replies keyed on which stage is calling
#[derive(Clone, Copy)]
enum Reply {
    Text(&'static str),
    Fail,
    Hang,
}

struct ScriptedLlm {
    classification: Reply,
    expansion: Reply,
    generation: Reply,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(classification: Reply, expansion: Reply, generation: Reply) -> Arc<Self> {
        Arc::new(Self {
            classification,
            expansion,
            generation,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Self::new(Reply::Fail, Reply::Fail, Reply::Fail)
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn complete(&self, messages: &[Message], _options: &CompletionOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let system = messages.first().map(|m| m.content.as_str()).unwrap_or_default();
        let reply = if system.contains("clasificador") {
            self.classification
        } else if system.contains("reformula") {
            self.expansion
        } else {
            self.generation
        };

        match reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Fail => Err(Error::Llm("backend down".into())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Index wrapper counting queries, optionally unreachable
struct CountingIndex {
    inner: InMemoryVectorIndex,
    queries: AtomicUsize,
    down: bool,
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn upsert(&self, document: Document) -> Result<()> {
        self.inner.upsert(document).await
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.down {
            return Err(Error::IndexUnavailable("connection refused".into()));
        }
        self.inner.query(vector, k).await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}

/// Store whose writes always fail
struct BrokenStore {
    attempts: Mutex<usize>,
}

#[async_trait]
impl MemoryStore for BrokenStore {
    async fn append_turn(&self, _turn: QueryTurn) -> Result<()> {
        *self.attempts.lock() += 1;
        Err(Error::StoreUnavailable("scylla down".into()))
    }

    async fn append_rating(&self, _rating: Rating) -> Result<()> {
        Err(Error::StoreUnavailable("scylla down".into()))
    }

    async fn upsert_preferences(&self, _user_id: &str, _preferences: Preferences) -> Result<()> {
        Err(Error::StoreUnavailable("scylla down".into()))
    }

    async fn recent_turns(&self, _user_id: &str, _limit: usize) -> Result<Vec<QueryTurn>> {
        Err(Error::StoreUnavailable("scylla down".into()))
    }

    async fn ratings(&self, _user_id: &str) -> Result<Vec<Rating>> {
        Err(Error::StoreUnavailable("scylla down".into()))
    }

    async fn preferences(&self, _user_id: &str) -> Result<Preferences> {
        Err(Error::StoreUnavailable("scylla down".into()))
    }

    async fn stats(&self) -> Result<MemoryStats> {
        Err(Error::StoreUnavailable("scylla down".into()))
    }

    fn backend(&self) -> &'static str {
        "broken"
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.embedding.dimension = 64;
    settings.llm.timeout_seconds = 2;
    settings
}

async fn index(down: bool) -> Arc<CountingIndex> {
    let embedder = HashEmbedder::new(EmbeddingConfig {
        embedding_dim: 64,
        normalize: true,
    });
    let index = Arc::new(CountingIndex {
        inner: InMemoryVectorIndex::new(),
        queries: AtomicUsize::new(0),
        down,
    });
    index_catalog(index.as_ref(), &embedder, &seed_catalog())
        .await
        .unwrap();
    index
}

async fn pipeline_with(
    llm: Arc<ScriptedLlm>,
    index: Arc<CountingIndex>,
    store: Arc<dyn MemoryStore>,
) -> QueryPipeline {
    let settings = settings();
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new(EmbeddingConfig {
        embedding_dim: 64,
        normalize: true,
    }));
    QueryPipeline::from_parts(&settings, llm, embedder, index, store)
}

#[tokio::test]
async fn test_empty_query_rejected_without_side_effects() {
    let store = Arc::new(InMemoryMemoryStore::new());
    let llm = ScriptedLlm::failing();
    let pipeline = pipeline_with(llm.clone(), index(false).await, store.clone()).await;

    let err = pipeline.run("   ", "u1", None).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.stats().await.unwrap().total_conversations, 0);
}

#[tokio::test]
async fn test_search_with_llm_down_degrades_to_template() {
    let store = Arc::new(InMemoryMemoryStore::new());
    let index = index(false).await;
    let pipeline = pipeline_with(ScriptedLlm::failing(), index.clone(), store.clone()).await;

    let response = pipeline.run("vino tinto para carne", "u1", None).await.unwrap();

    assert_eq!(response.category, QueryCategory::WineSearch);
    assert!(response.confidence > 0.0);
    assert!(response.used_rag);
    assert!(response.answer.contains("Recomendaciones basadas en tu consulta"));
    assert!(response.answer.contains("estructura tánica"));
    // Expansion failed, so exactly one query hit the index
    assert_eq!(index.queries.load(Ordering::SeqCst), 1);

    // All four wines are retrieved, only the three in the answer are cited
    assert_eq!(response.sources.len(), 3);
    let in_answer: HashSet<String> = seed_catalog()
        .into_iter()
        .map(|wine| wine.name)
        .filter(|name| response.answer.contains(name.as_str()))
        .collect();
    let cited: HashSet<String> = response.sources.iter().map(|s| s.name.clone()).collect();
    assert_eq!(cited, in_answer);

    let turns = store.recent_turns("u1", 5).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].category, QueryCategory::WineSearch);
    let persisted: HashSet<String> = turns[0].cited_item_names.iter().cloned().collect();
    assert_eq!(persisted, in_answer);
}

#[tokio::test]
async fn test_direct_categories_skip_retrieval() {
    let cases = [
        ("hola", QueryCategory::Greeting),
        ("tengo un mensaje secreto", QueryCategory::SecretMessage),
        ("¿Cuál es la capital de Francia?", QueryCategory::OffTopic),
    ];

    for (query, expected) in cases {
        let index = index(false).await;
        let store = Arc::new(InMemoryMemoryStore::new());
        let pipeline = pipeline_with(ScriptedLlm::failing(), index.clone(), store.clone()).await;

        let response = pipeline.run(query, "u1", None).await.unwrap();
        assert_eq!(response.category, expected, "query {:?}", query);
        assert_eq!(
            Some(response.answer.as_str()),
            expected.strategy().canned_response
        );
        assert!(response.sources.is_empty());
        assert!(!response.used_rag);
        assert_eq!(index.queries.load(Ordering::SeqCst), 0);
        assert_eq!(store.recent_turns("u1", 5).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_llm_classification_and_generation() {
    let llm = ScriptedLlm::new(
        Reply::Text("{\"category\": \"WINE_THEORY\", \"confidence\": 0.9}"),
        Reply::Text("[\"qué es la crianza en barrica\", \"tiempo de crianza del vino\"]"),
        Reply::Text("La crianza es el tiempo que el vino envejece en barrica."),
    );
    let index = index(false).await;
    let pipeline =
        pipeline_with(llm, index.clone(), Arc::new(InMemoryMemoryStore::new())).await;

    let response = pipeline.run("¿Qué es la crianza?", "u1", Some("s1")).await.unwrap();
    assert_eq!(response.category, QueryCategory::WineTheory);
    assert!((response.confidence - 0.9).abs() < 1e-6);
    assert_eq!(response.answer, "La crianza es el tiempo que el vino envejece en barrica.");
    assert_eq!(response.session_id, "s1");
    assert_eq!(index.queries.load(Ordering::SeqCst), 3);

    let names: HashSet<_> = response.sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names.len(), response.sources.len());
    assert!(response.sources.len() <= 5);
}

#[tokio::test]
async fn test_invalid_label_uses_fallback_classifier() {
    let llm = ScriptedLlm::new(
        Reply::Text("{\"category\": \"MAYBE_WINE\", \"confidence\": 0.99}"),
        Reply::Fail,
        Reply::Fail,
    );
    let pipeline =
        pipeline_with(llm, index(false).await, Arc::new(InMemoryMemoryStore::new())).await;

    let response = pipeline.run("buenas tardes", "u1", None).await.unwrap();
    assert_eq!(response.category, QueryCategory::Greeting);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_llm_times_out_to_fallbacks() {
    let llm = ScriptedLlm::new(Reply::Hang, Reply::Hang, Reply::Hang);
    let pipeline =
        pipeline_with(llm, index(false).await, Arc::new(InMemoryMemoryStore::new())).await;

    let response = pipeline.run("recomienda un vino para pescado", "u1", None).await.unwrap();
    assert_eq!(response.category, QueryCategory::WineSearch);
    assert!(response.answer.contains("pescados y mariscos"));
}

#[tokio::test]
async fn test_index_down_still_answers() {
    let pipeline = pipeline_with(
        ScriptedLlm::failing(),
        index(true).await,
        Arc::new(InMemoryMemoryStore::new()),
    )
    .await;

    let response = pipeline.run("vino blanco para marisco", "u1", None).await.unwrap();
    assert_eq!(response.category, QueryCategory::WineSearch);
    assert!(response.sources.is_empty());
    assert!(!response.used_rag);
    assert!(response.answer.contains("¿Podrías contarme más detalles?"));
}

#[tokio::test]
async fn test_store_down_is_best_effort() {
    let store = Arc::new(BrokenStore {
        attempts: Mutex::new(0),
    });
    let pipeline = pipeline_with(ScriptedLlm::failing(), index(false).await, store.clone()).await;

    let response = pipeline.run("vino tinto para cordero", "u1", None).await.unwrap();
    assert!(!response.answer.is_empty());
    assert_eq!(*store.attempts.lock(), 1);
}

#[tokio::test]
async fn test_memory_context_accumulates() {
    let store = Arc::new(InMemoryMemoryStore::new());
    let pipeline =
        pipeline_with(ScriptedLlm::failing(), index(false).await, store.clone()).await;

    for i in 0..7 {
        pipeline
            .run(&format!("vino tinto número {}", i), "u1", None)
            .await
            .unwrap();
    }

    let memory = pipeline.memory();
    memory
        .append_rating(Rating::new("u1", "Cava Brut Nature", 4, ""))
        .await
        .unwrap();
    memory
        .append_rating(Rating::new("u1", "Rioja Gran Reserva", 5, "espectacular"))
        .await
        .unwrap();
    assert!(memory
        .append_rating(Rating::new("u1", "Rioja Gran Reserva", 6, ""))
        .await
        .unwrap_err()
        .is_validation());

    let context = memory.read_context("u1").await.unwrap();
    assert_eq!(context.recent_turns.len(), 5);
    assert_eq!(context.recent_turns[0].query, "vino tinto número 6");
    assert_eq!(context.top_rated_items[0].name, "Rioja Gran Reserva");
    assert_eq!(context.top_rated_items.len(), 2);

    // Unknown users get an empty context
    assert!(memory.read_context("nadie").await.unwrap().is_empty());

    let stats = memory.stats().await.unwrap();
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.total_conversations, 7);
    assert_eq!(stats.total_ratings, 2);
}

#[tokio::test]
async fn test_malformed_preferences_rejected() {
    let pipeline = pipeline_with(
        ScriptedLlm::failing(),
        index(false).await,
        Arc::new(InMemoryMemoryStore::new()),
    )
    .await;

    let bad = serde_json::json!({"budget_max": "barato"});
    let bad = match bad {
        serde_json::Value::Object(map) => Preferences::new(map),
        _ => unreachable!(),
    };
    assert!(pipeline
        .memory()
        .upsert_preferences("u1", bad)
        .await
        .unwrap_err()
        .is_validation());
}
