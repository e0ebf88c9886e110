//! Sommelier Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use sommelier_config::{load_settings, EmbeddingProviderKind, Settings, VectorStoreKind};
use sommelier_core::{EmbeddingProvider, LanguageModel, MemoryStore, VectorIndex};
use sommelier_llm::LlmFactory;
use sommelier_persistence::{InMemoryMemoryStore, ScyllaConfig};
use sommelier_rag::{
    index_catalog, seed_catalog, EmbeddingConfig, HashEmbedder, InMemoryVectorIndex,
    OllamaEmbedder, OllamaEmbeddingConfig, QdrantIndex, VectorStoreConfig,
};
use sommelier_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("SOMMELIER_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };
    config.validate()?;

    init_tracing(&config);

    tracing::info!("Starting Sommelier Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled && init_metrics().is_some() {
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let store = init_memory_store(&config).await;
    let embedder = init_embedder(&config);
    let index = init_vector_index(&config).await;

    if config.vector_store.seed_catalog {
        seed_index(index.as_ref(), embedder.as_ref()).await;
    }

    let llm = LlmFactory::create_or_offline(&config.llm);

    tracing::info!(
        llm = llm.model_name(),
        embedder = embedder.name(),
        memory = store.backend(),
        "Initialized application state"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = create_router(AppState::new(config, llm, embedder, index, store));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("sommelier={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}

/// ScyllaDB when enabled, in-memory otherwise or when the cluster is unreachable
async fn init_memory_store(config: &Settings) -> Arc<dyn MemoryStore> {
    if !config.persistence.enabled {
        tracing::info!("Persistence disabled, using in-memory memory store");
        return Arc::new(InMemoryMemoryStore::new());
    }

    tracing::info!("Initializing ScyllaDB persistence layer...");
    match sommelier_persistence::init(ScyllaConfig::from(&config.persistence)).await {
        Ok(store) => {
            tracing::info!(
                hosts = ?config.persistence.scylla_hosts,
                keyspace = %config.persistence.keyspace,
                "ScyllaDB persistence initialized"
            );
            Arc::new(store)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize ScyllaDB. Falling back to in-memory.");
            Arc::new(InMemoryMemoryStore::new())
        }
    }
}

fn init_embedder(config: &Settings) -> Arc<dyn EmbeddingProvider> {
    let hash = || -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashEmbedder::new(EmbeddingConfig::from(&config.embedding)))
    };

    match config.embedding.provider {
        EmbeddingProviderKind::Hash => hash(),
        EmbeddingProviderKind::Ollama => {
            match OllamaEmbedder::new(OllamaEmbeddingConfig::from(&config.embedding)) {
                Ok(embedder) => Arc::new(embedder),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Ollama embedder. Using hash embeddings.");
                    hash()
                }
            }
        }
    }
}

async fn init_vector_index(config: &Settings) -> Arc<dyn VectorIndex> {
    match config.vector_store.provider {
        VectorStoreKind::Memory => Arc::new(InMemoryVectorIndex::new()),
        VectorStoreKind::Qdrant => {
            let vs_config = VectorStoreConfig::from_settings(&config.vector_store, &config.embedding);
            match QdrantIndex::connect(vs_config).await {
                Ok(index) => {
                    tracing::info!(
                        endpoint = %config.vector_store.endpoint,
                        collection = %config.vector_store.collection,
                        "Qdrant index initialized"
                    );
                    Arc::new(index)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to initialize Qdrant. Falling back to in-memory index.");
                    Arc::new(InMemoryVectorIndex::new())
                }
            }
        }
    }
}

/// Index the bundled wines into an empty index
async fn seed_index(index: &dyn VectorIndex, embedder: &dyn EmbeddingProvider) {
    match index.is_empty().await {
        Ok(true) => {
            if let Err(e) = index_catalog(index, embedder, &seed_catalog()).await {
                tracing::warn!(error = %e, "Failed to seed wine catalog");
            }
        }
        Ok(false) => tracing::debug!("Index already populated, skipping seed catalog"),
        Err(e) => tracing::warn!(error = %e, "Index unavailable, skipping seed catalog"),
    }
}
