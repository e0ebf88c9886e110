//! HTTP Endpoints
//!
//! REST API for the sommelier.

use axum::{
    extract::{Json, Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use sommelier_agent::PipelineResponse;
use sommelier_config::constants::DEFAULT_USER_ID;
use sommelier_core::{
    ClassificationResult, Document, EmbeddingProvider, Error, LanguageModel, Metadata,
    Preferences, Rating, UserContext, VectorIndex,
};

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ServerError;

type ApiResult<T> = Result<Json<T>, ServerError>;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.read();
    let cors_layer = build_cors_layer(&config.server.cors_origins, config.server.cors_enabled);
    let request_timeout = Duration::from_secs(config.server.request_timeout_seconds);
    drop(config);

    Router::new()
        .route("/query", post(query))
        .route("/rate-wine", post(rate_wine))
        .route("/preferences", post(update_preferences))
        .route("/user/:user_id/context", get(user_context))
        .route("/classify", post(classify))
        .route("/documents", post(add_document))
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If no configured origin parses, defaults to localhost:3000
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if parsed_origins.is_empty() {
        tracing::info!("No valid CORS origins configured, defaulting to localhost:3000");
        return layer.allow_origin(HeaderValue::from_static("http://localhost:3000"));
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    layer.allow_origin(parsed_origins)
}

fn default_user() -> String {
    DEFAULT_USER_ID.to_string()
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default = "default_user")]
    user_id: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    #[serde(flatten)]
    response: PipelineResponse,
    user_context: UserContext,
}

/// POST /query
async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<QueryResponse> {
    let response = state
        .pipeline
        .run(&request.query, &request.user_id, request.session_id.as_deref())
        .await?;

    let user_context = match state.memory().read_context(&request.user_id).await {
        Ok(context) => context,
        Err(e) => {
            tracing::warn!(user_id = %request.user_id, error = %e, "User context unavailable");
            UserContext::default()
        }
    };

    Ok(Json(QueryResponse {
        response,
        user_context,
    }))
}

#[derive(Debug, Deserialize)]
struct RateWineRequest {
    wine_name: String,
    rating: i32,
    #[serde(default)]
    notes: String,
    #[serde(default = "default_user")]
    user_id: String,
}

/// POST /rate-wine
async fn rate_wine(
    State(state): State<AppState>,
    Json(request): Json<RateWineRequest>,
) -> ApiResult<serde_json::Value> {
    let rating = Rating::new(
        request.user_id,
        request.wine_name.clone(),
        request.rating,
        request.notes,
    );
    state.memory().append_rating(rating).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": format!("Valoración de {} guardada", request.wine_name),
    })))
}

#[derive(Debug, Deserialize)]
struct PreferencesRequest {
    preferences: serde_json::Value,
    #[serde(default = "default_user")]
    user_id: String,
}

/// POST /preferences
async fn update_preferences(
    State(state): State<AppState>,
    Json(request): Json<PreferencesRequest>,
) -> ApiResult<serde_json::Value> {
    let preferences = match request.preferences {
        serde_json::Value::Object(map) => Preferences::new(map),
        _ => {
            return Err(ServerError::InvalidRequest(
                "preferences must be a JSON object".to_string(),
            ))
        }
    };
    state
        .memory()
        .upsert_preferences(&request.user_id, preferences)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Preferencias actualizadas",
    })))
}

/// GET /user/:user_id/context
async fn user_context(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserContext> {
    Ok(Json(state.memory().read_context(&user_id).await?))
}

#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    query: String,
}

#[derive(Debug, Serialize)]
struct ClassifyResponse {
    #[serde(flatten)]
    classification: ClassificationResult,
    canned_response: Option<&'static str>,
}

/// POST /classify
async fn classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> ApiResult<ClassifyResponse> {
    let classification = state.pipeline.classify(&request.query).await?;
    Ok(Json(ClassifyResponse {
        canned_response: classification.category.strategy().canned_response,
        classification,
    }))
}

#[derive(Debug, Deserialize)]
struct DocumentRequest {
    content: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    doc_id: Option<String>,
}

/// POST /documents
async fn add_document(
    State(state): State<AppState>,
    Json(request): Json<DocumentRequest>,
) -> ApiResult<serde_json::Value> {
    if request.content.trim().is_empty() {
        return Err(Error::Validation("document content must not be empty".to_string()).into());
    }

    let doc_id = match request.doc_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => format!("doc_{}", state.index.len().await? + 1),
    };
    let embedding = state.embedder.embed(&request.content).await?;

    let mut document = Document::new(doc_id.clone(), request.content).with_embedding(embedding);
    document.metadata = request.metadata;
    state.index.upsert(document).await?;

    tracing::info!(doc_id = %doc_id, "Document indexed");
    Ok(Json(serde_json::json!({
        "status": "success",
        "doc_id": doc_id,
    })))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut components = serde_json::Map::new();
    let mut healthy = true;

    let llm_ok = state.llm.model_name() != "offline";
    healthy &= llm_ok;
    components.insert(
        "llm".to_string(),
        serde_json::json!({
            "status": if llm_ok { "ok" } else { "offline" },
            "model": state.llm.model_name(),
        }),
    );

    components.insert(
        "embeddings".to_string(),
        serde_json::json!({
            "status": "ok",
            "provider": state.embedder.name(),
            "dimension": state.embedder.dimension(),
        }),
    );

    let index = match state.index.len().await {
        Ok(count) => serde_json::json!({ "status": "ok", "documents": count }),
        Err(e) => {
            healthy = false;
            serde_json::json!({ "status": "error", "error": e.to_string() })
        }
    };
    components.insert("vector_index".to_string(), index);

    let memory_stats = match state.memory().stats().await {
        Ok(stats) => {
            components.insert(
                "memory".to_string(),
                serde_json::json!({ "status": "ok", "backend": state.memory().backend() }),
            );
            serde_json::to_value(stats).unwrap_or_default()
        }
        Err(e) => {
            healthy = false;
            components.insert(
                "memory".to_string(),
                serde_json::json!({
                    "status": "error",
                    "backend": state.memory().backend(),
                    "error": e.to_string(),
                }),
            );
            serde_json::Value::Null
        }
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "components": components,
            "memory_stats": memory_stats,
        })),
    )
}

/// GET /stats
async fn stats(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    let memory_stats = state.memory().stats().await?;
    let indexed_documents = state.index.len().await?;

    let features = {
        let config = state.get_config();
        serde_json::json!({
            "llm_provider": config.llm.provider,
            "embedding_provider": config.embedding.provider,
            "vector_store": config.vector_store.provider,
            "memory_backend": state.memory().backend(),
            "top_k": config.rag.top_k,
            "max_expansions": config.rag.max_expansions,
            "categories": sommelier_core::QueryCategory::PRIORITY,
        })
    };

    Ok(Json(serde_json::json!({
        "memory": memory_stats,
        "indexed_documents": indexed_documents,
        "features": features,
    })))
}
