//! Vector Store using Qdrant
//!
//! Dense vector storage and similarity search behind the core `VectorIndex`
//! trait. Qdrant reports cosine similarity; it is converted to distance as
//! `1 - score`.

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        value::Kind, CreateCollectionBuilder, Distance, ListValue, PointStruct,
        SearchPointsBuilder, Struct, UpsertPointsBuilder, Value as QdrantValue,
        VectorParamsBuilder,
    },
    Qdrant,
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use sommelier_config::{constants::endpoints, EmbeddingSettings, VectorStoreSettings};
use sommelier_core::{Document, Metadata, Result, ScoredDocument, VectorIndex};

use crate::RagError;

/// Payload key holding the document text
const CONTENT_KEY: &str = "text";
/// Payload key holding the caller's document id (Qdrant ids are numeric)
const DOC_ID_KEY: &str = "doc_id";

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Qdrant endpoint
    pub endpoint: String,
    /// Collection name
    pub collection: String,
    /// Vector dimension
    pub vector_dim: usize,
    /// API key (optional)
    pub api_key: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        use sommelier_config::constants::{models, rag};
        Self {
            endpoint: endpoints::QDRANT_DEFAULT.to_string(),
            collection: rag::COLLECTION.to_string(),
            vector_dim: models::EMBEDDING_DIM,
            api_key: None,
        }
    }
}

impl VectorStoreConfig {
    pub fn from_settings(store: &VectorStoreSettings, embedding: &EmbeddingSettings) -> Self {
        Self {
            endpoint: store.endpoint.clone(),
            collection: store.collection.clone(),
            vector_dim: embedding.dimension,
            api_key: store.api_key.clone(),
        }
    }
}

/// Qdrant-backed index
pub struct QdrantIndex {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl QdrantIndex {
    /// Connect and make sure the collection exists
    pub async fn connect(config: VectorStoreConfig) -> std::result::Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        let index = Self { client, config };
        index.ensure_collection().await?;
        Ok(index)
    }

    /// Create collection if not exists
    pub async fn ensure_collection(&self) -> std::result::Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        if !exists {
            tracing::info!(collection = %self.config.collection, dim = self.config.vector_dim, "Creating Qdrant collection");
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                        VectorParamsBuilder::new(self.config.vector_dim as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
        }

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, document: Document) -> Result<()> {
        let mut payload: HashMap<String, QdrantValue> = document
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), json_to_qdrant(v)))
            .collect();
        payload.insert(CONTENT_KEY.to_string(), document.content.clone().into());
        payload.insert(DOC_ID_KEY.to_string(), document.id.clone().into());

        let point = PointStruct::new(point_id(&document.id), document.embedding, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, vec![point]).wait(true))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.config.collection, vector.to_vec(), k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let documents = results
            .result
            .into_iter()
            .map(|point| {
                let mut metadata = Metadata::new();
                let mut content = String::new();
                let mut id = String::new();

                for (k, v) in point.payload {
                    match k.as_str() {
                        CONTENT_KEY => {
                            if let Some(Kind::StringValue(s)) = v.kind {
                                content = s;
                            }
                        }
                        DOC_ID_KEY => {
                            if let Some(Kind::StringValue(s)) = v.kind {
                                id = s;
                            }
                        }
                        _ => {
                            metadata.insert(k, qdrant_to_json(v.kind));
                        }
                    }
                }

                let document = Document {
                    id,
                    content,
                    embedding: Vec::new(),
                    metadata,
                };
                ScoredDocument::new(document, 1.0 - point.score)
            })
            .collect();

        Ok(documents)
    }

    async fn len(&self) -> Result<usize> {
        let info = self
            .client
            .collection_info(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0) as usize)
    }
}

/// Stable numeric point id for a string document id (FNV-1a)
fn point_id(id: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in id.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn json_to_qdrant(value: &JsonValue) -> QdrantValue {
    let kind = match value {
        JsonValue::Null => Kind::NullValue(0),
        JsonValue::Bool(b) => Kind::BoolValue(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Kind::IntegerValue(i),
            None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => Kind::StringValue(s.clone()),
        JsonValue::Array(items) => Kind::ListValue(ListValue {
            values: items.iter().map(json_to_qdrant).collect(),
        }),
        JsonValue::Object(map) => Kind::StructValue(Struct {
            fields: map.iter().map(|(k, v)| (k.clone(), json_to_qdrant(v))).collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

fn qdrant_to_json(kind: Option<Kind>) -> JsonValue {
    match kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(b)) => JsonValue::Bool(b),
        Some(Kind::IntegerValue(i)) => JsonValue::from(i),
        Some(Kind::DoubleValue(d)) => JsonValue::from(d),
        Some(Kind::StringValue(s)) => JsonValue::String(s),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(|v| qdrant_to_json(v.kind)).collect())
        }
        Some(Kind::StructValue(s)) => JsonValue::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_to_json(v.kind)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_default() {
        let config = VectorStoreConfig::default();
        assert_eq!(config.vector_dim, 1024);
        assert_eq!(config.collection, "sommelier_wines");
        assert_eq!(config.endpoint, "http://127.0.0.1:6334");
    }

    #[test]
    fn test_point_id_stable() {
        assert_eq!(point_id("wine_1"), point_id("wine_1"));
        assert_ne!(point_id("wine_1"), point_id("wine_2"));
    }

    #[test]
    fn test_payload_conversion_preserves_values() {
        let original = json!({
            "name": "Rioja Gran Reserva",
            "price": 45.5,
            "rating": 92,
            "tags": ["tinto", "crianza"],
            "organic": false
        });
        let converted = qdrant_to_json(json_to_qdrant(&original).kind);
        assert_eq!(converted, original);
    }
}
