//! Wine catalog documents and source extraction

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use sommelier_core::{
    truncate_words, Document, EmbeddingProvider, Metadata, Result, RetrievedChunk, VectorIndex,
};

/// Metadata `type` values marking a chunk as a wine
const WINE_TYPES: [&str; 2] = ["vino", "wine"];
const DESCRIPTION_PREFIX: &str = "Descripción: ";
const MAX_DESCRIPTION_CHARS: usize = 200;

/// One wine of the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WineRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub wine_type: String,
    pub region: String,
    pub grape: String,
    #[serde(default)]
    pub winery: Option<String>,
    #[serde(default)]
    pub vintage: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub alcohol: Option<f64>,
    /// Score out of 100
    #[serde(default)]
    pub rating: Option<u32>,
    pub pairing: String,
    pub temperature: String,
    #[serde(default)]
    pub crianza: Option<String>,
    pub description: String,
}

impl WineRecord {
    /// Text indexed for semantic search
    pub fn to_content(&self) -> String {
        format!(
            "Vino: {}\nTipo: {}\nRegión: {}\nUva: {}\nBodega: {}\nPrecio: {}€\nGraduación: {}% vol.\n\
             Temperatura de servicio: {}\nCrianza: {}\nDescripción: {}\nMaridaje: {}\nPuntuación: {}/100",
            self.name,
            self.wine_type,
            self.region,
            self.grape,
            self.winery.as_deref().unwrap_or("Sin bodega"),
            self.price,
            self.alcohol.unwrap_or_default(),
            self.temperature,
            self.crianza.as_deref().unwrap_or("Sin información de crianza"),
            self.description,
            self.pairing,
            self.rating.unwrap_or_default(),
        )
    }

    pub fn to_metadata(&self) -> Metadata {
        let value = json!({
            "source": "catalog",
            "type": "vino",
            "name": self.name,
            "wine_type": self.wine_type,
            "region": self.region,
            "grape": self.grape,
            "winery": self.winery.clone().unwrap_or_default(),
            "vintage": self.vintage.clone().unwrap_or_default(),
            "price": self.price,
            "alcohol": self.alcohol.unwrap_or_default(),
            "rating": self.rating.unwrap_or_default(),
            "pairing": self.pairing,
            "temperature": self.temperature,
            "crianza": self.crianza.clone().unwrap_or_default(),
        });
        match value {
            Value::Object(map) => map,
            _ => Metadata::new(),
        }
    }
}

fn wine(
    name: &str,
    wine_type: &str,
    region: &str,
    grape: &str,
    price: f64,
    pairing: &str,
    description: &str,
    temperature: &str,
) -> WineRecord {
    WineRecord {
        name: name.to_string(),
        wine_type: wine_type.to_string(),
        region: region.to_string(),
        grape: grape.to_string(),
        winery: None,
        vintage: None,
        price,
        alcohol: None,
        rating: None,
        pairing: pairing.to_string(),
        temperature: temperature.to_string(),
        crianza: None,
        description: description.to_string(),
    }
}

/// Built-in starter catalog
pub fn seed_catalog() -> Vec<WineRecord> {
    vec![
        wine(
            "Ribera del Duero Reserva",
            "Tinto",
            "Ribera del Duero",
            "Tempranillo",
            25.50,
            "Carnes rojas, cordero, quesos curados",
            "Vino tinto con crianza en barrica, taninos suaves y notas a frutos rojos.",
            "16-18°C",
        ),
        wine(
            "Albariño Rías Baixas",
            "Blanco",
            "Rías Baixas",
            "Albariño",
            18.90,
            "Mariscos, pescados, paella",
            "Vino blanco fresco con acidez equilibrada y notas cítricas.",
            "8-10°C",
        ),
        wine(
            "Rioja Gran Reserva",
            "Tinto",
            "Rioja",
            "Tempranillo, Garnacha",
            45.00,
            "Caza, carnes asadas, quesos añejos",
            "Vino tinto de larga crianza con complejidad aromática excepcional.",
            "17-19°C",
        ),
        wine(
            "Cava Brut Nature",
            "Espumoso",
            "Penedès",
            "Macabeo, Xarel·lo, Parellada",
            12.75,
            "Aperitivos, mariscos, celebraciones",
            "Espumoso elegante sin azúcar añadido, burbujas finas y persistentes.",
            "6-8°C",
        ),
    ]
}

/// Embed and upsert wines with ids `wine_1..`; returns the number indexed
pub async fn index_catalog(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
    wines: &[WineRecord],
) -> Result<usize> {
    for (i, wine) in wines.iter().enumerate() {
        let content = wine.to_content();
        let embedding = embedder.embed(&content).await?;
        let document = Document {
            id: format!("wine_{}", i + 1),
            content,
            embedding,
            metadata: wine.to_metadata(),
        };
        index.upsert(document).await?;
    }

    tracing::info!(count = wines.len(), embedder = embedder.name(), "Wine catalog indexed");
    Ok(wines.len())
}

/// Cited source returned with an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub metadata: Metadata,
}

/// Build response sources from retrieved chunks, in chunk order
pub fn sources_from_chunks(chunks: &[RetrievedChunk]) -> Vec<Source> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut metadata = chunk.metadata.clone();
            metadata.insert("relevance_score".to_string(), json!(chunk.score));

            let is_wine = chunk
                .metadata_str("type")
                .map(|t| WINE_TYPES.contains(&t))
                .unwrap_or(false);

            let name = if is_wine {
                metadata.insert(
                    "description".to_string(),
                    Value::String(extract_description(&chunk.content)),
                );
                chunk
                    .metadata_text("name")
                    .unwrap_or_else(|| format!("Vino {}", i + 1))
            } else {
                chunk
                    .metadata_text("title")
                    .or_else(|| chunk.metadata_text("name"))
                    .unwrap_or_else(|| format!("Fuente {}", i + 1))
            };

            Source { name, metadata }
        })
        .collect()
}

fn extract_description(content: &str) -> String {
    let line = content
        .lines()
        .find_map(|l| l.trim().strip_prefix(DESCRIPTION_PREFIX))
        .or_else(|| {
            content
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty() && !l.starts_with("Vino:"))
        })
        .unwrap_or_default();
    truncate_words(line, MAX_DESCRIPTION_CHARS)
}
