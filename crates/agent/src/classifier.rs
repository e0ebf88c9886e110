//! Query classification
//!
//! The LLM labels the query with one of the closed categories. When the call
//! fails, times out or returns anything outside the contract, a weighted
//! keyword classifier takes over.

use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use unicode_segmentation::UnicodeSegmentation;

use sommelier_config::Settings;
use sommelier_core::{
    ClassificationResult, ClassificationSource, CompletionOptions, LanguageModel, Message,
    QueryCategory,
};

const CLASSIFICATION_PROMPT: &str = "Eres un clasificador de consultas para un sumiller virtual. \
Clasifica la consulta del usuario en UNA de estas categorías:\n\
- WINE_SEARCH: busca una recomendación de vino, maridaje o compra\n\
- WINE_THEORY: pregunta sobre enología, uvas, regiones, elaboración o cata\n\
- GREETING: saludo o despedida sin más contenido\n\
- SECRET_MESSAGE: menciona un mensaje secreto o a Pedro/Vicky\n\
- OFF_TOPIC: cualquier otra cosa\n\n\
Responde SOLO con JSON: {\"category\": \"CATEGORIA\", \"confidence\": 0.0-1.0}";

/// A weighted keyword set for one category
struct KeywordSet {
    category: QueryCategory,
    weight: u32,
    /// Each keyword is one or more whole words
    keywords: Vec<Vec<&'static str>>,
}

impl KeywordSet {
    fn new(category: QueryCategory, weight: u32, keywords: &[&'static str]) -> Self {
        Self {
            category,
            weight,
            keywords: keywords
                .iter()
                .map(|k| k.split_whitespace().collect())
                .collect(),
        }
    }

    /// Number of distinct keywords present as whole words
    fn matches(&self, words: &[String]) -> u32 {
        self.keywords
            .iter()
            .filter(|keyword| {
                words
                    .windows(keyword.len())
                    .any(|window| window.iter().zip(keyword.iter()).all(|(w, k)| w == k))
            })
            .count() as u32
    }
}

static KEYWORD_SETS: Lazy<Vec<KeywordSet>> = Lazy::new(|| {
    vec![
        KeywordSet::new(
            QueryCategory::SecretMessage,
            4,
            &["secreto", "pedro", "pedrito", "pepe", "perico", "vicky", "victoria", "vicki", "vic"],
        ),
        KeywordSet::new(
            QueryCategory::WineSearch,
            3,
            &[
                "recomienda", "recomiéndame", "recomendar", "recomendación", "recomiendas",
                "busco", "buscando", "necesito", "sugiere", "sugiéreme", "vino", "vinos",
                "tinto", "blanco", "rosado", "espumoso", "cava", "botella", "maridaje",
                "maridar", "acompañar", "carne", "pescado", "marisco", "mariscos", "queso",
                "cena", "comida", "regalo", "precio", "barato", "euros",
            ],
        ),
        KeywordSet::new(
            QueryCategory::WineTheory,
            2,
            &[
                "crianza", "barrica", "tanino", "taninos", "uva", "uvas", "variedad",
                "variedades", "fermentación", "cata", "catar", "aroma", "aromas",
                "denominación", "terroir", "viticultura", "enología", "añada", "diferencia",
                "qué es", "explica", "explícame", "historia", "elaboración", "elabora",
                "sulfitos", "decantar", "temperatura",
            ],
        ),
        KeywordSet::new(
            QueryCategory::Greeting,
            1,
            &[
                "hola", "buenas", "buenos días", "buenas tardes", "buenas noches", "saludos",
                "hey", "qué tal", "gracias", "adiós", "hello", "hi",
            ],
        ),
    ]
});

/// Lowercased Unicode words of the query
fn words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .unicode_words()
        .map(str::to_string)
        .collect()
}

/// Keyword classifier used when the LLM path is unavailable
pub fn fallback_classify(query: &str) -> ClassificationResult {
    let words = words(query);

    let best = KEYWORD_SETS
        .iter()
        .map(|set| (set, set.matches(&words)))
        .filter(|(_, matches)| *matches > 0)
        .max_by(|(a, a_matches), (b, b_matches)| {
            (a.weight * a_matches)
                .cmp(&(b.weight * b_matches))
                // Lower priority index wins ties
                .then_with(|| b.category.priority().cmp(&a.category.priority()))
        });

    match best {
        Some((set, matches)) => ClassificationResult::new(
            set.category,
            (0.5 + 0.15 * (matches - 1) as f32).min(1.0),
            ClassificationSource::Fallback,
        ),
        None => ClassificationResult::new(QueryCategory::OffTopic, 0.0, ClassificationSource::Fallback),
    }
}

/// Strictly decode `{"category": ..., "confidence": ...}` from an LLM reply
pub fn parse_classification(raw: &str) -> Option<ClassificationResult> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    let value: serde_json::Value = serde_json::from_str(&raw[start..=end]).ok()?;
    let category = QueryCategory::from_label(value.get("category")?.as_str()?)?;
    let confidence = value.get("confidence")?.as_f64()?;
    if !(0.0..=1.0).contains(&confidence) {
        return None;
    }

    Some(ClassificationResult::new(
        category,
        confidence as f32,
        ClassificationSource::Llm,
    ))
}

/// Classifier configuration
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub options: CompletionOptions,
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            options: CompletionOptions::new(0.1, 100),
            timeout: Duration::from_secs(sommelier_config::constants::timeouts::LLM_SECS),
        }
    }
}

impl From<&Settings> for ClassifierConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            options: settings.generation.classification,
            timeout: Duration::from_secs(settings.llm.timeout_seconds),
        }
    }
}

/// LLM classifier with keyword fallback
pub struct QueryClassifier {
    llm: Arc<dyn LanguageModel>,
    config: ClassifierConfig,
}

impl QueryClassifier {
    pub fn new(llm: Arc<dyn LanguageModel>, config: ClassifierConfig) -> Self {
        Self { llm, config }
    }

    pub async fn classify(&self, query: &str) -> ClassificationResult {
        let messages = [
            Message::system(CLASSIFICATION_PROMPT),
            Message::user(format!("Consulta: \"{}\"", query)),
        ];

        let reply =
            tokio::time::timeout(self.config.timeout, self.llm.complete(&messages, &self.config.options))
                .await;

        let parsed = match reply {
            Ok(Ok(text)) => {
                let parsed = parse_classification(&text);
                if parsed.is_none() {
                    tracing::warn!(reply = %text, "Unparseable classification reply");
                }
                parsed
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Classification call failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Classification timed out"
                );
                None
            }
        };

        match parsed {
            Some(result) => result,
            None => {
                metrics::counter!("sommelier_fallbacks_total", "stage" => "classification")
                    .increment(1);
                let result = fallback_classify(query);
                tracing::debug!(category = %result.category, confidence = result.confidence, "Fallback classification");
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_keywords_is_off_topic() {
        let result = fallback_classify("¿Cuál es la capital de Francia?");
        assert_eq!(result.category, QueryCategory::OffTopic);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.source, ClassificationSource::Fallback);
    }

    #[test]
    fn test_search_keywords() {
        let result = fallback_classify("vino tinto para carne");
        assert_eq!(result.category, QueryCategory::WineSearch);
        assert!((result.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_secret_beats_everything() {
        let result = fallback_classify("secreto");
        assert_eq!(result.category, QueryCategory::SecretMessage);
        assert!(result.confidence > 0.0);

        // 4 (secret) vs 3 (search)
        assert_eq!(
            fallback_classify("vino para Pedro").category,
            QueryCategory::SecretMessage
        );
    }

    #[test]
    fn test_whole_word_matching() {
        // "vic" must not fire inside "servicio"
        let result = fallback_classify("el servicio fue lento");
        assert_ne!(result.category, QueryCategory::SecretMessage);
    }

    #[test]
    fn test_multi_word_greeting() {
        let result = fallback_classify("Buenos días");
        assert_eq!(result.category, QueryCategory::Greeting);
    }

    #[test]
    fn test_tie_break_by_priority() {
        // greeting x3 (3) vs search x1 (3): search has priority
        let result = fallback_classify("hola hey saludos vino");
        assert_eq!(result.category, QueryCategory::WineSearch);
    }

    #[test]
    fn test_confidence_capped() {
        let result = fallback_classify("recomienda vino tinto blanco rosado cava espumoso para cena");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_parse_valid_reply() {
        let result =
            parse_classification("Claro: {\"category\": \"WINE_THEORY\", \"confidence\": 0.92}")
                .unwrap();
        assert_eq!(result.category, QueryCategory::WineTheory);
        assert_eq!(result.source, ClassificationSource::Llm);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(parse_classification("{\"category\": \"MAYBE_WINE\", \"confidence\": 0.9}").is_none());
        assert!(parse_classification("{\"category\": \"GREETING\", \"confidence\": 1.5}").is_none());
        assert!(parse_classification("{\"category\": \"GREETING\", \"confidence\": \"alta\"}").is_none());
        assert!(parse_classification("{\"category\": \"GREETING\"}").is_none());
        assert!(parse_classification("GREETING").is_none());
    }
}
