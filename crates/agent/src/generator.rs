//! Answer generation
//!
//! Builds a grounded prompt from the top retrieved chunks, the category
//! framing and the user's context. Any generation failure degrades to a
//! templated answer built from the same chunks.

use std::sync::Arc;
use std::time::Duration;

use sommelier_config::{GenerationSettings, Settings};
use sommelier_core::{LanguageModel, Message, QueryCategory, RetrievedChunk, UserContext};
use sommelier_rag::{sources_from_chunks, Source};

const GROUNDING_INSTRUCTION: &str = "Responde únicamente con la información de las fuentes \
proporcionadas. No inventes precios, añadas, puntuaciones ni vinos que no aparezcan en ellas. \
Si las fuentes no bastan para responder, dilo con sinceridad.";

const NO_RESULTS_ANSWER: &str = "No encontré vinos específicos para tu consulta, pero estaré \
encantado de ayudarte. ¿Podrías contarme más detalles? Por ejemplo: ¿qué tipo de vino prefieres \
(tinto, blanco, rosado)?, ¿para qué ocasión?, ¿tienes algún presupuesto en mente?, ¿hay alguna \
región que te interese especialmente?";

const FALLBACK_HEADER: &str = "🍷 **Recomendaciones basadas en tu consulta:**\n\n";

const FALLBACK_TIP: &str = "💡 **Consejo del sumiller**: Sirve a la temperatura adecuada y \
considera decantar si es un tinto con cuerpo para potenciar sus aromas.";

/// Pairing reasons keyed on words in the query, first match wins
const PAIRING_REASONS: &[(&[&str], &str)] = &[
    (
        &["pescado", "marisco", "sushi"],
        "Ideal para pescados y mariscos por su frescura y acidez equilibrada",
    ),
    (
        &["carne", "cordero", "ternera", "asado"],
        "Perfecto para carnes por su estructura tánica y cuerpo",
    ),
    (
        &["queso", "tabla"],
        "Excelente con quesos por su equilibrio y complejidad",
    ),
];

const DEFAULT_REASON: &str = "Recomendado por su excelente relación calidad-precio y versatilidad";

/// Generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub generation: GenerationSettings,
    /// Chunks included in the prompt
    pub prompt_chunks: usize,
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            generation: GenerationSettings::default(),
            prompt_chunks: sommelier_config::constants::rag::PROMPT_CHUNKS,
            timeout: Duration::from_secs(sommelier_config::constants::timeouts::LLM_SECS),
        }
    }
}

impl From<&Settings> for GeneratorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            generation: settings.generation.clone(),
            prompt_chunks: settings.rag.prompt_chunks,
            timeout: Duration::from_secs(settings.llm.timeout_seconds),
        }
    }
}

pub struct AnswerGenerator {
    llm: Arc<dyn LanguageModel>,
    config: GeneratorConfig,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }

    /// The leading chunks an answer is grounded on
    pub fn cited<'a>(&self, chunks: &'a [RetrievedChunk]) -> &'a [RetrievedChunk] {
        &chunks[..chunks.len().min(self.config.prompt_chunks)]
    }

    /// Generate an answer; never fails, degrading to the templated answer
    pub async fn generate(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
        context: Option<&UserContext>,
        category: QueryCategory,
    ) -> String {
        if chunks.is_empty() {
            metrics::counter!("sommelier_fallbacks_total", "stage" => "generation").increment(1);
            return NO_RESULTS_ANSWER.to_string();
        }

        let strategy = category.strategy();
        let options = self.config.generation.for_profile(strategy.profile);
        let messages = self.build_messages(query, chunks, context, strategy.system_framing);

        let reply =
            tokio::time::timeout(self.config.timeout, self.llm.complete(&messages, &options)).await;

        match reply {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => {
                tracing::warn!(category = %category, "Empty generation reply");
                self.fallback(query, chunks)
            }
            Ok(Err(e)) => {
                tracing::warn!(category = %category, error = %e, "Generation call failed");
                self.fallback(query, chunks)
            }
            Err(_) => {
                tracing::warn!(
                    category = %category,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Generation timed out"
                );
                self.fallback(query, chunks)
            }
        }
    }

    fn build_messages(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
        context: Option<&UserContext>,
        framing: &str,
    ) -> Vec<Message> {
        let mut prompt = String::new();
        prompt.push_str("FUENTES:\n");
        for (i, chunk) in chunks.iter().take(self.config.prompt_chunks).enumerate() {
            prompt.push_str(&format!("[Fuente {}]\n{}\n\n", i + 1, chunk.content.trim()));
        }

        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            prompt.push_str("CONTEXTO DEL USUARIO:\n");
            prompt.push_str(&ctx.render());
            prompt.push('\n');
        }

        prompt.push_str(&format!("CONSULTA: {}\n\n", query));
        prompt.push_str(GROUNDING_INSTRUCTION);

        vec![Message::system(framing), Message::user(prompt)]
    }

    fn fallback(&self, query: &str, chunks: &[RetrievedChunk]) -> String {
        metrics::counter!("sommelier_fallbacks_total", "stage" => "generation").increment(1);
        templated_answer(query, chunks, self.config.prompt_chunks)
    }
}

/// Deterministic answer built from the top `limit` chunks
pub fn templated_answer(query: &str, chunks: &[RetrievedChunk], limit: usize) -> String {
    let top = &chunks[..chunks.len().min(limit)];
    if top.is_empty() {
        return NO_RESULTS_ANSWER.to_string();
    }

    let reason = pairing_reason(query);
    let mut answer = String::from(FALLBACK_HEADER);

    for (i, source) in sources_from_chunks(top).iter().enumerate() {
        answer.push_str(&format!("**{}. {}**\n", i + 1, source.name));
        if let Some(kind) = field(source, "wine_type") {
            answer.push_str(&format!("   • Tipo: {}\n", kind));
        }
        if let Some(region) = field(source, "region") {
            answer.push_str(&format!("   • Región: {}\n", region));
        }
        if let Some(price) = field(source, "price") {
            answer.push_str(&format!("   • Precio: {}€\n", price));
        }
        if let Some(description) = field(source, "description") {
            answer.push_str(&format!("   • Características: {}\n", description));
        }
        answer.push_str(&format!("   • ¿Por qué te lo recomiendo?: {}\n\n", reason));
    }

    answer.push_str(FALLBACK_TIP);
    answer
}

fn field(source: &Source, key: &str) -> Option<String> {
    match source.metadata.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn pairing_reason(query: &str) -> &'static str {
    let query = query.to_lowercase();
    PAIRING_REASONS
        .iter()
        .find(|(words, _)| words.iter().any(|w| query.contains(w)))
        .map(|(_, reason)| *reason)
        .unwrap_or(DEFAULT_REASON)
}
