//! LLM query expansion
//!
//! Produces alternate phrasings of a query to widen recall. The reply is
//! decoded strictly first (JSON array or `{"queries": [...]}`), then
//! heuristically as one variant per line. Any failure degrades to the
//! original query alone.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sommelier_config::Settings;
use sommelier_core::{CompletionOptions, LanguageModel, Message, UserContext};

const EXPANSION_SYSTEM_PROMPT: &str = "Eres un asistente que reformula consultas sobre vinos \
para mejorar una búsqueda semántica. Genera variantes con sinónimos, términos de cata, \
variedades de uva o regiones relacionadas. Responde SOLO con un array JSON de cadenas.";

/// Expander configuration
#[derive(Debug, Clone)]
pub struct ExpanderConfig {
    /// Maximum expansions returned, original query included
    pub max_expansions: usize,
    pub options: CompletionOptions,
    pub timeout: Duration,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        use sommelier_config::constants::{rag, timeouts};
        Self {
            max_expansions: rag::MAX_EXPANSIONS,
            options: CompletionOptions::new(0.5, 300),
            timeout: Duration::from_secs(timeouts::LLM_SECS),
        }
    }
}

impl From<&Settings> for ExpanderConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_expansions: settings.rag.max_expansions,
            options: settings.generation.expansion,
            timeout: Duration::from_secs(settings.llm.timeout_seconds),
        }
    }
}

/// LLM-backed query expander
pub struct QueryExpander {
    llm: Arc<dyn LanguageModel>,
    config: ExpanderConfig,
}

impl QueryExpander {
    pub fn new(llm: Arc<dyn LanguageModel>, config: ExpanderConfig) -> Self {
        Self { llm, config }
    }

    /// Expand a query into `1..=max_expansions` phrasings, the original first
    pub async fn expand(&self, query: &str, context: Option<&UserContext>) -> Vec<String> {
        let max = self.config.max_expansions.max(1);
        if max == 1 {
            return vec![query.to_string()];
        }

        let messages = self.build_messages(query, context, max - 1);
        let reply =
            tokio::time::timeout(self.config.timeout, self.llm.complete(&messages, &self.config.options))
                .await;

        let variants = match reply {
            Ok(Ok(text)) => parse_expansions(&text),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Query expansion call failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Query expansion timed out"
                );
                None
            }
        };

        match variants {
            Some(variants) => {
                let expansions = assemble(query, variants, max);
                tracing::debug!(count = expansions.len(), "Query expanded");
                expansions
            }
            None => {
                metrics::counter!("sommelier_fallbacks_total", "stage" => "expansion").increment(1);
                vec![query.to_string()]
            }
        }
    }

    fn build_messages(&self, query: &str, context: Option<&UserContext>, variants: usize) -> Vec<Message> {
        let mut prompt = format!(
            "Genera {} reformulaciones distintas de la siguiente consulta.\n\nConsulta: {}\n",
            variants, query
        );

        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            prompt.push_str("\nTen en cuenta el contexto del usuario:\n");
            prompt.push_str(&ctx.render());
        }

        prompt.push_str("\nFormato: [\"variante 1\", \"variante 2\"]");

        vec![Message::system(EXPANSION_SYSTEM_PROMPT), Message::user(prompt)]
    }
}

/// Decode an expansion reply; `None` when nothing usable was produced
pub fn parse_expansions(raw: &str) -> Option<Vec<String>> {
    let text = strip_code_fence(raw.trim());
    if text.is_empty() {
        return None;
    }

    let variants = match structured_span(text).and_then(parse_structured) {
        Some(variants) => variants,
        None if text.starts_with('[') || text.starts_with('{') => return None,
        None => text.lines().filter_map(clean_line).collect(),
    };

    if variants.is_empty() {
        None
    } else {
        Some(variants)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Outermost `[...]` or `{...}` span, whichever opens first
fn structured_span(text: &str) -> Option<&str> {
    let (open, close) = match (text.find('['), text.find('{')) {
        (Some(list), Some(object)) if object < list => ('{', '}'),
        (Some(_), _) => ('[', ']'),
        (None, Some(_)) => ('{', '}'),
        (None, None) => return None,
    };
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn parse_structured(text: &str) -> Option<Vec<String>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Reply {
        List(Vec<String>),
        Object { queries: Vec<String> },
    }

    let reply: Reply = serde_json::from_str(text).ok()?;
    let items = match reply {
        Reply::List(items) => items,
        Reply::Object { queries } => queries,
    };
    Some(
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn clean_line(line: &str) -> Option<String> {
    let mut line = line.trim();

    for bullet in ["-", "*", "•"] {
        if let Some(rest) = line.strip_prefix(bullet) {
            line = rest.trim_start();
            break;
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            line = rest.trim_start();
        }
    }

    let line = line
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '«' | '»'))
        .trim();

    // Preambles ("Aquí tienes:") and leftover JSON fragments are not variants
    if line.is_empty() || line.ends_with(':') || line.contains(['[', ']', '{', '}']) {
        None
    } else {
        Some(line.to_string())
    }
}

/// Original first, case-insensitive dedup, truncated to `max`
fn assemble(query: &str, variants: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    seen.insert(query.to_lowercase());

    let mut expansions = vec![query.to_string()];
    for variant in variants {
        if expansions.len() >= max {
            break;
        }
        if seen.insert(variant.to_lowercase()) {
            expansions.push(variant);
        }
    }
    expansions
}
