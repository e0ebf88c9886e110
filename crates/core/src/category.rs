//! Query categories and the category strategy table

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed set of query categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryCategory {
    /// Looking for a wine recommendation or pairing
    WineSearch,
    /// Asking about oenology, regions, grapes, tasting
    WineTheory,
    Greeting,
    /// Hidden easter-egg trigger
    SecretMessage,
    OffTopic,
}

impl QueryCategory {
    /// All categories in tie-break priority order (highest first)
    pub const PRIORITY: [QueryCategory; 5] = [
        QueryCategory::SecretMessage,
        QueryCategory::WineSearch,
        QueryCategory::WineTheory,
        QueryCategory::Greeting,
        QueryCategory::OffTopic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::WineSearch => "WINE_SEARCH",
            QueryCategory::WineTheory => "WINE_THEORY",
            QueryCategory::Greeting => "GREETING",
            QueryCategory::SecretMessage => "SECRET_MESSAGE",
            QueryCategory::OffTopic => "OFF_TOPIC",
        }
    }

    /// Parse an exact category label. Unknown labels are rejected, not coerced.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "WINE_SEARCH" => Some(QueryCategory::WineSearch),
            "WINE_THEORY" => Some(QueryCategory::WineTheory),
            "GREETING" => Some(QueryCategory::Greeting),
            "SECRET_MESSAGE" => Some(QueryCategory::SecretMessage),
            "OFF_TOPIC" => Some(QueryCategory::OffTopic),
            _ => None,
        }
    }

    /// Lower value wins ties
    pub fn priority(&self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|c| c == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    /// Response strategy for this category
    pub fn strategy(&self) -> &'static CategoryStrategy {
        STRATEGIES.get(self).unwrap_or(&OFF_TOPIC_STRATEGY)
    }

    pub fn route(&self) -> Route {
        self.strategy().route
    }
}

impl std::fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline branch taken after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Canned or lightly generated response, no retrieval
    Direct,
    /// Query expansion followed by multi-query retrieval
    ExpandedRetrieval,
}

/// Which configured sampling profile a category generates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationProfile {
    Search,
    Theory,
    Conversational,
}

/// How a category is answered
#[derive(Debug, Clone)]
pub struct CategoryStrategy {
    pub route: Route,
    pub profile: GenerationProfile,
    /// System framing used when the answer is generated
    pub system_framing: &'static str,
    /// Fixed answer for direct categories
    pub canned_response: Option<&'static str>,
}

const SEARCH_FRAMING: &str = "Eres Sumy, un sumiller experto y apasionado. Tu objetivo es \
proporcionar recomendaciones de vinos detalladas y útiles.\n\n\
ESTILO DE RESPUESTA:\n\
- Sé profesional pero cercano y entusiasta\n\
- Recomienda entre 1 y 3 vinos de las fuentes proporcionadas\n\
- Indica nombre, precio, región y características de cada vino\n\
- Explica por qué recomiendas cada vino para esta consulta\n\
- Añade consejos de servicio o maridaje cuando sea apropiado";

const THEORY_FRAMING: &str = "Eres Sumy, un sumiller experto con amplio conocimiento en \
enología y viticultura. Tu objetivo es educar y compartir conocimiento de manera clara.\n\n\
ESTILO DE RESPUESTA:\n\
- Explica el concepto principal y sus detalles técnicos relevantes\n\
- Usa ejemplos prácticos de cata o servicio\n\
- Sé didáctico pero no condescendiente";

const CONVERSATIONAL_FRAMING: &str =
    "Eres Sumy, un sumiller cercano. Responde de forma breve y amable en español.";

const GREETING_RESPONSE: &str = "¡Hola! Soy Sumy, tu sumiller virtual 🍷. Puedo recomendarte \
vinos, sugerir maridajes o explicarte cualquier duda sobre el mundo del vino. ¿Qué te apetece hoy?";

const SECRET_RESPONSE: &str = "🤫 Mensaje secreto detectado... Pedro y Vicky te mandan un \
brindis muy especial. ¡Salud! 🥂";

const OFF_TOPIC_RESPONSE: &str = "Como sumiller profesional, me especializo en el mundo del \
vino. Puedo ayudarte con recomendaciones de vinos, maridajes, técnicas de cata, información \
sobre regiones vitivinícolas, y mucho más. ¿En qué aspecto del vino te gustaría que te asesore?";

static OFF_TOPIC_STRATEGY: CategoryStrategy = CategoryStrategy {
    route: Route::Direct,
    profile: GenerationProfile::Conversational,
    system_framing: CONVERSATIONAL_FRAMING,
    canned_response: Some(OFF_TOPIC_RESPONSE),
};

static STRATEGIES: Lazy<HashMap<QueryCategory, CategoryStrategy>> = Lazy::new(|| {
    use QueryCategory::*;
    let mut map = HashMap::new();
    map.insert(
        WineSearch,
        CategoryStrategy {
            route: Route::ExpandedRetrieval,
            profile: GenerationProfile::Search,
            system_framing: SEARCH_FRAMING,
            canned_response: None,
        },
    );
    map.insert(
        WineTheory,
        CategoryStrategy {
            route: Route::ExpandedRetrieval,
            profile: GenerationProfile::Theory,
            system_framing: THEORY_FRAMING,
            canned_response: None,
        },
    );
    map.insert(
        Greeting,
        CategoryStrategy {
            route: Route::Direct,
            profile: GenerationProfile::Conversational,
            system_framing: CONVERSATIONAL_FRAMING,
            canned_response: Some(GREETING_RESPONSE),
        },
    );
    map.insert(
        SecretMessage,
        CategoryStrategy {
            route: Route::Direct,
            profile: GenerationProfile::Conversational,
            system_framing: CONVERSATIONAL_FRAMING,
            canned_response: Some(SECRET_RESPONSE),
        },
    );
    map.insert(OffTopic, OFF_TOPIC_STRATEGY.clone());
    map
});

/// Who produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationSource {
    Llm,
    Fallback,
}

/// Result of classifying one query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: QueryCategory,
    /// Confidence in [0, 1]
    pub confidence: f32,
    pub source: ClassificationSource,
}

impl ClassificationResult {
    pub fn new(category: QueryCategory, confidence: f32, source: ClassificationSource) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    pub fn route(&self) -> Route {
        self.category.route()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for category in QueryCategory::PRIORITY {
            assert_eq!(QueryCategory::from_label(category.as_str()), Some(category));
        }
        assert_eq!(QueryCategory::from_label("MAYBE_WINE"), None);
        assert_eq!(QueryCategory::from_label("wine_search"), None);
    }

    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_string(&QueryCategory::SecretMessage).unwrap();
        assert_eq!(json, "\"SECRET_MESSAGE\"");
    }

    #[test]
    fn test_priority_order() {
        assert!(QueryCategory::SecretMessage.priority() < QueryCategory::WineSearch.priority());
        assert!(QueryCategory::WineSearch.priority() < QueryCategory::WineTheory.priority());
        assert!(QueryCategory::Greeting.priority() < QueryCategory::OffTopic.priority());
    }

    #[test]
    fn test_strategy_table_routes() {
        assert_eq!(QueryCategory::WineSearch.route(), Route::ExpandedRetrieval);
        assert_eq!(QueryCategory::WineTheory.route(), Route::ExpandedRetrieval);
        for direct in [
            QueryCategory::Greeting,
            QueryCategory::SecretMessage,
            QueryCategory::OffTopic,
        ] {
            assert_eq!(direct.route(), Route::Direct);
            assert!(direct.strategy().canned_response.is_some());
        }
        assert_eq!(
            QueryCategory::WineTheory.strategy().profile,
            GenerationProfile::Theory
        );
    }

    #[test]
    fn test_confidence_clamped() {
        let result =
            ClassificationResult::new(QueryCategory::Greeting, 1.4, ClassificationSource::Llm);
        assert_eq!(result.confidence, 1.0);
    }
}
