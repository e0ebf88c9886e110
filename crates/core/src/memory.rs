//! Conversation memory types
//!
//! Turns and ratings are append-only records. `UserContext` is derived from
//! them on read and is never written back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::{Error, QueryCategory, Result};

/// Valid rating range (inclusive)
pub const RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

/// One completed pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTurn {
    pub user_id: String,
    pub query: String,
    pub category: QueryCategory,
    pub answer: String,
    #[serde(default)]
    pub cited_item_names: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// Explicit user rating of a wine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: String,
    pub item_name: String,
    pub value: i32,
    #[serde(default)]
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

impl Rating {
    pub fn new(
        user_id: impl Into<String>,
        item_name: impl Into<String>,
        value: i32,
        note: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            item_name: item_name.into(),
            value,
            note: note.into(),
            timestamp: Utc::now(),
        }
    }

    /// Reject out-of-range values and empty item names
    pub fn validate(&self) -> Result<()> {
        if !RATING_RANGE.contains(&self.value) {
            return Err(Error::Validation(format!(
                "rating must be between 1 and 5, got {}",
                self.value
            )));
        }
        if self.item_name.trim().is_empty() {
            return Err(Error::Validation("item name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Compact view of a past turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub query: String,
    pub answer_summary: String,
    pub timestamp: DateTime<Utc>,
}

impl TurnSummary {
    pub const MAX_SUMMARY_CHARS: usize = 160;

    pub fn from_turn(turn: &QueryTurn) -> Self {
        Self {
            query: turn.query.clone(),
            answer_summary: truncate_words(&turn.answer, Self::MAX_SUMMARY_CHARS),
            timestamp: turn.timestamp,
        }
    }
}

/// Aggregated rating of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedItem {
    pub name: String,
    pub avg_rating: f32,
    pub rating_count: u32,
}

/// Stored user preferences
///
/// Storage is schema-flexible; the keys the generator understands are
/// validated through [`Preferences::recognized`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences(pub Map<String, Value>);

/// Typed view of the recognized preference keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizedPreferences {
    pub wine_types: Vec<String>,
    pub regions: Vec<String>,
    pub budget_max: Option<f64>,
    pub avoid: Vec<String>,
    pub sweetness: Option<String>,
}

impl RecognizedPreferences {
    pub fn is_empty(&self) -> bool {
        self.wine_types.is_empty()
            && self.regions.is_empty()
            && self.budget_max.is_none()
            && self.avoid.is_empty()
            && self.sweetness.is_none()
    }
}

impl Preferences {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the recognized keys, failing on a recognized key with the wrong shape.
    /// Unrecognized keys are kept in storage and ignored here.
    pub fn recognized(&self) -> Result<RecognizedPreferences> {
        Ok(RecognizedPreferences {
            wine_types: self.string_list("wine_types")?,
            regions: self.string_list("regions")?,
            budget_max: self.budget()?,
            avoid: self.string_list("avoid")?,
            sweetness: self.string("sweetness")?,
        })
    }

    fn string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        Error::Validation(format!("preference '{}' must contain only strings", key))
                    })
                })
                .collect(),
            Some(_) => Err(Error::Validation(format!(
                "preference '{}' must be a list of strings",
                key
            ))),
        }
    }

    fn string(&self, key: &str) -> Result<Option<String>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(Error::Validation(format!(
                "preference '{}' must be a string",
                key
            ))),
        }
    }

    fn budget(&self) -> Result<Option<f64>> {
        match self.0.get("budget_max") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v >= 0.0 => Ok(Some(v)),
                _ => Err(Error::Validation(
                    "preference 'budget_max' must be a non-negative number".to_string(),
                )),
            },
            Some(_) => Err(Error::Validation(
                "preference 'budget_max' must be a number".to_string(),
            )),
        }
    }
}

/// Bounded personalization context for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    /// Most recent first
    pub recent_turns: Vec<TurnSummary>,
    pub preferences: Preferences,
    pub top_rated_items: Vec<RatedItem>,
}

impl UserContext {
    pub fn is_empty(&self) -> bool {
        self.recent_turns.is_empty() && self.preferences.is_empty() && self.top_rated_items.is_empty()
    }

    /// Compact prompt rendering. Preferences with an invalid shape are skipped.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if !self.recent_turns.is_empty() {
            out.push_str("Consultas recientes del usuario:\n");
            for turn in &self.recent_turns {
                if turn.answer_summary.is_empty() {
                    out.push_str(&format!("- {}\n", turn.query));
                } else {
                    out.push_str(&format!("- {} → {}\n", turn.query, turn.answer_summary));
                }
            }
        }

        if let Ok(prefs) = self.preferences.recognized() {
            if !prefs.is_empty() {
                out.push_str("Preferencias del usuario:\n");
                if !prefs.wine_types.is_empty() {
                    out.push_str(&format!("- Tipos de vino: {}\n", prefs.wine_types.join(", ")));
                }
                if !prefs.regions.is_empty() {
                    out.push_str(&format!("- Regiones: {}\n", prefs.regions.join(", ")));
                }
                if let Some(budget) = prefs.budget_max {
                    out.push_str(&format!("- Presupuesto máximo: {}€\n", budget));
                }
                if !prefs.avoid.is_empty() {
                    out.push_str(&format!("- Evitar: {}\n", prefs.avoid.join(", ")));
                }
                if let Some(sweetness) = &prefs.sweetness {
                    out.push_str(&format!("- Dulzor: {}\n", sweetness));
                }
            }
        }

        if !self.top_rated_items.is_empty() {
            out.push_str("Vinos favoritos:\n");
            for item in &self.top_rated_items {
                out.push_str(&format!(
                    "- {} ({:.1}/5, {} valoraciones)\n",
                    item.name, item.avg_rating, item.rating_count
                ));
            }
        }

        out
    }
}

/// Store-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_users: u64,
    pub total_conversations: u64,
    pub total_ratings: u64,
}

/// Truncate at a word boundary, appending "..." when cut
pub fn truncate_words(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let head = match cut.rfind(' ') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}...", head.trim_end())
}
