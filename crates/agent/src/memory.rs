//! Conversation memory
//!
//! Per-user context assembled from the memory store: the most recent turns,
//! stored preferences and the best-rated items.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use sommelier_config::MemorySettings;
use sommelier_core::{
    MemoryStats, MemoryStore, Preferences, QueryTurn, RatedItem, Rating, Result, TurnSummary,
    UserContext,
};

pub struct ConversationMemory {
    store: Arc<dyn MemoryStore>,
    config: MemorySettings,
}

impl ConversationMemory {
    pub fn new(store: Arc<dyn MemoryStore>, config: MemorySettings) -> Self {
        Self { store, config }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Build the user's context; an unknown user yields an empty context
    pub async fn read_context(&self, user_id: &str) -> Result<UserContext> {
        let turns = self
            .store
            .recent_turns(user_id, self.config.recent_turns)
            .await?;
        let preferences = self.store.preferences(user_id).await?;
        let ratings = self.store.ratings(user_id).await?;

        Ok(UserContext {
            recent_turns: turns
                .iter()
                .take(self.config.recent_turns)
                .map(TurnSummary::from_turn)
                .collect(),
            preferences,
            top_rated_items: top_rated(&ratings, self.config.top_rated_items),
        })
    }

    pub async fn append_turn(&self, turn: QueryTurn) -> Result<()> {
        self.store.append_turn(turn).await
    }

    /// Store a rating after checking its value is within 1..=5
    pub async fn append_rating(&self, rating: Rating) -> Result<()> {
        rating.validate()?;
        tracing::debug!(user_id = %rating.user_id, item = %rating.item_name, value = rating.value, "Storing rating");
        self.store.append_rating(rating).await
    }

    /// Replace the user's preferences; recognized keys must be well-formed
    pub async fn upsert_preferences(&self, user_id: &str, preferences: Preferences) -> Result<()> {
        preferences.recognized()?;
        self.store.upsert_preferences(user_id, preferences).await
    }

    pub async fn stats(&self) -> Result<MemoryStats> {
        self.store.stats().await
    }
}

/// Items ordered by average rating, then count, then name
pub fn top_rated(ratings: &[Rating], limit: usize) -> Vec<RatedItem> {
    let mut totals: HashMap<&str, (i64, u32)> = HashMap::new();
    for rating in ratings {
        let entry = totals.entry(rating.item_name.as_str()).or_insert((0, 0));
        entry.0 += i64::from(rating.value);
        entry.1 += 1;
    }

    let mut items: Vec<RatedItem> = totals
        .into_iter()
        .map(|(name, (sum, count))| RatedItem {
            name: name.to_string(),
            avg_rating: sum as f32 / count as f32,
            rating_count: count,
        })
        .collect();

    items.sort_by(|a, b| {
        b.avg_rating
            .partial_cmp(&a.avg_rating)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.rating_count.cmp(&a.rating_count))
            .then_with(|| a.name.cmp(&b.name))
    });
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(item: &str, value: i32) -> Rating {
        Rating::new("u1", item, value, "")
    }

    #[test]
    fn test_top_rated_ordering() {
        let ratings = vec![
            rating("Cava Brut Nature", 4),
            rating("Albariño Rías Baixas", 5),
            rating("Rioja Gran Reserva", 5),
            rating("Rioja Gran Reserva", 5),
            rating("Ribera del Duero Reserva", 3),
        ];
        let top = top_rated(&ratings, 3);
        let names: Vec<_> = top.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Rioja Gran Reserva", "Albariño Rías Baixas", "Cava Brut Nature"]
        );
        assert_eq!(top[0].rating_count, 2);
        assert_eq!(top[0].avg_rating, 5.0);
    }

    #[test]
    fn test_top_rated_empty() {
        assert!(top_rated(&[], 3).is_empty());
    }
}
