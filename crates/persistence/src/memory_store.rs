//! In-process memory store
//!
//! One `DashMap` entry per user. Writes for the same user serialize on the
//! shard lock; different users never contend.

use async_trait::async_trait;
use dashmap::DashMap;

use sommelier_core::{MemoryStats, MemoryStore, Preferences, QueryTurn, Rating, Result};

#[derive(Debug, Default)]
struct UserPartition {
    /// Oldest first
    turns: Vec<QueryTurn>,
    ratings: Vec<Rating>,
    preferences: Preferences,
}

/// `MemoryStore` held in process memory
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    users: DashMap<String, UserPartition>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn append_turn(&self, turn: QueryTurn) -> Result<()> {
        self.users
            .entry(turn.user_id.clone())
            .or_default()
            .turns
            .push(turn);
        Ok(())
    }

    async fn append_rating(&self, rating: Rating) -> Result<()> {
        rating.validate()?;
        self.users
            .entry(rating.user_id.clone())
            .or_default()
            .ratings
            .push(rating);
        Ok(())
    }

    async fn upsert_preferences(&self, user_id: &str, preferences: Preferences) -> Result<()> {
        self.users.entry(user_id.to_string()).or_default().preferences = preferences;
        Ok(())
    }

    async fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<QueryTurn>> {
        Ok(self
            .users
            .get(user_id)
            .map(|p| p.turns.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn ratings(&self, user_id: &str) -> Result<Vec<Rating>> {
        Ok(self
            .users
            .get(user_id)
            .map(|p| p.ratings.clone())
            .unwrap_or_default())
    }

    async fn preferences(&self, user_id: &str) -> Result<Preferences> {
        Ok(self
            .users
            .get(user_id)
            .map(|p| p.preferences.clone())
            .unwrap_or_default())
    }

    async fn stats(&self) -> Result<MemoryStats> {
        let mut stats = MemoryStats {
            total_users: self.users.len() as u64,
            ..Default::default()
        };
        for entry in self.users.iter() {
            stats.total_conversations += entry.turns.len() as u64;
            stats.total_ratings += entry.ratings.len() as u64;
        }
        Ok(stats)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sommelier_core::QueryCategory;

    fn turn(user: &str, query: &str, minutes_ago: i64) -> QueryTurn {
        QueryTurn {
            user_id: user.to_string(),
            query: query.to_string(),
            category: QueryCategory::WineSearch,
            answer: format!("respuesta a {}", query),
            cited_item_names: Default::default(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            session_id: "s1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recent_turns_most_recent_first() {
        let store = InMemoryMemoryStore::new();
        for (i, q) in ["uno", "dos", "tres"].iter().enumerate() {
            store.append_turn(turn("u1", q, 10 - i as i64)).await.unwrap();
        }

        let recent = store.recent_turns("u1", 2).await.unwrap();
        let queries: Vec<_> = recent.iter().map(|t| t.query.as_str()).collect();
        assert_eq!(queries, vec!["tres", "dos"]);
    }

    #[tokio::test]
    async fn test_invalid_rating_not_persisted() {
        let store = InMemoryMemoryStore::new();
        let err = store
            .append_rating(Rating::new("u1", "Cava Brut Nature", 6, ""))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.ratings("u1").await.unwrap().is_empty());
        assert_eq!(store.stats().await.unwrap().total_ratings, 0);
    }

    #[tokio::test]
    async fn test_users_are_partitioned() {
        let store = InMemoryMemoryStore::new();
        store.append_turn(turn("u1", "rioja", 1)).await.unwrap();
        store
            .append_rating(Rating::new("u2", "Rioja Gran Reserva", 5, "top"))
            .await
            .unwrap();

        assert!(store.recent_turns("u2", 5).await.unwrap().is_empty());
        assert!(store.ratings("u1").await.unwrap().is_empty());
        assert!(store.preferences("nobody").await.unwrap().is_empty());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_conversations, 1);
        assert_eq!(stats.total_ratings, 1);
    }

    #[tokio::test]
    async fn test_preferences_replaced() {
        let store = InMemoryMemoryStore::new();
        let mut first = serde_json::Map::new();
        first.insert("regions".into(), "Rioja".into());
        store.upsert_preferences("u1", Preferences::new(first)).await.unwrap();

        let mut second = serde_json::Map::new();
        second.insert("sweetness".into(), "seco".into());
        store.upsert_preferences("u1", Preferences::new(second.clone())).await.unwrap();

        assert_eq!(store.preferences("u1").await.unwrap(), Preferences::new(second));
    }
}
