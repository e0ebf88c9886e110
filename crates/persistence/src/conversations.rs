//! ScyllaDB-backed memory store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

use sommelier_core::{
    Error, MemoryStats, MemoryStore, Preferences, QueryCategory, QueryTurn, Rating, Result,
};

use crate::{PersistenceError, ScyllaClient};

/// `MemoryStore` over the `conversation_turns`, `wine_ratings` and
/// `user_preferences` tables
#[derive(Clone)]
pub struct ScyllaMemoryStore {
    client: ScyllaClient,
}

impl ScyllaMemoryStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    async fn count(&self, table: &str) -> std::result::Result<u64, PersistenceError> {
        let query = format!("SELECT COUNT(*) FROM {}.{}", self.client.keyspace(), table);
        let result = self.client.session().query_unpaged(query, &[]).await?;

        if let Some(row) = result.rows.and_then(|rows| rows.into_iter().next()) {
            let (count,): (i64,) = row
                .into_typed()
                .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
            return Ok(count.max(0) as u64);
        }
        Ok(0)
    }

    async fn user_ids(&self, table: &str) -> std::result::Result<Vec<String>, PersistenceError> {
        let query = format!("SELECT DISTINCT user_id FROM {}.{}", self.client.keyspace(), table);
        let result = self.client.session().query_unpaged(query, &[]).await?;

        let mut ids = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let (user_id,): (String,) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                ids.push(user_id);
            }
        }
        Ok(ids)
    }

    fn row_to_turn(
        user_id: &str,
        row: scylla::frame::response::result::Row,
    ) -> std::result::Result<QueryTurn, PersistenceError> {
        let (created_at, session_id, query, category, answer, cited_items): (
            i64,
            Option<String>,
            String,
            String,
            Option<String>,
            Option<Vec<String>>,
        ) = row
            .into_typed()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        let category = QueryCategory::from_label(&category).ok_or_else(|| {
            PersistenceError::InvalidData(format!("unknown category '{}'", category))
        })?;

        Ok(QueryTurn {
            user_id: user_id.to_string(),
            query,
            category,
            answer: answer.unwrap_or_default(),
            cited_item_names: cited_items.unwrap_or_default().into_iter().collect::<BTreeSet<_>>(),
            timestamp: from_millis(created_at),
            session_id: session_id.unwrap_or_default(),
        })
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

#[async_trait]
impl MemoryStore for ScyllaMemoryStore {
    async fn append_turn(&self, turn: QueryTurn) -> Result<()> {
        let query = format!(
            "INSERT INTO {}.conversation_turns (
                user_id, created_at, turn_id, session_id, query, category, answer, cited_items
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        let cited: Vec<String> = turn.cited_item_names.iter().cloned().collect();
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &turn.user_id,
                    turn.timestamp.timestamp_millis(),
                    Uuid::new_v4(),
                    &turn.session_id,
                    &turn.query,
                    turn.category.as_str(),
                    &turn.answer,
                    cited,
                ),
            )
            .await
            .map_err(PersistenceError::from)?;

        tracing::debug!(user_id = %turn.user_id, category = %turn.category, "Turn persisted");
        Ok(())
    }

    async fn append_rating(&self, rating: Rating) -> Result<()> {
        rating.validate()?;

        let query = format!(
            "INSERT INTO {}.wine_ratings (
                user_id, created_at, rating_id, wine_name, rating, notes
            ) VALUES (?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &rating.user_id,
                    rating.timestamp.timestamp_millis(),
                    Uuid::new_v4(),
                    &rating.item_name,
                    rating.value,
                    &rating.note,
                ),
            )
            .await
            .map_err(PersistenceError::from)?;

        tracing::info!(user_id = %rating.user_id, wine = %rating.item_name, rating = rating.value, "Rating persisted");
        Ok(())
    }

    async fn upsert_preferences(&self, user_id: &str, preferences: Preferences) -> Result<()> {
        let query = format!(
            "INSERT INTO {}.user_preferences (user_id, preferences_json, updated_at) VALUES (?, ?, ?)",
            self.client.keyspace()
        );
        let json = serde_json::to_string(&preferences).map_err(PersistenceError::from)?;

        self.client
            .session()
            .query_unpaged(query, (user_id, json, Utc::now().timestamp_millis()))
            .await
            .map_err(PersistenceError::from)?;

        Ok(())
    }

    async fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<QueryTurn>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT created_at, session_id, query, category, answer, cited_items
             FROM {}.conversation_turns WHERE user_id = ? LIMIT ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (user_id, limit.min(i32::MAX as usize) as i32))
            .await
            .map_err(PersistenceError::from)?;

        let mut turns = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                turns.push(Self::row_to_turn(user_id, row)?);
            }
        }
        Ok(turns)
    }

    async fn ratings(&self, user_id: &str) -> Result<Vec<Rating>> {
        let query = format!(
            "SELECT created_at, wine_name, rating, notes FROM {}.wine_ratings WHERE user_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (user_id,))
            .await
            .map_err(PersistenceError::from)?;

        let mut ratings = Vec::new();
        if let Some(rows) = result.rows {
            for row in rows {
                let (created_at, wine_name, value, notes): (i64, String, i32, Option<String>) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                ratings.push(Rating {
                    user_id: user_id.to_string(),
                    item_name: wine_name,
                    value,
                    note: notes.unwrap_or_default(),
                    timestamp: from_millis(created_at),
                });
            }
        }
        Ok(ratings)
    }

    async fn preferences(&self, user_id: &str) -> Result<Preferences> {
        let query = format!(
            "SELECT preferences_json FROM {}.user_preferences WHERE user_id = ?",
            self.client.keyspace()
        );

        let result = self
            .client
            .session()
            .query_unpaged(query, (user_id,))
            .await
            .map_err(PersistenceError::from)?;

        if let Some(row) = result.rows.and_then(|rows| rows.into_iter().next()) {
            let (json,): (Option<String>,) = row
                .into_typed()
                .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
            if let Some(json) = json {
                return serde_json::from_str(&json)
                    .map_err(|e| Error::from(PersistenceError::from(e)));
            }
        }
        Ok(Preferences::default())
    }

    async fn stats(&self) -> Result<MemoryStats> {
        let mut users = HashSet::new();
        for table in ["conversation_turns", "wine_ratings", "user_preferences"] {
            users.extend(self.user_ids(table).await?);
        }

        Ok(MemoryStats {
            total_users: users.len() as u64,
            total_conversations: self.count("conversation_turns").await?,
            total_ratings: self.count("wine_ratings").await?,
        })
    }

    fn backend(&self) -> &'static str {
        "scylla"
    }
}
