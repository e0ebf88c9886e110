use async_trait::async_trait;

use crate::{MemoryStats, Preferences, QueryTurn, Rating, Result};

/// Durable per-user conversation store
///
/// Storage is partitioned by `user_id`; no method reads across users.
/// Unavailability is `Error::StoreUnavailable`, out-of-range ratings are
/// `Error::Validation`.
#[async_trait]
pub trait MemoryStore: Send + Sync + 'static {
    /// Append a completed turn
    async fn append_turn(&self, turn: QueryTurn) -> Result<()>;

    /// Append a rating. Must reject values outside 1..=5 without writing.
    async fn append_rating(&self, rating: Rating) -> Result<()>;

    /// Replace the user's preferences
    async fn upsert_preferences(&self, user_id: &str, preferences: Preferences) -> Result<()>;

    /// Most recent turns first, at most `limit`
    async fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<QueryTurn>>;

    /// All ratings of the user
    async fn ratings(&self, user_id: &str) -> Result<Vec<Rating>>;

    /// Stored preferences (empty when none)
    async fn preferences(&self, user_id: &str) -> Result<Preferences>;

    /// Store-wide counters
    async fn stats(&self) -> Result<MemoryStats>;

    /// Backend name for health reporting
    fn backend(&self) -> &'static str;
}
