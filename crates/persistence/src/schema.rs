//! ScyllaDB schema creation
//!
//! All tables are partitioned by `user_id`. Timestamps are epoch milliseconds.

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::SchemaError(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    let turns_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.conversation_turns (
            user_id TEXT,
            created_at BIGINT,
            turn_id UUID,
            session_id TEXT,
            query TEXT,
            category TEXT,
            answer TEXT,
            cited_items LIST<TEXT>,
            PRIMARY KEY ((user_id), created_at, turn_id)
        ) WITH CLUSTERING ORDER BY (created_at DESC, turn_id ASC)
    "#,
        keyspace
    );

    session.query_unpaged(turns_table, &[]).await.map_err(|e| {
        PersistenceError::SchemaError(format!("Failed to create conversation_turns table: {}", e))
    })?;

    let ratings_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.wine_ratings (
            user_id TEXT,
            created_at BIGINT,
            rating_id UUID,
            wine_name TEXT,
            rating INT,
            notes TEXT,
            PRIMARY KEY ((user_id), created_at, rating_id)
        ) WITH CLUSTERING ORDER BY (created_at DESC, rating_id ASC)
    "#,
        keyspace
    );

    session.query_unpaged(ratings_table, &[]).await.map_err(|e| {
        PersistenceError::SchemaError(format!("Failed to create wine_ratings table: {}", e))
    })?;

    let preferences_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.user_preferences (
            user_id TEXT,
            preferences_json TEXT,
            updated_at BIGINT,
            PRIMARY KEY (user_id)
        )
    "#,
        keyspace
    );

    session.query_unpaged(preferences_table, &[]).await.map_err(|e| {
        PersistenceError::SchemaError(format!("Failed to create user_preferences table: {}", e))
    })?;

    Ok(())
}
