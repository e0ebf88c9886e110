//! Conversation memory persistence
//!
//! Provides `MemoryStore` implementations for:
//! - In-process storage partitioned per user (`DashMap`)
//! - ScyllaDB tables partitioned by `user_id`, clustered by time

pub mod client;
pub mod conversations;
pub mod error;
pub mod memory_store;
pub mod schema;

pub use client::{ScyllaClient, ScyllaConfig};
pub use conversations::ScyllaMemoryStore;
pub use error::PersistenceError;
pub use memory_store::InMemoryMemoryStore;

/// Connect to ScyllaDB, ensure the schema and build the durable store
pub async fn init(config: ScyllaConfig) -> Result<ScyllaMemoryStore, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;
    Ok(ScyllaMemoryStore::new(client))
}
