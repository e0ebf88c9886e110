//! Centralized constants for the sommelier service
//!
//! Single source of truth for default values shared between the settings
//! defaults and the component `Default` impls.

/// Service endpoints (defaults for local development)
pub mod endpoints {
    /// OpenAI-compatible chat completions base URL
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";

    /// Ollama endpoint (LLM and embeddings)
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    /// Qdrant vector store endpoint
    pub const QDRANT_DEFAULT: &str = "http://127.0.0.1:6334";
}

/// Model defaults
pub mod models {
    pub const OPENAI_CHAT: &str = "gpt-4o-mini";
    pub const OLLAMA_CHAT: &str = "qwen2.5:7b";
    pub const OLLAMA_EMBEDDING: &str = "qwen3-embedding:0.6b";
    pub const EMBEDDING_DIM: usize = 1024;
}

/// Retrieval defaults
pub mod rag {
    /// Final number of chunks returned by the retriever
    pub const TOP_K: usize = 5;

    /// Maximum number of query expansions (original included)
    pub const MAX_EXPANSIONS: usize = 4;

    /// Characters of content used for the dedup fingerprint
    pub const FINGERPRINT_LEN: usize = 100;

    /// Chunks included in the generation prompt
    pub const PROMPT_CHUNKS: usize = 3;

    pub const COLLECTION: &str = "sommelier_wines";
}

/// Conversation memory bounds
pub mod memory {
    pub const RECENT_TURNS: usize = 5;
    pub const TOP_RATED_ITEMS: usize = 3;
}

/// Timeouts (seconds)
pub mod timeouts {
    pub const LLM_SECS: u64 = 30;
    pub const EMBEDDING_SECS: u64 = 10;
    pub const REQUEST_SECS: u64 = 60;
}

/// Persistence defaults
pub mod persistence {
    pub const SCYLLA_HOST: &str = "127.0.0.1:9042";
    pub const KEYSPACE: &str = "sommelier";
}

/// Default user when the caller does not identify itself
pub const DEFAULT_USER_ID: &str = "default_user";
