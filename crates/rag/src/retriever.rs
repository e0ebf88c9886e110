//! Multi-query retriever
//!
//! Embeds each expansion, queries the vector index concurrently, then merges
//! the per-expansion candidate lists with [`dedup_and_rank`].

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sommelier_config::Settings;
use sommelier_core::{EmbeddingProvider, Error, Result, RetrievedChunk, VectorIndex};

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Default result count
    pub top_k: usize,
    /// Characters of content forming the dedup fingerprint
    pub fingerprint_len: usize,
    pub embedding_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        use sommelier_config::constants::{rag, timeouts};
        Self {
            top_k: rag::TOP_K,
            fingerprint_len: rag::FINGERPRINT_LEN,
            embedding_timeout: Duration::from_secs(timeouts::EMBEDDING_SECS),
        }
    }
}

impl From<&Settings> for RetrieverConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            top_k: settings.rag.top_k,
            fingerprint_len: settings.rag.fingerprint_len,
            embedding_timeout: Duration::from_secs(settings.embedding.timeout_seconds),
        }
    }
}

/// Outcome of one expansion's embed + query
enum ExpansionOutcome {
    Hits(Vec<RetrievedChunk>),
    EmbedFailed,
    IndexFailed,
}

/// Fan-out retriever over an embedding provider and a vector index
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Retrieve at most `k` deduplicated chunks for the given expansions.
    ///
    /// Partial failures are logged and skipped. Fails only when every
    /// expansion failed: `EmbeddingUnavailable` if none could be embedded,
    /// `IndexUnavailable` otherwise.
    pub async fn retrieve(&self, expansions: &[String], k: usize) -> Result<Vec<RetrievedChunk>> {
        if expansions.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let outcomes = join_all(
            expansions
                .iter()
                .map(|expansion| self.retrieve_one(expansion, k)),
        )
        .await;

        let mut candidates = Vec::with_capacity(outcomes.len());
        let mut embed_failures = 0;
        let mut index_failures = 0;
        for outcome in outcomes {
            match outcome {
                ExpansionOutcome::Hits(hits) => candidates.push(hits),
                ExpansionOutcome::EmbedFailed => embed_failures += 1,
                ExpansionOutcome::IndexFailed => index_failures += 1,
            }
        }

        if candidates.is_empty() {
            return Err(if index_failures == 0 {
                Error::EmbeddingUnavailable(format!(
                    "all {} expansions failed to embed",
                    embed_failures
                ))
            } else {
                Error::IndexUnavailable(format!(
                    "vector index unreachable for all {} expansions",
                    expansions.len()
                ))
            });
        }

        let ranked = dedup_and_rank(candidates, self.config.fingerprint_len, k);
        tracing::debug!(
            expansions = expansions.len(),
            embed_failures,
            index_failures,
            results = ranked.len(),
            "Retrieval complete"
        );
        Ok(ranked)
    }

    async fn retrieve_one(&self, expansion: &str, k: usize) -> ExpansionOutcome {
        let embedding =
            match tokio::time::timeout(self.config.embedding_timeout, self.embedder.embed(expansion)).await {
                Ok(Ok(embedding)) => embedding,
                Ok(Err(e)) => {
                    tracing::warn!(expansion, error = %e, "Embedding failed, skipping expansion");
                    return ExpansionOutcome::EmbedFailed;
                }
                Err(_) => {
                    tracing::warn!(expansion, "Embedding timed out, skipping expansion");
                    return ExpansionOutcome::EmbedFailed;
                }
            };

        match self.index.query(&embedding, k).await {
            Ok(hits) => ExpansionOutcome::Hits(
                hits.into_iter()
                    .map(|scored| RetrievedChunk::from_scored(scored, expansion))
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!(expansion, error = %e, "Vector index query failed");
                ExpansionOutcome::IndexFailed
            }
        }
    }
}

/// Dedup fingerprint: the first `len` characters of the content, case preserved
pub fn fingerprint(content: &str, len: usize) -> String {
    content.chars().take(len).collect()
}

/// Merge per-expansion candidate lists (in expansion order, each in rank order).
///
/// Chunks sharing a fingerprint collapse to the highest score; on an exact
/// tie the earlier expansion, then the earlier rank, wins. The survivors are
/// stably sorted by score descending and truncated to `k`.
pub fn dedup_and_rank(
    candidates: Vec<Vec<RetrievedChunk>>,
    fingerprint_len: usize,
    k: usize,
) -> Vec<RetrievedChunk> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<RetrievedChunk> = Vec::new();

    for chunk in candidates.into_iter().flatten() {
        let key = fingerprint(&chunk.content, fingerprint_len);
        match positions.get(&key) {
            Some(&pos) => {
                if chunk.score > kept[pos].score {
                    kept[pos] = chunk;
                }
            }
            None => {
                positions.insert(key, kept.len());
                kept.push(chunk);
            }
        }
    }

    kept.sort_by(|a, b| b.score.total_cmp(&a.score));
    kept.truncate(k);
    kept
}
