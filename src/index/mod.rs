//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait covers everything ragchat needs from a hosted
//! vector database: two-stage search (recall, then rerank), batched record
//! upserts, and deletion. Embedding is the provider's job; records carry
//! plain text.
//!
//! | Backend | Config value | Notes |
//! |---------|--------------|-------|
//! | [`PineconeIndex`] | `"pinecone"` | Integrated-embedding records API |
//! | [`InMemoryIndex`] | `"memory"` | Lexical stand-in for local runs and tests |

pub mod memory;
pub mod pinecone;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::models::{IndexHit, IndexRecord};

pub use memory::InMemoryIndex;
pub use pinecone::PineconeIndex;

/// A hosted (or local) text vector index.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// request.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Index identity, for logs.
    fn name(&self) -> &str;

    /// Create the index if it does not exist and wait until it accepts writes.
    async fn ensure_ready(&self) -> Result<()>;

    /// Fetch `recall_k` candidates for `query`, rerank them, and return the
    /// best `rerank_n` hits ordered by descending relevance.
    async fn search(&self, query: &str, recall_k: usize, rerank_n: usize) -> Result<Vec<IndexHit>>;

    /// Insert or overwrite records by id.
    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<()>;

    /// Delete every record whose metadata `field` equals `value`.
    async fn delete_by_filter(&self, field: &str, value: &str) -> Result<()>;

    /// Delete every record in the index.
    async fn delete_all(&self) -> Result<()>;
}

/// Create the [`VectorIndex`] selected by `index.provider`.
pub fn create_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "pinecone" => Ok(Arc::new(PineconeIndex::new(config)?)),
        "memory" => Ok(Arc::new(InMemoryIndex::new(&config.name))),
        other => bail!("Unknown index provider: {}", other),
    }
}
