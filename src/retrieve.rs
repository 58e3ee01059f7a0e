//! Two-stage retrieval against the vector index.

use std::sync::Arc;

use crate::chunk::preprocess;
use crate::config::RetrievalConfig;
use crate::error::PipelineError;
use crate::index::VectorIndex;
use crate::models::RetrievedChunk;

/// Fetches the best-matching chunks for a standalone question.
///
/// The index is asked for `recall_k` candidates and reranks them down to
/// `rerank_n`; hits come back best first and keep that order.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    recall_k: usize,
    rerank_n: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, config: &RetrievalConfig) -> Self {
        Self {
            index,
            recall_k: config.recall_k.max(config.rerank_n),
            rerank_n: config.rerank_n,
        }
    }

    /// Retrieve chunks for `question`. An empty result means "no relevant
    /// context" and is not an error; index failures are.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, PipelineError> {
        let query = preprocess(question);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self
            .index
            .search(&query, self.recall_k, self.rerank_n)
            .await
            .map_err(PipelineError::Retrieval)?;

        tracing::info!(
            index = self.index.name(),
            hits = hits.len(),
            "retrieved relevant chunks"
        );

        Ok(hits
            .into_iter()
            .take(self.rerank_n)
            .enumerate()
            .map(|(i, hit)| RetrievedChunk {
                text: hit.text,
                source_rank: i + 1,
            })
            .collect())
    }
}
