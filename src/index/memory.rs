//! In-memory [`VectorIndex`] for local runs and tests.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. There are no
//! embeddings: the recall stage scores records by how many query terms they
//! contain, and the rerank stage reorders candidates by the share of the
//! record's own terms that the query covers.

use std::collections::HashSet;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::VectorIndex;
use crate::models::{IndexHit, IndexRecord};

pub struct InMemoryIndex {
    name: String,
    records: RwLock<Vec<IndexRecord>>,
}

impl InMemoryIndex {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every stored record, in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.records
            .read()
            .map(|r| r.iter().map(|rec| rec.id.clone()).collect())
            .unwrap_or_default()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn search(&self, query: &str, recall_k: usize, rerank_n: usize) -> Result<Vec<IndexHit>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;

        // Recall: raw term overlap.
        let mut candidates: Vec<(&IndexRecord, usize, HashSet<String>)> = records
            .iter()
            .filter_map(|rec| {
                let rec_terms = terms(&rec.chunk_text);
                let overlap = query_terms.intersection(&rec_terms).count();
                (overlap > 0).then_some((rec, overlap, rec_terms))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates.truncate(recall_k);

        // Rerank: overlap normalised by record length.
        let mut hits: Vec<IndexHit> = candidates
            .into_iter()
            .map(|(rec, overlap, rec_terms)| IndexHit {
                id: rec.id.clone(),
                score: overlap as f64 / rec_terms.len().max(1) as f64,
                text: rec.chunk_text.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(rerank_n);

        Ok(hits)
    }

    async fn upsert_batch(&self, batch: &[IndexRecord]) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        for rec in batch {
            records.retain(|r| r.id != rec.id);
            records.push(rec.clone());
        }
        Ok(())
    }

    async fn delete_by_filter(&self, field: &str, value: &str) -> Result<()> {
        if field != "fileName" {
            bail!("in-memory index can only filter on fileName, got '{}'", field);
        }
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        records.retain(|r| r.file_name != value);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?
            .clear();
        Ok(())
    }
}
