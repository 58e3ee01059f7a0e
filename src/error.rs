//! Error taxonomy for the answering pipeline.
//!
//! Everything outside the pipeline (CLI, persistence, ingestion, HTTP)
//! uses `anyhow`; the pipeline keeps a closed set of failure kinds so
//! callers can tell a quota problem from a broken index.

use thiserror::Error;

/// Fatal conditions that abort an `answer` call.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network failure talking to the model endpoint.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The model endpoint answered with something we could not interpret.
    #[error("unexpected model response: {raw}")]
    UnexpectedResponse { raw: String },

    /// Every configured credential reported the quota-exceeded condition.
    #[error("quota exhausted during {stage} after {attempts} credential(s)")]
    QuotaExhausted { stage: &'static str, attempts: usize },

    /// The vector index could not be queried.
    #[error("retrieval error: {0}")]
    Retrieval(#[source] anyhow::Error),

    /// The caller abandoned the request before it completed.
    #[error("request cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn unexpected(raw: impl Into<String>) -> Self {
        PipelineError::UnexpectedResponse { raw: raw.into() }
    }
}
