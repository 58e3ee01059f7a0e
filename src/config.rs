use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Chat-completion endpoint settings.
///
/// Credentials are never stored in the file; `api_key_envs` lists the
/// environment variables to read them from, in failover order.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model_name")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_key_envs")]
    pub api_key_envs: Vec<String>,
    /// Provider error message that marks a credential as over quota.
    /// Compared for exact equality.
    #[serde(default = "default_quota_error")]
    pub quota_error: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            model: default_model_name(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            api_key_envs: default_api_key_envs(),
            quota_error: default_quota_error(),
        }
    }
}

fn default_model_endpoint() -> String {
    "https://router.huggingface.co/v1/chat/completions".to_string()
}
fn default_model_name() -> String {
    "meta-llama/Llama-3.1-8B-Instruct:novita".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_api_key_envs() -> Vec<String> {
    vec![
        "HUGGINGFACE_API_KEY".to_string(),
        "HUGGINGFACE_API_KEY_SECONDARY".to_string(),
    ]
}
fn default_quota_error() -> String {
    "You have exceeded your monthly included credits for Inference Providers. \
     Subscribe to PRO to get 20x more monthly included credits."
        .to_string()
}

/// Vector index settings.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `"pinecone"` or `"memory"`.
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default = "default_index_name")]
    pub name: String,
    /// Data-plane host. Looked up through the control plane when unset.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    #[serde(default = "default_index_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_rerank_model")]
    pub rerank_model: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// How long to wait for a freshly created index to become ready.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            name: default_index_name(),
            host: None,
            namespace: default_namespace(),
            control_url: default_control_url(),
            api_key_env: default_index_key_env(),
            api_version: default_api_version(),
            embed_model: default_embed_model(),
            rerank_model: default_rerank_model(),
            cloud: default_cloud(),
            region: default_region(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "pinecone".to_string()
}
fn default_index_name() -> String {
    "ragchat".to_string()
}
fn default_namespace() -> String {
    "__default__".to_string()
}
fn default_control_url() -> String {
    "https://api.pinecone.io".to_string()
}
fn default_index_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}
fn default_api_version() -> String {
    "2025-01".to_string()
}
fn default_embed_model() -> String {
    "llama-text-embed-v2".to_string()
}
fn default_rerank_model() -> String {
    "bge-reranker-v2-m3".to_string()
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_ready_timeout_secs() -> u64 {
    60
}

/// Recall/precision pool sizes for the two-stage search.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,
    #[serde(default = "default_rerank_n")]
    pub rerank_n: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            recall_k: default_recall_k(),
            rerank_n: default_rerank_n(),
        }
    }
}

fn default_recall_k() -> usize {
    6
}
fn default_rerank_n() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            batch_size: default_batch_size(),
            documents_dir: default_documents_dir(),
        }
    }
}

fn default_chunk_size() -> usize {
    200
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_batch_size() -> usize {
    80
}
fn default_documents_dir() -> PathBuf {
    PathBuf::from("./documents")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate a TOML configuration document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.rerank_n == 0 {
        bail!("retrieval.rerank_n must be >= 1");
    }
    if config.retrieval.recall_k < config.retrieval.rerank_n {
        bail!(
            "retrieval.recall_k ({}) must be >= retrieval.rerank_n ({})",
            config.retrieval.recall_k,
            config.retrieval.rerank_n
        );
    }

    // Validate ingest
    if config.ingest.chunk_size == 0 {
        bail!("ingest.chunk_size must be > 0");
    }
    if config.ingest.chunk_overlap >= config.ingest.chunk_size {
        bail!("ingest.chunk_overlap must be smaller than ingest.chunk_size");
    }
    if config.ingest.batch_size == 0 {
        bail!("ingest.batch_size must be > 0");
    }

    // Validate model
    if config.model.api_key_envs.is_empty() {
        bail!("model.api_key_envs must name at least one environment variable");
    }
    if config.model.quota_error.trim().is_empty() {
        bail!("model.quota_error must not be empty");
    }

    match config.index.provider.as_str() {
        "pinecone" | "memory" => {}
        other => bail!(
            "Unknown index provider: '{}'. Must be pinecone or memory.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/ragchat.sqlite"

[server]
bind = "127.0.0.1:7341"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.retrieval.recall_k, 6);
        assert_eq!(cfg.retrieval.rerank_n, 5);
        assert_eq!(cfg.ingest.chunk_size, 200);
        assert_eq!(cfg.ingest.chunk_overlap, 50);
        assert_eq!(cfg.ingest.batch_size, 80);
        assert_eq!(cfg.model.temperature, 0.0);
        assert_eq!(cfg.model.api_key_envs.len(), 2);
        assert_eq!(cfg.index.provider, "pinecone");
    }

    #[test]
    fn test_recall_smaller_than_rerank_rejected() {
        let content = format!("{}\n[retrieval]\nrecall_k = 3\nrerank_n = 5\n", MINIMAL);
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("recall_k"));
    }

    #[test]
    fn test_unknown_index_provider_rejected() {
        let content = format!("{}\n[index]\nprovider = \"faiss\"\n", MINIMAL);
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn test_empty_credential_list_rejected() {
        let content = format!("{}\n[model]\napi_key_envs = []\n", MINIMAL);
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let content = format!("{}\n[ingest]\nchunk_size = 50\nchunk_overlap = 50\n", MINIMAL);
        assert!(parse_config(&content).is_err());
    }
}
