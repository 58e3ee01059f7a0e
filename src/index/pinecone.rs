//! Pinecone integrated-embedding index client.
//!
//! Uses the Pinecone REST API directly:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list indexes | `GET {control}/indexes` |
//! | describe | `GET {control}/indexes/{name}` |
//! | create | `POST {control}/indexes/create-for-model` |
//! | search + rerank | `POST {host}/records/namespaces/{ns}/search` |
//! | upsert | `POST {host}/records/namespaces/{ns}/upsert` (NDJSON) |
//! | delete | `POST {host}/vectors/delete` |
//!
//! The index embeds the `chunk_text` field itself, so records and queries
//! are sent as text. The data-plane host is taken from `index.host` or
//! looked up once through the control plane and cached.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use super::VectorIndex;
use crate::config::IndexConfig;
use crate::models::{IndexHit, IndexRecord};

/// Field that holds chunk text in every record.
const TEXT_FIELD: &str = "chunk_text";

/// Poll interval while waiting for a new index to become ready.
const READY_POLL: Duration = Duration::from_secs(2);

pub struct PineconeIndex {
    client: reqwest::Client,
    config: IndexConfig,
    api_key: String,
    host: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: f64,
    #[serde(default)]
    fields: Value,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

impl PineconeIndex {
    /// Create a client. Reads the API key from `index.api_key_env`.
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(config: &IndexConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let host = OnceCell::new();
        if let Some(h) = &config.host {
            host.set(normalize_host(h))
                .map_err(|_| anyhow!("index host already set"))?;
        }

        Ok(Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
            host,
        })
    }

    fn control(&self, path: &str) -> String {
        format!("{}{}", self.config.control_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.config.api_version)
    }

    async fn describe(&self) -> Result<Option<IndexDescription>> {
        let url = self.control(&format!("/indexes/{}", self.config.name));
        let resp = self.request(reqwest::Method::GET, &url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp, "describe index").await?;
        Ok(Some(resp.json().await?))
    }

    /// Data-plane base URL, resolved once.
    async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let desc = self
                    .describe()
                    .await?
                    .ok_or_else(|| anyhow!("Pinecone index '{}' does not exist", self.config.name))?;
                let host = desc
                    .host
                    .ok_or_else(|| anyhow!("Pinecone index '{}' has no host yet", self.config.name))?;
                Ok::<_, anyhow::Error>(normalize_host(&host))
            })
            .await?;
        Ok(host.as_str())
    }

    async fn data(&self, path: &str) -> Result<String> {
        Ok(format!("{}{}", self.host().await?, path))
    }

    async fn create(&self) -> Result<()> {
        let body = json!({
            "name": self.config.name,
            "cloud": self.config.cloud,
            "region": self.config.region,
            "embed": {
                "model": self.config.embed_model,
                "field_map": { "text": TEXT_FIELD },
            },
        });
        let resp = self
            .request(reqwest::Method::POST, &self.control("/indexes/create-for-model"))
            .json(&body)
            .send()
            .await?;
        check_status(resp, "create index").await?;
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.ready_timeout_secs);
        loop {
            if let Some(desc) = self.describe().await? {
                if desc.status.map(|s| s.ready).unwrap_or(false) {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                bail!(
                    "Pinecone index '{}' not ready after {}s",
                    self.config.name,
                    self.config.ready_timeout_secs
                );
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn ensure_ready(&self) -> Result<()> {
        tracing::info!(index = %self.config.name, "checking for index");
        let resp = self
            .request(reqwest::Method::GET, &self.control("/indexes"))
            .send()
            .await?;
        let list: IndexList = check_status(resp, "list indexes").await?.json().await?;

        if list.indexes.iter().any(|i| i.name == self.config.name) {
            tracing::info!(index = %self.config.name, "index already exists");
            return Ok(());
        }

        tracing::info!(index = %self.config.name, model = %self.config.embed_model, "creating index");
        self.create()
            .await
            .with_context(|| format!("Pinecone index creation failed for '{}'", self.config.name))?;
        self.wait_until_ready().await?;
        tracing::info!(index = %self.config.name, "index created and ready");
        Ok(())
    }

    async fn search(&self, query: &str, recall_k: usize, rerank_n: usize) -> Result<Vec<IndexHit>> {
        let body = json!({
            "query": {
                "top_k": recall_k,
                "inputs": { "text": query },
            },
            "fields": [TEXT_FIELD],
            "rerank": {
                "model": self.config.rerank_model,
                "rank_fields": [TEXT_FIELD],
                "top_n": rerank_n,
            },
        });
        let url = self
            .data(&format!("/records/namespaces/{}/search", self.config.namespace))
            .await?;
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;
        let parsed: SearchResponse = check_status(resp, "search").await?.json().await?;

        parsed
            .result
            .hits
            .into_iter()
            .map(|hit| {
                let text = hit
                    .fields
                    .get(TEXT_FIELD)
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("search hit {} has no {} field", hit.id, TEXT_FIELD))?
                    .to_string();
                Ok(IndexHit {
                    id: hit.id,
                    score: hit.score,
                    text,
                })
            })
            .collect()
    }

    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut body = String::new();
        for rec in records {
            body.push_str(&serde_json::to_string(rec)?);
            body.push('\n');
        }
        let url = self
            .data(&format!("/records/namespaces/{}/upsert", self.config.namespace))
            .await?;
        let resp = self
            .request(reqwest::Method::POST, &url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        check_status(resp, "upsert").await?;
        tracing::info!(index = %self.config.name, count = records.len(), "upserted batch");
        Ok(())
    }

    async fn delete_by_filter(&self, field: &str, value: &str) -> Result<()> {
        let mut filter = serde_json::Map::new();
        filter.insert(field.to_string(), json!({ "$eq": value }));
        let body = json!({
            "filter": filter,
            "namespace": self.config.namespace,
        });
        let url = self.data("/vectors/delete").await?;
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;
        check_status(resp, "delete by filter").await?;
        tracing::info!(index = %self.config.name, field, value, "deleted records by filter");
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let body = json!({
            "deleteAll": true,
            "namespace": self.config.namespace,
        });
        let url = self.data("/vectors/delete").await?;
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;
        check_status(resp, "delete all").await?;
        tracing::info!(index = %self.config.name, "deleted all records");
        Ok(())
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

async fn check_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body_text = resp.text().await.unwrap_or_default();
    bail!("Pinecone {} error {}: {}", what, status, body_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("ragchat-abc.svc.pinecone.io"),
            "https://ragchat-abc.svc.pinecone.io"
        );
        assert_eq!(normalize_host("http://127.0.0.1:5080/"), "http://127.0.0.1:5080");
    }

    #[test]
    fn test_search_response_parses() {
        let raw = r#"{"result":{"hits":[
            {"_id":"a.txt_0","_score":0.91,"fields":{"chunk_text":"Open 9-5"}},
            {"_id":"a.txt_1","_score":0.40,"fields":{"chunk_text":"Closed weekends"}}
        ]},"usage":{"read_units":1}}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result.hits.len(), 2);
        assert_eq!(parsed.result.hits[0].id, "a.txt_0");
        assert_eq!(parsed.result.hits[1].fields[TEXT_FIELD], "Closed weekends");
    }
}
