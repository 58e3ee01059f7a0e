//! Chat-completion client abstraction.
//!
//! Defines the [`ChatModel`] trait the pipeline talks to, the tagged
//! [`ModelCallResult`] it answers with, and [`HttpChatModel`], which speaks
//! the OpenAI-compatible `POST /v1/chat/completions` protocol (Hugging Face
//! router, OpenAI, vLLM, ...).
//!
//! # Rate-limit detection
//!
//! Quota exhaustion is recognised by the provider's error *message*, not by
//! HTTP status: a response is [`ModelCallResult::RateLimited`] only when its
//! `error` (or `error.message`) string equals `model.quota_error` exactly.
//! Everything else that lacks a generated message is a failure.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::error::PipelineError;
use crate::models::PromptMessage;

/// One API credential for the model endpoint.
#[derive(Clone)]
pub struct Credential {
    label: String,
    secret: String,
}

impl Credential {
    pub fn new(label: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            secret: secret.into(),
        }
    }

    /// Name used in logs (the environment variable it came from).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("label", &self.label)
            .field("secret", &"***")
            .finish()
    }
}

/// Ordered, non-empty list of credentials, tried first to last.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    credentials: Vec<Credential>,
}

impl CredentialSet {
    pub fn new(credentials: Vec<Credential>) -> Result<Self> {
        if credentials.is_empty() {
            bail!("at least one model credential is required");
        }
        Ok(Self { credentials })
    }

    /// Read credentials from the environment variables named in config.
    ///
    /// The first variable is mandatory. Later ones are optional fallbacks
    /// and are skipped with a warning when unset.
    pub fn from_env(config: &ModelConfig) -> Result<Self> {
        let mut credentials = Vec::with_capacity(config.api_key_envs.len());
        for (i, var) in config.api_key_envs.iter().enumerate() {
            match std::env::var(var) {
                Ok(secret) if !secret.trim().is_empty() => {
                    credentials.push(Credential::new(var.clone(), secret.trim()));
                }
                _ if i == 0 => bail!("{} environment variable not set", var),
                _ => tracing::warn!("fallback credential {} not set, skipping", var),
            }
        }
        Self::new(credentials)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

/// Outcome of a single model call.
#[derive(Debug)]
pub enum ModelCallResult {
    /// The model produced text (already trimmed).
    Success(String),
    /// The credential is over quota; another credential may succeed.
    RateLimited,
    /// Anything else. Not retried.
    Failure(PipelineError),
}

impl ModelCallResult {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ModelCallResult::RateLimited)
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier sent with each request.
    fn model_name(&self) -> &str;

    /// Run one completion over `messages` using `credential`.
    async fn complete(&self, messages: &[PromptMessage], credential: &Credential)
        -> ModelCallResult;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [PromptMessage],
    model: &'a str,
    temperature: f32,
}

/// OpenAI-compatible chat-completion client over HTTP.
pub struct HttpChatModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    quota_error: String,
}

impl HttpChatModel {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            quota_error: config.quota_error.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[PromptMessage],
        credential: &Credential,
    ) -> ModelCallResult {
        let body = ChatRequest {
            messages,
            model: &self.model,
            temperature: self.temperature,
        };

        tracing::debug!(
            model = %self.model,
            credential = credential.label(),
            messages = messages.len(),
            "calling chat completion"
        );

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.secret())
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return ModelCallResult::Failure(PipelineError::Transport(e)),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => return ModelCallResult::Failure(PipelineError::Transport(e)),
        };

        classify_response(status.as_u16(), &text, &self.quota_error)
    }
}

/// Interpret a raw chat-completion response body.
///
/// The HTTP status is only used for diagnostics; the body decides.
pub fn classify_response(status: u16, body: &str, quota_error: &str) -> ModelCallResult {
    let json: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            return ModelCallResult::Failure(PipelineError::unexpected(format!(
                "HTTP {}: {}",
                status, body
            )))
        }
    };

    if let Some(content) = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            return ModelCallResult::Success(trimmed.to_string());
        }
    }

    if error_message(&json) == Some(quota_error) {
        return ModelCallResult::RateLimited;
    }

    ModelCallResult::Failure(PipelineError::unexpected(json.to_string()))
}

/// Provider error text: either `{"error": "..."}` or `{"error": {"message": "..."}}`.
fn error_message(json: &Value) -> Option<&str> {
    let error = json.get("error")?;
    error
        .as_str()
        .or_else(|| error.get("message").and_then(Value::as_str))
}
