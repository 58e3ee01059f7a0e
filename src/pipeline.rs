//! Retrieval-augmented answering.
//!
//! [`Orchestrator::answer`] runs the linear chain
//!
//! ```text
//! REWRITE ──▶ RETRIEVE ──▶ GENERATE ──▶ answer
//!                │
//!                └── no hits ──▶ "I do not have enough information ..."
//! ```
//!
//! Rewrite and generation each fail over across the configured credentials
//! once; nothing else is retried. Any fatal error aborts the chain. There is
//! no internal timeout: callers bound a request by dropping the future or
//! by using [`Orchestrator::answer_until`].

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;

use crate::config::{Config, RetrievalConfig};
use crate::error::PipelineError;
use crate::failover::call_with_failover;
use crate::generate::AnswerGenerator;
use crate::index::{create_index, VectorIndex};
use crate::llm::{ChatModel, CredentialSet, HttpChatModel};
use crate::models::{ChatMessage, Sender};
use crate::prompts::NO_INFO_ANSWER;
use crate::retrieve::Retriever;
use crate::rewrite::QuestionRewriter;

const REWRITE_STAGE: &str = "rewrite";

pub struct Orchestrator {
    rewriter: QuestionRewriter,
    retriever: Retriever,
    generator: AnswerGenerator,
    credentials: Arc<CredentialSet>,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        index: Arc<dyn VectorIndex>,
        credentials: CredentialSet,
        retrieval: &RetrievalConfig,
    ) -> Self {
        let credentials = Arc::new(credentials);
        Self {
            rewriter: QuestionRewriter::new(model.clone()),
            retriever: Retriever::new(index, retrieval),
            generator: AnswerGenerator::new(model, credentials.clone()),
            credentials,
        }
    }

    /// Wire up the HTTP model client, the configured index, and credentials
    /// from the environment. Returns the index too so ingestion can share it.
    pub fn from_config(config: &Config) -> Result<(Self, Arc<dyn VectorIndex>)> {
        let model: Arc<dyn ChatModel> = Arc::new(HttpChatModel::new(&config.model)?);
        let index = create_index(&config.index)?;
        let credentials = CredentialSet::from_env(&config.model)?;
        tracing::info!(
            model = model.model_name(),
            index = index.name(),
            credentials = credentials.len(),
            "answer pipeline ready"
        );
        Ok((
            Self::new(model, index.clone(), credentials, &config.retrieval),
            index,
        ))
    }

    /// Answer `question` given the conversation so far.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<String, PipelineError> {
        let rewriter = &self.rewriter;
        let standalone = call_with_failover(REWRITE_STAGE, &self.credentials, |credential| {
            async move { rewriter.rewrite(question, history, &credential).await }
        })
        .await?;
        tracing::debug!(standalone = %standalone, "standalone question");

        let chunks = self.retriever.retrieve(&standalone).await?;
        if chunks.is_empty() {
            tracing::info!("no relevant matches found, skipping generation");
            return Ok(NO_INFO_ANSWER.to_string());
        }

        let conversation = with_current_question(question, history);
        self.generator
            .generate(&chunks, question, &conversation)
            .await
    }

    /// Like [`answer`](Self::answer), but gives up with
    /// [`PipelineError::Cancelled`] as soon as `cancel` completes. The
    /// in-flight network call is dropped.
    pub async fn answer_until<C>(
        &self,
        question: &str,
        history: &[ChatMessage],
        cancel: C,
    ) -> Result<String, PipelineError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            result = self.answer(question, history) => result,
            _ = cancel => {
                tracing::warn!("answer cancelled by caller");
                Err(PipelineError::Cancelled)
            }
        }
    }
}

/// The conversation handed to generation must end with the question being
/// answered; append it when the caller has not.
fn with_current_question<'a>(question: &str, history: &'a [ChatMessage]) -> Cow<'a, [ChatMessage]> {
    match history.last() {
        Some(last) if last.sender == Sender::User && last.text.trim() == question.trim() => {
            Cow::Borrowed(history)
        }
        _ => {
            let mut owned = history.to_vec();
            owned.push(ChatMessage::user(question));
            Cow::Owned(owned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_appended_when_missing() {
        let conv = with_current_question("What are your hours?", &[]);
        assert_eq!(conv.len(), 1);
        assert_eq!(conv[0].sender, Sender::User);
        assert_eq!(conv[0].text, "What are your hours?");
    }

    #[test]
    fn test_question_not_duplicated() {
        let history = vec![
            ChatMessage::ai("Hi! How can I help?"),
            ChatMessage::user("What are your hours?"),
        ];
        let conv = with_current_question("What are your hours?", &history);
        assert!(matches!(conv, Cow::Borrowed(_)));
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_previous_ai_turn_gets_question_appended() {
        let history = vec![ChatMessage::user("Hi"), ChatMessage::ai("Hello!")];
        let conv = with_current_question("Do you deliver?", &history);
        assert_eq!(conv.len(), 3);
        assert_eq!(conv[2].text, "Do you deliver?");
    }
}
