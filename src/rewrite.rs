//! Standalone-question rewriting.
//!
//! Turns a follow-up such as "and on weekends?" into a question that can be
//! searched without the conversation. One model call per invocation; the
//! caller decides which credential to use and what to do on a rate limit.

use std::sync::Arc;

use crate::llm::{ChatModel, Credential, ModelCallResult};
use crate::models::{ChatMessage, PromptMessage, Role};
use crate::prompts::{clean_rewrite, rewrite_prompt};

pub struct QuestionRewriter {
    model: Arc<dyn ChatModel>,
}

impl QuestionRewriter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// The single-message request sent for a rewrite.
    pub fn messages(question: &str, history: &[ChatMessage]) -> Vec<PromptMessage> {
        vec![PromptMessage::new(
            Role::User,
            rewrite_prompt(question, history),
        )]
    }

    /// Rewrite `question` using `credential`.
    ///
    /// A successful result never contains the instruction text; rate limits
    /// and failures are passed through untouched.
    pub async fn rewrite(
        &self,
        question: &str,
        history: &[ChatMessage],
        credential: &Credential,
    ) -> ModelCallResult {
        let messages = Self::messages(question, history);
        match self.model.complete(&messages, credential).await {
            ModelCallResult::Success(text) => {
                let standalone = clean_rewrite(&text, question);
                tracing::debug!(original = question, standalone = %standalone, "rewrote question");
                ModelCallResult::Success(standalone)
            }
            other => other,
        }
    }
}
