//! Answer generation from retrieved context.
//!
//! Assembles the chat-completion request (fixed persona, labelled context,
//! the conversation) and runs it with credential failover.
//!
//! # Message layout
//!
//! ```text
//! system     PERSONA
//! user       "Relevant background information:\n\nContext 1: ...\n\nContext 2: ..."
//! user|asst  history[0]
//! ...
//! user       history[n-1]   (the current question)
//! ```

use std::sync::Arc;

use crate::error::PipelineError;
use crate::failover::call_with_failover;
use crate::llm::{ChatModel, CredentialSet};
use crate::models::{ChatMessage, PromptMessage, RetrievedChunk, Role};
use crate::prompts::{context_block, CONTEXT_LABEL, PERSONA};

const STAGE: &str = "generate";

pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    credentials: Arc<CredentialSet>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>, credentials: Arc<CredentialSet>) -> Self {
        Self { model, credentials }
    }

    /// Build the request messages. `history` must already end with the
    /// question being answered.
    pub fn messages(chunks: &[RetrievedChunk], history: &[ChatMessage]) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(PromptMessage::new(Role::System, PERSONA));
        messages.push(PromptMessage::new(
            Role::User,
            format!("{}\n\n{}", CONTEXT_LABEL, context_block(chunks)),
        ));
        messages.extend(
            history
                .iter()
                .map(|msg| PromptMessage::new(msg.sender.role(), msg.text.clone())),
        );
        messages
    }

    /// Generate an answer, failing over to the next credential on a rate limit.
    pub async fn generate(
        &self,
        chunks: &[RetrievedChunk],
        question: &str,
        history: &[ChatMessage],
    ) -> Result<String, PipelineError> {
        tracing::info!(chunks = chunks.len(), turns = history.len(), "generating answer");
        tracing::debug!(question, "generation question");

        let messages = Self::messages(chunks, history);
        let messages = &messages;
        let model = &self.model;

        call_with_failover(STAGE, &self.credentials, |credential| async move {
            model.complete(messages, &credential).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sender;

    #[test]
    fn test_message_layout() {
        let chunks = vec![
            RetrievedChunk {
                text: "Open 9-5 Mon-Fri".to_string(),
                source_rank: 1,
            },
            RetrievedChunk {
                text: "Closed weekends".to_string(),
                source_rank: 2,
            },
        ];
        let history = vec![
            ChatMessage {
                id: "1".to_string(),
                sender: Sender::User,
                text: "Hi".to_string(),
                timestamp: 1,
            },
            ChatMessage {
                id: "2".to_string(),
                sender: Sender::Ai,
                text: "Hello!".to_string(),
                timestamp: 2,
            },
            ChatMessage {
                id: "3".to_string(),
                sender: Sender::User,
                text: "Are you open Sunday?".to_string(),
                timestamp: 3,
            },
        ];

        let messages = AnswerGenerator::messages(&chunks, &history);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], PromptMessage::new(Role::System, PERSONA));
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1].content.starts_with(CONTEXT_LABEL));
        let first = messages[1].content.find("Open 9-5 Mon-Fri").unwrap();
        let second = messages[1].content.find("Closed weekends").unwrap();
        assert!(first < second);
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(messages[3].role, Role::Assistant);
        assert_eq!(messages[4].content, "Are you open Sunday?");
    }
}
