//! Core data models used throughout ragchat.
//!
//! These types represent the conversation turns, retrieved context, and
//! prompt messages that flow through the answering pipeline, plus the
//! records written to the vector index during ingestion.

use serde::{Deserialize, Serialize};

/// Who produced a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    /// Speaker label used when a conversation is rendered as a transcript.
    pub fn transcript_label(self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Ai => "AI",
        }
    }

    /// Chat-completion role for this speaker.
    pub fn role(self) -> Role {
        match self {
            Sender::User => Role::User,
            Sender::Ai => Role::Assistant,
        }
    }
}

/// A single conversation turn.
///
/// Created by the caller once per turn and never mutated afterwards; an
/// ordered `Vec<ChatMessage>` is a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub sender: Sender,
    pub text: String,
    /// Creation time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl ChatMessage {
    /// Build a user turn stamped with the current time.
    pub fn user(text: impl Into<String>) -> Self {
        Self::now(Sender::User, text)
    }

    /// Build an assistant turn stamped with the current time.
    pub fn ai(text: impl Into<String>) -> Self {
        Self::now(Sender::Ai, text)
    }

    fn now(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A chunk of indexed text returned by the retriever.
///
/// Lives only for the duration of one answer; ordering encodes relevance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    /// 1-based position after reranking (1 = most relevant).
    pub source_rank: usize,
}

/// Chat-completion message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A chunk record as written to the vector index.
///
/// The index provider embeds `chunk_text` itself; `file_name` is the
/// metadata field used for per-file deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub chunk_text: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

/// A hit returned by a vector index search, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub score: f64,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_serializes_lowercase() {
        let msg = ChatMessage {
            id: "1".to_string(),
            sender: Sender::Ai,
            text: "hi".to_string(),
            timestamp: 1,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "ai");

        let back: ChatMessage = serde_json::from_value(serde_json::json!({
            "id": "2", "sender": "user", "text": "yo", "timestamp": 5
        }))
        .unwrap();
        assert_eq!(back.sender, Sender::User);
    }

    #[test]
    fn test_role_mapping() {
        assert_eq!(Sender::User.role(), Role::User);
        assert_eq!(Sender::Ai.role(), Role::Assistant);
        assert_eq!(Sender::Ai.transcript_label(), "AI");
    }

    #[test]
    fn test_index_record_field_names() {
        let rec = IndexRecord {
            id: "notes.txt_0".to_string(),
            chunk_text: "hello".to_string(),
            file_name: "notes.txt".to_string(),
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["_id"], "notes.txt_0");
        assert_eq!(json["fileName"], "notes.txt");
    }
}
