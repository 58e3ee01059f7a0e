//! Admin data management.
//!
//! Uploaded source files and saved chat transcripts live in the document
//! [`Store`]; deleting a file also removes its vectors from the index.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::VectorIndex;
use crate::models::ChatMessage;
use crate::store::Store;

/// Collection holding uploaded files.
pub const FILES_COLLECTION: &str = "admin_files";
/// Collection holding saved chat transcripts.
pub const CHATS_COLLECTION: &str = "chat_history";

/// Metadata field the index filters on when a file is deleted.
pub const FILE_NAME_FIELD: &str = "fileName";

/// An uploaded file as persisted in [`FILES_COLLECTION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub text: String,
    /// Epoch milliseconds.
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: i64,
}

/// A saved transcript as persisted in [`CHATS_COLLECTION`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatRecord {
    #[serde(rename = "chatHistory")]
    chat_history: Vec<ChatMessage>,
    #[serde(rename = "updatedAt")]
    updated_at: i64,
}

pub struct Admin {
    store: Arc<dyn Store>,
    index: Arc<dyn VectorIndex>,
}

impl Admin {
    pub fn new(store: Arc<dyn Store>, index: Arc<dyn VectorIndex>) -> Self {
        Self { store, index }
    }

    /// Every uploaded file, each with its `docId`.
    pub async fn list_files(&self) -> Result<Vec<Value>> {
        let docs = self.store.get(FILES_COLLECTION).await?;
        Ok(docs.into_iter().map(|d| d.into_listing()).collect())
    }

    /// Uploaded file names, for duplicate checks.
    pub async fn file_names(&self) -> Result<Vec<String>> {
        let docs = self.store.get(FILES_COLLECTION).await?;
        Ok(docs
            .into_iter()
            .filter_map(|d| {
                d.data
                    .get(FILE_NAME_FIELD)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect())
    }

    /// Remove one uploaded file and every vector indexed from it.
    pub async fn delete_file(&self, doc_id: &str, file_name: &str) -> Result<bool> {
        let existed = self.store.delete(FILES_COLLECTION, doc_id).await?;
        self.index
            .delete_by_filter(FILE_NAME_FIELD, file_name)
            .await?;
        tracing::info!(doc_id, file_name, existed, "deleted file");
        Ok(existed)
    }

    /// Remove every uploaded file and empty the index.
    pub async fn delete_all_files(&self) -> Result<u64> {
        let removed = self.store.clear(FILES_COLLECTION).await?;
        self.index.delete_all().await?;
        tracing::info!(removed, "deleted all files and vectors");
        Ok(removed)
    }

    /// Save a transcript. Creates a new entry when `doc_id` is `None`,
    /// otherwise replaces the existing one. Returns the entry id.
    pub async fn save_chat(&self, doc_id: Option<&str>, messages: &[ChatMessage]) -> Result<String> {
        let record = ChatRecord {
            chat_history: messages.to_vec(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        let id = self
            .store
            .save(CHATS_COLLECTION, doc_id, &serde_json::to_value(&record)?)
            .await?;
        tracing::debug!(doc_id = %id, turns = messages.len(), "saved chat history");
        Ok(id)
    }

    pub async fn list_chats(&self) -> Result<Vec<Value>> {
        let docs = self.store.get(CHATS_COLLECTION).await?;
        Ok(docs.into_iter().map(|d| d.into_listing()).collect())
    }

    pub async fn delete_chat(&self, doc_id: &str) -> Result<bool> {
        self.store.delete(CHATS_COLLECTION, doc_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::index::InMemoryIndex;
    use crate::models::IndexRecord;
    use crate::store::SqliteStore;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Arc<dyn Store>, Arc<InMemoryIndex>, Admin) {
        let tmp = TempDir::new().unwrap();
        let content = format!(
            "[db]\npath = \"{}\"\n\n[server]\nbind = \"127.0.0.1:0\"\n",
            tmp.path().join("admin.sqlite").display()
        );
        let config = parse_config(&content).unwrap();
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&config).await.unwrap());
        let index = Arc::new(InMemoryIndex::new("admin-test"));
        let admin = Admin::new(store.clone(), index.clone());
        (tmp, store, index, admin)
    }

    fn record(id: &str, file: &str) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            chunk_text: format!("text of {}", id),
            file_name: file.to_string(),
        }
    }

    #[tokio::test]
    async fn test_delete_file_removes_vectors() {
        let (_tmp, store, index, admin) = setup().await;
        let file = FileRecord {
            id: "f1".to_string(),
            file_name: "menu.txt".to_string(),
            text: "soup".to_string(),
            uploaded_at: 1,
        };
        let doc_id = store
            .save(FILES_COLLECTION, None, &serde_json::to_value(&file).unwrap())
            .await
            .unwrap();
        index
            .upsert_batch(&[
                record("menu.txt_0", "menu.txt"),
                record("hours.txt_0", "hours.txt"),
            ])
            .await
            .unwrap();

        let listed = admin.list_files().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["docId"], doc_id.as_str());
        assert_eq!(listed[0]["fileName"], "menu.txt");

        assert!(admin.delete_file(&doc_id, "menu.txt").await.unwrap());
        assert!(admin.list_files().await.unwrap().is_empty());
        assert_eq!(index.ids(), vec!["hours.txt_0".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_all_empties_index() {
        let (_tmp, store, index, admin) = setup().await;
        store
            .save(FILES_COLLECTION, None, &serde_json::json!({"fileName": "a.txt"}))
            .await
            .unwrap();
        index.upsert_batch(&[record("a.txt_0", "a.txt")]).await.unwrap();

        assert_eq!(admin.delete_all_files().await.unwrap(), 1);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_chat_create_then_replace() {
        let (_tmp, _store, _index, admin) = setup().await;
        let first = vec![ChatMessage::user("Hi")];
        let id = admin.save_chat(None, &first).await.unwrap();

        let second = vec![ChatMessage::user("Hi"), ChatMessage::ai("Hello!")];
        let same = admin.save_chat(Some(&id), &second).await.unwrap();
        assert_eq!(id, same);

        let chats = admin.list_chats().await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0]["chatHistory"].as_array().unwrap().len(), 2);

        assert!(admin.delete_chat(&id).await.unwrap());
        assert!(admin.list_chats().await.unwrap().is_empty());
    }
}
