//! Opaque document persistence.
//!
//! The [`Store`] trait is a minimal collection/document API: documents are
//! arbitrary JSON objects addressed by `(collection, id)`. ragchat keeps
//! uploaded files in [`crate::admin::FILES_COLLECTION`] and chat transcripts
//! in [`crate::admin::CHATS_COLLECTION`]. [`SqliteStore`] is the bundled
//! backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::migrate;

/// A document and its id within a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

impl StoredDocument {
    /// The document's fields with `docId` added, the shape admin clients list.
    pub fn into_listing(self) -> Value {
        let mut data = match self.data {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        data.insert("docId".to_string(), Value::String(self.id));
        Value::Object(data)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Save `document` under `id`, or under a fresh id when `id` is `None`.
    /// Returns the id. Saving to an existing id replaces the document.
    async fn save(&self, collection: &str, id: Option<&str>, document: &Value) -> Result<String>;

    /// All documents in `collection`, oldest first.
    async fn get(&self, collection: &str) -> Result<Vec<StoredDocument>>;

    /// Delete one document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// Delete every document in `collection`. Returns how many were removed.
    async fn clear(&self, collection: &str) -> Result<u64>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config)
            .await
            .with_context(|| format!("Failed to open database {}", config.db.path.display()))?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn save(&self, collection: &str, id: Option<&str>, document: &Value) -> Result<String> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO records (collection, id, body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(serde_json::to_string(document)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            "SELECT id, body FROM records WHERE collection = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<StoredDocument> {
                let id: String = row.get("id");
                let body: String = row.get("body");
                let data = serde_json::from_str(&body)
                    .with_context(|| format!("Corrupt document {}/{}", collection, id))?;
                Ok(StoredDocument { id, data })
            })
            .collect()
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, collection: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let content = format!(
            "[db]\npath = \"{}\"\n\n[server]\nbind = \"127.0.0.1:0\"\n",
            tmp.path().join("data/ragchat.sqlite").display()
        );
        let config = parse_config(&content).unwrap();
        let store = SqliteStore::open(&config).await.unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn test_save_get_delete() {
        let (_tmp, store) = open_temp().await;

        let a = store.save("files", None, &json!({"name": "a"})).await.unwrap();
        let b = store.save("files", None, &json!({"name": "b"})).await.unwrap();
        store.save("other", Some("x"), &json!({"n": 1})).await.unwrap();

        let docs = store.get("files").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, a);
        assert_eq!(docs[1].data["name"], "b");

        assert!(store.delete("files", &b).await.unwrap());
        assert!(!store.delete("files", &b).await.unwrap());
        assert_eq!(store.get("files").await.unwrap().len(), 1);
        assert_eq!(store.get("other").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_with_id_replaces() {
        let (_tmp, store) = open_temp().await;
        store.save("chats", Some("c1"), &json!({"v": 1})).await.unwrap();
        store.save("chats", Some("c1"), &json!({"v": 2})).await.unwrap();
        let docs = store.get("chats").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["v"], 2);
    }

    #[tokio::test]
    async fn test_clear_only_touches_collection() {
        let (_tmp, store) = open_temp().await;
        store.save("files", None, &json!({})).await.unwrap();
        store.save("files", None, &json!({})).await.unwrap();
        store.save("chats", None, &json!({})).await.unwrap();
        assert_eq!(store.clear("files").await.unwrap(), 2);
        assert!(store.get("files").await.unwrap().is_empty());
        assert_eq!(store.get("chats").await.unwrap().len(), 1);
    }

    #[test]
    fn test_listing_adds_doc_id() {
        let doc = StoredDocument {
            id: "abc".to_string(),
            data: json!({"fileName": "a.txt"}),
        };
        let listed = doc.into_listing();
        assert_eq!(listed["docId"], "abc");
        assert_eq!(listed["fileName"], "a.txt");
    }
}
