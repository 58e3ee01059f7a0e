//! Document ingestion.
//!
//! Turns plain-text documents into index records: chunk → preprocess →
//! `{source}_{idx}` ids → batched upserts. Documents arrive either as admin
//! uploads (persisted to the files collection first) or from the
//! configured documents directory during setup.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::admin::{Admin, FileRecord, FILES_COLLECTION};
use crate::chunk::chunk_text;
use crate::config::IngestConfig;
use crate::index::VectorIndex;
use crate::models::IndexRecord;
use crate::store::Store;

/// A document to index: where it came from and its full text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

/// One file in an upload request.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadFile {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No files uploaded")]
    Empty,

    #[error("Only .txt files are accepted.")]
    NotText,

    #[error("File \"{0}\" has already been uploaded.")]
    Duplicate(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Counts reported after an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub documents: usize,
    pub chunks: usize,
    pub batches: usize,
}

pub struct Ingestor {
    store: Arc<dyn Store>,
    index: Arc<dyn VectorIndex>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(store: Arc<dyn Store>, index: Arc<dyn VectorIndex>, config: IngestConfig) -> Self {
        Self {
            store,
            index,
            config,
        }
    }

    /// Validate, persist, and index uploaded files.
    ///
    /// Every file is checked before anything is written: a single bad name
    /// or duplicate rejects the whole upload.
    pub async fn upload_files(&self, files: &[UploadFile]) -> Result<IngestSummary, UploadError> {
        if files.is_empty() {
            return Err(UploadError::Empty);
        }
        if files.iter().any(|f| !f.name.ends_with(".txt")) {
            return Err(UploadError::NotText);
        }

        let admin = Admin::new(self.store.clone(), self.index.clone());
        let mut seen = admin.file_names().await?;
        for file in files {
            if seen.contains(&file.name) {
                return Err(UploadError::Duplicate(file.name.clone()));
            }
            seen.push(file.name.clone());
        }

        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            let record = FileRecord {
                id: uuid::Uuid::new_v4().to_string(),
                file_name: file.name.clone(),
                text: file.text.clone(),
                uploaded_at: chrono::Utc::now().timestamp_millis(),
            };
            self.store
                .save(
                    FILES_COLLECTION,
                    None,
                    &serde_json::to_value(&record).map_err(anyhow::Error::from)?,
                )
                .await?;
            documents.push(SourceDocument {
                source: file.name.clone(),
                text: file.text.clone(),
            });
        }

        Ok(self.index_documents(&documents).await?)
    }

    /// Chunk and upsert `documents`, creating the index first if needed.
    pub async fn index_documents(&self, documents: &[SourceDocument]) -> Result<IngestSummary> {
        self.index.ensure_ready().await?;

        let mut summary = IngestSummary {
            documents: documents.len(),
            ..Default::default()
        };

        for doc in documents {
            let records = build_records(doc, &self.config);
            tracing::info!(
                source = %doc.source,
                chunks = records.len(),
                "indexing document"
            );

            for batch in records.chunks(self.config.batch_size) {
                self.index.upsert_batch(batch).await?;
                summary.batches += 1;
                tracing::debug!(size = batch.len(), "upserted batch");
            }
            summary.chunks += records.len();
        }

        Ok(summary)
    }

    /// Index every `.txt` file under the configured documents directory.
    pub async fn setup_from_dir(&self) -> Result<IngestSummary> {
        let documents = load_text_documents(&self.config.documents_dir)?;
        tracing::info!(
            dir = %self.config.documents_dir.display(),
            documents = documents.len(),
            "loaded documents for setup"
        );
        self.index_documents(&documents).await
    }
}

/// Records for one document, ids `<source>_<idx>` and `fileName` the
/// source's base name.
pub fn build_records(doc: &SourceDocument, config: &IngestConfig) -> Vec<IndexRecord> {
    let file_name = base_name(&doc.source);
    chunk_text(&doc.text, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| IndexRecord {
            id: format!("{}_{}", doc.source, idx),
            chunk_text: chunk,
            file_name: file_name.to_string(),
        })
        .collect()
}

fn base_name(source: &str) -> &str {
    source
        .rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or(source)
}

/// Read every `*.txt` file under `root`, sorted by path.
pub fn load_text_documents(root: &Path) -> Result<Vec<SourceDocument>> {
    if !root.exists() {
        anyhow::bail!("Documents directory does not exist: {}", root.display());
    }

    let include = build_globset(&["**/*.txt"])?;
    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !include.is_match(relative) {
            continue;
        }

        let text = std::fs::read_to_string(path)?;
        documents.push(SourceDocument {
            source: path.to_string_lossy().to_string(),
            text,
        });
    }

    documents.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(documents)
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::index::InMemoryIndex;
    use crate::store::SqliteStore;
    use tempfile::TempDir;

    fn small_config(dir: &Path) -> IngestConfig {
        IngestConfig {
            chunk_size: 40,
            chunk_overlap: 10,
            batch_size: 2,
            documents_dir: dir.to_path_buf(),
        }
    }

    async fn ingestor(tmp: &TempDir) -> (Arc<InMemoryIndex>, Ingestor) {
        let content = format!(
            "[db]\npath = \"{}\"\n\n[server]\nbind = \"127.0.0.1:0\"\n",
            tmp.path().join("ingest.sqlite").display()
        );
        let config = parse_config(&content).unwrap();
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&config).await.unwrap());
        let index = Arc::new(InMemoryIndex::new("ingest-test"));
        let ingestor = Ingestor::new(store, index.clone(), small_config(tmp.path()));
        (index, ingestor)
    }

    #[test]
    fn test_record_ids_and_file_name() {
        let doc = SourceDocument {
            source: "docs/faq/hours.txt".to_string(),
            text: "We open at nine.\n\nWe close at five on weekdays and at noon on Saturday."
                .to_string(),
        };
        let records = build_records(&doc, &small_config(Path::new(".")));
        assert!(records.len() >= 2);
        for (i, rec) in records.iter().enumerate() {
            assert_eq!(rec.id, format!("docs/faq/hours.txt_{}", i));
            assert_eq!(rec.file_name, "hours.txt");
            assert!(rec.chunk_text.chars().count() <= 40);
        }
    }

    #[test]
    fn test_base_name_handles_windows_paths() {
        assert_eq!(base_name("C:\\docs\\menu.txt"), "menu.txt");
        assert_eq!(base_name("menu.txt"), "menu.txt");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_text() {
        let tmp = TempDir::new().unwrap();
        let (index, ingestor) = ingestor(&tmp).await;
        let files = vec![
            UploadFile {
                name: "a.txt".to_string(),
                text: "fine".to_string(),
            },
            UploadFile {
                name: "b.pdf".to_string(),
                text: "nope".to_string(),
            },
        ];
        assert!(matches!(
            ingestor.upload_files(&files).await,
            Err(UploadError::NotText)
        ));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_upload_then_duplicate() {
        let tmp = TempDir::new().unwrap();
        let (index, ingestor) = ingestor(&tmp).await;
        let files = vec![UploadFile {
            name: "hours.txt".to_string(),
            text: "We open at nine and close at five on weekdays.".to_string(),
        }];

        let summary = ingestor.upload_files(&files).await.unwrap();
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.chunks, index.len());
        assert!(index.ids().iter().all(|id| id.starts_with("hours.txt_")));

        match ingestor.upload_files(&files).await {
            Err(UploadError::Duplicate(name)) => assert_eq!(name, "hours.txt"),
            other => panic!("expected duplicate, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let tmp = TempDir::new().unwrap();
        let (_index, ingestor) = ingestor(&tmp).await;
        assert!(matches!(
            ingestor.upload_files(&[]).await,
            Err(UploadError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_setup_reads_only_text_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("menu.txt"), "Soup of the day.").unwrap();
        std::fs::write(tmp.path().join("nested/hours.txt"), "Open nine to five.").unwrap();
        std::fs::write(tmp.path().join("notes.md"), "ignored").unwrap();

        let (index, ingestor) = ingestor(&tmp).await;
        let summary = ingestor.setup_from_dir().await.unwrap();
        assert_eq!(summary.documents, 2);
        assert_eq!(index.len(), summary.chunks);
        assert!(summary.batches >= 2);
    }
}
