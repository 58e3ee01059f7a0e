//! # ragchat CLI
//!
//! The `ragchat` binary ingests plain-text documents into a vector index,
//! answers questions against them, manages uploaded files and saved chat
//! transcripts, and serves the JSON HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! ragchat --config ./config/ragchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragchat init` | Create the SQLite document store |
//! | `ragchat setup` | Index every `.txt` file in the documents directory |
//! | `ragchat upload <files..>` | Upload and index `.txt` files |
//! | `ragchat ask "<question>"` | Answer a question, optionally with a history file |
//! | `ragchat files list\|delete\|clear` | Manage uploaded files |
//! | `ragchat chats list\|delete` | Manage saved chat transcripts |
//! | `ragchat serve` | Start the HTTP server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use ragchat::admin::Admin;
use ragchat::config::{self, Config};
use ragchat::index::create_index;
use ragchat::ingest::{Ingestor, UploadFile};
use ragchat::models::ChatMessage;
use ragchat::pipeline::Orchestrator;
use ragchat::server;
use ragchat::store::{SqliteStore, Store};

/// ragchat: a retrieval-augmented customer-support assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "Retrieval-augmented chat assistant over your own documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the document store schema. Safe to run repeatedly.
    Init,

    /// Create the vector index if needed and index `ingest.documents_dir`.
    Setup,

    /// Upload `.txt` files: save them to the store and index them.
    Upload {
        /// Files to upload. Stored under their base name.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Answer a question against the indexed documents.
    Ask {
        question: String,

        /// JSON file holding the conversation so far (array of messages).
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Manage uploaded files.
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },

    /// Manage saved chat transcripts.
    Chats {
        #[command(subcommand)]
        action: ChatsAction,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum FilesAction {
    /// List uploaded files.
    List,
    /// Delete an uploaded file and its vectors.
    Delete { doc_id: String, file_name: String },
    /// Delete every uploaded file and empty the index.
    Clear,
}

#[derive(Subcommand)]
enum ChatsAction {
    /// List saved transcripts.
    List,
    /// Delete a saved transcript.
    Delete { doc_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = SqliteStore::open(&cfg).await?;
            store.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Setup => {
            let ingestor = ingestor(&cfg).await?;
            let summary = ingestor.setup_from_dir().await?;
            println!(
                "Indexed {} documents ({} chunks, {} batches).",
                summary.documents, summary.chunks, summary.batches
            );
        }
        Commands::Upload { files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                uploads.push(UploadFile { name, text });
            }
            let summary = ingestor(&cfg).await?.upload_files(&uploads).await?;
            println!(
                "Uploaded {} files ({} chunks).",
                summary.documents, summary.chunks
            );
        }
        Commands::Ask { question, history } => {
            let history: Vec<ChatMessage> = match history {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    serde_json::from_str(&raw)
                        .with_context(|| format!("Invalid history file {}", path.display()))?
                }
                None => Vec::new(),
            };
            let (pipeline, _index) = Orchestrator::from_config(&cfg)?;
            let answer = pipeline.answer(&question, &history).await?;
            println!("{}", answer);
        }
        Commands::Files { action } => {
            let admin = admin(&cfg).await?;
            match action {
                FilesAction::List => print_json(&admin.list_files().await?)?,
                FilesAction::Delete { doc_id, file_name } => {
                    if !admin.delete_file(&doc_id, &file_name).await? {
                        println!("No stored file with id {}; vectors removed anyway.", doc_id);
                    } else {
                        println!("Deleted {}.", file_name);
                    }
                }
                FilesAction::Clear => {
                    let removed = admin.delete_all_files().await?;
                    println!("Deleted {} files and cleared the index.", removed);
                }
            }
        }
        Commands::Chats { action } => {
            let admin = admin(&cfg).await?;
            match action {
                ChatsAction::List => print_json(&admin.list_chats().await?)?,
                ChatsAction::Delete { doc_id } => {
                    if admin.delete_chat(&doc_id).await? {
                        println!("Deleted chat {}.", doc_id);
                    } else {
                        println!("No chat with id {}.", doc_id);
                    }
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn store(cfg: &Config) -> anyhow::Result<Arc<dyn Store>> {
    Ok(Arc::new(SqliteStore::open(cfg).await?))
}

async fn ingestor(cfg: &Config) -> anyhow::Result<Ingestor> {
    let index = create_index(&cfg.index)?;
    Ok(Ingestor::new(store(cfg).await?, index, cfg.ingest.clone()))
}

async fn admin(cfg: &Config) -> anyhow::Result<Admin> {
    let index = create_index(&cfg.index)?;
    Ok(Admin::new(store(cfg).await?, index))
}

fn print_json(values: &[serde_json::Value]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(values)?);
    Ok(())
}
