//! # ragchat
//!
//! A retrieval-augmented customer-support assistant over your own text
//! documents.
//!
//! Each question is rewritten into a standalone query using the
//! conversation so far, matched against a hosted vector index (recall then
//! rerank), and answered by a chat model that speaks as a fixed persona and
//! only uses the retrieved context. Model calls fail over across a list of
//! API credentials when the provider reports its quota as exhausted.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//! │ question │──▶│ rewrite  │──▶│ retrieve  │──▶│ generate │──▶ answer
//! │ +history │   │ (model)  │   │ (index)   │   │ (model)  │
//! └──────────┘   └──────────┘   └─────┬─────┘   └──────────┘
//!                                     │ no hits
//!                                     ▼
//!                          "I do not have enough information ..."
//!
//! ┌──────────┐   ┌──────────┐   ┌───────────┐
//! │ .txt     │──▶│ chunk    │──▶│ upsert    │   admin files and chat
//! │ uploads  │   │          │   │ (index)   │   transcripts: SQLite
//! └──────────┘   └──────────┘   └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error type |
//! | [`chunk`] | Text normalization and chunking |
//! | [`prompts`] | Persona and prompt templates |
//! | [`llm`] | Chat-model client and credentials |
//! | [`failover`] | Credential failover |
//! | [`rewrite`] | Standalone-question rewriting |
//! | [`index`] | Vector index abstraction and backends |
//! | [`retrieve`] | Two-stage retrieval |
//! | [`generate`] | Answer generation |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`ingest`] | Document upload and indexing |
//! | [`admin`] | File and chat transcript management |
//! | [`store`] | Document store |
//! | [`server`] | JSON HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod admin;
pub mod chunk;
pub mod config;
pub mod db;
pub mod error;
pub mod failover;
pub mod generate;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod retrieve;
pub mod rewrite;
pub mod server;
pub mod store;
