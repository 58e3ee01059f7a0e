//! JSON HTTP API.
//!
//! Serves the chat endpoint and the admin data-management endpoints.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/read` | Answer `[question, history]` |
//! | `POST` | `/api/upload-data` | Upload and index `.txt` files |
//! | `POST` | `/api/manage-data` | Admin actions on files and chat transcripts |
//! | `POST` | `/api/setup` | Index the documents directory |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response envelope
//!
//! Successful responses carry `"success": true` plus an endpoint-specific
//! payload. Errors look like:
//!
//! ```json
//! { "success": false, "error": { "message": "Internal server error" } }
//! ```
//!
//! Pipeline failures never leak details to the client; they are logged.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::admin::Admin;
use crate::config::Config;
use crate::ingest::{Ingestor, UploadError, UploadFile};
use crate::models::ChatMessage;
use crate::pipeline::Orchestrator;
use crate::store::{SqliteStore, Store};

const INTERNAL_ERROR: &str = "Internal server error";

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Orchestrator>,
    pub admin: Arc<Admin>,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    /// Build the pipeline, document store, and index from configuration.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let (pipeline, index) = Orchestrator::from_config(config)?;
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(config).await?);
        Ok(Self {
            pipeline: Arc::new(pipeline),
            admin: Arc::new(Admin::new(store.clone(), index.clone())),
            ingestor: Arc::new(Ingestor::new(store, index, config.ingest.clone())),
        })
    }
}

/// The application router with CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/read", post(handle_read))
        .route("/api/upload-data", post(handle_upload))
        .route("/api/manage-data", post(handle_manage))
        .route("/api/setup", post(handle_setup))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "ragchat server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
}

/// Error type that converts into the JSON error envelope.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

/// Log `err` and answer with a 500 carrying only `message`.
fn internal(message: &str, err: impl std::fmt::Display) -> AppError {
    tracing::error!(error = %err, "{}", message);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.to_string(),
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Empty | UploadError::NotText => bad_request(err.to_string()),
            UploadError::Duplicate(_) => AppError {
                status: StatusCode::CONFLICT,
                message: err.to_string(),
            },
            UploadError::Other(e) => internal(INTERNAL_ERROR, e),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/read ============

/// Body is a two-element array: `[question, history]`.
async fn handle_read(
    State(state): State<AppState>,
    payload: Result<Json<(String, Vec<ChatMessage>)>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json((question, history)) = payload.map_err(|e| internal(INTERNAL_ERROR, e))?;

    let answer = state
        .pipeline
        .answer(&question, &history)
        .await
        .map_err(|e| internal(INTERNAL_ERROR, e))?;

    Ok(Json(json!({ "success": true, "data": answer })))
}

// ============ POST /api/upload-data ============

#[derive(Deserialize)]
struct UploadRequest {
    #[serde(default)]
    files: Vec<UploadFile>,
}

async fn handle_upload(
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let summary = state.ingestor.upload_files(&request.files).await?;
    Ok(Json(json!({ "success": true, "data": summary })))
}

// ============ POST /api/manage-data ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManageRequest {
    action: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    doc_id: Option<String>,
    #[serde(default)]
    chat_history: Option<Vec<ChatMessage>>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .ok_or_else(|| bad_request(format!("{} is required", name)))
}

async fn handle_manage(
    State(state): State<AppState>,
    payload: Result<Json<ManageRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload.map_err(|e| internal(INTERNAL_ERROR, e))?;
    let admin = &state.admin;

    match request.action.as_str() {
        "delete" => {
            let doc_id = required(&request.doc_id, "docId")?;
            let file_name = required(&request.file_name, "fileName")?;
            admin
                .delete_file(doc_id, file_name)
                .await
                .map_err(|e| internal("Failed to delete file", e))?;
            Ok(Json(json!({ "success": true })))
        }
        "getAllFiles" => {
            let files = admin
                .list_files()
                .await
                .map_err(|e| internal("Failed to get files", e))?;
            Ok(Json(json!({ "success": true, "files": files })))
        }
        "delete-all" => {
            admin
                .delete_all_files()
                .await
                .map_err(|e| internal("Failed to delete all files", e))?;
            Ok(Json(json!({ "success": true })))
        }
        // "uploud-" is the spelling older admin clients send.
        "upload-chat-history" | "uploud-chat-history" => {
            let history = request.chat_history.unwrap_or_default();
            let doc_id = admin
                .save_chat(request.doc_id.as_deref(), &history)
                .await
                .map_err(|e| internal("Failed to upload chat history", e))?;
            Ok(Json(json!({ "success": true, "docId": doc_id })))
        }
        "get-all-chats" => {
            let chats = admin
                .list_chats()
                .await
                .map_err(|e| internal("Failed to get chats", e))?;
            Ok(Json(json!({ "success": true, "chats": chats })))
        }
        "delete-chat" => {
            let doc_id = required(&request.doc_id, "docId")?;
            admin
                .delete_chat(doc_id)
                .await
                .map_err(|e| internal("Failed to delete chat", e))?;
            Ok(Json(json!({ "success": true })))
        }
        _ => Err(bad_request("Invalid action")),
    }
}

// ============ POST /api/setup ============

async fn handle_setup(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let summary = state
        .ingestor
        .setup_from_dir()
        .await
        .map_err(|e| internal(INTERNAL_ERROR, e))?;
    Ok(Json(json!({
        "success": true,
        "data": "successfully created index and loaded data",
        "summary": summary,
    })))
}
