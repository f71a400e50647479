//! API server: document upload, retrieval-augmented queries, and
//! namespace administration.
//!
//! Serves the chat front-end and the JSON API it talks to. Session
//! verification lives on the auth server; this server trusts the email in
//! each request and scopes every operation to the namespace derived from
//! it.
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `GET`    | `/` | Landing page |
//! | `GET`    | `/chat` | Chat front-end |
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/batch-ingest` | Multipart upload: `email` field + `files` parts |
//! | `POST`   | `/query` | Answer a question against the user's documents |
//! | `GET`    | `/namespace/{email}/stats` | Vector count and dimension |
//! | `DELETE` | `/namespace/{email}` | Drop the user's namespace |
//!
//! # Error Contract
//!
//! Error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Email is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embeddings_disabled` (400),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the chat page may be
//! served from a different origin than the auth server during development.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::ingest::{self, BatchSummary, FileInput};
use crate::migrate;
use crate::namespace::derive_namespace;
use crate::query::{self, QueryOutcome};
use crate::session::SessionStore;
use crate::stats::{self, NamespaceStats};
use crate::store;
use crate::ui;

/// Uploads are capped at 50 MiB per request.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    sessions: SessionStore,
}

/// Starts the API server on `[api].bind`.
///
/// Fails fast when the configured LLM or embedding provider cannot be
/// initialized; a server that cannot answer queries should not come up.
pub async fn run_api_server(config: &Config) -> anyhow::Result<()> {
    config.require_llm()?;

    let provider = embedding::create_provider(&config.embedding)?;
    tracing::info!(
        provider = %config.embedding.provider,
        model = provider.model_name(),
        dims = provider.dims(),
        "embedding provider ready"
    );

    let pool = db::connect(&config.db.path).await?;
    migrate::ensure_schema(&pool).await?;

    let sessions = SessionStore::new(&config.sessions.dir)?;

    let bind_addr = config.api.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        sessions,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_home))
        .route("/chat", get(handle_chat))
        .route("/health", get(handle_health))
        .route("/batch-ingest", post(handle_batch_ingest))
        .route("/query", post(handle_query))
        .route("/namespace/{email}/stats", get(handle_namespace_stats))
        .route("/namespace/{email}", delete(handle_delete_namespace))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal_error(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

/// Maps query pipeline failures to the most appropriate status code:
/// a disabled embedding provider is a deployment problem the client can
/// at least report precisely; everything else is a 500.
fn classify_query_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains("disabled") {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "embeddings_disabled".to_string(),
            message: msg,
        }
    } else {
        internal_error(err)
    }
}

// ============ GET / and GET /chat ============

async fn handle_home(State(state): State<AppState>) -> Html<String> {
    Html(ui::render_home_page(&state.config.api.auth_base_url))
}

async fn handle_chat(State(state): State<AppState>) -> Html<String> {
    Html(ui::render_chat_page(&state.config.api.auth_base_url))
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

// ============ POST /batch-ingest ============

/// Handler for `POST /batch-ingest`.
///
/// Expects a multipart form with one `email` text field and any number of
/// `files` parts. Responds with a [`BatchSummary`]; per-file failures are
/// reported there, not as an HTTP error.
async fn handle_batch_ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchSummary>, AppError> {
    let mut email: Option<String> = None;
    let mut files: Vec<FileInput> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("email") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Invalid email field: {}", e)))?;
                email = Some(value);
            }
            Some("files") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Invalid file part: {}", e)))?;
                files.push(FileInput {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let email = match email {
        Some(e) if !e.trim().is_empty() => e,
        _ => return Err(bad_request("Email is required")),
    };
    if files.is_empty() {
        return Err(bad_request("No files provided"));
    }

    let summary = ingest::ingest_batch(&state.config, &state.pool, &email, files).await;
    Ok(Json(summary))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    email: String,
    /// Session id whose transcript receives the exchange; optional.
    #[serde(default)]
    session: Option<String>,
}

/// Handler for `POST /query`.
///
/// Embeds the question, retrieves from the caller's namespace, and answers
/// via the configured LLM. With a `session` id, the exchange is appended
/// to that session's transcript.
async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryOutcome>, AppError> {
    if req.email.trim().is_empty() {
        return Err(bad_request("Email is required"));
    }
    if req.query.trim().is_empty() {
        return Err(bad_request("Query is required"));
    }

    let outcome = query::answer_query_with_session(
        &state.config,
        &state.pool,
        &state.sessions,
        &req.email,
        &req.query,
        req.session.as_deref(),
    )
    .await
    .map_err(classify_query_error)?;

    Ok(Json(outcome))
}

// ============ GET /namespace/{email}/stats ============

async fn handle_namespace_stats(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<NamespaceStats>, AppError> {
    let namespace = derive_namespace(&email);
    let stats = stats::namespace_stats(&state.pool, &namespace)
        .await
        .map_err(internal_error)?;
    Ok(Json(stats))
}

// ============ DELETE /namespace/{email} ============

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
}

async fn handle_delete_namespace(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let namespace = derive_namespace(&email);
    store::delete_namespace(&state.pool, &namespace)
        .await
        .map_err(internal_error)?;

    Ok(Json(DeleteResponse {
        message: format!("Successfully deleted namespace {}", namespace),
    }))
}
