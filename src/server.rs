//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/files` | Queryable scopes: `all_files`, corpus files, uploads |
//! | `POST` | `/query` | Answer a query |
//! | `POST` | `/upload` | Upload, extract, and index one file (multipart field `file`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query text is empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unsupported_type` (400),
//! `not_found` (404), `upstream_error` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can call the API from another origin.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use ragbot_core::models::{SourceFilter, ALL_FILES};

use crate::app::App;
use crate::chatbot::Chatbot;
use crate::config::Config;
use crate::error::{QueryError, UploadError};
use crate::uploads::{list_scopes, Uploads};

/// User assumed when a query names none.
const DEFAULT_USER: &str = "default";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    chatbot: Arc<Chatbot>,
    uploads: Arc<Uploads>,
    /// File names of the configured corpus, listed before uploads.
    corpus_files: Arc<Vec<String>>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        chatbot: Arc<Chatbot>,
        uploads: Arc<Uploads>,
        corpus_files: Vec<String>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            chatbot,
            uploads,
            corpus_files: Arc::new(corpus_files),
            max_upload_bytes,
        }
    }

    pub fn from_app(app: &App) -> Self {
        Self::new(
            app.chatbot.clone(),
            app.uploads.clone(),
            app.config.ingest.file_names(),
            app.config.server.max_upload_bytes,
        )
    }
}

/// Builds the router with CORS, request tracing, and the upload body limit.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/files", get(handle_files))
        .route("/query", post(handle_query))
        .route("/upload", post(handle_upload))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves the API on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config, app: &App) -> anyhow::Result<()> {
    let router = build_router(AppState::from_app(app));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %config.server.bind, "ragbot listening");
    axum::serve(listener, router).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, "{}", self.message);
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::EmptyQuery => bad_request(err.to_string()),
            QueryError::NotFound(_) => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: err.to_string(),
            },
            QueryError::Upstream { .. } => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "upstream_error",
                message: err.to_string(),
            },
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::MissingFile | UploadError::InvalidName(_) => bad_request(err.to_string()),
            UploadError::Unsupported(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "unsupported_type",
                message: err.to_string(),
            },
            UploadError::Processing { .. } => internal(err.to_string()),
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

// ============ GET /files ============

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<String>,
}

/// `all_files`, then corpus names, then uploads; duplicates dropped.
async fn handle_files(State(state): State<AppState>) -> Result<Json<FilesResponse>, AppError> {
    let uploaded = state
        .uploads
        .registry()
        .list()
        .await
        .map_err(|e| internal(format!("failed to list uploads: {:#}", e)))?;

    Ok(Json(FilesResponse {
        files: list_scopes(state.corpus_files.as_ref().clone(), uploaded),
    }))
}

// ============ POST /query ============

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query_text: String,
    #[serde(default)]
    use_web_search: bool,
    #[serde(default)]
    file_to_query: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    response: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let filter = SourceFilter::parse(req.file_to_query.as_deref().unwrap_or(ALL_FILES));
    let user = req
        .user
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(DEFAULT_USER);

    let response = state
        .chatbot
        .answer(&req.query_text, &filter, req.use_web_search, user)
        .await?;
    Ok(Json(QueryResponse { response }))
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: String,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(|n| n.to_string())
            .ok_or_else(|| UploadError::InvalidName(String::new()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let unit = state.uploads.accept(&name, &bytes).await?;
        return Ok(Json(UploadResponse {
            message: format!(
                "File {} uploaded and indexed as {}.",
                unit.source_id, unit.source_kind
            ),
        }));
    }

    Err(UploadError::MissingFile.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_errors_map_to_statuses() {
        let e: AppError = QueryError::EmptyQuery.into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);

        let e: AppError = QueryError::NotFound("resume.docx".into()).into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.code, "not_found");

        let e: AppError = QueryError::upstream(crate::error::Stage::Generator)(anyhow::anyhow!(
            "refused"
        ))
        .into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.message.contains("generator"));
    }

    #[test]
    fn upload_errors_map_to_statuses() {
        let e: AppError = UploadError::Unsupported("a.txt".into()).into();
        assert_eq!((e.status, e.code), (StatusCode::BAD_REQUEST, "unsupported_type"));

        let e: AppError = UploadError::MissingFile.into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);

        let e: AppError = UploadError::Processing {
            name: "x.pdf".into(),
            source: anyhow::anyhow!("bad xref"),
        }
        .into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_fields_default() {
        let req: QueryRequest = serde_json::from_str("{}").unwrap();
        assert!(req.query_text.is_empty());
        assert!(!req.use_web_search);
        assert!(req.file_to_query.is_none());
    }
}
