//! Vector-search HTTP server.
//!
//! Exposes the [`VectorIndex`] over a small JSON API. Request and response
//! bodies use camelCase keys.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/index` | Embed and store chunks under a repository namespace |
//! | `POST` | `/search` | Semantic search, optionally scoped to one repository |
//! | `POST` | `/search/batch` | Several queries with shared options |
//! | `POST` | `/delete` | Delete a namespace, or specific ids within it |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "success": false, "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use repo_intake_core::models::{ChunkType, CodeChunk};
use repo_intake_core::search::{SearchOptions, SearchResult};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::index::{QueryResults, VectorIndex};

/// Upper bound on queries in one `/search/batch` call.
pub const MAX_BATCH_QUERIES: usize = 20;

#[derive(Clone)]
struct AppState {
    index: VectorIndex,
}

/// Build the router. Exposed separately so tests can serve it on an
/// ephemeral port.
pub fn router(index: VectorIndex) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/index", post(handle_index))
        .route("/search", post(handle_search))
        .route("/search/batch", post(handle_batch_search))
        .route("/delete", post(handle_delete))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { index })
}

/// Serve until the process is terminated.
pub async fn run_server(config: &Config, index: VectorIndex) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(index);

    println!("Vector search server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
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
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
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

fn internal(err: anyhow::Error) -> AppError {
    tracing::warn!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ Request types ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexRequest {
    repo_id: String,
    chunks: Vec<CodeChunk>,
}

/// Query options shared by `/search` and `/search/batch`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryOptions {
    repo_id: Option<String>,
    limit: Option<usize>,
    #[serde(rename = "type")]
    chunk_type: Option<ChunkType>,
    language: Option<String>,
    min_score: Option<f32>,
}

impl QueryOptions {
    fn to_search_options(&self) -> SearchOptions {
        let defaults = SearchOptions::default();
        SearchOptions {
            namespace: self.repo_id.clone().filter(|r| !r.is_empty()),
            limit: self.limit.unwrap_or(defaults.limit),
            chunk_type: self.chunk_type,
            language: self.language.clone(),
            min_score: self.min_score.unwrap_or(defaults.min_score),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(flatten)]
    options: QueryOptions,
}

#[derive(Debug, Deserialize)]
struct BatchSearchRequest {
    queries: Vec<String>,
    #[serde(flatten)]
    options: QueryOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest {
    repo_id: String,
    #[serde(default)]
    ids: Option<Vec<String>>,
}

// ============ Response types ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexResponse {
    success: bool,
    indexed_count: usize,
    errors: Vec<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    success: bool,
    count: usize,
    results: Vec<SearchResult>,
}

#[derive(Serialize)]
struct BatchSearchResponse {
    success: bool,
    results: Vec<QueryResults>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    success: bool,
    deleted_count: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ============ Handlers ============

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_index(
    State(state): State<AppState>,
    payload: Result<Json<IndexRequest>, JsonRejection>,
) -> Result<Json<IndexResponse>, AppError> {
    let Json(req) = payload?;
    if req.repo_id.trim().is_empty() {
        return Err(bad_request("repoId must not be empty"));
    }
    let report = state.index.index(&req.chunks, &req.repo_id).await;
    Ok(Json(IndexResponse {
        success: true,
        indexed_count: report.indexed_count,
        errors: report.errors,
    }))
}

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(req) = payload?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let results = state
        .index
        .search(&req.query, &req.options.to_search_options())
        .await
        .map_err(internal)?;
    Ok(Json(SearchResponse {
        success: true,
        count: results.len(),
        results,
    }))
}

async fn handle_batch_search(
    State(state): State<AppState>,
    payload: Result<Json<BatchSearchRequest>, JsonRejection>,
) -> Result<Json<BatchSearchResponse>, AppError> {
    let Json(req) = payload?;
    if req.queries.is_empty() {
        return Err(bad_request("queries must not be empty"));
    }
    if req.queries.len() > MAX_BATCH_QUERIES {
        return Err(bad_request(format!(
            "at most {} queries per batch",
            MAX_BATCH_QUERIES
        )));
    }
    if req.queries.iter().any(|q| q.trim().is_empty()) {
        return Err(bad_request("queries must not contain empty strings"));
    }
    let results = state
        .index
        .batch_search(&req.queries, &req.options.to_search_options())
        .await
        .map_err(internal)?;
    Ok(Json(BatchSearchResponse {
        success: true,
        results,
    }))
}

async fn handle_delete(
    State(state): State<AppState>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let Json(req) = payload?;
    if req.repo_id.trim().is_empty() {
        return Err(bad_request("repoId must not be empty"));
    }
    let deleted_count = match &req.ids {
        Some(ids) => state.index.delete_ids(&req.repo_id, ids).await,
        None => state.index.delete_namespace(&req.repo_id).await,
    }
    .map_err(internal)?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted_count,
    }))
}
