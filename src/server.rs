//! HTTP API for exposure tracking and progress queries.
//!
//! Exposes the tracking core as a JSON API for the upload pipeline and
//! dashboard UI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/exposure/track` | Ingest one analysis event (204 on success) |
//! | `GET`  | `/exposure/progress?user_id=` | Full progress summary |
//! | `GET`  | `/exposure/recommendations?user_id=` | Learning-tier items |
//! | `GET`  | `/exposure/mastered?user_id=&type=` | Mastered items by kind |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "user_id must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `storage_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! dashboard clients.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::progress::{ItemKindFilter, ProgressQueryService};
use crate::store::StoreError;
use crate::store_sqlite::SqliteExposureStore;
use crate::tracker::ExposureTracker;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    tracker: Arc<ExposureTracker>,
    progress: Arc<ProgressQueryService>,
}

/// Starts the HTTP server against the configured SQLite database.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteExposureStore::new(pool));

    let state = AppState {
        tracker: Arc::new(ExposureTracker::new(
            store.clone(),
            config.tracking.history_cap,
        )),
        progress: Arc::new(ProgressQueryService::new(store)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/exposure/track", post(handle_track))
        .route("/exposure/progress", get(handle_progress))
        .route("/exposure/recommendations", get(handle_recommendations))
        .route("/exposure/mastered", get(handle_mastered))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!(bind = %config.server.bind, "exposure server listening");
    println!("Exposure server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
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
    /// Machine-readable error code (e.g., `"bad_request"`, `"storage_error"`).
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

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "storage_error".to_string(),
            message: err.to_string(),
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

// ============ POST /exposure/track ============

/// Request body for `POST /exposure/track` — one analysis event.
#[derive(Deserialize)]
struct TrackRequest {
    user_id: String,
    file_id: String,
    filename: String,
    #[serde(default)]
    character_counts: IndexMap<String, i64>,
    #[serde(default)]
    word_counts: IndexMap<String, i64>,
}

/// Handler for `POST /exposure/track`.
///
/// Folds the event into the user's record and returns `204 No Content`.
/// Missing count maps are treated as empty; the session is recorded
/// either way.
async fn handle_track(
    State(state): State<AppState>,
    Json(req): Json<TrackRequest>,
) -> Result<StatusCode, AppError> {
    if req.user_id.is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    if req.file_id.is_empty() {
        return Err(bad_request("file_id must not be empty"));
    }

    state
        .tracker
        .track_exposure(
            &req.user_id,
            &req.character_counts,
            &req.word_counts,
            &req.file_id,
            &req.filename,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /exposure/progress ============

#[derive(Deserialize)]
struct UserQuery {
    user_id: String,
}

async fn handle_progress(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if q.user_id.is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    let summary = state.progress.get_user_progress(&q.user_id).await?;
    Ok(Json(serde_json::to_value(summary).map_err(StoreError::from)?))
}

// ============ GET /exposure/recommendations ============

async fn handle_recommendations(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if q.user_id.is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    let recs = state
        .progress
        .get_learning_recommendations(&q.user_id)
        .await?;
    Ok(Json(serde_json::to_value(recs).map_err(StoreError::from)?))
}

// ============ GET /exposure/mastered ============

#[derive(Deserialize)]
struct MasteredQuery {
    user_id: String,
    /// `characters`, `words`, or `both` (default).
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn handle_mastered(
    State(state): State<AppState>,
    Query(q): Query<MasteredQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if q.user_id.is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    let kind: ItemKindFilter = q
        .kind
        .as_deref()
        .unwrap_or("both")
        .parse()
        .map_err(bad_request)?;

    let items = state.progress.get_mastered_items(&q.user_id, kind).await?;
    Ok(Json(serde_json::to_value(items).map_err(StoreError::from)?))
}
