//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Banner |
//! | `GET`  | `/health` | Liveness, version and whether data is loaded |
//! | `GET`  | `/status` | Inventory status with per-file load reports and the last scheduled reload |
//! | `POST` | `/search` | `{ "query": "...", "limit": 20 }` |
//! | `GET`  | `/search?q=...&limit=...` | Same as `POST /search` |
//! | `POST` | `/reload` | Rebuild from the spreadsheets now |
//! | `GET`  | `/files` | Spreadsheets in the data directory |
//! | `GET`  | `/parts/{code}` | Raw rows for a part code, by file |
//! | `GET`  | `/analytics/summary` | Totals over the current inventory |
//! | `GET`  | `/analytics/deltas` | Changes between adjacent snapshots |
//! | `GET`  | `/analytics/history/{code}` | Per-part history with quantity stats |
//! | `GET`  | `/analytics/locations` | Parts whose location changed |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_loaded", "message": "inventory not loaded yet" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `not_loaded` (503),
//! `reload_failed` (503), `internal` (500). A panicking handler is turned
//! into an `internal` response; the server keeps running.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends on
//! other hosts can query the API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use crate::analytics::{LocationChange, PartHistory, SnapshotDelta, Summary};
use crate::config::Config;
use crate::error::{InventoryError, LoadError};
use crate::files::SpreadsheetFile;
use crate::scheduler::{spawn_periodic_reload, ReloadEvent};
use crate::search::SearchResponse;
use crate::service::{Inventory, InventoryStatus, PartOccurrences, ReloadSummary};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<Inventory>,
    /// Outcomes of the scheduled reloads; `None` when the scheduler is off.
    pub scheduler: Option<watch::Receiver<ReloadEvent>>,
}

impl AppState {
    pub fn new(inventory: Arc<Inventory>) -> Self {
        Self {
            inventory,
            scheduler: None,
        }
    }
}

/// Loads the inventory (cache first), starts the reload scheduler when
/// enabled, and serves until the process is terminated.
///
/// A failed initial load does not stop the server: `/health` and `/status`
/// keep answering and the next reload may succeed.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let inventory = Arc::new(Inventory::new(config.clone()));

    let inv = inventory.clone();
    match tokio::task::spawn_blocking(move || inv.startup()).await? {
        Ok(()) => {
            let status = inventory.status();
            tracing::info!(
                items = status.item_count,
                records = status.record_count,
                files = status.file_count,
                "inventory loaded"
            );
        }
        Err(e) => tracing::error!(error = %format!("{:#}", e), "initial load failed"),
    }

    let mut state = AppState::new(inventory.clone());
    if config.reload.is_enabled() {
        let period = Duration::from_secs(config.reload.interval_secs);
        // Detached: the task runs for the lifetime of the runtime.
        let (_task, events) = spawn_periodic_reload(inventory, period);
        state.scheduler = Some(events);
        tracing::info!(period_secs = period.as_secs(), "reload scheduler started");
    }

    serve_state(config, state).await
}

/// Serves an already constructed inventory on `[server].bind`.
pub async fn run_server_with_inventory(
    config: &Config,
    inventory: Arc<Inventory>,
) -> anyhow::Result<()> {
    serve_state(config, AppState::new(inventory)).await
}

/// Serves `state` on `[server].bind`.
pub async fn serve_state(config: &Config, state: AppState) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(state);

    println!("Stock lookup listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    router_with(state, Router::new())
}

/// The API plus `extra` routes, all behind the same panic and CORS layers.
pub fn router_with(state: AppState, extra: Router<AppState>) -> Router {
    with_service_layers(api_routes().merge(extra)).with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/search", post(handle_search_post).get(handle_search_get))
        .route("/reload", post(handle_reload))
        .route("/files", get(handle_files))
        .route("/parts/{code}", get(handle_part))
        .route("/analytics/summary", get(handle_summary))
        .route("/analytics/deltas", get(handle_deltas))
        .route("/analytics/history/{code}", get(handle_history))
        .route("/analytics/locations", get(handle_locations))
}

fn with_service_layers(routes: Router<AppState>) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    routes
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
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

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn reload_failed(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::SERVICE_UNAVAILABLE, "reload_failed", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// Maps service errors onto status codes. Typed errors are matched first;
/// validation failures are recognized by message.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if let Some(e) = err.downcast_ref::<InventoryError>() {
            return match e {
                InventoryError::NotLoaded => {
                    AppError::new(StatusCode::SERVICE_UNAVAILABLE, "not_loaded", message)
                }
                InventoryError::NoRecords { .. } => reload_failed(message),
            };
        }
        if let Some(LoadError::MissingDirectory(_)) = err.downcast_ref::<LoadError>() {
            return not_found(message);
        }
        if message.contains("must be") {
            return AppError::new(StatusCode::BAD_REQUEST, "bad_request", message);
        }
        internal(message)
    }
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %detail, "handler panicked");

    internal("internal error while handling the request").into_response()
}

/// Runs a blocking inventory call off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| internal(format!("task failed: {}", e)))?
        .map_err(AppError::from)
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct BannerResponse {
    message: String,
}

async fn handle_index() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: format!(
            "Stock lookup API v{}. POST /search with {{\"query\": \"<part code>\"}}.",
            env!("CARGO_PKG_VERSION")
        ),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    loaded: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        loaded: state.inventory.is_loaded(),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    inventory: InventoryStatus,
    /// Latest scheduled reload, once one has finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduler: Option<ReloadEvent>,
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let scheduler = state
        .scheduler
        .as_ref()
        .map(|rx| rx.borrow().clone())
        .filter(|event| event.runs > 0);
    Json(StatusResponse {
        inventory: state.inventory.status(),
        scheduler,
    })
}

// ============ /search ============

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

async fn handle_search_post(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    Ok(Json(state.inventory.search(&req.query, req.limit)?))
}

async fn handle_search_get(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    Ok(Json(state.inventory.search(&params.q, params.limit)?))
}

// ============ POST /reload ============

#[derive(Serialize)]
struct ReloadResponse {
    ok: bool,
    #[serde(flatten)]
    summary: ReloadSummary,
}

async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let inv = state.inventory.clone();
    let summary = blocking(move || inv.reload())
        .await
        .map_err(|e| reload_failed(e.message))?;
    Ok(Json(ReloadResponse { ok: true, summary }))
}

// ============ files and parts ============

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<SpreadsheetFile>,
}

async fn handle_files(State(state): State<AppState>) -> Result<Json<FilesResponse>, AppError> {
    let inv = state.inventory.clone();
    let files = blocking(move || inv.files()).await?;
    Ok(Json(FilesResponse { files }))
}

async fn handle_part(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PartOccurrences>, AppError> {
    let occurrences = state.inventory.part_occurrences(&code)?;
    if occurrences.total == 0 {
        return Err(not_found(format!("part not found: {}", code)));
    }
    Ok(Json(occurrences))
}

// ============ /analytics ============

async fn handle_summary(State(state): State<AppState>) -> Result<Json<Summary>, AppError> {
    Ok(Json(state.inventory.summary()?))
}

#[derive(Serialize)]
struct DeltasResponse {
    deltas: Vec<SnapshotDelta>,
}

async fn handle_deltas(State(state): State<AppState>) -> Result<Json<DeltasResponse>, AppError> {
    Ok(Json(DeltasResponse {
        deltas: state.inventory.deltas()?,
    }))
}

async fn handle_history(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PartHistory>, AppError> {
    state
        .inventory
        .history(&code)?
        .map(Json)
        .ok_or_else(|| not_found(format!("part not found: {}", code)))
}

#[derive(Serialize)]
struct LocationsResponse {
    changes: Vec<LocationChange>,
}

async fn handle_locations(
    State(state): State<AppState>,
) -> Result<Json<LocationsResponse>, AppError> {
    Ok(Json(LocationsResponse {
        changes: state.inventory.location_changes()?,
    }))
}
