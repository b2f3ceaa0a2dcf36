use adcore::feed::load_into_catalog;
use adcore::{
    AdQuery, CatalogError, IndexHandle, IndexStats, InMemoryCatalog, Item, ItemCreate, ItemFilter, RankingEngine,
    ScoringWeights, Winner,
};
use anyhow::Result;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod events;

use events::{event_channel, EventPublisher, TrackingEvent, TrackingRecord};

pub const MAX_LIMIT: usize = 50;
const MAX_PARAM_CHARS: usize = 50;

/// Settings resolved from the command line and environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub catalog_path: Option<PathBuf>,
    pub serve_base_url: String,
    pub default_limit: usize,
    pub weights: ScoringWeights,
    pub admin_token: Option<String>,
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            serve_base_url: adcore::ranking::DEFAULT_SERVE_BASE_URL.to_string(),
            default_limit: 4,
            weights: ScoringWeights::default(),
            admin_token: None,
            event_buffer: 1024,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<InMemoryCatalog>,
    pub index: Arc<IndexHandle>,
    pub engine: Arc<RankingEngine>,
    pub events: EventPublisher,
    pub default_limit: usize,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Rebuild the index from the current catalog and swap it in. The catalog
    /// is read under the rebuild lock, so concurrent refreshes install in order.
    pub fn refresh_index(&self) -> IndexStats {
        let catalog = &self.catalog;
        self.index.rebuild_from(|| catalog.snapshot()).stats()
    }

    /// [`AppState::refresh_index`] on the blocking pool, off the async workers.
    pub async fn refresh_index_blocking(&self) -> Result<IndexStats, tokio::task::JoinError> {
        let state = self.clone();
        tokio::task::spawn_blocking(move || state.refresh_index()).await
    }
}

/// Load the catalog, build the first index snapshot and wire the event channel.
/// The receiver must be drained (see [`events::run_event_log`]) or tracking
/// requests will start failing once the buffer fills.
pub fn build_state(config: ServerConfig) -> Result<(AppState, mpsc::Receiver<TrackingRecord>)> {
    let catalog = Arc::new(InMemoryCatalog::new());
    if let Some(path) = &config.catalog_path {
        load_into_catalog(&catalog, path)?;
    }
    let engine = RankingEngine::new(config.weights).with_serve_base_url(config.serve_base_url);
    let (events, rx) = event_channel(config.event_buffer);
    let state = AppState {
        catalog,
        index: Arc::new(IndexHandle::default()),
        engine: Arc::new(engine),
        events,
        default_limit: config.default_limit.min(MAX_LIMIT),
        admin_token: config.admin_token,
    };
    state.refresh_index();
    Ok((state, rx))
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/ads", get(ads_handler))
        .route("/api/v1/lineitems", post(create_line_item).get(list_line_items))
        .route("/api/v1/lineitems/:id", get(get_line_item))
        .route("/api/v1/tracking", post(track_event))
        .route("/admin/index/rebuild", post(rebuild_index))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Rebuild the index from the catalog every `every`, until the runtime shuts down.
pub fn spawn_index_refresh(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = state.refresh_index_blocking().await {
                tracing::error!(%err, "periodic index refresh failed");
            }
        }
    })
}

/// JSON error body: `{"code", "message", "details"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    details: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str, details: impl Into<Option<String>>) -> Self {
        Self { status, message, details: details.into() }
    }

    fn bad_request(message: &'static str, details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, Some(details.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": self.status.as_u16(),
            "message": self.message,
            "details": self.details,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Invalid { .. } => ApiError::bad_request("Invalid line item", err.to_string()),
            CatalogError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, "Line item not found", err.to_string()),
        }
    }
}

fn rebuild_failed(err: tokio::task::JoinError) -> ApiError {
    tracing::error!(%err, "index rebuild failed");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Index rebuild failed", err.to_string())
}

#[derive(Debug, Deserialize)]
pub struct AdsParams {
    pub placement: Option<String>,
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub category: String,
    pub limit: Option<usize>,
}

fn check_len(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.chars().count() > MAX_PARAM_CHARS {
        return Err(ApiError::bad_request("Invalid query parameters", format!("{field} must be at most {MAX_PARAM_CHARS} characters")));
    }
    Ok(())
}

pub async fn ads_handler(
    State(state): State<AppState>,
    params: Result<Query<AdsParams>, QueryRejection>,
) -> Result<Json<Vec<Winner>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request("Failed to parse query parameters", e.body_text()))?;
    let placement = params.placement.unwrap_or_default();
    if placement.trim().is_empty() {
        return Err(ApiError::bad_request("Invalid query parameters", "placement is required"));
    }
    check_len("placement", &placement)?;
    check_len("keyword", &params.keyword)?;
    check_len("category", &params.category)?;

    let limit = params.limit.unwrap_or(state.default_limit).min(MAX_LIMIT);
    let query = AdQuery::new(placement, limit).keyword(params.keyword).category(params.category);
    let index = state.index.current();
    Ok(Json(state.engine.rank(&index, state.catalog.as_ref(), &query)))
}

pub async fn create_line_item(
    State(state): State<AppState>,
    body: Result<Json<ItemCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let Json(input) = body.map_err(|e| ApiError::bad_request("Invalid JSON", e.body_text()))?;
    let item = state.catalog.create(input)?;
    tracing::info!(id = %item.id, placement = %item.placement, "line item created");
    state.refresh_index_blocking().await.map_err(rebuild_failed)?;
    Ok((StatusCode::CREATED, Json(Item::clone(&item))))
}

pub async fn list_line_items(State(state): State<AppState>, Query(filter): Query<ItemFilter>) -> Json<Vec<Item>> {
    Json(state.catalog.list(&filter).iter().map(|i| Item::clone(i)).collect())
}

pub async fn get_line_item(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Item>, ApiError> {
    let item = state.catalog.get(&id)?;
    Ok(Json(Item::clone(&item)))
}

pub async fn track_event(
    State(state): State<AppState>,
    body: Result<Json<TrackingEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(event) = body.map_err(|e| ApiError::bad_request("Invalid JSON", e.body_text()))?;
    let record = event.into_record().map_err(|details| ApiError::bad_request("Invalid tracking event", details))?;
    match state.events.publish(record) {
        Ok(()) => Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "accepted" })))),
        Err(err) => {
            tracing::warn!(%err, "tracking event dropped");
            Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Tracking unavailable", err.to_string()))
        }
    }
}

async fn rebuild_index(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<IndexStats>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let stats = state.refresh_index_blocking().await.map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(stats))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
