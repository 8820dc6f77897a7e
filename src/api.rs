use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::error::{PipelineError, StoreError};
use crate::ingest::registry::{self, SourceRegistry};
use crate::ingest::types::{Category, EventType, Region, SourceDescriptor, SourceFamily};
use crate::ingest::Pipeline;
use crate::store::{EventQuery, EventSort, NewsQuery, NewsSort, Store};
use crate::translate::TranslationOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub pipeline: Arc<Pipeline>,
    pub orchestrator: Arc<TranslationOrchestrator>,
    /// Operator token; admin routes answer 403 when unset.
    pub admin_token: Option<String>,
}

impl AppState {
    fn registry(&self) -> &SourceRegistry {
        self.pipeline.registry()
    }
}

pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/admin/run/{family}", post(run_family))
        .route("/admin/translate", post(translate_sweep))
        .route("/admin/translate/requeue", post(requeue_failed))
        .route("/admin/sources", get(list_sources).post(upsert_source))
        .route("/admin/sources/{name}", delete(delete_source))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/news", get(list_news))
        .route("/api/news/{id}", get(get_news))
        .route("/api/events", get(list_events))
        .merge(admin)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "missing admin token".into()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "admin access denied".into()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".into()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "store error while serving request");
        ApiError::Unavailable(e.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::RunInProgress(_) | PipelineError::SweepInProgress => {
                ApiError::Conflict(e.to_string())
            }
            PipelineError::PersistenceUnavailable(_) => ApiError::Unavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ------------------------------------------------------------
// Admin auth
// ------------------------------------------------------------

fn provided_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| headers.get("x-admin-token").and_then(|v| v.to_str().ok()))
        .map(str::trim)
}

fn tokens_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::Forbidden);
    };
    match provided_token(req.headers()) {
        None => return Err(ApiError::Unauthorized),
        Some(t) if !tokens_match(t, expected) => return Err(ApiError::Forbidden),
        Some(_) => {}
    }
    Ok(next.run(req).await)
}

// ------------------------------------------------------------
// Read interface
// ------------------------------------------------------------

fn parse_opt<T>(field: &str, v: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match v.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|e| ApiError::BadRequest(format!("{field}: {e}"))),
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
struct NewsParams {
    region: Option<String>,
    category: Option<String>,
    q: Option<String>,
    sort: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EventParams {
    #[serde(rename = "type")]
    event_type: Option<String>,
    region: Option<String>,
    q: Option<String>,
    sort: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

async fn list_news(
    State(state): State<AppState>,
    Query(p): Query<NewsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = match p.sort.as_deref().map(str::trim) {
        None | Some("") | Some("published_desc") => NewsSort::PublishedDesc,
        Some("published_asc") => NewsSort::PublishedAsc,
        Some(other) => return Err(ApiError::BadRequest(format!("sort: unknown value {other}"))),
    };
    let query = NewsQuery {
        region: parse_opt::<Region>("region", p.region.as_deref())?,
        category: parse_opt::<Category>("category", p.category.as_deref())?,
        search: non_blank(p.q),
        sort,
        page: p.page.unwrap_or(1),
        page_size: p.page_size.unwrap_or(0),
    };
    Ok(Json(state.store.list_news(&query)?))
}

async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_news(id)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn list_events(
    State(state): State<AppState>,
    Query(p): Query<EventParams>,
) -> Result<impl IntoResponse, ApiError> {
    let sort = match p.sort.as_deref().map(str::trim) {
        None | Some("") | Some("start_asc") => EventSort::StartAsc,
        Some("start_desc") => EventSort::StartDesc,
        Some("location") => EventSort::Location,
        Some(other) => return Err(ApiError::BadRequest(format!("sort: unknown value {other}"))),
    };
    let query = EventQuery {
        region: parse_opt::<Region>("region", p.region.as_deref())?,
        event_type: parse_opt::<EventType>("type", p.event_type.as_deref())?,
        search: non_blank(p.q),
        sort,
        page: p.page.unwrap_or(1),
        page_size: p.page_size.unwrap_or(0),
    };
    Ok(Json(state.store.list_events(&query)?))
}

// ------------------------------------------------------------
// Operator triggers
// ------------------------------------------------------------

async fn run_family(
    State(state): State<AppState>,
    Path(family): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let family: SourceFamily = family
        .parse()
        .map_err(|e: crate::ingest::types::UnknownVariant| ApiError::BadRequest(e.to_string()))?;
    tracing::info!(%family, "manual run requested");
    let report = state.pipeline.run_family(family).await?;
    Ok(Json(report))
}

async fn translate_sweep(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.orchestrator.run_sweep().await?;
    Ok(Json(report))
}

async fn requeue_failed(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let n = state.orchestrator.requeue_failed()?;
    Ok(Json(json!({ "requeued": n })))
}

// ------------------------------------------------------------
// Source configuration
// ------------------------------------------------------------

async fn list_sources(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.registry().all()?))
}

async fn upsert_source(
    State(state): State<AppState>,
    Json(mut source): Json<SourceDescriptor>,
) -> Result<impl IntoResponse, ApiError> {
    source.name = source.name.trim().to_string();
    source.endpoint = source.endpoint.trim().to_string();
    registry::validate(&source).map_err(ApiError::BadRequest)?;
    state.registry().upsert(&source)?;
    tracing::info!(source = %source.name, "source upserted");
    Ok((StatusCode::OK, Json(source)))
}

async fn delete_source(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.registry().remove(&name)? {
        tracing::info!(source = %name, "source deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
