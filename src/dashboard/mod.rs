//! Progress dashboard and operator endpoints.
//!
//! The store handle is installed after start-up so `/health` answers while
//! the database connection is still being established.

pub mod render;

use crate::config::DashboardConfig;
use crate::domain::model::{ArchiveFilter, QueueStats};
use crate::domain::ports::Stores;
use crate::utils::error::{EtlError, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct DashboardState {
    stores: Arc<OnceCell<Stores>>,
    config: Arc<DashboardConfig>,
}

impl DashboardState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            stores: Arc::new(OnceCell::new()),
            config: Arc::new(config),
        }
    }

    pub fn with_stores(config: DashboardConfig, stores: Stores) -> Self {
        let state = Self::new(config);
        state.install(stores);
        state
    }

    /// Makes the stores available to handlers; later calls are ignored.
    pub fn install(&self, stores: Stores) {
        if self.stores.set(stores).is_err() {
            tracing::debug!("Dashboard stores already installed");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.stores.initialized()
    }

    fn stores(&self) -> std::result::Result<&Stores, ApiError> {
        self.stores.get().ok_or(ApiError::NotReady)
    }
}

#[derive(Debug)]
enum ApiError {
    NotReady,
    InvalidParameter(String),
    Internal(EtlError),
}

impl From<EtlError> for ApiError {
    fn from(e: EtlError) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                "database connection not ready".to_string(),
            ),
            ApiError::InvalidParameter(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::Internal(e) => {
                tracing::error!("❌ Dashboard request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.user_friendly_message())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub epoca: Option<String>,
    pub materia: Option<String>,
}

/// `limit` stays raw so malformed values get the same 422 as out-of-range ones.
#[derive(Debug, Deserialize)]
pub struct RetryParams {
    pub limit: Option<String>,
}

impl RetryParams {
    fn parse_limit(&self) -> std::result::Result<Option<u64>, ApiError> {
        let Some(raw) = self.limit.as_deref() else {
            return Ok(None);
        };
        match raw.trim().parse::<i64>() {
            Ok(n) if n >= 1 => Ok(Some(n as u64)),
            _ => Err(ApiError::InvalidParameter(format!(
                "limit must be an integer greater than or equal to 1, got '{}'",
                raw
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryResponse {
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(rename = "reintentos")]
    pub requeued: u64,
    pub limit: Option<u64>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn dashboard(State(state): State<DashboardState>, Query(query): Query<DashboardQuery>) -> Response {
    let stores = match state.stores() {
        Ok(stores) => stores,
        Err(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Html(render::render_connecting()),
            )
                .into_response()
        }
    };

    let filter = ArchiveFilter::new(query.epoca, query.materia);
    let page = async {
        let stats = stores.queue.stats().await?;
        let recent = stores
            .archive
            .latest(&filter, state.config.recent_limit)
            .await?;
        Ok::<_, EtlError>(render::render_dashboard(
            &stats,
            &recent,
            &filter,
            state.config.rubro_preview_chars,
        ))
    };

    match page.await {
        Ok(html) => Html(html).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn stats(State(state): State<DashboardState>) -> std::result::Result<Json<QueueStats>, ApiError> {
    let stats = state.stores()?.queue.stats().await?;
    Ok(Json(stats))
}

async fn retry_errors(
    State(state): State<DashboardState>,
    Query(params): Query<RetryParams>,
) -> std::result::Result<Json<RetryResponse>, ApiError> {
    let limit = params.parse_limit()?;

    let requeued = state.stores()?.queue.requeue_failed(limit).await?;
    tracing::info!("🔁 Requeued {} failed entries (limit: {:?})", requeued, limit);

    Ok(Json(RetryResponse {
        message: "Reintentos programados".to_string(),
        requeued,
        limit,
    }))
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/reintentar-errores", post(retry_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<F>(bind_addr: &str, state: DashboardState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("🌐 Dashboard listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
