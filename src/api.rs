use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::diagnostics::TraceEngine;
use crate::engine::{CycleReport, MonitorState};
use crate::error::MonitorError;
use crate::models::{Link, LinkStatus, StatusSummary, TraceReport};
use crate::store::{link_states, summarize, StatusStore};

#[derive(Clone)]
pub struct ApiState {
    pub monitor: Arc<MonitorState>,
    pub store: Arc<dyn StatusStore>,
    pub tracer: Arc<TraceEngine>,
}

#[derive(Debug, Serialize)]
pub struct LinkView {
    #[serde(flatten)]
    pub link: Link,
    pub status: LinkStatus,
}

impl LinkView {
    fn new(link: Link, status: Option<Arc<LinkStatus>>) -> Self {
        let status = status.map_or_else(|| LinkStatus::new(link.link_id.clone()), |s| (*s).clone());
        Self { link, status }
    }
}

pub struct ApiError(MonitorError);

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            MonitorError::LinkNotFound(_) => StatusCode::NOT_FOUND,
            MonitorError::StoreUnavailable(_) | MonitorError::InventoryUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            MonitorError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn get_summary(State(state): State<ApiState>) -> Result<Json<StatusSummary>, ApiError> {
    let links = state.monitor.inventory();
    Ok(Json(summarize(state.store.as_ref(), &links).await?))
}

pub async fn get_links(State(state): State<ApiState>) -> Result<Json<Vec<LinkView>>, ApiError> {
    let links = state.monitor.inventory();
    let rows = link_states(state.store.as_ref(), &links).await?;
    Ok(Json(rows.into_iter().map(|(link, status)| LinkView::new(link, status)).collect()))
}

pub async fn get_link(
    State(state): State<ApiState>,
    Path(link_id): Path<String>,
) -> Result<Json<LinkView>, ApiError> {
    let link = state
        .monitor
        .find_link(&link_id)
        .ok_or_else(|| MonitorError::LinkNotFound(link_id.clone()))?;
    let status = state.store.get(&link_id).await?;
    Ok(Json(LinkView::new(link, status)))
}

pub async fn get_cycle(State(state): State<ApiState>) -> Json<Option<CycleReport>> {
    Json(state.monitor.last_cycle())
}

pub async fn run_trace(
    State(state): State<ApiState>,
    Path(link_id): Path<String>,
) -> Result<Json<TraceReport>, ApiError> {
    Ok(Json(state.tracer.trace(&link_id).await?))
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/summary", get(get_summary))
        .route("/api/links", get(get_links))
        .route("/api/links/{id}", get(get_link))
        .route("/api/links/{id}/trace", post(run_trace))
        .route("/api/cycle", get(get_cycle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(port: u16, state: ApiState) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {}", port))?;
    info!("Dashboard API: http://localhost:{}", addr.port());
    axum::serve(listener, app).await.context("API server failed")
}
