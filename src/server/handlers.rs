//! HTTP and WebSocket request handlers.

use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::analysis::PropertyMap;
use crate::error::Result;
use crate::pipeline::{Outbound, Transport};
use crate::server::stream::serve_socket;
use crate::server::AppState;

/// Upgrade to a session WebSocket.
pub async fn handle_ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.pipeline.registry().len(),
        "connections": state.connections.len(),
    }))
}

/// Prometheus exposition.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.exporter {
        Some(exporter) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            exporter.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response(),
    }
}

/// Connection counters plus the live queue counters.
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut stats = state.metrics.to_json();
    stats["queue"] = serde_json::json!(state.pipeline.queue_info().peek());
    stats["sessions"] = serde_json::json!(state.pipeline.registry().len());
    Json(stats)
}

/// Current pipeline properties.
pub async fn get_pipeline(State(state): State<Arc<AppState>>) -> Result<Json<PropertyMap>> {
    Ok(Json(state.pipeline.client_properties(None)?))
}

/// Update pipeline properties and tell every connected client.
///
/// The batch is checked as a whole; a bad entry rejects it without
/// changing anything.
pub async fn put_pipeline(
    State(state): State<Arc<AppState>>,
    Json(updates): Json<PropertyMap>,
) -> Result<Json<PropertyMap>> {
    let applied = state.pipeline.apply_properties(&updates)?;

    if !applied.is_empty() {
        let changed = state.pipeline.client_properties(Some(applied.as_slice()))?;
        let reached = state
            .connections
            .broadcast(Outbound::Properties(changed))
            .await;
        info!(applied = applied.len(), reached, "Pipeline properties updated");
    }

    Ok(Json(state.pipeline.client_properties(None)?))
}

/// Names accepted by `start_analysis`.
pub async fn list_analyzers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.catalog.names())
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(handle_ws))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .route("/pipeline", get(get_pipeline).put(put_pipeline))
        .route("/analyzers", get(list_analyzers))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
