use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::analytics::IngestService;
use crate::cursor::CursorSigner;

use super::handlers::{
    get_heatmap, get_metrics, get_trend, health_check, list_events, log_event, AppState,
};

pub fn create_api_router(ingest: IngestService, cursors: CursorSigner) -> Router {
    let state = Arc::new(AppState { ingest, cursors });

    let analytics_routes = Router::new()
        .route("/events", get(list_events).post(log_event))
        .route("/metrics", get(get_metrics))
        .route("/metrics/trend", get(get_trend))
        .route("/metrics/heatmap", get(get_heatmap))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", analytics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
