use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::ws::ws_handler;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Recording uploads stream arbitrary media; the fixed body limit is
    // disabled and bounds come from the chunking client instead
    let upload_routes = Router::new()
        .route("/recordings/:kind", post(handlers::upload_recording))
        .route("/recordings/:kind/chunk", post(handlers::upload_chunk))
        .layer(DefaultBodyLimit::disable());

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/conversion-status/:job_id", get(handlers::conversion_status))
        .merge(upload_routes);

    Router::new()
        .nest("/api", api_routes)
        // Signaling channel
        .route("/ws", any(ws_handler))
        // Stored recording fetch (with post-conversion redirect)
        .route("/recordings/:kind/:file_name", get(handlers::fetch_recording))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
