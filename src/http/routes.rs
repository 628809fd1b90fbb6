use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::get_status))
        // Push-to-talk
        .route("/ptt/down", post(handlers::ptt_down))
        .route("/ptt/up", post(handlers::ptt_up))
        .route("/ptt/leave", post(handlers::ptt_leave))
        .route("/input/key", post(handlers::key_input))
        // Time stop and rewind
        .route("/time-stop", post(handlers::time_stop))
        .route("/rewind/targets", get(handlers::rewind_targets))
        .route("/rewind", post(handlers::rewind_to))
        .route("/rewind/cancel", post(handlers::rewind_cancel))
        .route("/finish", post(handlers::finish))
        // The control bar is served from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
