use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        // Recording control
        .route(
            "/sessions/:session_id/recording/start",
            post(handlers::start_recording),
        )
        .route(
            "/sessions/:session_id/recording/stop",
            post(handlers::stop_recording),
        )
        // The web UI is served from another origin during development
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
