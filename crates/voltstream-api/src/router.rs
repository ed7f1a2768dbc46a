//! Route definitions.
//!
//! REST routes are mounted under `/api`; the realtime WebSocket endpoint
//! is at `/ws`.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/sessions", post(handlers::session::start_session))
        .route("/sessions/{id}", get(handlers::session::get_session))
        .route("/sessions/{id}/stop", post(handlers::session::stop_session))
        .route(
            "/sessions/{id}/pause",
            post(handlers::session::pause_session),
        )
        .route(
            "/sessions/{id}/resume",
            post(handlers::session::resume_session),
        )
        .route(
            "/users/{user_id}/sessions",
            get(handlers::session::session_history),
        )
        .route(
            "/users/{user_id}/sessions/active",
            get(handlers::session::active_session),
        )
        .route(
            "/stations/{station_id}",
            get(handlers::station::station_status),
        )
        .route(
            "/stations/{station_id}/connectors",
            get(handlers::station::station_connectors),
        );

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(handlers::ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
