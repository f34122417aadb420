//! HTTP control surface
//!
//! Thin axum layer over a [`CoordinatorHandle`]: POST routes only dispatch
//! events, GET routes read snapshots. SSE streams every committed context.

pub mod handlers;
pub mod sse;

use crate::coordinator::CoordinatorHandle;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    /// Server port
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(handlers::health))
        // SSE context stream
        .route("/events", get(sse::event_stream))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                .route("/state", get(handlers::get_state))
                .route("/diagnostics", get(handlers::get_diagnostics))
                // Playback commands
                .route("/playback/load", post(handlers::load))
                .route("/playback/play", post(handlers::play))
                .route("/playback/pause", post(handlers::pause))
                .route("/playback/stop", post(handlers::stop))
                .route("/playback/seek", post(handlers::seek))
                .route("/playback/rate", post(handlers::set_rate))
                .route("/playback/volume", post(handlers::set_volume))
                .route("/playback/jump_forward", post(handlers::jump_forward))
                .route("/playback/jump_backward", post(handlers::jump_backward))
                // App lifecycle
                .route("/lifecycle/foreground", post(handlers::foreground))
                .route("/lifecycle/background", post(handlers::background))
                // Position-jump notice
                .route("/position_jump/undo", post(handlers::undo_position_jump))
                .route("/position_jump/dismiss", post(handlers::dismiss_position_jump)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}
