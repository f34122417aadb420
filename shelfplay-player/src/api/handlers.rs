//! HTTP request handlers
//!
//! Every command handler validates its body, dispatches one event and
//! answers 202 with the snapshot current at dispatch time; the event is
//! processed asynchronously.

use super::AppState;
use crate::coordinator::{DiagnosticsExport, EventSource, StateContext};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shelfplay_common::events::{PlayerEvent, TrackDescriptor};
use tracing::{debug, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    state: String,
    port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    pub track: TrackDescriptor,
    #[serde(default)]
    pub start_position: Option<f64>,
    #[serde(default)]
    pub auto_play: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub position: f64,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct JumpRequest {
    #[serde(default)]
    pub seconds: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub accepted: bool,
    pub event: String,
    pub context: StateContext,
}

/// Error body returned by every failing handler
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

type ApiResult = std::result::Result<(StatusCode, Json<DispatchResponse>), ApiError>;

fn dispatch(state: &AppState, source: EventSource, event: PlayerEvent) -> ApiResult {
    let event_type = event.event_type();
    if !state.coordinator.dispatch_from(source, event) {
        warn!("Coordinator unavailable, dropped {}", event_type);
        return Err(ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "coordinator is not running".to_string(),
        });
    }
    debug!("Dispatched {} via HTTP", event_type);
    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchResponse {
            accepted: true,
            event: event_type.to_string(),
            context: (*state.coordinator.context()).clone(),
        }),
    ))
}

fn require_finite(name: &str, value: f64) -> std::result::Result<f64, ApiError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ApiError::bad_request(format!("{} must be a finite number", name)))
    }
}

// ============================================================================
// Read Endpoints
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "shelfplay-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        state: state.coordinator.context().current_state.to_string(),
        port: state.port,
    })
}

/// GET /api/v1/state - Current context snapshot
pub async fn get_state(State(state): State<AppState>) -> Json<StateContext> {
    Json((*state.coordinator.context()).clone())
}

/// GET /api/v1/diagnostics - Diagnostics export
pub async fn get_diagnostics(State(state): State<AppState>) -> Json<DiagnosticsExport> {
    Json(state.coordinator.diagnostics().export())
}

// ============================================================================
// Playback Commands
// ============================================================================

/// POST /api/v1/playback/load
pub async fn load(State(state): State<AppState>, Json(req): Json<LoadRequest>) -> ApiResult {
    if req.track.library_item_id.is_empty() {
        return Err(ApiError::bad_request("track.libraryItemId is required"));
    }
    if let Some(start) = req.start_position {
        require_finite("startPosition", start)?;
    }
    dispatch(
        &state,
        EventSource::Ui,
        PlayerEvent::LoadTrack {
            track: req.track,
            start_position: req.start_position,
            auto_play: req.auto_play,
        },
    )
}

/// POST /api/v1/playback/play
pub async fn play(State(state): State<AppState>) -> ApiResult {
    dispatch(&state, EventSource::Ui, PlayerEvent::Play)
}

/// POST /api/v1/playback/pause
pub async fn pause(State(state): State<AppState>) -> ApiResult {
    dispatch(&state, EventSource::Ui, PlayerEvent::Pause)
}

/// POST /api/v1/playback/stop
pub async fn stop(State(state): State<AppState>) -> ApiResult {
    dispatch(&state, EventSource::Ui, PlayerEvent::Stop)
}

/// POST /api/v1/playback/seek
pub async fn seek(State(state): State<AppState>, Json(req): Json<SeekRequest>) -> ApiResult {
    let position = require_finite("position", req.position)?;
    dispatch(&state, EventSource::Ui, PlayerEvent::Seek { position })
}

/// POST /api/v1/playback/rate
pub async fn set_rate(State(state): State<AppState>, Json(req): Json<RateRequest>) -> ApiResult {
    let rate = require_finite("rate", req.rate)?;
    if rate <= 0.0 {
        return Err(ApiError::bad_request("rate must be positive"));
    }
    dispatch(&state, EventSource::Ui, PlayerEvent::SetRate { rate })
}

/// POST /api/v1/playback/volume
pub async fn set_volume(
    State(state): State<AppState>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult {
    let volume = require_finite("volume", req.volume)?;
    dispatch(&state, EventSource::Ui, PlayerEvent::SetVolume { volume })
}

/// POST /api/v1/playback/jump_forward
///
/// Body is optional; without one the configured jump length applies.
pub async fn jump_forward(
    State(state): State<AppState>,
    body: Option<Json<JumpRequest>>,
) -> ApiResult {
    let seconds = jump_seconds(body)?;
    dispatch(&state, EventSource::Ui, PlayerEvent::JumpForward { seconds })
}

/// POST /api/v1/playback/jump_backward
pub async fn jump_backward(
    State(state): State<AppState>,
    body: Option<Json<JumpRequest>>,
) -> ApiResult {
    let seconds = jump_seconds(body)?;
    dispatch(&state, EventSource::Ui, PlayerEvent::JumpBackward { seconds })
}

fn jump_seconds(body: Option<Json<JumpRequest>>) -> std::result::Result<Option<f64>, ApiError> {
    match body.and_then(|Json(req)| req.seconds) {
        Some(seconds) if !seconds.is_finite() || seconds < 0.0 => Err(ApiError::bad_request(
            "seconds must be a non-negative number",
        )),
        other => Ok(other),
    }
}

// ============================================================================
// Lifecycle and Position-Jump Notice
// ============================================================================

/// POST /api/v1/lifecycle/foreground
pub async fn foreground(State(state): State<AppState>) -> ApiResult {
    dispatch(&state, EventSource::Lifecycle, PlayerEvent::AppForegrounded)
}

/// POST /api/v1/lifecycle/background
pub async fn background(State(state): State<AppState>) -> ApiResult {
    dispatch(&state, EventSource::Lifecycle, PlayerEvent::AppBackgrounded)
}

/// POST /api/v1/position_jump/undo
pub async fn undo_position_jump(State(state): State<AppState>) -> ApiResult {
    dispatch(&state, EventSource::Ui, PlayerEvent::UndoPositionJump)
}

/// POST /api/v1/position_jump/dismiss
pub async fn dismiss_position_jump(State(state): State<AppState>) -> ApiResult {
    dispatch(&state, EventSource::Ui, PlayerEvent::DismissPositionJump)
}
