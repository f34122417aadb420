//! Server-Sent Events (SSE) context stream
//!
//! Sends the current snapshot on connect, then every committed context.
//! Lagging clients skip ahead to the newest snapshot.

use super::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const EVENT_NAME: &str = "PlayerContext";

/// GET /events - SSE context stream
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected");

    let mut rx = state.coordinator.updates();
    let initial = state.coordinator.context();

    let stream = async_stream::stream! {
        match Event::default().event(EVENT_NAME).json_data(initial.as_ref()) {
            Ok(event) => yield Ok(event),
            Err(e) => warn!("SSE: Failed to serialize initial context: {}", e),
        }

        loop {
            match rx.recv().await {
                Ok(context) => {
                    match Event::default().event(EVENT_NAME).json_data(context.as_ref()) {
                        Ok(event) => yield Ok(event),
                        Err(e) => warn!("SSE: Failed to serialize context: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("SSE: Client lagged, skipped {} snapshots", skipped);
                }
                Err(RecvError::Closed) => {
                    info!("SSE: Coordinator stopped, closing stream");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
