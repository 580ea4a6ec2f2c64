//! Crawl progress: status snapshot and WebSocket push channel

use crate::api::AppState;
use crate::crawler::{CrawlEvent, JobStatus};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

pub(crate) async fn job_status(State(state): State<AppState>) -> Json<JobStatus> {
    Json(state.jobs.status())
}

pub(crate) async fn progress_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    // subscribe before the upgrade so nothing sent meanwhile is missed
    let events = state.jobs.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, events))
}

/// Sends every event as a JSON text frame until either side goes away
///
/// Events published before the observer connected are not replayed. An
/// observer that falls behind skips what it missed.
async fn forward_events(mut socket: WebSocket, mut events: Receiver<CrawlEvent>) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Progress observer skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("Progress observer disconnected");
}
