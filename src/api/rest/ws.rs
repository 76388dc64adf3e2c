use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::models::event::DomainEvent;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    /// Comma-separated event types to receive, e.g.
    /// `?types=load_published,trip_location`. Absent means everything.
    types: Option<String>,
}

/// Streams domain events (published loads, accepted offers, trip positions)
/// to connected dashboards.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let filter: Option<Vec<String>> = query.types.map(|raw| {
        raw.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    });

    ws.on_upgrade(|socket| handle_socket(socket, state, filter))
}

fn event_type(event: &DomainEvent) -> &'static str {
    match event {
        DomainEvent::LoadPublished { .. } => "load_published",
        DomainEvent::OfferAccepted { .. } => "offer_accepted",
        DomainEvent::TripStarted { .. } => "trip_started",
        DomainEvent::TripLocation { .. } => "trip_location",
        DomainEvent::TripCompleted { .. } => "trip_completed",
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, filter: Option<Vec<String>>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.events_tx.subscribe();

    info!("event stream client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                // A slow consumer missed events; keep streaming from here.
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream client lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if let Some(wanted) = &filter {
                if !wanted.iter().any(|t| t == event_type(&event)) {
                    continue;
                }
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("event stream client disconnected");
}
