//! Streaming channel: clients subscribe per ride and receive `rideUpdate`
//! and `driverPosition` pushes at the simulator's tick rate.

use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use ridehail_dispatcher::RideEvent;

use crate::routes::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Subscribe { ride_id: String },
}

/// Per-connection subscription set; the broadcast hub carries every
/// ride's events, the connection forwards only the rides asked for.
#[derive(Debug, Default)]
struct Subscriptions {
    rides: HashSet<String>,
}

impl Subscriptions {
    fn apply(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Subscribe { ride_id } => {
                debug!(ride_id, "websocket subscription added");
                self.rides.insert(ride_id);
            }
        }
    }

    fn wants(&self, event: &RideEvent) -> bool {
        self.rides.contains(event.ride_id())
    }
}

pub async fn ws_handler(
    State(state): State<AppState>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut events = state.dispatcher.subscribe();
    let mut subscriptions = Subscriptions::default();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => subscriptions.apply(message),
                            Err(e) => {
                                debug!(error = %e, "ignoring malformed client message");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket receive failed");
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) if subscriptions.wants(&event) => {
                        match serde_json::to_string(&event) {
                            Ok(payload) => {
                                if socket.send(Message::Text(payload.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to encode event"),
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket subscriber lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
