//! WebSocket bridge to the bus
//!
//! `GET /ws/:exchange` upgrades to a socket whose inbound text frames are
//! IUs published on `exchange`. Passing `?subscribe=a,b` also streams every
//! payload seen on those exchanges back to the client.

use super::AppState;
use crate::bus::{Bus, Payload};
use crate::iu::Iu;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures::stream;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;

#[derive(Debug, Default, Deserialize)]
pub(super) struct BridgeQuery {
    #[serde(default)]
    subscribe: Option<String>,
}

impl BridgeQuery {
    fn exchanges(&self) -> Vec<String> {
        self.subscribe
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub(super) async fn bridge_exchange(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(exchange): Path<String>,
    Query(query): Query<BridgeQuery>,
) -> Response {
    let subscriptions = query.exchanges();
    ws.on_upgrade(move |socket| handle_socket(socket, state.bus, exchange, subscriptions))
}

async fn handle_socket(socket: WebSocket, bus: Bus, exchange: String, subscriptions: Vec<String>) {
    tracing::info!(%exchange, ?subscriptions, "Bus bridge connected");
    let (mut sender, mut receiver) = socket.split();

    let mut outbound = stream::select_all(
        subscriptions
            .iter()
            .map(|name| BroadcastStream::new(bus.subscribe(name))),
    );

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    forward_inbound(&bus, &exchange, text);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(%exchange, error = %e, "Bus bridge receive failed");
                    break;
                }
            },
            Some(item) = outbound.next(), if !subscriptions.is_empty() => {
                let Ok(payload) = item else {
                    tracing::warn!(%exchange, "Bus bridge lagged, messages dropped");
                    continue;
                };
                if sender.send(Message::Text(payload.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(%exchange, "Bus bridge disconnected");
}

/// Publish a client frame if it is a well-formed IU
fn forward_inbound(bus: &Bus, exchange: &str, text: String) -> bool {
    if let Err(e) = Iu::parse(&text) {
        tracing::warn!(exchange, error = %e, "Rejecting malformed IU from bridge client");
        return false;
    }
    let payload: Payload = text.into();
    bus.publish_raw(exchange, payload);
    true
}
