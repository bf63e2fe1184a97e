//! Server-Sent Events support

use crate::runtime::{RuntimeNotice, StateSnapshot};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Current snapshot first, then every runtime notice
pub fn sse_stream(
    snapshot: StateSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<RuntimeNotice>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok(Event::default()
            .event("init")
            .data(json!({ "type": "init", "snapshot": snapshot }).to_string()))
    });

    let notices = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(notice) => Some(Ok(notice_to_sse(notice))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(notices)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn notice_to_sse(notice: RuntimeNotice) -> Event {
    let (event_type, data) = notice_payload(notice);
    Event::default().event(event_type).data(data.to_string())
}

fn notice_payload(notice: RuntimeNotice) -> (&'static str, serde_json::Value) {
    match notice {
        RuntimeNotice::StateChange {
            old,
            new,
            event,
            turn,
        } => (
            "state_change",
            json!({
                "type": "state_change",
                "old": old,
                "new": new,
                "event": event,
                "turn": turn
            }),
        ),
        RuntimeNotice::Published { iu } => (
            "iu",
            json!({
                "type": "iu",
                "iu": iu
            }),
        ),
        RuntimeNotice::TurnFailed { turn, message } => (
            "turn_failed",
            json!({
                "type": "turn_failed",
                "turn": turn,
                "message": message
            }),
        ),
        RuntimeNotice::Halted { message } => (
            "halted",
            json!({
                "type": "halted",
                "message": message
            }),
        ),
    }
}
