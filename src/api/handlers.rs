//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AcceptedResponse, ErrorResponse, EventRequest, HealthResponse, UtteranceRequest,
};
use super::ws::bridge_exchange;
use super::AppState;
use crate::runtime::{RuntimeClosed, StateSnapshot};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Runtime observation
        .route("/api/state", get(get_state))
        .route("/api/stream", get(stream_notices))
        // Manual injection
        .route("/api/events", post(post_event))
        .route("/api/utterances", post(post_utterance))
        // Bus bridge
        .route("/ws/:exchange", get(bridge_exchange))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_state(State(state): State<AppState>) -> Json<StateSnapshot> {
    Json(state.runtime.snapshot())
}

async fn stream_notices(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before reading the snapshot so nothing falls in between
    let rx = state.runtime.subscribe();
    sse_stream(state.runtime.snapshot(), rx)
}

async fn post_event(
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    tracing::info!(event = %req.event, "Injected turn event");
    state.runtime.send_event(req.event).await?;
    Ok(Json(AcceptedResponse { accepted: true }))
}

async fn post_utterance(
    State(state): State<AppState>,
    Json(req): Json<UtteranceRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    if req.text.is_empty() {
        return Err(AppError::BadRequest("Utterance must not be empty".to_string()));
    }
    state.runtime.send_utterance(req.text).await?;
    Ok(Json(AcceptedResponse { accepted: true }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub(super) enum AppError {
    BadRequest(String),
    Unavailable(String),
}

impl From<RuntimeClosed> for AppError {
    fn from(e: RuntimeClosed) -> Self {
        AppError::Unavailable(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::runtime::{Input, RuntimeHandle};
    use crate::state_machine::Event;
    use serde_json::Value;

    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_health_and_state() {
        let (handle, _inputs) = RuntimeHandle::detached();
        let base = serve(AppState::new(Bus::new(8), handle)).await;
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let snapshot: Value = client
            .get(format!("{base}/api/state"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot["state"], "idle");
        assert_eq!(snapshot["generating"], false);
    }

    #[tokio::test]
    async fn test_post_event_reaches_runtime() {
        let (handle, mut inputs) = RuntimeHandle::detached();
        let base = serve(AppState::new(Bus::new(8), handle)).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/events"))
            .json(&serde_json::json!({ "event": "USER_BACKCHANNEL" }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(matches!(
            inputs.recv().await,
            Some(Input::TurnEvent(Event::UserBackchannel))
        ));
    }

    #[tokio::test]
    async fn test_unknown_event_is_rejected() {
        let (handle, _inputs) = RuntimeHandle::detached();
        let base = serve(AppState::new(Bus::new(8), handle)).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/events"))
            .json(&serde_json::json!({ "event": "SNEEZE" }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_closed_runtime_is_unavailable() {
        let (handle, inputs) = RuntimeHandle::detached();
        drop(inputs);
        let base = serve(AppState::new(Bus::new(8), handle)).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/utterances"))
            .json(&serde_json::json!({ "text": "hello" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }
}
