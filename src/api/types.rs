//! API request and response types

use crate::state_machine::Event;
use serde::{Deserialize, Serialize};

/// Request to inject a turn-taking event
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub event: Event,
}

/// Request to inject a stabilized user utterance
#[derive(Debug, Deserialize)]
pub struct UtteranceRequest {
    pub text: String,
}

/// Response for injected inputs
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
