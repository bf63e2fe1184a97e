//! Dialogue processor request/response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request sent to the dialogue processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueRequest {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_utterance: Option<String>,
}

impl DialogueRequest {
    /// Opening request: no session yet, nothing said
    pub fn initial(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
            user_utterance: None,
        }
    }
}

/// Candidate system utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueResponse {
    pub system_utterance: String,
    pub session_id: String,
    /// Set by the processor when the dialogue has reached its end
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_data: Option<Value>,
}

impl DialogueResponse {
    pub fn new(system_utterance: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            system_utterance: system_utterance.into(),
            session_id: session_id.into(),
            is_final: false,
            aux_data: None,
        }
    }
}
