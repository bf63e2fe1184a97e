//! Incremental units
//!
//! An IU is the revisable message unit exchanged between the recognizer,
//! the synthesizer and the dialogue manager. Payloads travel as JSON.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Exchange carrying recognition results (inbound)
pub const ASR: &str = "asr";
/// Exchange carrying synthesis progress (inbound)
pub const TTS: &str = "tts";
/// Exchange carrying system utterances (outbound)
pub const DIALOGUE: &str = "dialogue";

/// IU lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateType {
    #[serde(alias = "add")]
    Add,
    #[serde(alias = "commit")]
    Commit,
    #[serde(alias = "revoke")]
    Revoke,
}

/// A single incremental unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iu {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub timestamp: f64,
    pub update_type: UpdateType,
    #[serde(default)]
    pub body: String,
    pub exchange: String,
}

#[derive(Debug, Error)]
pub enum IuError {
    #[error("Malformed IU payload: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Failed to encode IU {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Iu {
    /// Parse a wire payload
    pub fn parse(payload: &str) -> Result<Self, IuError> {
        serde_json::from_str(payload).map_err(IuError::Malformed)
    }

    /// Encode for the wire
    pub fn to_json(&self) -> Result<String, IuError> {
        serde_json::to_string(self).map_err(|source| IuError::Encode {
            id: self.id.clone(),
            source,
        })
    }

    /// The same unit re-tagged as a retraction
    #[must_use]
    pub fn revoked(&self) -> Self {
        Self {
            update_type: UpdateType::Revoke,
            ..self.clone()
        }
    }

    pub fn is_commit(&self) -> bool {
        self.update_type == UpdateType::Commit
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

/// Wall-clock time as float seconds, the IU timestamp convention
#[allow(clippy::cast_precision_loss)]
pub fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Mints IUs for one producer with monotonically increasing ids
#[derive(Debug)]
pub struct IuFactory {
    producer: String,
    next_id: u64,
}

impl IuFactory {
    pub fn new(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
            next_id: 0,
        }
    }

    /// A factory tagged with a fresh random producer name
    pub fn unique(prefix: &str) -> Self {
        let tag: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(8)
            .collect();
        Self::new(format!("{prefix}-{tag}"))
    }

    pub fn create(
        &mut self,
        body: impl Into<String>,
        exchange: &str,
        update_type: UpdateType,
    ) -> Iu {
        self.next_id += 1;
        Iu {
            id: format!("{}:{}", self.producer, self.next_id),
            timestamp: now_seconds(),
            update_type,
            body: body.into(),
            exchange: exchange.to_string(),
        }
    }
}
