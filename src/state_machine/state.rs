//! Conversational state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who holds the floor from the system's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// No system turn in flight
    #[default]
    Idle,
    /// A system turn is being generated or played
    Talking,
}

impl TurnState {
    #[cfg(test)]
    pub const ALL: [TurnState; 2] = [TurnState::Idle, TurnState::Talking];

    pub fn as_str(self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::Talking => "talking",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
