//! Turn-taking events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic triggers consumed by the state machine, in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    /// The recognizer finalized a user utterance
    AsrCommit,
    SystemTakeTurn,
    UserTakeTurn,
    BothTakeTurn,
    SystemBackchannel,
    UserBackchannel,
    /// The synthesizer finished playing the system utterance
    TtsCommit,
}

impl Event {
    #[cfg(test)]
    pub const ALL: [Event; 7] = [
        Event::AsrCommit,
        Event::SystemTakeTurn,
        Event::UserTakeTurn,
        Event::BothTakeTurn,
        Event::SystemBackchannel,
        Event::UserBackchannel,
        Event::TtsCommit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Event::AsrCommit => "ASR_COMMIT",
            Event::SystemTakeTurn => "SYSTEM_TAKE_TURN",
            Event::UserTakeTurn => "USER_TAKE_TURN",
            Event::BothTakeTurn => "BOTH_TAKE_TURN",
            Event::SystemBackchannel => "SYSTEM_BACKCHANNEL",
            Event::UserBackchannel => "USER_BACKCHANNEL",
            Event::TtsCommit => "TTS_COMMIT",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
