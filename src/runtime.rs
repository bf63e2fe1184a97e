//! Turn runtime
//!
//! A single task owns the conversational state, the output buffer, the
//! utterance accumulator and the dialogue history. Everything else reaches
//! it through [`RuntimeHandle`].

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::TurnRuntime;

use crate::iu::Iu;
use crate::processor::{DialogueResponse, ProcessorError};
use crate::state_machine::{Event, TurnState};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};

const INPUT_CAPACITY: usize = 256;
const NOTICE_CAPACITY: usize = 256;

/// Messages consumed by the runtime, in arrival order
#[derive(Debug)]
pub enum Input {
    /// Turn-taking trigger for the state machine
    TurnEvent(Event),
    /// A stabilized user utterance for the accumulator
    Utterance(String),
    /// A background generation finished
    Generation {
        turn: u64,
        outcome: GenerationOutcome,
    },
}

#[derive(Debug)]
pub enum GenerationOutcome {
    Ready(DialogueResponse),
    Failed(ProcessorError),
    Cancelled,
}

/// Notifications broadcast to observers (the HTTP stream, tests)
#[derive(Debug, Clone)]
pub enum RuntimeNotice {
    StateChange {
        old: TurnState,
        new: TurnState,
        event: Option<Event>,
        turn: u64,
    },
    Published {
        iu: Iu,
    },
    TurnFailed {
        turn: u64,
        message: String,
    },
    Halted {
        message: String,
    },
}

/// Point-in-time view of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub state: TurnState,
    pub turn: u64,
    pub generating: bool,
    pub buffered_ius: usize,
    pub history_entries: usize,
}

#[derive(Debug, Error)]
#[error("Turn runtime is no longer running")]
pub struct RuntimeClosed;

/// Handle to interact with a running turn runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    input_tx: mpsc::Sender<Input>,
    notice_tx: broadcast::Sender<RuntimeNotice>,
    snapshot_rx: watch::Receiver<StateSnapshot>,
}

impl RuntimeHandle {
    pub async fn send_event(&self, event: Event) -> Result<(), RuntimeClosed> {
        self.input_tx
            .send(Input::TurnEvent(event))
            .await
            .map_err(|_| RuntimeClosed)
    }

    pub async fn send_utterance(&self, text: String) -> Result<(), RuntimeClosed> {
        self.input_tx
            .send(Input::Utterance(text))
            .await
            .map_err(|_| RuntimeClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeNotice> {
        self.notice_tx.subscribe()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        *self.snapshot_rx.borrow()
    }

    /// A handle whose inputs land in the returned receiver instead of a
    /// runtime
    #[cfg(test)]
    pub fn detached() -> (Self, mpsc::Receiver<Input>) {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        let (_, snapshot_rx) = watch::channel(StateSnapshot {
            state: TurnState::Idle,
            turn: 0,
            generating: false,
            buffered_ius: 0,
            history_entries: 0,
        });
        (
            Self {
                input_tx,
                notice_tx,
                snapshot_rx,
            },
            input_rx,
        )
    }
}
