//! Pure state transition function
//!
//! Both the state table and the action table are data keyed by
//! `(TurnState, Event)`, so adding a state or an event means adding rows,
//! not touching the loop that consumes them.

use super::{Effect, Event, TurnState};
use std::collections::HashMap;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub old_state: TurnState,
    pub new_state: TurnState,
    pub effect: Option<Effect>,
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("No transition from {state} on {event}")]
    Undefined { state: TurnState, event: Event },
}

/// Static transition and action tables
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    transitions: HashMap<(TurnState, Event), TurnState>,
    actions: HashMap<(TurnState, Event), Effect>,
}

impl TransitionTable {
    /// A table with no rows at all
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_transition(mut self, from: TurnState, event: Event, to: TurnState) -> Self {
        self.transitions.insert((from, event), to);
        self
    }

    #[must_use]
    pub fn with_action(mut self, from: TurnState, event: Event, effect: Effect) -> Self {
        self.actions.insert((from, event), effect);
        self
    }

    pub fn next_state(&self, state: TurnState, event: Event) -> Option<TurnState> {
        self.transitions.get(&(state, event)).copied()
    }

    pub fn action(&self, state: TurnState, event: Event) -> Option<Effect> {
        self.actions.get(&(state, event)).copied()
    }

    /// The stock two-state turn-taking table
    pub fn turn_taking() -> Self {
        use Event::{
            AsrCommit, BothTakeTurn, SystemBackchannel, SystemTakeTurn, TtsCommit,
            UserBackchannel, UserTakeTurn,
        };
        use TurnState::{Idle, Talking};

        let rows = [
            (Idle, AsrCommit, Talking),
            (Idle, SystemTakeTurn, Talking),
            (Idle, UserTakeTurn, Idle),
            (Idle, BothTakeTurn, Talking),
            (Idle, SystemBackchannel, Idle),
            (Idle, UserBackchannel, Idle),
            (Idle, TtsCommit, Idle),
            (Talking, AsrCommit, Talking),
            (Talking, SystemTakeTurn, Talking),
            (Talking, UserTakeTurn, Idle),
            (Talking, BothTakeTurn, Idle),
            (Talking, SystemBackchannel, Talking),
            (Talking, UserBackchannel, Talking),
            (Talking, TtsCommit, Idle),
        ];

        // Backchannels while talking are reserved and deliberately absent here
        let actions = [
            (Talking, UserTakeTurn, Effect::Retract),
            (Talking, BothTakeTurn, Effect::Retract),
            (Talking, TtsCommit, Effect::Retract),
            (Idle, SystemBackchannel, Effect::Backchannel),
            (Idle, SystemTakeTurn, Effect::Respond),
            (Idle, AsrCommit, Effect::Respond),
        ];

        let table = rows
            .into_iter()
            .fold(Self::empty(), |table, (from, event, to)| {
                table.with_transition(from, event, to)
            });
        actions
            .into_iter()
            .fold(table, |table, (from, event, effect)| {
                table.with_action(from, event, effect)
            })
    }
}

/// Pure transition function
///
/// Given the same table, state and event this always produces the same
/// result and performs no I/O. The action is selected by the state the
/// event arrived in, not the one it leads to.
pub fn transition(
    table: &TransitionTable,
    state: TurnState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let new_state = table
        .next_state(state, event)
        .ok_or(TransitionError::Undefined { state, event })?;

    Ok(TransitionResult {
        old_state: state,
        new_state,
        effect: table.action(state, event),
    })
}
