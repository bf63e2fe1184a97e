//! Turn-taking state machine
//!
//! Pure, table-driven transitions. The runtime owns the current state and
//! executes the returned effect.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::TurnState;
pub use transition::{transition, TransitionError, TransitionResult, TransitionTable};
