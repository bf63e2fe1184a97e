//! Recognition IU aggregation
//!
//! Folds the recognizer's partial results into a running utterance,
//! debounces partial updates by fragment count and decides when a finalized
//! utterance should count as the user taking the floor.

use crate::iu::{Iu, UpdateType};
use crate::runtime::RuntimeHandle;
use crate::state_machine::Event;
use tokio::sync::{mpsc, watch};

/// A stabilized user utterance ready for the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct Stabilized {
    pub text: String,
    /// Set when the utterance should raise `ASR_COMMIT`
    pub turn_event: Option<Event>,
}

#[derive(Debug)]
pub struct Aggregator {
    working_set: Vec<Iu>,
    pending_fragments: usize,
    response_generation_interval: usize,
}

impl Aggregator {
    pub fn new(response_generation_interval: usize) -> Self {
        Self {
            working_set: Vec::new(),
            pending_fragments: 0,
            response_generation_interval: response_generation_interval.max(1),
        }
    }

    /// Fold one recognition IU into the working set.
    ///
    /// `system_end` is the timestamp at which the last system utterance
    /// finished playing; a commit at or before it is the tail of speech that
    /// overlapped the system turn and does not take the floor.
    pub fn ingest(&mut self, iu: Iu, system_end: f64) -> Option<Stabilized> {
        if iu.update_type == UpdateType::Revoke {
            // Revocation does not touch the pending-fragment counter
            self.working_set.retain(|stored| stored.id != iu.id);
            return None;
        }

        let update_type = iu.update_type;
        let timestamp = iu.timestamp;
        self.working_set.push(iu);

        let text = self.text();
        if text.is_empty() {
            return None;
        }

        match update_type {
            UpdateType::Add => {
                self.pending_fragments += 1;
                if self.pending_fragments < self.response_generation_interval {
                    return None;
                }
                self.pending_fragments = 0;
                Some(Stabilized {
                    text,
                    turn_event: None,
                })
            }
            UpdateType::Commit => {
                self.pending_fragments = 0;
                self.working_set.clear();
                let takes_floor = timestamp > system_end;
                Some(Stabilized {
                    text,
                    turn_event: takes_floor.then_some(Event::AsrCommit),
                })
            }
            UpdateType::Revoke => None,
        }
    }

    /// Concatenated bodies of the working set in arrival order
    pub fn text(&self) -> String {
        self.working_set.iter().map(|iu| iu.body.as_str()).collect()
    }

    #[cfg(test)]
    pub fn working_set(&self) -> &[Iu] {
        &self.working_set
    }
}

/// Aggregation loop: one IU at a time, in arrival order
pub async fn run_aggregator(
    mut aggregator: Aggregator,
    mut ius: mpsc::UnboundedReceiver<Iu>,
    system_end: watch::Receiver<f64>,
    runtime: RuntimeHandle,
) {
    tracing::info!("Starting IU aggregator");

    while let Some(iu) = ius.recv().await {
        let end = *system_end.borrow();
        let Some(stable) = aggregator.ingest(iu, end) else {
            continue;
        };

        tracing::debug!(text = %stable.text, "User utterance stabilized");
        if runtime.send_utterance(stable.text).await.is_err() {
            break;
        }
        if let Some(event) = stable.turn_event {
            if runtime.send_event(event).await.is_err() {
                break;
            }
        }
    }

    tracing::info!("IU aggregator stopped");
}
