//! Turn runtime executor

use super::{
    GenerationOutcome, Input, RuntimeHandle, RuntimeNotice, StateSnapshot, INPUT_CAPACITY,
    NOTICE_CAPACITY,
};
use crate::bus::IuSink;
use crate::config::DialogueConfig;
use crate::history::{DialogueHistory, Role};
use crate::iu::{Iu, IuFactory, UpdateType, DIALOGUE};
use crate::processor::{DialogueProcessor, DialogueRequest, DialogueResponse, ProcessorError};
use crate::state_machine::{
    transition, Effect, Event, TransitionError, TransitionResult, TransitionTable, TurnState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

const PRECOMPUTED_CAPACITY: usize = 4;

/// A response being generated for a system turn
struct Generation {
    turn: u64,
    cancel: CancellationToken,
}

/// Owner of all conversational state; generic over the processor and the
/// IU sink so tests can substitute both
pub struct TurnRuntime<P, S>
where
    P: DialogueProcessor + 'static,
    S: IuSink + 'static,
{
    config: DialogueConfig,
    table: TransitionTable,
    state: TurnState,
    processor: Arc<P>,
    sink: S,
    iu_factory: IuFactory,
    /// IUs published for the current system turn
    output_buffer: Vec<Iu>,
    /// Stabilized user utterances for the current user turn
    utterances: Vec<String>,
    history: DialogueHistory,
    session_id: Option<String>,
    precomputed_tx: mpsc::Sender<DialogueResponse>,
    precomputed_rx: Arc<Mutex<mpsc::Receiver<DialogueResponse>>>,
    turn: u64,
    generation: Option<Generation>,
    input_rx: mpsc::Receiver<Input>,
    input_tx: mpsc::Sender<Input>,
    notice_tx: broadcast::Sender<RuntimeNotice>,
    snapshot_tx: watch::Sender<StateSnapshot>,
}

impl<P, S> TurnRuntime<P, S>
where
    P: DialogueProcessor + 'static,
    S: IuSink + 'static,
{
    pub fn new(config: DialogueConfig, processor: P, sink: S) -> Self {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CAPACITY);
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        let (precomputed_tx, precomputed_rx) = mpsc::channel(PRECOMPUTED_CAPACITY);
        let (snapshot_tx, _) = watch::channel(StateSnapshot {
            state: TurnState::Idle,
            turn: 0,
            generating: false,
            buffered_ius: 0,
            history_entries: 0,
        });

        Self {
            history: DialogueHistory::new(config.history_length),
            config,
            table: TransitionTable::turn_taking(),
            state: TurnState::Idle,
            processor: Arc::new(processor),
            sink,
            iu_factory: IuFactory::unique("dialogue"),
            output_buffer: Vec::new(),
            utterances: Vec::new(),
            session_id: None,
            precomputed_tx,
            precomputed_rx: Arc::new(Mutex::new(precomputed_rx)),
            turn: 0,
            generation: None,
            input_rx,
            input_tx,
            notice_tx,
            snapshot_tx,
        }
    }

    /// Replace the stock turn-taking table
    #[cfg(test)]
    #[must_use]
    pub fn with_table(mut self, table: TransitionTable) -> Self {
        self.table = table;
        self
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            input_tx: self.input_tx.clone(),
            notice_tx: self.notice_tx.clone(),
            snapshot_rx: self.snapshot_tx.subscribe(),
        }
    }

    /// Process inputs until an undefined transition halts the loop
    pub async fn run(mut self) -> Result<(), TransitionError> {
        tracing::info!(state = %self.state, "Starting turn runtime");

        if self.config.start_with_system_turn {
            self.start_turn().await;
        }

        loop {
            if let Err(e) = self.step().await {
                tracing::error!(error = %e, state = %self.state, "Halting turn runtime");
                let _ = self.notice_tx.send(RuntimeNotice::Halted {
                    message: e.to_string(),
                });
                return Err(e);
            }
        }
    }

    /// Wait for and process one input.
    ///
    /// The runtime keeps a sender of its own for generation outcomes, so the
    /// input queue stays open for as long as the runtime exists.
    pub(crate) async fn step(&mut self) -> Result<(), TransitionError> {
        if let Some(input) = self.input_rx.recv().await {
            self.process_input(input)?;
        }
        Ok(())
    }

    fn process_input(&mut self, input: Input) -> Result<(), TransitionError> {
        match input {
            Input::TurnEvent(event) => {
                self.on_event(event)?;
            }
            Input::Utterance(text) => {
                tracing::debug!(utterance = %text, "Accumulated user utterance");
                self.utterances.push(text);
            }
            Input::Generation { turn, outcome } => self.on_generation(turn, outcome),
        }
        Ok(())
    }

    /// Let the system speak first: fetch the opening utterance, park it in
    /// the precomputed buffer and respond from it.
    pub async fn start_turn(&mut self) {
        let request = DialogueRequest::initial(self.config.user_id.clone());
        let deadline = self.config.processor_timeout();

        let response = match tokio::time::timeout(deadline, self.processor.process(&request, true))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.report_failure(0, &e);
                return;
            }
            Err(_) => {
                let e = ProcessorError::timeout(format!(
                    "No opening response within {}s",
                    deadline.as_secs()
                ));
                self.report_failure(0, &e);
                return;
            }
        };

        tracing::info!(session_id = %response.session_id, "Dialogue session opened");
        self.session_id = Some(response.session_id.clone());
        if self.precomputed_tx.try_send(response).is_err() {
            tracing::warn!("Precomputed response buffer full, dropping opening response");
        }
        self.set_state(TurnState::Talking, None);
        self.respond();
    }

    fn on_event(&mut self, event: Event) -> Result<TransitionResult, TransitionError> {
        let result = transition(&self.table, self.state, event)?;

        tracing::info!(
            old = %result.old_state,
            new = %result.new_state,
            event = %event,
            "State: {} -> {}, trigger: {}",
            result.old_state,
            result.new_state,
            event
        );
        self.set_state(result.new_state, Some(event));

        if let Some(effect) = result.effect {
            self.execute_effect(effect);
        }
        Ok(result)
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Respond => self.respond(),
            Effect::Retract => self.retract(),
            Effect::Backchannel => self.backchannel(),
        }
    }

    /// Start generating the response for a new system turn.
    ///
    /// The generation runs on its own task; its outcome comes back as
    /// [`Input::Generation`] tagged with the turn number.
    fn respond(&mut self) {
        self.turn += 1;
        let turn = self.turn;

        let user_utterance = self.utterances.last().cloned();
        if let Some(text) = &user_utterance {
            self.history.record(Role::User, text.clone());
        }
        let request = DialogueRequest {
            user_id: self.config.user_id.clone(),
            session_id: self.session_id.clone(),
            user_utterance,
        };

        let cancel = CancellationToken::new();
        self.generation = Some(Generation {
            turn,
            cancel: cancel.clone(),
        });
        self.publish_snapshot();

        let processor = Arc::clone(&self.processor);
        let precomputed = Arc::clone(&self.precomputed_rx);
        let input_tx = self.input_tx.clone();
        let wait = self.config.precompute_wait();
        let deadline = self.config.processor_timeout();

        tokio::spawn(async move {
            tracing::debug!(turn, "Generating system response (background)");

            // Race generation against retraction
            let outcome = tokio::select! {
                biased;

                () = cancel.cancelled() => GenerationOutcome::Cancelled,

                result = obtain_response(&*processor, &precomputed, &request, wait, deadline) => {
                    match result {
                        Ok(response) => GenerationOutcome::Ready(response),
                        Err(e) => GenerationOutcome::Failed(e),
                    }
                }
            };
            let _ = input_tx.send(Input::Generation { turn, outcome }).await;
        });
    }

    fn on_generation(&mut self, turn: u64, outcome: GenerationOutcome) {
        if !self.generation.as_ref().is_some_and(|g| g.turn == turn) {
            tracing::debug!(turn, current = self.turn, "Dropping outcome of superseded turn");
            return;
        }
        self.generation = None;

        match outcome {
            GenerationOutcome::Ready(response) => {
                if self.session_id.is_none() {
                    self.session_id = Some(response.session_id.clone());
                }
                if response.is_final {
                    tracing::info!(
                        session_id = %response.session_id,
                        "Dialogue processor reached the end of the dialogue"
                    );
                }
                if self.state == TurnState::Talking {
                    let iu = self.publish(response.system_utterance.clone(), UpdateType::Add);
                    self.output_buffer.push(iu);
                    self.history.record(Role::Assistant, response.system_utterance);
                } else {
                    tracing::debug!(
                        turn,
                        state = %self.state,
                        "Turn preempted during generation, discarding response"
                    );
                }
                self.finish_turn();
            }
            GenerationOutcome::Cancelled => {
                // Only retract cancels, and it already closed the turn
                tracing::debug!(turn, "Generation cancelled");
            }
            GenerationOutcome::Failed(e) => {
                self.report_failure(turn, &e);
                self.reset_turn_buffers();
                if self.state != TurnState::Idle {
                    self.set_state(TurnState::Idle, None);
                }
            }
        }
        self.publish_snapshot();
    }

    /// Close the system turn: end-of-turn commit, then fresh buffers
    fn finish_turn(&mut self) {
        let summary = self.history.joined_content();
        self.publish(summary, UpdateType::Commit);
        tracing::info!(turn = self.turn, "End of system turn, waiting for next user utterance");
        self.reset_turn_buffers();
    }

    fn reset_turn_buffers(&mut self) {
        self.history.clear();
        self.utterances.clear();
    }

    /// Revoke everything published for the current turn and stop any
    /// generation still running for it. Safe to call repeatedly.
    ///
    /// Cancelling a live generation closes its turn here, so utterances
    /// arriving before the `Cancelled` outcome survive into the next turn.
    fn retract(&mut self) {
        for iu in std::mem::take(&mut self.output_buffer) {
            self.send(&iu.revoked());
        }
        if let Some(generation) = self.generation.take() {
            generation.cancel.cancel();
            tracing::debug!(turn = generation.turn, "Generation cancelled by retraction");
            self.finish_turn();
        }
        self.publish_snapshot();
    }

    fn backchannel(&mut self) {
        let text = self.config.backchannel_text.clone();
        self.publish(text.clone(), UpdateType::Add);
        self.publish(text, UpdateType::Commit);
    }

    fn publish(&mut self, body: String, update_type: UpdateType) -> Iu {
        let iu = self.iu_factory.create(body, DIALOGUE, update_type);
        self.send(&iu);
        iu
    }

    fn send(&self, iu: &Iu) {
        if let Err(e) = self.sink.publish(iu) {
            tracing::warn!(error = %e, iu_id = %iu.id, "Failed to publish IU");
            return;
        }
        let _ = self
            .notice_tx
            .send(RuntimeNotice::Published { iu: iu.clone() });
    }

    fn report_failure(&self, turn: u64, error: &ProcessorError) {
        tracing::error!(turn, error = %error, kind = ?error.kind, "System turn failed");
        let _ = self.notice_tx.send(RuntimeNotice::TurnFailed {
            turn,
            message: error.to_string(),
        });
    }

    fn set_state(&mut self, new: TurnState, event: Option<Event>) {
        let old = std::mem::replace(&mut self.state, new);
        let _ = self.notice_tx.send(RuntimeNotice::StateChange {
            old,
            new,
            event,
            turn: self.turn,
        });
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(StateSnapshot {
            state: self.state,
            turn: self.turn,
            generating: self.generation.is_some(),
            buffered_ius: self.output_buffer.len(),
            history_entries: self.history.len(),
        });
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> TurnState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn output_buffer(&self) -> &[Iu] {
        &self.output_buffer
    }

    #[cfg(test)]
    pub(crate) fn utterances(&self) -> &[String] {
        &self.utterances
    }

    #[cfg(test)]
    pub(crate) fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Take a precomputed response if one is (or shortly becomes) available,
/// otherwise ask the processor, bounded by `deadline`.
async fn obtain_response<P: DialogueProcessor + ?Sized>(
    processor: &P,
    precomputed: &Mutex<mpsc::Receiver<DialogueResponse>>,
    request: &DialogueRequest,
    wait: Duration,
    deadline: Duration,
) -> Result<DialogueResponse, ProcessorError> {
    {
        let mut buffer = precomputed.lock().await;
        if let Ok(response) = buffer.try_recv() {
            return Ok(response);
        }
        tokio::select! {
            Some(response) = buffer.recv() => return Ok(response),
            () = tokio::time::sleep(wait) => {}
        }
    }

    tokio::time::timeout(deadline, processor.process(request, false))
        .await
        .unwrap_or_else(|_| {
            Err(ProcessorError::timeout(format!(
                "No response within {}s",
                deadline.as_secs()
            )))
        })
}
