//! Bus listeners
//!
//! Bridge the recognizer and synthesizer exchanges into the aggregator and
//! the turn runtime. A payload that does not parse is skipped, a lagging
//! subscriber keeps going from the oldest message still buffered.

use crate::bus::Payload;
use crate::iu::Iu;
use crate::runtime::RuntimeHandle;
use crate::state_machine::Event;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};

/// Receive the next parseable IU, or `None` once the exchange is gone
async fn next_iu(rx: &mut broadcast::Receiver<Payload>, exchange: &str) -> Option<Iu> {
    loop {
        match rx.recv().await {
            Ok(payload) => match Iu::parse(&payload) {
                Ok(iu) => return Some(iu),
                Err(e) => {
                    tracing::warn!(exchange, error = %e, "Skipping malformed IU");
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(exchange, skipped, "Listener lagged, messages dropped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Forward recognizer IUs to the aggregator
pub async fn listen_asr(mut rx: broadcast::Receiver<Payload>, ius: mpsc::UnboundedSender<Iu>) {
    tracing::info!("Listening for recognizer IUs");
    while let Some(iu) = next_iu(&mut rx, crate::iu::ASR).await {
        if ius.send(iu).is_err() {
            break;
        }
    }
    tracing::info!("Recognizer listener stopped");
}

/// Track the end of system speech and report it to the runtime
pub async fn listen_tts(
    mut rx: broadcast::Receiver<Payload>,
    system_end: watch::Sender<f64>,
    runtime: RuntimeHandle,
) {
    tracing::info!("Listening for synthesizer IUs");
    while let Some(iu) = next_iu(&mut rx, crate::iu::TTS).await {
        if !iu.is_commit() {
            continue;
        }
        tracing::debug!(timestamp = iu.timestamp, "System utterance finished");
        system_end.send_replace(iu.timestamp);
        if runtime.send_event(Event::TtsCommit).await.is_err() {
            break;
        }
    }
    tracing::info!("Synthesizer listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Bus, IuSink};
    use crate::iu::{IuFactory, UpdateType, ASR, TTS};
    use crate::runtime::Input;

    #[tokio::test]
    async fn test_asr_listener_skips_malformed_payloads() {
        let bus = Bus::new(16);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(listen_asr(bus.subscribe(ASR), tx));

        let mut factory = IuFactory::new("asr");
        bus.publish_raw(ASR, "not json".into());
        bus.publish(&factory.create("hello", ASR, UpdateType::Add))
            .unwrap();

        let iu = rx.recv().await.unwrap();
        assert_eq!(iu.body, "hello");
        assert_eq!(iu.update_type, UpdateType::Add);

        drop(rx);
        bus.publish(&factory.create("again", ASR, UpdateType::Add))
            .unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_tts_commit_marks_end_and_emits_event() {
        let bus = Bus::new(16);
        let (handle, mut inputs) = RuntimeHandle::detached();
        let (end_tx, mut end_rx) = watch::channel(0.0);
        let _task = tokio::spawn(listen_tts(bus.subscribe(TTS), end_tx, handle));

        let mut factory = IuFactory::new("tts");
        bus.publish(&factory.create("speaking", TTS, UpdateType::Add))
            .unwrap();
        let mut commit = factory.create("", TTS, UpdateType::Commit);
        commit.timestamp = 1234.5;
        bus.publish(&commit).unwrap();

        end_rx.changed().await.unwrap();
        assert!((*end_rx.borrow() - 1234.5).abs() < f64::EPSILON);

        let input = inputs.recv().await.unwrap();
        assert!(matches!(input, Input::TurnEvent(Event::TtsCommit)));
        assert!(inputs.try_recv().is_err());
    }
}
