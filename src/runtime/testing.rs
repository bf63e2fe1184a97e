//! Mock implementations for testing
//!
//! These mocks enable runtime tests without a dialogue server or a bus.

use crate::bus::IuSink;
use crate::config::DialogueConfig;
use crate::iu::{Iu, IuError};
use crate::processor::{DialogueProcessor, DialogueRequest, DialogueResponse, ProcessorError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock dialogue processor
// ============================================================================

/// Processor that returns queued responses
pub struct MockProcessor {
    responses: Mutex<VecDeque<Result<DialogueResponse, ProcessorError>>>,
    /// Every request seen, with its `initial` flag
    pub requests: Mutex<Vec<(DialogueRequest, bool)>>,
}

impl MockProcessor {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, response: DialogueResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: ProcessorError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<(DialogueRequest, bool)> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &DialogueRequest, initial: bool) -> Result<DialogueResponse, ProcessorError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), initial));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProcessorError::network("No mock response queued")))
    }
}

#[async_trait]
impl DialogueProcessor for MockProcessor {
    async fn process(
        &self,
        request: &DialogueRequest,
        initial: bool,
    ) -> Result<DialogueResponse, ProcessorError> {
        self.next(request, initial)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Processor that sleeps before answering, for exercising interruption
/// and deadlines
pub struct DelayedMockProcessor {
    inner: MockProcessor,
    delay: Duration,
}

impl DelayedMockProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockProcessor::new(),
            delay,
        }
    }

    pub fn queue_response(&self, response: DialogueResponse) {
        self.inner.queue_response(response);
    }

    pub fn recorded_requests(&self) -> Vec<(DialogueRequest, bool)> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl DialogueProcessor for DelayedMockProcessor {
    async fn process(
        &self,
        request: &DialogueRequest,
        initial: bool,
    ) -> Result<DialogueResponse, ProcessorError> {
        tokio::time::sleep(self.delay).await;
        self.inner.next(request, initial)
    }

    fn name(&self) -> &str {
        "delayed-mock"
    }
}

// ============================================================================
// Recording sink
// ============================================================================

/// Sink that keeps every IU it is given
pub struct RecordingSink {
    published: Mutex<Vec<Iu>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn published(&self) -> Vec<Iu> {
        self.published.lock().unwrap().clone()
    }
}

impl IuSink for RecordingSink {
    fn publish(&self, iu: &Iu) -> Result<(), IuError> {
        self.published.lock().unwrap().push(iu.clone());
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Dialogue config with a short precompute wait so tests stay fast
pub fn test_config() -> DialogueConfig {
    DialogueConfig {
        precompute_wait_ms: 10,
        processor_timeout_secs: 5,
        ..DialogueConfig::default()
    }
}
