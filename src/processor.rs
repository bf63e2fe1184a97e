//! External dialogue processor abstraction
//!
//! The processor turns conversation state into a candidate system utterance.
//! It is treated as opaque and potentially slow.

mod error;
mod http;
mod types;

pub use error::{ProcessorError, ProcessorErrorKind};
pub use http::HttpDialogueProcessor;
pub use types::{DialogueRequest, DialogueResponse};

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for dialogue processors
#[async_trait]
pub trait DialogueProcessor: Send + Sync {
    /// Produce a response; `initial` marks the opening request of a session
    async fn process(
        &self,
        request: &DialogueRequest,
        initial: bool,
    ) -> Result<DialogueResponse, ProcessorError>;

    /// Identifier used in logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: DialogueProcessor + ?Sized> DialogueProcessor for Arc<T> {
    async fn process(
        &self,
        request: &DialogueRequest,
        initial: bool,
    ) -> Result<DialogueResponse, ProcessorError> {
        (**self).process(request, initial).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Logging wrapper for dialogue processors
pub struct LoggingProcessor {
    inner: Arc<dyn DialogueProcessor>,
    name: String,
}

impl LoggingProcessor {
    pub fn new(inner: Arc<dyn DialogueProcessor>) -> Self {
        let name = inner.name().to_string();
        Self { inner, name }
    }
}

#[async_trait]
impl DialogueProcessor for LoggingProcessor {
    async fn process(
        &self,
        request: &DialogueRequest,
        initial: bool,
    ) -> Result<DialogueResponse, ProcessorError> {
        let start = std::time::Instant::now();
        let result = self.inner.process(request, initial).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    processor = %self.name,
                    initial,
                    duration_ms = %duration.as_millis(),
                    session_id = %response.session_id,
                    "Dialogue processor responded"
                );
            }
            Err(e) => {
                tracing::error!(
                    processor = %self.name,
                    initial,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Dialogue processor failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        &self.name
    }
}
