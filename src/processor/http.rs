//! HTTP dialogue processor client
//!
//! Speaks the `/init` + `/dialogue` JSON protocol: the opening request goes
//! to `/init`, every later turn to `/dialogue`.

use super::{DialogueProcessor, DialogueRequest, DialogueResponse, ProcessorError};
use crate::config::ProcessorConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub struct HttpDialogueProcessor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDialogueProcessor {
    pub fn new(config: &ProcessorConfig) -> Result<Self, ProcessorError> {
        // Turn-level deadline is enforced by the runtime; this only guards
        // against connections that never make progress.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProcessorError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, initial: bool) -> String {
        let path = if initial { "init" } else { "dialogue" };
        format!("{}/{path}", self.base_url)
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> ProcessorError {
        match status.as_u16() {
            500..=599 => ProcessorError::server_error(format!("Server error {status}: {body}")),
            _ => ProcessorError::unknown(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl DialogueProcessor for HttpDialogueProcessor {
    async fn process(
        &self,
        request: &DialogueRequest,
        initial: bool,
    ) -> Result<DialogueResponse, ProcessorError> {
        let mut builder = self.client.post(self.endpoint(initial)).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProcessorError::timeout(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                ProcessorError::network(format!("Connection failed: {e}"))
            } else {
                ProcessorError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProcessorError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProcessorError::invalid_response(format!("Failed to parse response: {e} - body: {body}"))
        })
    }

    fn name(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProcessorErrorKind;

    fn processor(base_url: &str) -> HttpDialogueProcessor {
        HttpDialogueProcessor::new(&ProcessorConfig {
            base_url: base_url.to_string(),
            api_key: None,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoints() {
        let p = processor("http://localhost:8080/");
        assert_eq!(p.endpoint(true), "http://localhost:8080/init");
        assert_eq!(p.endpoint(false), "http://localhost:8080/dialogue");
    }

    #[test]
    fn test_server_errors_are_classified() {
        let err = HttpDialogueProcessor::classify_error(
            reqwest::StatusCode::BAD_GATEWAY,
            "upstream down",
        );
        assert_eq!(err.kind, ProcessorErrorKind::ServerError);
        let err =
            HttpDialogueProcessor::classify_error(reqwest::StatusCode::NOT_FOUND, "no route");
        assert_eq!(err.kind, ProcessorErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_unreachable_processor_is_a_network_error() {
        // Port 9 (discard) is closed on test hosts
        let p = processor("http://127.0.0.1:9");
        let err = p
            .process(&DialogueRequest::initial("user"), true)
            .await
            .unwrap_err();
        assert!(matches!(
            err.kind,
            ProcessorErrorKind::Network | ProcessorErrorKind::Unknown
        ));
    }
}
