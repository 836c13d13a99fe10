//! Mock LLM client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::matcher::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};

/// Mock implementation of the LlmClient trait.
///
/// Responses are served from a queue; once the queue is drained the
/// fallback response (if any) is repeated. Every request is recorded.
///
/// # Example
///
/// ```rust,ignore
/// use trialmatch_core::testing::MockLlmClient;
///
/// let client = MockLlmClient::with_response(r#"["asthma"]"#);
/// let response = client.complete(CompletionRequest::new("...")).await?;
/// assert_eq!(client.recorded_requests().len(), 1);
/// ```
#[derive(Debug)]
pub struct MockLlmClient {
    queued: Mutex<VecDeque<Result<String, String>>>,
    fallback: Mutex<Option<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    /// Create a client with no responses; every call fails.
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a client that always answers with `text`.
    pub fn with_response(text: impl Into<String>) -> Self {
        let client = Self::new();
        client.set_fallback(text);
        client
    }

    /// Create a client whose every call fails.
    pub fn failing() -> Self {
        Self::new()
    }

    /// Answer with `text` whenever the queue is empty.
    pub fn set_fallback(&self, text: impl Into<String>) {
        *self.fallback.lock().unwrap() = Some(text.into());
    }

    /// Queue a one-shot response.
    pub fn push_response(&self, text: impl Into<String>) {
        self.queued.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a one-shot failure.
    pub fn push_error(&self, message: impl Into<String>) {
        self.queued.lock().unwrap().push_back(Err(message.into()));
    }

    /// Requests received so far, in order.
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let input_tokens = (request.prompt.len() / 4) as u32;
        self.requests.lock().unwrap().push(request);

        let next = self.queued.lock().unwrap().pop_front();
        let text = match next {
            Some(Ok(text)) => text,
            Some(Err(message)) => {
                return Err(LlmError::Api {
                    status: 500,
                    message,
                })
            }
            None => self.fallback.lock().unwrap().clone().ok_or_else(|| {
                LlmError::Http("mock LLM has no response configured".to_string())
            })?,
        };

        Ok(CompletionResponse {
            usage: LlmUsage {
                input_tokens,
                output_tokens: (text.len() / 4) as u32,
            },
            text,
            model: "mock-model".to_string(),
        })
    }
}
