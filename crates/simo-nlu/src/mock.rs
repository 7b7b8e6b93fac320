//! Mock LLM for deterministic testing.
//!
//! Returns pre-configured replies without making any HTTP calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use simo_core::{Result, SimoError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::LlmCall;

/// One queued reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub text: String,
    /// If set, the call fails with this message instead.
    pub error: Option<String>,
    /// Artificial latency before answering.
    pub delay: Option<Duration>,
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            error: None,
            delay: None,
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            text: String::new(),
            error: Some(msg.to_string()),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// An [`LlmCall`] that replays queued replies.
///
/// # Example
/// ```
/// use simo_nlu::MockLlm;
/// let llm = MockLlm::new().with_response(r#"{"suggestions":[],"confidence":0}"#);
/// ```
#[derive(Clone, Default)]
pub struct MockLlm {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    /// Every user text received, for assertions in tests.
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply.
    pub fn with_response(self, text: &str) -> Self {
        self.replies.lock().push_back(MockReply::text(text));
        self
    }

    /// Queue a failing call.
    pub fn with_error(self, error: &str) -> Self {
        self.replies.lock().push_back(MockReply::error(error));
        self
    }

    /// Queue a fully custom reply.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockReply::text("(mock: no more queued responses)"))
    }
}

#[async_trait]
impl LlmCall for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn call(&self, _system: &str, text: &str) -> Result<String> {
        self.calls.lock().push(text.to_string());
        let reply = self.next_reply();
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        match reply.error {
            Some(error) => Err(SimoError::Llm(error)),
            None => Ok(reply.text),
        }
    }
}
