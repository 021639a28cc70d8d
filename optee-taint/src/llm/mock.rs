use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;

use super::{ChatMessage, LlmClient};

/// Scripted test double: returns one canned response per call, in
/// order, cycling the last response once the script runs out.
pub struct MockLlmClient {
    responses: Mutex<Vec<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockLlmClient {
    /// Builds a client that replays `responses` in order.
    #[must_use]
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every request this client has observed, in call order.
    #[must_use]
    pub fn recorded_calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().expect("mock llm lock poisoned").clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.lock().expect("mock llm lock poisoned").push(messages.to_vec());
        let mut responses = self.responses.lock().expect("mock llm lock poisoned");
        if responses.len() > 1 {
            Ok(responses.remove(0))
        } else {
            Ok(responses.first().cloned().unwrap_or_default())
        }
    }
}
