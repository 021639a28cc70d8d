use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{LlmError, LlmErrorKind};

use super::{ChatMessage, LlmClient};

/// Generic client for any OpenAI-compatible `/chat/completions` endpoint.
///
/// Provider-specific request shaping (function calling, vendor
/// extensions) is deliberately out of scope; this only ever sends the
/// minimal `{model, messages}` body every compatible provider accepts.
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpLlmClient {
    /// Builds a client for `endpoint` (the full `/chat/completions` URL).
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        }
    }
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::new(LlmErrorKind::AuthError, format!("http {status}")));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::new(LlmErrorKind::RateLimit, format!("http {status}")));
        }
        if status.is_server_error() {
            return Err(LlmError::new(LlmErrorKind::ServerError, format!("http {status}")));
        }
        if !status.is_success() {
            return Err(LlmError::new(LlmErrorKind::Unknown, format!("http {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| LlmError::new(LlmErrorKind::Unknown, err.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::new(LlmErrorKind::Unknown, "empty choices array"))
    }
}

fn classify_transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::new(LlmErrorKind::Timeout, err.to_string())
    } else if err.is_connect() {
        LlmError::new(LlmErrorKind::NetworkError, err.to_string())
    } else {
        LlmError::new(LlmErrorKind::Unknown, err.to_string())
    }
}
