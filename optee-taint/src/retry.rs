//! Exponential backoff retry wrapper around [`LlmClient`](crate::llm::LlmClient) calls.

use std::time::Duration;

use tracing::warn;

use crate::constants::{RETRY_BASE_DELAY_SECS, RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY_SECS};
use crate::error::LlmError;
use crate::llm::{ChatMessage, LlmClient};
use crate::ratelimit::RateLimiter;

/// Calls `client.chat_completion` with rate limiting and exponential
/// backoff retry, per spec.md §6.
///
/// Non-retriable errors (`AUTH_ERROR`, `TOKEN_LIMIT`, `CONTENT_FILTER`)
/// are returned immediately on first occurrence. Retriable errors are
/// retried up to [`RETRY_MAX_ATTEMPTS`] times with delay
/// `min(base * 2^attempt, max)`.
pub async fn call_with_retry(
    client: &dyn LlmClient,
    limiter: &RateLimiter,
    messages: &[ChatMessage],
) -> Result<String, LlmError> {
    let mut attempt = 0;
    loop {
        limiter.acquire().await;
        match client.chat_completion(messages).await {
            Ok(text) => return Ok(text),
            Err(err) if !err.kind.is_retriable() => return Err(err),
            Err(err) if attempt + 1 >= RETRY_MAX_ATTEMPTS => return Err(err),
            Err(err) => {
                let delay = backoff_delay(attempt);
                warn!(?err.kind, attempt, delay_secs = delay.as_secs(), "retrying llm call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let secs = RETRY_BASE_DELAY_SECS.saturating_mul(1u64 << attempt).min(RETRY_MAX_DELAY_SECS);
    Duration::from_secs(secs)
}

/// Calls through [`call_with_retry`], then validates the response
/// against a caller-supplied contract. On violation, replays the
/// model's own malformed response back to it alongside a correction
/// prompt and tries exactly once more (spec.md §4.6's "two-line
/// contract validator... triggers an intelligent retry with a
/// correction prompt").
///
/// A response that still violates the contract after the correction
/// attempt is returned as-is: the extractor's own fallback cascade is
/// what ultimately keeps a malformed turn from aborting the chain, not
/// this function looping forever.
pub async fn call_with_contract_retry(
    client: &dyn LlmClient,
    limiter: &RateLimiter,
    messages: &[ChatMessage],
    validate: impl Fn(&str) -> bool,
    correction_prompt: &str,
) -> Result<String, LlmError> {
    let first = call_with_retry(client, limiter, messages).await?;
    if validate(&first) {
        return Ok(first);
    }

    warn!("response violated the expected turn contract, retrying with a correction prompt");
    let mut corrected_messages = messages.to_vec();
    corrected_messages.push(ChatMessage::assistant(first));
    corrected_messages.push(ChatMessage::user(correction_prompt.to_owned()));
    call_with_retry(client, limiter, &corrected_messages).await
}
