//! Completion client - one request with retry and cross-tier fallback.
//!
//! Recovery policy per failed attempt, classified by the provider:
//! - rate limited on the smart tier: downgrade to fast and retry without
//!   sleeping (the tier switch still consumes an attempt)
//! - rate limited on the fast tier: exponential backoff, same tier
//! - model unavailable on the smart tier: downgrade to fast
//! - malformed tool-call shape: short fixed delay, same tier
//! - anything else: fixed delay, except on the final attempt where the
//!   error propagates

use std::time::Duration;

use tracing::{debug, warn};

use super::llm::{ErrorKind, LlmResponse, ProviderAdapter};
use super::message::Message;
use super::router::ModelTier;
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::Result;

/// Base seconds for rate-limit backoff (doubled per attempt).
const BACKOFF_BASE_SECS: u64 = 2;
/// Ceiling on any single backoff sleep.
const BACKOFF_CAP_SECS: u64 = 30;
/// Fixed delay after a rejected tool-call shape.
const TOOL_REJECT_DELAY_SECS: u64 = 1;
/// Fixed delay after an unclassified error.
const GENERIC_DELAY_SECS: u64 = 2;

/// Backoff for a rate-limited fast-tier attempt. The shift amount is
/// clamped so an arbitrarily large configured retry count cannot
/// overflow; the cap is reached by the fourth attempt regardless.
fn backoff_secs(attempt: usize) -> u64 {
    (BACKOFF_BASE_SECS << attempt.min(4)).min(BACKOFF_CAP_SECS)
}

/// Wraps a provider with the retry/fallback policy.
pub struct CompletionClient<P: ProviderAdapter> {
    adapter: P,
}

impl<P: ProviderAdapter> CompletionClient<P> {
    pub fn new(adapter: P) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &P {
        &self.adapter
    }

    /// Run one completion to success or retry exhaustion.
    ///
    /// Returns the first successful response verbatim. The effective
    /// tier may end up below the requested one after a downgrade.
    pub async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        tier: ModelTier,
        max_retries: usize,
    ) -> Result<LlmResponse> {
        let mut tier = tier;

        for attempt in 0..max_retries {
            let model = self.adapter.model_id(tier);
            debug!("completion attempt {}/{} on {}", attempt + 1, max_retries, model);

            let err = match self.adapter.send(messages, tools, model).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let last_attempt = attempt + 1 == max_retries;
            warn!("attempt {}/{} failed: {}", attempt + 1, max_retries, err);

            match self.adapter.classify_error(&err) {
                ErrorKind::RateLimited => {
                    if tier == ModelTier::Smart {
                        debug!("rate limited on smart tier, downgrading to fast");
                        tier = ModelTier::Fast;
                        continue;
                    }
                    let wait = backoff_secs(attempt);
                    debug!("rate limited on fast tier, backing off {}s", wait);
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                ErrorKind::ModelUnavailable if tier == ModelTier::Smart => {
                    debug!("smart model unavailable, downgrading to fast");
                    tier = ModelTier::Fast;
                }
                ErrorKind::ToolUseRejected => {
                    if last_attempt {
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_secs(TOOL_REJECT_DELAY_SECS)).await;
                }
                _ => {
                    if last_attempt {
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_secs(GENERIC_DELAY_SECS)).await;
                }
            }
        }

        Err(Error::ExhaustedRetries(max_retries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::FakeAdapter;

    fn rate_limit() -> Error {
        Error::Llm("rate limit".to_string())
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff_secs(0), 2);
        assert_eq!(backoff_secs(1), 4);
        assert_eq!(backoff_secs(2), 8);
        assert_eq!(backoff_secs(3), 16);
        assert_eq!(backoff_secs(4), 30);
        // Huge retry budgets must clamp, not overflow the shift.
        assert_eq!(backoff_secs(64), 30);
        assert_eq!(backoff_secs(usize::MAX), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let client = CompletionClient::new(FakeAdapter::with_texts(vec!["hi"]));
        let response = client
            .complete(&[], &[], ModelTier::Fast, 3)
            .await
            .unwrap();
        assert_eq!(response.content.as_deref(), Some("hi"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_downgrades_smart_to_fast_without_sleep() {
        let adapter = FakeAdapter::new(vec![
            Err(rate_limit()),
            Ok(crate::agent::llm::LlmResponse::text("from fast")),
        ]);
        let client = CompletionClient::new(adapter);

        let start = tokio::time::Instant::now();
        let response = client
            .complete(&[], &[], ModelTier::Smart, 3)
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("from fast"));
        // Tier switch is free: no backoff sleep happened.
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(
            *client.adapter().models_seen.lock().unwrap(),
            vec!["fake-smart", "fake-fast"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rate_limits_then_cheap_tier_success() {
        // Two transient rate-limit failures, then the cheap tier answers
        // on the third attempt.
        let adapter = FakeAdapter::new(vec![
            Err(rate_limit()),
            Err(rate_limit()),
            Ok(crate::agent::llm::LlmResponse::text("ok")),
        ]);
        let client = CompletionClient::new(adapter);

        let response = client
            .complete(&[], &[], ModelTier::Smart, 3)
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("ok"));
        assert_eq!(client.adapter().models_seen.lock().unwrap().len(), 3);
        assert_eq!(
            client.adapter().models_seen.lock().unwrap().last().unwrap(),
            "fake-fast"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_unavailable_downgrades() {
        let adapter = FakeAdapter::new(vec![
            Err(Error::Llm("model unavailable".to_string())),
            Ok(crate::agent::llm::LlmResponse::text("fallback")),
        ]);
        let client = CompletionClient::new(adapter);

        let response = client
            .complete(&[], &[], ModelTier::Smart, 3)
            .await
            .unwrap();
        assert_eq!(response.content.as_deref(), Some("fallback"));
        assert_eq!(
            *client.adapter().models_seen.lock().unwrap(),
            vec!["fake-smart", "fake-fast"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_error_propagates_on_final_attempt() {
        let adapter = FakeAdapter::new(vec![
            Err(Error::Llm("boom".to_string())),
            Err(Error::Llm("boom again".to_string())),
        ]);
        let client = CompletionClient::new(adapter);

        let err = client
            .complete(&[], &[], ModelTier::Fast, 2)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom again"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limits_exhaust_retries_on_fast_tier() {
        let adapter = FakeAdapter::new(vec![
            Err(rate_limit()),
            Err(rate_limit()),
            Err(rate_limit()),
        ]);
        let client = CompletionClient::new(adapter);

        let err = client
            .complete(&[], &[], ModelTier::Fast, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExhaustedRetries(3)));
    }
}
