//! Retry provider - decorator that adds automatic retry with exponential backoff.
//!
//! Wraps any [`LLMProvider`] to transparently retry transient errors such as
//! HTTP 429 (rate limit), 5xx (server errors), timeouts and overload.

use async_trait::async_trait;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{Result, SqlMaticError};
use crate::session::Message;

use super::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};

/// A decorator provider that retries transient errors with exponential backoff.
///
/// Non-transient errors (auth, billing, invalid request, unknown model) are
/// returned immediately.
pub struct RetryProvider {
    inner: Box<dyn LLMProvider>,
    /// Maximum number of retry attempts after the first call. Default: 3.
    max_retries: u32,
    /// Base delay in milliseconds for exponential backoff. Default: 1000.
    base_delay_ms: u64,
    /// Maximum delay cap in milliseconds. Default: 30000.
    max_delay_ms: u64,
}

impl std::fmt::Debug for RetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryProvider")
            .field("inner", &self.inner.name())
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .finish()
    }
}

impl RetryProvider {
    /// Wrap `inner` with the policy from configuration.
    pub fn from_config(inner: Box<dyn LLMProvider>, cfg: &RetryConfig) -> Self {
        Self {
            inner,
            max_retries: cfg.max_retries,
            base_delay_ms: cfg.base_delay_ms,
            max_delay_ms: cfg.max_delay_ms,
        }
    }
}

/// Check whether an error represents a transient failure worth retrying.
pub fn is_retryable(err: &SqlMaticError) -> bool {
    match err {
        SqlMaticError::ProviderTyped(pe) => pe.is_retryable(),
        SqlMaticError::Http(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

/// Compute the backoff delay for a given attempt (without sleeping).
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(16));
    exponential.saturating_add(jitter_ms).min(max_delay_ms)
}

/// Sleep for the backoff delay of `attempt`.
///
/// Jitter comes from the sub-second part of the system clock, bounded by
/// `base_delay_ms`.
pub async fn delay_with_jitter(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) {
    let jitter_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % base_delay_ms.max(1))
        .unwrap_or(0);

    let delay = compute_delay(attempt, base_delay_ms, max_delay_ms, jitter_ms);
    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
}

#[async_trait]
impl LLMProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let mut attempt = 0u32;
        loop {
            match self
                .inner
                .chat(messages.clone(), tools.clone(), model, options.clone())
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) if is_retryable(&err) && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "Retrying chat request after transient error"
                    );
                    delay_with_jitter(attempt - 1, self.base_delay_ms, self.max_delay_ms).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails with the given error `failures` times, then succeeds.
    struct FlakyProvider {
        calls: Arc<AtomicU32>,
        failures: u32,
        retryable: bool,
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn default_model(&self) -> &str {
            "flaky-model"
        }

        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                let err = if self.retryable {
                    ProviderError::RateLimit("slow down".into())
                } else {
                    ProviderError::Auth("bad key".into())
                };
                return Err(err.into());
            }
            Ok(LLMResponse::text("ok"))
        }
    }

    fn flaky(failures: u32, retryable: bool) -> (RetryProvider, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let inner = FlakyProvider {
            calls: Arc::clone(&calls),
            failures,
            retryable,
        };
        let cfg = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let provider = RetryProvider::from_config(Box::new(inner), &cfg);
        (provider, calls)
    }

    #[test]
    fn test_is_retryable_classification() {
        assert!(is_retryable(&ProviderError::ServerError("502".into()).into()));
        assert!(is_retryable(&ProviderError::Timeout("read".into()).into()));
        assert!(!is_retryable(&ProviderError::Auth("401".into()).into()));
        assert!(!is_retryable(&SqlMaticError::Provider("parse".into())));
        assert!(!is_retryable(&SqlMaticError::Config("x".into())));
    }

    #[test]
    fn test_compute_delay_exponential_and_capped() {
        assert_eq!(compute_delay(0, 1000, 30_000, 0), 1000);
        assert_eq!(compute_delay(1, 1000, 30_000, 0), 2000);
        assert_eq!(compute_delay(2, 1000, 30_000, 250), 4250);
        assert_eq!(compute_delay(10, 1000, 30_000, 0), 30_000);
        assert_eq!(compute_delay(64, u64::MAX, u64::MAX, 0), u64::MAX);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let (provider, calls) = flaky(2, true);
        let response = provider
            .chat(vec![], vec![], None, ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let (provider, calls) = flaky(10, true);
        let err = provider
            .chat(vec![], vec![], None, ChatOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SqlMaticError::ProviderTyped(ProviderError::RateLimit(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let (provider, calls) = flaky(1, false);
        assert!(provider
            .chat(vec![], vec![], None, ChatOptions::new())
            .await
            .is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delegates_name_and_model() {
        let (provider, _) = flaky(0, true);
        assert_eq!(provider.name(), "flaky");
        assert_eq!(provider.default_model(), "flaky-model");
        assert!(format!("{:?}", provider).contains("max_retries: 3"));
    }
}
