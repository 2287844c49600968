//! Retrying sink decorator

use std::time::Duration;

use async_trait::async_trait;

use crate::application::errors::SinkError;
use crate::domain::traits::OutputSink;

/// How often and how patiently to retry a failed send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first; 0 disables retrying
    pub max_retries: u32,
    /// Base delay, multiplied by the attempt number
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    fn delay(&self, attempt: u32, error: &SinkError) -> Duration {
        match error {
            SinkError::RateLimited { retry_after } => *retry_after,
            _ => self.backoff.saturating_mul(attempt),
        }
    }
}

/// Wraps a sink and retries transient failures
pub struct RetryingSink<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: OutputSink> RetryingSink<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: OutputSink> OutputSink for RetryingSink<S> {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        let mut attempt = 0;
        loop {
            match self.inner.send(channel_id, text).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay(attempt, &e);
                    tracing::warn!(
                        "[{}] Send failed ({}), retry {}/{} in {:?}",
                        channel_id, e, attempt, self.policy.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
