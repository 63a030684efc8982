use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{ErrorKind, ServiceError};

/// Bounded retry with linear backoff, chosen by failure kind.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Backoff unit after a rate-limit response
    pub rate_limit_step: Duration,
    /// Backoff unit after any other retryable failure
    pub default_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_step: Duration::from_secs(5),
            default_step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            rate_limit_step: Duration::ZERO,
            default_step: Duration::ZERO,
        }
    }

    /// Delay before the next attempt, after `attempt` (1-based) failed.
    ///
    /// Grows with the number of attempts already made (`step * attempt`),
    /// so with the default three attempts a rate-limited scene waits 5 s and
    /// then 10 s.
    pub fn backoff(&self, kind: ErrorKind, attempt: u32) -> Duration {
        let step = match kind {
            ErrorKind::RateLimited => self.rate_limit_step,
            _ => self.default_step,
        };
        step * attempt
    }

    /// Quota and malformed-payload failures are never worth repeating.
    pub fn is_retryable(error: &ServiceError) -> bool {
        matches!(error.kind, ErrorKind::RateLimited | ErrorKind::Fatal)
    }

    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.run_if(label, Self::is_retryable, op).await
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned on exhaustion.
    pub async fn run_if<T, F, Fut, P>(
        &self,
        label: &str,
        retryable: P,
        mut op: F,
    ) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
        P: Fn(&ServiceError) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && retryable(&err) => {
                    let delay = self.backoff(err.kind, attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label, attempt, max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
