use std::future::Future;
use std::time::Duration;

use observatory_core::config::DefaultParameters;
use observatory_core::error::ProviderError;
use observatory_core::model::ProviderKind;

/// Attempt budget and backoff for one logical request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never below 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_defaults(&DefaultParameters::default())
    }
}

/// A value produced after `retries` failed attempts.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub retries: u32,
}

/// The error that ended the attempt loop.
#[derive(Debug)]
pub struct Exhausted {
    pub error: ProviderError,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_defaults(defaults: &DefaultParameters) -> Self {
        Self::new(
            defaults.retry_attempts,
            Duration::from_millis(defaults.retry_base_delay_ms),
        )
    }

    /// Delay after failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Runs `op` until it succeeds, fails permanently, or the budget is spent.
    pub async fn run<T, F, Fut>(&self, provider: ProviderKind, mut op: F) -> Result<Retried<T>, Exhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => {
                    return Ok(Retried {
                        value,
                        retries: attempt,
                    })
                }
                Err(error) => {
                    let attempts = attempt + 1;
                    if !error.is_transient() || attempts >= self.max_attempts {
                        return Err(Exhausted { error, attempts });
                    }

                    let delay = self.backoff(attempt);
                    if let ProviderError::RateLimited { retry_after_ms } = &error {
                        tracing::warn!(
                            %provider,
                            attempt = attempts,
                            max_attempts = self.max_attempts,
                            server_hint_ms = retry_after_ms,
                            delay_ms = delay.as_millis() as u64,
                            "rate limited, backing off"
                        );
                    } else {
                        tracing::warn!(
                            %provider,
                            attempt = attempts,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "transient provider error, retrying"
                        );
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
