//! Bounded retry with backoff
//!
//! One combinator, used for every adapter call. Transient errors are retried
//! until the attempt budget runs out; anything else stops immediately.
//! Cancellation is observed before each attempt, while an attempt is in
//! flight, and during the delay between attempts.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use utgen_provider::ProviderError;
use utgen_toolchain::ToolchainError;

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    /// Whether retrying may help
    fn is_transient(&self) -> bool;
}

impl Retryable for ProviderError {
    fn is_transient(&self) -> bool {
        ProviderError::is_transient(self)
    }
}

impl Retryable for ToolchainError {
    fn is_transient(&self) -> bool {
        false
    }
}

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// `delay * 2^(retry - 1)`
    Exponential,
}

/// Attempt budget and delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Fixed-delay policy
    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    /// Single attempt, no delay
    #[must_use]
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Delay slept before retry number `retry` (1 for the second attempt)
    #[must_use]
    pub fn delay_before(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let exponent = retry.saturating_sub(1).min(16);
                self.delay.saturating_mul(1u32 << exponent)
            }
        }
    }
}

/// Successful result and the attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Why the combinator gave up
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed transiently
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// A non-transient error ended the attempts
    #[error("{error}")]
    Fatal { attempts: u32, error: E },

    /// Cancelled before an attempt succeeded
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Attempts started before giving up
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Fatal { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

/// Run `op` under `policy`
///
/// `op` receives the 1-based attempt number.
///
/// # Errors
/// - [`RetryError::Exhausted`] after `max_attempts` transient failures
/// - [`RetryError::Fatal`] on the first non-transient failure
/// - [`RetryError::Cancelled`] when `cancel` fires
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<Retried<T>, RetryError<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { attempts: attempt });
        }
        attempt += 1;

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
            result = op(attempt) => result,
        };

        let error = match result {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                })
            }
            Err(error) => error,
        };

        if !error.is_transient() {
            return Err(RetryError::Fatal {
                attempts: attempt,
                error,
            });
        }
        if attempt >= max_attempts {
            tracing::warn!(label, attempts = attempt, error = %error, "retry budget exhausted");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }

        let delay = policy.delay_before(attempt);
        tracing::warn!(label, attempt, delay_ms = delay.as_millis(), error = %error, "transient failure, retrying");
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn transient() -> ProviderError {
        ProviderError::transient("connection refused")
    }

    #[tokio::test(start_paused = true)]
    async fn always_transient_exhausts_after_budget() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));
        let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let start = Instant::now();

        let result: Result<Retried<()>, _> = retry(&policy, &CancellationToken::new(), "test", |_| {
            let calls = Arc::clone(&calls);
            async move {
                calls.lock().push(Instant::now());
                Err(transient())
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(2));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(2));
        // no delay after the final attempt
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            delay: Duration::from_secs(1),
            backoff: Backoff::Exponential,
        };
        assert_eq!(policy.delay_before(1), Duration::from_secs(1));
        assert_eq!(policy.delay_before(2), Duration::from_secs(2));
        assert_eq!(policy.delay_before(3), Duration::from_secs(4));

        let start = Instant::now();
        let _ = retry::<(), _, _, _>(&policy, &CancellationToken::new(), "test", |_| async {
            Err(transient())
        })
        .await;
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let result = retry(
            &RetryPolicy::fixed(5, Duration::from_millis(10)),
            &CancellationToken::new(),
            "test",
            |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(transient())
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(result.value, "done");
        assert_eq!(result.attempts, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let result = retry::<(), _, _, _>(
            &RetryPolicy::fixed(5, Duration::from_secs(60)),
            &CancellationToken::new(),
            "test",
            |_| async { Err(ProviderError::permanent("401 unauthorized")) },
        )
        .await;
        assert!(matches!(result, Err(RetryError::Fatal { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn toolchain_errors_are_fatal() {
        let result = retry::<(), _, _, _>(
            &RetryPolicy::fixed(3, Duration::ZERO),
            &CancellationToken::new(),
            "build",
            |_| async { Err(ToolchainError::Workspace("gone".into())) },
        )
        .await;
        assert!(matches!(result, Err(RetryError::Fatal { attempts: 1, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_delay() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = retry::<(), _, _, _>(
            &RetryPolicy::fixed(10, Duration::from_secs(60)),
            &cancel,
            "test",
            |_| async { Err(transient()) },
        )
        .await;
        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let counter = AtomicU32::new(0);
        let result = retry::<(), ProviderError, _, _>(&RetryPolicy::once(), &cancel, "test", |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0 })));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
