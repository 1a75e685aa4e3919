// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Retry Budget
//!
//! One bounded retry decorator applied uniformly to every filesystem
//! mutation, so backoff policy lives in exactly one place. Stateless and
//! shared read-only across requests.
//!
//! Cancellation never aborts an in-flight operation; it only prevents the
//! next attempt from starting, and the caller sees a cancellation indicator
//! instead of the last operation error.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Bounded retry configuration (attempt count plus exponential backoff).
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(10),
        }
    }
}

/// Terminal outcome of an exhausted or abandoned retry loop.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error("operation failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("operation cancelled while retrying")]
    Cancelled,
}

impl RetryBudget {
    /// Run `op` until it succeeds, the budget is exhausted, or the caller
    /// cancels. There is no partial-success state: the result is either the
    /// operation's success value or a terminal error.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.initial_delay;
        let mut last_error = None;

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(attempt, max = attempts, error = %e, "operation failed");
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = delay.saturating_mul(2);
            }
        }

        match last_error {
            Some(source) => Err(RetryError::Exhausted { attempts, source }),
            None => Err(RetryError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let budget = RetryBudget::default();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = budget
            .run(&cancel, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err(Boom) } else { Ok(n) } }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_budget() {
        let budget = RetryBudget {
            attempts: 3,
            initial_delay: Duration::from_millis(10),
        };
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = budget
            .run(&cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Boom) }
            })
            .await;

        assert!(matches!(
            result,
            Err(RetryError::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_attempts() {
        let budget = RetryBudget {
            attempts: 5,
            initial_delay: Duration::from_secs(60),
        };
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        // Cancel while the first attempt is in flight: it finishes, but no
        // further attempt starts.
        let result = budget
            .run(&cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                async { Err::<(), _>(Boom) }
            })
            .await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
        // First attempt ran to completion; no further attempts started.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_runs_nothing() {
        let budget = RetryBudget::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), _> = budget.run(&cancel, || async { Err::<(), _>(Boom) }).await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}
