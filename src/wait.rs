//! Polling until an asynchronous operation settles.
//!
//! Create, update and delete calls return before the service has finished.
//! A [`WaitHandler`] runs a caller-supplied check on a fixed interval until
//! the check reports a terminal state, the deadline passes, or the caller
//! cancels through its [`CancellationToken`]. Cancellation is checked on every
//! iteration, including while sleeping between polls.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::ApiError;
use crate::error::ProviderError;

/// Default overall wait timeout.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Longest wait a handler will honour. Larger timeouts are capped to this.
pub const MAX_WAIT_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// Not there yet; poll again.
    Pending,
    /// Reached the desired terminal state.
    Done(T),
    /// Reached a failed terminal state.
    Failed(String),
}

/// Polls a check until it settles.
#[derive(Debug, Clone)]
pub struct WaitHandler {
    timeout: Duration,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Default for WaitHandler {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIMEOUT)
    }
}

impl WaitHandler {
    /// Create a handler with the given overall timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the delay between polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Observe `cancel`; cancelling it aborts any wait in progress.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The overall timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The delay between polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run `check` until it settles.
    ///
    /// A check still running at the deadline is dropped and the wait fails
    /// with [`ProviderError::DeadlineExceeded`].
    ///
    /// `what` names the operation in logs and errors. Check errors are
    /// propagated unchanged as [`ProviderError::Api`]; a failed terminal state
    /// becomes [`ProviderError::WaitFailed`].
    pub async fn wait<T, F, Fut>(&self, what: &str, mut check: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollStatus<T>, ApiError>>,
    {
        let deadline = self.deadline();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let status = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(ProviderError::Cancelled(what.to_string()));
                }
                status = tokio::time::timeout_at(deadline, check()) => match status {
                    Ok(status) => status?,
                    Err(_) => return Err(self.deadline_exceeded(what)),
                },
            };

            match status {
                PollStatus::Done(value) => {
                    debug!(operation = what, attempt, "Wait completed");
                    return Ok(value);
                },
                PollStatus::Failed(reason) => {
                    return Err(ProviderError::WaitFailed(format!("{}: {}", what, reason)));
                },
                PollStatus::Pending => {
                    debug!(operation = what, attempt, "Still waiting");
                },
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.deadline_exceeded(what));
            }
            let delay = self.poll_interval.min(deadline - now);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(ProviderError::Cancelled(what.to_string()));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.timeout.min(MAX_WAIT_TIMEOUT))
            .unwrap_or(now)
    }

    fn deadline_exceeded(&self, what: &str) -> ProviderError {
        ProviderError::DeadlineExceeded(format!(
            "{} did not finish within {:?}",
            what, self.timeout
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn handler() -> WaitHandler {
        WaitHandler::new(Duration::from_secs(60)).with_poll_interval(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_done() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = handler()
            .wait("create job", move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Ok(PollStatus::Pending)
                    } else {
                        Ok(PollStatus::Done(n))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let err = handler()
            .wait("create job", || async { Ok::<_, ApiError>(PollStatus::<()>::Pending) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_state() {
        let err = handler()
            .wait("create job", || async {
                Ok::<_, ApiError>(PollStatus::<()>::Failed("status FAILED".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Wait failed: create job: status FAILED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_propagates() {
        let err = handler()
            .wait("delete job", || async {
                Err::<PollStatus<()>, _>(ApiError::status(500, "boom"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let waiter = handler().with_cancellation(cancel.clone());

        let task = tokio::spawn(async move {
            waiter
                .wait("update job", || async {
                    Ok::<_, ApiError>(PollStatus::<()>::Pending)
                })
                .await
        });

        tokio::time::sleep(Duration::from_secs(7)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_is_bounded_by_deadline() {
        let started = Instant::now();
        let err = handler()
            .wait("create job", || {
                std::future::pending::<Result<PollStatus<()>, ApiError>>()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(started.elapsed() < Duration::from_secs(61));
    }

    #[tokio::test]
    async fn test_huge_timeout_does_not_overflow() {
        let value = WaitHandler::new(Duration::MAX)
            .wait("create job", || async { Ok::<_, ApiError>(PollStatus::Done(7)) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_defaults() {
        let waiter = WaitHandler::default();
        assert_eq!(waiter.timeout(), Duration::from_secs(300));
        assert_eq!(waiter.poll_interval(), Duration::from_secs(5));
    }
}
