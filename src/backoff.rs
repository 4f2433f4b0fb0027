use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::config::Limits;
use crate::error::{PurgeError, RemoteError};
use crate::purge::progress::{ProgressEvent, ProgressObserver};
use crate::quota::{Clock, QuotaTracker, TokioClock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for every further attempt.
    pub backoff_base: Duration,
    /// Pause taken when the quota tracker refuses a request.
    pub quota_cooldown: Duration,
}

impl From<&Limits> for RetryPolicy {
    fn from(limits: &Limits) -> Self {
        RetryPolicy {
            max_attempts: limits.max_attempts,
            backoff_base: limits.backoff_base,
            quota_cooldown: limits.quota_cooldown,
        }
    }
}

/// Runs remote calls with quota pacing and exponential backoff on rate limits.
///
/// Every remote call of a run goes through one executor, so its quota
/// tracker sees the whole request stream.
pub struct BackoffExecutor<C: Clock = TokioClock> {
    quota: QuotaTracker<C>,
    policy: RetryPolicy,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl BackoffExecutor<TokioClock> {
    pub fn new(
        limits: &Limits,
        observer: Arc<dyn ProgressObserver>,
        cancel: CancellationToken,
    ) -> Self {
        let quota = QuotaTracker::new(limits.daily_request_limit, limits.per_minute_request_limit);
        Self::with_quota(quota, RetryPolicy::from(limits), observer, cancel)
    }
}

impl<C: Clock> BackoffExecutor<C> {
    pub fn with_quota(
        quota: QuotaTracker<C>,
        policy: RetryPolicy,
        observer: Arc<dyn ProgressObserver>,
        cancel: CancellationToken,
    ) -> Self {
        BackoffExecutor {
            quota,
            policy,
            observer,
            cancel,
        }
    }

    pub fn quota(&self) -> &QuotaTracker<C> {
        &self.quota
    }

    /// Runs `call` with the configured number of attempts.
    pub async fn execute<T, F, Fut>(&mut self, operation: &str, call: F) -> Result<T, PurgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = self.policy.max_attempts;
        self.execute_with_attempts(operation, max_attempts, call).await
    }

    /// Invokes `call` up to `max_attempts` times.
    ///
    /// Rate-limited failures are retried after `base * 2^i`; any other
    /// failure is returned at once. When attempts run out the last
    /// rate-limit error is returned.
    pub async fn execute_with_attempts<T, F, Fut>(
        &mut self,
        operation: &str,
        max_attempts: u32,
        mut call: F,
    ) -> Result<T, PurgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if self.cancel.is_cancelled() {
                return Err(PurgeError::Cancelled);
            }

            // Quota pauses do not use up an attempt.
            if !self.quota.can_proceed() {
                let delay = self.policy.quota_cooldown;
                self.observer.on_event(&ProgressEvent::QuotaPause {
                    operation: operation.to_string(),
                    delay,
                });
                pause(&self.cancel, delay).await?;
            }

            debug!("{} attempt {}/{}", operation, attempt + 1, max_attempts);

            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() => {
                    if attempt + 1 < max_attempts {
                        let delay = backoff_delay(self.policy.backoff_base, attempt);
                        self.observer.on_event(&ProgressEvent::RateLimited {
                            operation: operation.to_string(),
                            attempt: attempt + 1,
                            delay,
                        });
                        pause(&self.cancel, delay).await?;
                    }
                    last_error = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }

        let err = last_error
            .unwrap_or_else(|| RemoteError::rate_limited(operation, "no attempt was made"));
        warn!("{} still rate limited after {} attempt(s)", operation, max_attempts);
        Err(err.into())
    }
}

/// `base * 2^attempt`, saturating.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Sleeps for `delay` unless the run is cancelled first.
pub(crate) async fn pause(cancel: &CancellationToken, delay: Duration) -> Result<(), PurgeError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(PurgeError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
