//! Retrying operations that fail while AWS catches up with itself.
//!
//! These sit on top of [`StateWaiter`]: every attempt is one poll, a retryable
//! error is a pending status and a successful attempt is the target.

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use crate::error::{RetryError, WaitError};
use crate::poll::PollResult;
use crate::spec::WaitSpec;
use crate::waiter::StateWaiter;

const RETRYABLE_ERROR: &str = "retryableerror";
const SUCCESS: &str = "success";
const STILL_EXISTS: &str = "exists";

/// Smallest pause between attempts.
pub const RETRY_MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Verdict on a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

/// Run `op` until it succeeds or `classify` says stop, giving up after `timeout`.
///
/// On timeout the error from the last attempt is returned inside
/// [`RetryError::TimedOut`].
pub async fn retry_when<T, E, F, Fut, C>(
    timeout: Duration,
    mut op: F,
    classify: C,
) -> Result<T, RetryError<E>>
where
    E: StdError + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
{
    let spec = WaitSpec::new([RETRYABLE_ERROR], [SUCCESS], timeout)
        .min_poll_interval(RETRY_MIN_POLL_INTERVAL)
        .description("retry");
    let classify = &classify;

    let outcome = StateWaiter::new(&spec)
        .wait(|| {
            let attempt = op();
            async move {
                match attempt.await {
                    Ok(value) => Ok(PollResult::new(Ok(value), SUCCESS)),
                    Err(err) => match classify(&err) {
                        RetryDecision::Retry => {
                            log::debug!("retrying after error: {err}");
                            Ok(PollResult::new(Err(err), RETRYABLE_ERROR))
                        }
                        RetryDecision::Stop => Err(err),
                    },
                }
            }
        })
        .await;

    match outcome {
        Ok(Some(Ok(value))) => Ok(value),
        Ok(Some(Err(err))) => Err(RetryError::Stopped(err)),
        // Every attempt yields an object, so absence never reaches the target.
        Ok(None) => Err(RetryError::TimedOut {
            timeout,
            last: None,
        }),
        Err(failure) => match failure.into_parts() {
            (WaitError::Poll(err), _) => Err(RetryError::Stopped(err)),
            (WaitError::Timeout { .. }, last) => Err(RetryError::TimedOut {
                timeout,
                last: last.and_then(Result::err),
            }),
            (other, _) => Err(RetryError::Wait(other)),
        },
    }
}

/// Retry `op` while it fails with a not-found error, as freshly created
/// resources often are for a while.
pub async fn retry_when_not_found<T, E, F, Fut, N>(
    timeout: Duration,
    op: F,
    is_not_found: N,
) -> Result<T, RetryError<E>>
where
    E: StdError + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    N: Fn(&E) -> bool,
{
    retry_when(timeout, op, |err| {
        if is_not_found(err) {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    })
    .await
}

/// Call `op` until it reports not found. A successful call means the
/// resource still exists; any other error stops immediately.
pub async fn retry_until_not_found<T, E, F, Fut, N>(
    timeout: Duration,
    mut op: F,
    is_not_found: N,
) -> Result<(), RetryError<E>>
where
    E: StdError + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    N: Fn(&E) -> bool + Send + Sync,
{
    let spec = WaitSpec::deletion([STILL_EXISTS], timeout)
        .min_poll_interval(RETRY_MIN_POLL_INTERVAL)
        .description("retry until not found");

    let outcome = StateWaiter::new(&spec)
        .treat_as_not_found(is_not_found)
        .wait(|| {
            let attempt = op();
            async move { attempt.await.map(|value| PollResult::new(value, STILL_EXISTS)) }
        })
        .await;

    match outcome {
        Ok(_) => Ok(()),
        Err(failure) => match failure.into_error() {
            WaitError::Poll(err) => Err(RetryError::Stopped(err)),
            WaitError::Timeout { .. } => Err(RetryError::TimedOut {
                timeout,
                last: None,
            }),
            other => Err(RetryError::Wait(other)),
        },
    }
}
