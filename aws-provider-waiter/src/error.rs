//! Error types for waits and retries.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A [`WaitSpec`](crate::WaitSpec) that breaks one of its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    #[error("statuses {0:?} are both pending and target")]
    OverlappingStatuses(Vec<String>),

    #[error("target statuses must not be empty unless absence is the target")]
    EmptyTarget,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("continuous target occurrence must be at least 1")]
    ZeroTargetOccurrence,

    #[error("jitter fraction {0} is outside 0.0..=1.0")]
    InvalidJitter(f64),
}

/// Why a wait stopped without reaching a target status.
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: StdError + 'static,
{
    #[error("invalid wait configuration: {0}")]
    InvalidSpec(#[from] SpecError),

    /// The status query itself failed. Not retried.
    #[error(transparent)]
    Poll(E),

    #[error(
        "unexpected state '{status}', wanted target '{}'{}",
        join(.expected),
        last_error_suffix(.last_error)
    )]
    UnexpectedStatus {
        status: String,
        expected: Vec<String>,
        last_error: Option<String>,
    },

    #[error("couldn't find resource ({checks} retries){}", last_error_suffix(.last_error))]
    NotFound {
        checks: u32,
        last_error: Option<String>,
    },

    #[error(
        "timeout while waiting for state to become '{}' (last state: '{}', timeout: {timeout:?}){}",
        join(.expected),
        status_or_empty(.last_status),
        last_error_suffix(.last_error)
    )]
    Timeout {
        timeout: Duration,
        last_status: Option<String>,
        expected: Vec<String>,
        last_error: Option<String>,
    },
}

fn join(statuses: &[String]) -> String {
    statuses.join(", ")
}

fn status_or_empty(status: &Option<String>) -> &str {
    status.as_deref().unwrap_or_default()
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(message) => format!(". last error: {message}"),
        None => String::new(),
    }
}

impl<E> WaitError<E>
where
    E: StdError + 'static,
{
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_unexpected_status(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The status observed when the wait gave up, if any.
    pub fn last_status(&self) -> Option<&str> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(status),
            Self::Timeout { last_status, .. } => last_status.as_deref(),
            _ => None,
        }
    }

    /// Attach a resource-specific reason, such as a status message returned
    /// alongside a failed state. Poll and configuration errors are left alone.
    pub fn with_last_error(mut self, message: impl Into<String>) -> Self {
        match &mut self {
            Self::UnexpectedStatus { last_error, .. }
            | Self::NotFound { last_error, .. }
            | Self::Timeout { last_error, .. } => *last_error = Some(message.into()),
            Self::InvalidSpec(_) | Self::Poll(_) => {}
        }
        self
    }
}

/// A failed wait together with the last object the poll returned.
#[derive(Debug)]
pub struct WaitFailure<T, E>
where
    E: StdError + 'static,
{
    error: WaitError<E>,
    last_object: Option<T>,
}

impl<T, E> WaitFailure<T, E>
where
    E: StdError + 'static,
{
    pub(crate) fn new(error: WaitError<E>, last_object: Option<T>) -> Self {
        Self { error, last_object }
    }

    pub fn error(&self) -> &WaitError<E> {
        &self.error
    }

    pub fn last_object(&self) -> Option<&T> {
        self.last_object.as_ref()
    }

    pub fn into_error(self) -> WaitError<E> {
        self.error
    }

    pub fn into_parts(self) -> (WaitError<E>, Option<T>) {
        (self.error, self.last_object)
    }

    /// Derive a reason from the last object and attach it to the error.
    pub fn set_last_error(mut self, reason: impl FnOnce(&T) -> Option<String>) -> Self {
        if let Some(message) = self.last_object.as_ref().and_then(reason) {
            self.error = self.error.with_last_error(message);
        }
        self
    }
}

impl<T, E> fmt::Display for WaitFailure<T, E>
where
    E: StdError + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T, E> StdError for WaitFailure<T, E>
where
    T: fmt::Debug,
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

/// Outcome of a wait. `Ok(None)` means absence was the target.
pub type WaitResult<T, E> = Result<Option<T>, WaitFailure<T, E>>;

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: StdError + 'static,
{
    /// The operation failed with an error that is not worth retrying.
    #[error(transparent)]
    Stopped(E),

    #[error("timeout after {timeout:?} while retrying{}", last_attempt_suffix(.last))]
    TimedOut { timeout: Duration, last: Option<E> },

    #[error(transparent)]
    Wait(WaitError<E>),
}

fn last_attempt_suffix<E: fmt::Display>(last: &Option<E>) -> String {
    match last {
        Some(err) => format!(": {err}"),
        None => String::new(),
    }
}

impl<E> RetryError<E>
where
    E: StdError + 'static,
{
    /// The error from the final attempt, if one completed.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Stopped(err) => Some(err),
            Self::TimedOut { last, .. } => last.as_ref(),
            Self::Wait(WaitError::Poll(err)) => Some(err),
            Self::Wait(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}
