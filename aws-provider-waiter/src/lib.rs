//! Generic state-transition waiter for remote resources.
//!
//! Creating, modifying or deleting most AWS resources returns before the
//! resource has settled. Callers poll a read-only "describe" API until the
//! resource reports one of a set of target statuses:
//!
//! - [`WaitSpec`] names the pending and target statuses, the timeout, and
//!   the polling schedule;
//! - [`PollResult`] is one observation of the resource;
//! - [`StateWaiter`] runs the loop and reports [`WaitError`]s;
//! - [`retry_when`] and friends reuse the same loop to retry operations
//!   that fail transiently.
//!
//! Waits never share state, so any number can run concurrently.

mod error;
mod poll;
mod retry;
mod schedule;
mod spec;
mod waiter;

pub use error::{RetryError, SpecError, WaitError, WaitFailure, WaitResult};
pub use poll::PollResult;
pub use retry::{
    retry_until_not_found, retry_when, retry_when_not_found, RetryDecision,
    RETRY_MIN_POLL_INTERVAL,
};
pub use spec::{
    NotFoundPolicy, UnexpectedStatusPolicy, WaitSpec, DEFAULT_MAX_POLL_INTERVAL,
    DEFAULT_NOT_FOUND_CHECKS,
};
pub use waiter::{wait_for_state, StateWaiter, WaitPhase};
