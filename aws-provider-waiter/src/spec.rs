//! Wait configuration: which statuses mean "keep going", which mean "done",
//! and how long and how often to poll.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::SpecError;

/// Consecutive not-found observations tolerated by [`NotFoundPolicy::default`].
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Upper bound of the exponential poll schedule unless overridden.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// First step of the exponential poll schedule.
pub(crate) const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What to do when a poll reports a status that is neither pending nor target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnexpectedStatusPolicy {
    /// Abort with [`WaitError::UnexpectedStatus`](crate::WaitError::UnexpectedStatus).
    #[default]
    Fail,
    /// Log the status and keep polling until a target status or the timeout.
    KeepPolling,
}

/// How an absent resource is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// Absence is fatal on the first observation.
    Fail,
    /// Absence counts as pending, up to `max_checks` consecutive observations.
    /// Used right after creation, while the API catches up.
    Pending { max_checks: u32 },
    /// Absence is the goal. Used when waiting for deletion.
    Target,
}

impl Default for NotFoundPolicy {
    fn default() -> Self {
        Self::Pending {
            max_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }
}

/// Configuration for a single wait operation.
///
/// Built fresh for every Create/Update/Delete call that needs to wait and
/// dropped afterwards.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    pending: BTreeSet<String>,
    target: BTreeSet<String>,
    timeout: Duration,
    poll_interval: Option<Duration>,
    min_poll_interval: Duration,
    max_poll_interval: Duration,
    initial_delay: Option<Duration>,
    jitter: Option<f64>,
    unexpected_status: UnexpectedStatusPolicy,
    not_found: NotFoundPolicy,
    continuous_target_occurrence: u32,
    description: String,
}

impl WaitSpec {
    pub fn new<P, T, S>(pending: P, target: T, timeout: Duration) -> Self
    where
        P: IntoIterator<Item = S>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout,
            poll_interval: None,
            min_poll_interval: Duration::ZERO,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
            initial_delay: None,
            jitter: None,
            unexpected_status: UnexpectedStatusPolicy::default(),
            not_found: NotFoundPolicy::default(),
            continuous_target_occurrence: 1,
            description: String::from("resource"),
        }
    }

    /// Configuration for waiting until a resource disappears: every status in
    /// `pending` keeps polling and absence is success.
    pub fn deletion<P, S>(pending: P, timeout: Duration) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending: Vec<String> = pending.into_iter().map(Into::into).collect();
        Self::new(pending, Vec::new(), timeout).not_found(NotFoundPolicy::Target)
    }

    /// Poll at a fixed interval instead of the exponential schedule.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    pub fn max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = interval;
        self
    }

    /// Sleep before the first poll.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Randomise each sleep by up to `fraction` of its length in either direction.
    pub fn jitter(mut self, fraction: f64) -> Self {
        self.jitter = Some(fraction);
        self
    }

    pub fn unexpected_status(mut self, policy: UnexpectedStatusPolicy) -> Self {
        self.unexpected_status = policy;
        self
    }

    pub fn not_found(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found = policy;
        self
    }

    /// Require `count` target observations in a row before succeeding.
    pub fn continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    pub fn target(&self) -> &BTreeSet<String> {
        &self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn fixed_poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    pub fn min_interval(&self) -> Duration {
        self.min_poll_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_poll_interval
    }

    pub fn delay(&self) -> Option<Duration> {
        self.initial_delay
    }

    pub fn jitter_fraction(&self) -> Option<f64> {
        self.jitter
    }

    pub fn unexpected_status_policy(&self) -> UnexpectedStatusPolicy {
        self.unexpected_status
    }

    pub fn not_found_policy(&self) -> NotFoundPolicy {
        self.not_found
    }

    pub fn required_target_occurrences(&self) -> u32 {
        self.continuous_target_occurrence
    }

    pub fn label(&self) -> &str {
        &self.description
    }

    pub fn is_pending(&self, status: &str) -> bool {
        self.pending.contains(status)
    }

    pub fn is_target(&self, status: &str) -> bool {
        self.target.contains(status)
    }

    /// Target statuses in a stable order, for messages.
    pub fn expected(&self) -> Vec<String> {
        self.target.iter().cloned().collect()
    }

    /// Check the invariants every wait relies on.
    pub fn validate(&self) -> Result<(), SpecError> {
        let overlap: Vec<String> = self.pending.intersection(&self.target).cloned().collect();
        if !overlap.is_empty() {
            return Err(SpecError::OverlappingStatuses(overlap));
        }
        if self.target.is_empty() && self.not_found != NotFoundPolicy::Target {
            return Err(SpecError::EmptyTarget);
        }
        if self.timeout.is_zero() {
            return Err(SpecError::ZeroTimeout);
        }
        if self.continuous_target_occurrence == 0 {
            return Err(SpecError::ZeroTargetOccurrence);
        }
        if let Some(fraction) = self.jitter {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(SpecError::InvalidJitter(fraction));
            }
        }
        Ok(())
    }
}
