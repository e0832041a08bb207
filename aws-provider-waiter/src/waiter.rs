//! The polling loop.

use std::error::Error as StdError;
use std::future::Future;

use tokio::time::Instant;

use crate::error::{WaitError, WaitFailure, WaitResult};
use crate::poll::PollResult;
use crate::schedule::PollSchedule;
use crate::spec::{NotFoundPolicy, UnexpectedStatusPolicy, WaitSpec};

/// Where a wait is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    NotStarted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

type NotFoundClassifier<'a, E> = Box<dyn Fn(&E) -> bool + Send + Sync + 'a>;

/// Polls a remote resource until it reaches a target status.
///
/// ```no_run
/// use std::time::Duration;
/// use aws_provider_waiter::{PollResult, StateWaiter, WaitSpec};
///
/// # #[derive(Debug, thiserror::Error)]
/// # #[error("api")]
/// # struct ApiError;
/// # async fn describe(_id: &str) -> Result<(String, String), ApiError> { unimplemented!() }
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let spec = WaitSpec::new(["attaching"], ["available"], Duration::from_secs(300))
///     .description("internet gateway igw-123 attachment");
///
/// let attachment = StateWaiter::new(&spec)
///     .wait(|| async {
///         let (attachment, state) = describe("igw-123").await?;
///         Ok::<_, ApiError>(PollResult::new(attachment, state))
///     })
///     .await?;
/// # let _ = attachment;
/// # Ok(())
/// # }
/// ```
pub struct StateWaiter<'a, E> {
    spec: &'a WaitSpec,
    not_found_error: Option<NotFoundClassifier<'a, E>>,
}

impl<'a, E> StateWaiter<'a, E>
where
    E: StdError + 'static,
{
    pub fn new(spec: &'a WaitSpec) -> Self {
        Self {
            spec,
            not_found_error: None,
        }
    }

    /// Treat poll errors matching `classifier` as a not-found observation
    /// instead of a fatal error.
    pub fn treat_as_not_found(mut self, classifier: impl Fn(&E) -> bool + Send + Sync + 'a) -> Self {
        self.not_found_error = Some(Box::new(classifier));
        self
    }

    /// Poll until a target status is reached or the wait fails. The timeout
    /// also interrupts an in-flight poll or sleep.
    pub async fn wait<T, F, Fut>(&self, mut poll: F) -> WaitResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollResult<T>, E>>,
    {
        self.spec
            .validate()
            .map_err(|err| WaitFailure::new(WaitError::InvalidSpec(err), None))?;

        let deadline = Instant::now() + self.spec.timeout();
        let mut progress = Progress::new(self.spec.label());
        log::debug!(
            "[{}] waiting for state to become: {:?}",
            self.spec.label(),
            self.spec.target()
        );

        let outcome = tokio::time::timeout_at(deadline, self.run(&mut poll, &mut progress)).await;

        match outcome {
            Ok(Ok(object)) => {
                progress.transition(WaitPhase::Succeeded);
                Ok(object)
            }
            Ok(Err(error)) => {
                progress.transition(WaitPhase::Failed);
                Err(WaitFailure::new(error, progress.last_object.take()))
            }
            Err(_elapsed) => {
                progress.transition(WaitPhase::TimedOut);
                let error = WaitError::Timeout {
                    timeout: self.spec.timeout(),
                    last_status: progress.last_status.take(),
                    expected: self.spec.expected(),
                    last_error: None,
                };
                Err(WaitFailure::new(error, progress.last_object.take()))
            }
        }
    }

    fn is_not_found_error(&self, err: &E) -> bool {
        self.not_found_error
            .as_ref()
            .is_some_and(|classifier| classifier(err))
    }

    async fn run<T, F, Fut>(
        &self,
        poll: &mut F,
        progress: &mut Progress<'_, T>,
    ) -> Result<Option<T>, WaitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollResult<T>, E>>,
    {
        if let Some(delay) = self.spec.delay() {
            log::debug!("[{}] waiting {:?} before first poll", self.spec.label(), delay);
            tokio::time::sleep(delay).await;
        }

        let mut schedule = PollSchedule::new(self.spec);
        let required = self.spec.required_target_occurrences();
        progress.transition(WaitPhase::Polling);

        loop {
            progress.polls += 1;
            let observation = match poll().await {
                Ok(observation) => observation,
                Err(err) if self.is_not_found_error(&err) => {
                    log::trace!("[{}] poll reported not found: {}", self.spec.label(), err);
                    PollResult::not_found()
                }
                Err(err) => return Err(WaitError::Poll(err)),
            };

            match observation.into_parts() {
                (None, _) => match self.spec.not_found_policy() {
                    NotFoundPolicy::Target => {
                        progress.last_status = None;
                        progress.target_hits += 1;
                        if progress.target_hits >= required {
                            return Ok(None);
                        }
                    }
                    NotFoundPolicy::Fail => {
                        return Err(WaitError::NotFound {
                            checks: 1,
                            last_error: None,
                        });
                    }
                    NotFoundPolicy::Pending { max_checks } => {
                        progress.target_hits = 0;
                        progress.not_found_hits += 1;
                        if progress.not_found_hits > max_checks {
                            return Err(WaitError::NotFound {
                                checks: progress.not_found_hits,
                                last_error: None,
                            });
                        }
                        log::trace!(
                            "[{}] resource not found yet ({}/{})",
                            self.spec.label(),
                            progress.not_found_hits,
                            max_checks
                        );
                    }
                },
                (Some(object), status) => {
                    progress.not_found_hits = 0;
                    progress.last_object = Some(object);

                    if self.spec.is_target(&status) {
                        progress.target_hits += 1;
                        log::trace!(
                            "[{}] reached target state {:?} ({}/{})",
                            self.spec.label(),
                            status,
                            progress.target_hits,
                            required
                        );
                        if progress.target_hits >= required {
                            progress.last_status = Some(status);
                            return Ok(progress.last_object.take());
                        }
                    } else {
                        progress.target_hits = 0;
                        if !self.spec.is_pending(&status) {
                            match self.spec.unexpected_status_policy() {
                                UnexpectedStatusPolicy::Fail => {
                                    return Err(WaitError::UnexpectedStatus {
                                        status,
                                        expected: self.spec.expected(),
                                        last_error: None,
                                    });
                                }
                                UnexpectedStatusPolicy::KeepPolling => {
                                    log::debug!(
                                        "[{}] ignoring unexpected state {:?}",
                                        self.spec.label(),
                                        status
                                    );
                                }
                            }
                        }
                    }
                    progress.last_status = Some(status);
                }
            }

            let wait = schedule.next_wait();
            log::trace!(
                "[{}] poll {} saw {:?}, sleeping {:?}",
                self.spec.label(),
                progress.polls,
                progress.last_status,
                wait
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// Poll bookkeeping that survives the loop being cut short by the deadline.
struct Progress<'s, T> {
    label: &'s str,
    phase: WaitPhase,
    polls: u32,
    target_hits: u32,
    not_found_hits: u32,
    last_status: Option<String>,
    last_object: Option<T>,
}

impl<'s, T> Progress<'s, T> {
    fn new(label: &'s str) -> Self {
        Self {
            label,
            phase: WaitPhase::NotStarted,
            polls: 0,
            target_hits: 0,
            not_found_hits: 0,
            last_status: None,
            last_object: None,
        }
    }

    fn transition(&mut self, next: WaitPhase) {
        log::debug!(
            "[{}] {:?} -> {:?} after {} poll(s)",
            self.label,
            self.phase,
            next,
            self.polls
        );
        self.phase = next;
    }
}

/// Shorthand for [`StateWaiter::new`] followed by [`StateWaiter::wait`].
pub async fn wait_for_state<T, E, F, Fut>(spec: &WaitSpec, poll: F) -> WaitResult<T, E>
where
    E: StdError + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollResult<T>, E>>,
{
    StateWaiter::new(spec).wait(poll).await
}
