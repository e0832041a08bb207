use std::collections::VecDeque;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aws_provider_waiter::{
    wait_for_state, NotFoundPolicy, PollResult, StateWaiter, UnexpectedStatusPolicy, WaitError,
    WaitPhase, WaitSpec,
};
use rstest::rstest;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
enum ApiError {
    #[error("resource not found")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    poll: usize,
    status: String,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Status(&'static str),
    Absent,
    MissingError,
    Denied,
}

type Observation = Result<PollResult<Snapshot>, ApiError>;

/// A poll function that replays `steps`, repeating the last one forever.
fn scripted(steps: &[Step]) -> (impl FnMut() -> Ready<Observation>, Arc<AtomicUsize>) {
    let mut remaining: VecDeque<Step> = steps.iter().copied().collect();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let poll = move || {
        let poll = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let step = if remaining.len() > 1 {
            remaining.pop_front().unwrap()
        } else {
            *remaining.front().unwrap()
        };
        ready(match step {
            Step::Status(status) => Ok(PollResult::new(
                Snapshot {
                    poll,
                    status: status.to_string(),
                },
                status,
            )),
            Step::Absent => Ok(PollResult::not_found()),
            Step::MissingError => Err(ApiError::NotFound),
            Step::Denied => Err(ApiError::AccessDenied),
        })
    };
    (poll, calls)
}

fn spec(pending: &[&str], target: &[&str], timeout: Duration) -> WaitSpec {
    WaitSpec::new(pending.iter().copied(), target.iter().copied(), timeout)
        .poll_interval(Duration::from_millis(10))
}

#[tokio::test(start_paused = true)]
async fn target_on_first_poll_returns_without_sleeping() {
    let (poll, calls) = scripted(&[Step::Status("ACTIVE")]);
    let start = Instant::now();

    let object = wait_for_state(&spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(60)), poll)
        .await
        .expect("wait should succeed")
        .expect("object should be returned");

    assert_eq!(object.status, "ACTIVE");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn pending_then_active_succeeds_after_three_polls() {
    let (poll, calls) = scripted(&[
        Step::Status("PENDING"),
        Step::Status("PENDING"),
        Step::Status("ACTIVE"),
    ]);
    let spec = WaitSpec::new(["PENDING"], ["ACTIVE"], Duration::from_secs(1))
        .poll_interval(Duration::from_millis(1));

    let object = wait_for_state(&spec, poll).await.unwrap().unwrap();

    assert_eq!(object.poll, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn always_pending_times_out() {
    let (poll, calls) = scripted(&[Step::Status("CREATING")]);
    let spec = WaitSpec::new(["CREATING"], ["AVAILABLE"], Duration::from_millis(50))
        .poll_interval(Duration::from_millis(10));
    let start = Instant::now();

    let failure = wait_for_state(&spec, poll).await.unwrap_err();

    assert!(failure.error().is_timeout(), "got {failure}");
    assert_eq!(failure.error().last_status(), Some("CREATING"));
    assert_eq!(
        failure.last_object().map(|s| s.status.as_str()),
        Some("CREATING")
    );
    assert_eq!(start.elapsed(), Duration::from_millis(50));
    let polls = calls.load(Ordering::SeqCst);
    assert!((5..=6).contains(&polls), "polled {polls} times");
    assert_eq!(
        failure.to_string(),
        "timeout while waiting for state to become 'AVAILABLE' (last state: 'CREATING', timeout: 50ms)"
    );
}

#[tokio::test(start_paused = true)]
async fn no_polls_after_target_reached() {
    let (poll, calls) = scripted(&[
        Step::Status("PENDING"),
        Step::Status("ACTIVE"),
        Step::Status("PENDING"),
    ]);

    let result = wait_for_state(&spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(5)), poll).await;

    assert!(result.is_ok());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn poll_error_aborts_immediately() {
    let (poll, calls) = scripted(&[Step::Status("PENDING"), Step::Denied, Step::Status("ACTIVE")]);

    let failure = wait_for_state(&spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(5)), poll)
        .await
        .unwrap_err();

    assert!(matches!(failure.error(), WaitError::Poll(ApiError::AccessDenied)));
    assert_eq!(failure.to_string(), "access denied");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(failure.last_object().map(|s| s.poll), Some(1));
}

#[tokio::test(start_paused = true)]
async fn not_found_error_without_classifier_is_fatal() {
    let (poll, calls) = scripted(&[Step::MissingError, Step::Status("ACTIVE")]);

    let failure = wait_for_state(&spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(5)), poll)
        .await
        .unwrap_err();

    assert!(matches!(failure.error(), WaitError::Poll(ApiError::NotFound)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn not_found_errors_during_creation_count_as_pending() {
    let (poll, calls) = scripted(&[Step::MissingError, Step::MissingError, Step::Status("ACTIVE")]);
    let spec = spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(5));

    let object = StateWaiter::new(&spec)
        .treat_as_not_found(|err: &ApiError| *err == ApiError::NotFound)
        .wait(poll)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(object.status, "ACTIVE");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn overlapping_statuses_are_rejected_before_polling() {
    let (poll, calls) = scripted(&[Step::Status("ACTIVE")]);

    let failure = wait_for_state(
        &spec(&["PENDING", "ACTIVE"], &["ACTIVE"], Duration::from_secs(5)),
        poll,
    )
    .await
    .unwrap_err();

    assert!(matches!(failure.error(), WaitError::InvalidSpec(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case::fail(UnexpectedStatusPolicy::Fail, false, 2)]
#[case::keep_polling(UnexpectedStatusPolicy::KeepPolling, true, 4)]
#[tokio::test(start_paused = true)]
async fn unexpected_status_follows_policy(
    #[case] policy: UnexpectedStatusPolicy,
    #[case] succeeds: bool,
    #[case] expected_polls: usize,
) {
    let (poll, calls) = scripted(&[
        Step::Status("CREATING"),
        Step::Status("DELETED"),
        Step::Status("DELETED"),
        Step::Status("AVAILABLE"),
    ]);
    let spec = spec(&["CREATING"], &["AVAILABLE"], Duration::from_secs(5)).unexpected_status(policy);

    let result = wait_for_state(&spec, poll).await;

    assert_eq!(result.is_ok(), succeeds);
    assert_eq!(calls.load(Ordering::SeqCst), expected_polls);
    if let Err(failure) = result {
        assert!(failure.error().is_unexpected_status());
        assert_eq!(failure.error().last_status(), Some("DELETED"));
        assert_eq!(
            failure.to_string(),
            "unexpected state 'DELETED', wanted target 'AVAILABLE'"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn continuous_target_occurrence_requires_consecutive_hits() {
    let (poll, calls) = scripted(&[
        Step::Status("available"),
        Step::Status("in-use"),
        Step::Status("available"),
        Step::Status("available"),
    ]);
    let spec = spec(&["in-use"], &["available"], Duration::from_secs(5)).continuous_target_occurrence(2);

    let object = wait_for_state(&spec, poll).await.unwrap().unwrap();

    assert_eq!(object.poll, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn not_found_checks_are_bounded() {
    let (poll, calls) = scripted(&[Step::Absent]);
    let spec = spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(5))
        .not_found(NotFoundPolicy::Pending { max_checks: 2 });

    let failure = wait_for_state(&spec, poll).await.unwrap_err();

    assert!(failure.error().is_not_found());
    assert_eq!(failure.to_string(), "couldn't find resource (3 retries)");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn not_found_counter_resets_when_resource_appears() {
    let (poll, calls) = scripted(&[
        Step::Absent,
        Step::Absent,
        Step::Status("PENDING"),
        Step::Absent,
        Step::Absent,
        Step::Status("ACTIVE"),
    ]);
    let spec = spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(5))
        .not_found(NotFoundPolicy::Pending { max_checks: 2 });

    assert!(wait_for_state(&spec, poll).await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn not_found_fail_policy_stops_on_first_absence() {
    let (poll, calls) = scripted(&[Step::Absent, Step::Status("ACTIVE")]);
    let spec = spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(5)).not_found(NotFoundPolicy::Fail);

    let failure = wait_for_state(&spec, poll).await.unwrap_err();

    assert!(failure.error().is_not_found());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn deletion_succeeds_when_resource_disappears() {
    let (poll, calls) = scripted(&[Step::Status("deleting"), Step::Status("deleting"), Step::Absent]);
    let spec = WaitSpec::deletion(["deleting"], Duration::from_secs(5))
        .poll_interval(Duration::from_millis(10));

    let result = wait_for_state(&spec, poll).await.unwrap();

    assert!(result.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn initial_delay_precedes_first_poll() {
    let (poll, calls) = scripted(&[Step::Status("ACTIVE")]);
    let spec = spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(60)).initial_delay(Duration::from_secs(30));
    let start = Instant::now();

    assert!(wait_for_state(&spec, poll).await.is_ok());
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn initial_delay_longer_than_timeout_never_polls() {
    let (poll, calls) = scripted(&[Step::Status("ACTIVE")]);
    let spec = spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(1)).initial_delay(Duration::from_secs(5));

    let failure = wait_for_state(&spec, poll).await.unwrap_err();

    assert!(failure.error().is_timeout());
    assert_eq!(failure.error().last_status(), None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_interrupts_hung_poll() {
    let spec = spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(3));
    let start = Instant::now();

    let failure = wait_for_state(&spec, || {
        std::future::pending::<Result<PollResult<Snapshot>, ApiError>>()
    })
    .await
    .unwrap_err();

    assert!(failure.error().is_timeout());
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn exponential_schedule_is_used_without_fixed_interval() {
    let (poll, _calls) = scripted(&[
        Step::Status("PENDING"),
        Step::Status("PENDING"),
        Step::Status("PENDING"),
        Step::Status("ACTIVE"),
    ]);
    let spec = WaitSpec::new(["PENDING"], ["ACTIVE"], Duration::from_secs(60));
    let start = Instant::now();

    assert!(wait_for_state(&spec, poll).await.is_ok());
    assert_eq!(start.elapsed(), Duration::from_millis(100 + 200 + 400));
}

#[tokio::test(start_paused = true)]
async fn failure_carries_resource_specific_reason() {
    let (poll, _calls) = scripted(&[Step::Status("failed")]);
    let spec = spec(&["pending"], &["active"], Duration::from_secs(5));

    let failure = wait_for_state(&spec, poll)
        .await
        .unwrap_err()
        .set_last_error(|snapshot| Some(format!("poll {} reported failure", snapshot.poll)));

    assert_eq!(
        failure.to_string(),
        "unexpected state 'failed', wanted target 'active'. last error: poll 1 reported failure"
    );
}

#[tokio::test(start_paused = true)]
async fn independent_waits_run_concurrently() {
    let (fast, fast_calls) = scripted(&[Step::Status("PENDING"), Step::Status("ACTIVE")]);
    let (slow, slow_calls) = scripted(&[
        Step::Status("PENDING"),
        Step::Status("PENDING"),
        Step::Status("PENDING"),
        Step::Status("ACTIVE"),
    ]);
    let spec = spec(&["PENDING"], &["ACTIVE"], Duration::from_secs(5));
    let start = Instant::now();

    let (a, b) = tokio::join!(wait_for_state(&spec, fast), wait_for_state(&spec, slow));

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(fast_calls.load(Ordering::SeqCst), 2);
    assert_eq!(slow_calls.load(Ordering::SeqCst), 4);
    assert_eq!(start.elapsed(), Duration::from_millis(30));
}

#[test]
fn phases_are_distinct() {
    let phases = [
        WaitPhase::NotStarted,
        WaitPhase::Polling,
        WaitPhase::Succeeded,
        WaitPhase::Failed,
        WaitPhase::TimedOut,
    ];
    for (i, a) in phases.iter().enumerate() {
        for b in &phases[i + 1..] {
            assert_ne!(a, b);
        }
    }
}
