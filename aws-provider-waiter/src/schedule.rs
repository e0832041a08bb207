//! Sleep lengths between polls.

use std::time::Duration;

use rand::Rng;

use crate::spec::{WaitSpec, INITIAL_POLL_INTERVAL};

/// Produces the sleep before each subsequent poll.
///
/// With a fixed interval every sleep is that interval. Otherwise the sleep
/// starts at 100ms and doubles, clamped to the configured minimum and maximum.
/// The minimum wins when the two conflict.
#[derive(Debug)]
pub(crate) struct PollSchedule {
    fixed: Option<Duration>,
    min: Duration,
    max: Duration,
    jitter: Option<f64>,
    next: Duration,
}

impl PollSchedule {
    pub(crate) fn new(spec: &WaitSpec) -> Self {
        Self {
            fixed: spec.fixed_poll_interval(),
            min: spec.min_interval(),
            max: spec.max_interval(),
            jitter: spec.jitter_fraction(),
            next: INITIAL_POLL_INTERVAL,
        }
    }

    pub(crate) fn next_wait(&mut self) -> Duration {
        let base = match self.fixed {
            Some(interval) => interval,
            None => {
                let mut wait = self.next;
                if wait < self.min {
                    wait = self.min;
                } else if wait > self.max {
                    wait = self.max;
                }
                self.next = self.next.saturating_mul(2);
                wait
            }
        };
        match self.jitter {
            Some(fraction) if fraction > 0.0 && !base.is_zero() => {
                let factor = 1.0 + rand::thread_rng().gen_range(-fraction..=fraction);
                base.mul_f64(factor.max(0.0))
            }
            _ => base,
        }
    }
}
