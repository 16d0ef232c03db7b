use std::time::Duration;

use tracing::debug;

use crate::clock::Clock;

/// Bounded retry with a fixed schedule of waits.
///
/// `delays[i]` is slept before attempt `i`, so the number of attempts equals
/// the schedule length. A zero delay makes the attempt immediate.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn from_secs(secs: &[u64]) -> Self {
        Self {
            delays: secs.iter().map(|&s| Duration::from_secs(s)).collect(),
        }
    }

    /// A single immediate attempt.
    pub fn once() -> Self {
        Self {
            delays: vec![Duration::ZERO],
        }
    }

    pub fn attempts(&self) -> usize {
        self.delays.len()
    }

    /// Run `attempt` until it yields `Some` or the schedule is exhausted.
    pub fn run<T>(
        &self,
        clock: &dyn Clock,
        mut attempt: impl FnMut(usize) -> Option<T>,
    ) -> Option<T> {
        for (i, delay) in self.delays.iter().enumerate() {
            if !delay.is_zero() {
                debug!(attempt = i + 1, wait = ?delay, "Waiting before retry");
                clock.sleep(*delay);
            }
            if let Some(value) = attempt(i) {
                return Some(value);
            }
        }
        None
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(&crate::consts::DEFAULT_METADATA_RETRY_SECS)
    }
}
