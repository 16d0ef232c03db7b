use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of wall-clock time and blocking waits.
///
/// The monitor and the metadata retry policy only ever wait through this
/// trait, so tests can substitute a clock that advances instantly.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration);
}

/// The real clock: `Utc::now` and `std::thread::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
