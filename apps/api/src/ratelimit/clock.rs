use std::fmt::Debug;

use chrono::{DateTime, Utc};

/// Source of the current time for window arithmetic.
/// Production uses `SystemClock`; tests drive a `MockClock`.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub use mock::MockClock;
