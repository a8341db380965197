use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Number of tracked identities after which expired windows are swept, at most
/// once per window.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

/// A fixed rate-limit window: `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub length: std::time::Duration,
}

impl Window {
    /// The epoch-aligned window containing `now`.
    pub fn containing(now: DateTime<Utc>, length: std::time::Duration) -> Self {
        let length_ms = (length.as_millis() as i64).max(1);
        let start_ms = now.timestamp_millis().div_euclid(length_ms) * length_ms;
        let start = DateTime::<Utc>::from_timestamp_millis(start_ms).unwrap_or(now);
        Self { start, length }
    }

    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::milliseconds(self.length.as_millis() as i64)
    }
}

/// Backing store for per-identity request counters.
///
/// `increment` must be atomic per key: two concurrent calls for the same identity
/// and window observe distinct counts.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Adds one to the identity's counter for `window` and returns the new count.
    async fn increment(&self, identity: &str, window: &Window) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    window_start_ms: i64,
    count: u64,
}

#[derive(Debug, Default)]
struct Slots {
    by_identity: HashMap<String, Slot>,
    /// Start of the window the last sweep ran in.
    swept_window_ms: Option<i64>,
}

/// Per-process counter store. Correct only while a single instance serves traffic.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    slots: Mutex<Slots>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots.lock().map(|s| s.by_identity.len()).unwrap_or(0)
    }

    #[cfg(test)]
    fn swept_window_ms(&self) -> Option<i64> {
        self.slots.lock().ok().and_then(|s| s.swept_window_ms)
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, identity: &str, window: &Window) -> Result<u64, StoreError> {
        let start_ms = window.start_ms();
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory counter lock poisoned".to_string()))?;

        if slots.by_identity.len() > PRUNE_THRESHOLD && slots.swept_window_ms != Some(start_ms) {
            slots
                .by_identity
                .retain(|_, slot| slot.window_start_ms >= start_ms);
            slots.swept_window_ms = Some(start_ms);
        }

        let slot = slots.by_identity.entry(identity.to_string()).or_insert(Slot {
            window_start_ms: start_ms,
            count: 0,
        });
        if slot.window_start_ms != start_ms {
            *slot = Slot {
                window_start_ms: start_ms,
                count: 0,
            };
        }
        slot.count += 1;
        Ok(slot.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn window_at(secs: i64) -> Window {
        let now = Utc.timestamp_opt(secs, 0).unwrap();
        Window::containing(now, Duration::from_secs(60))
    }

    #[test]
    fn test_window_is_epoch_aligned() {
        let window = window_at(125);
        assert_eq!(window.start.timestamp(), 120);
        assert_eq!(window.reset_at().timestamp(), 180);
    }

    #[tokio::test]
    async fn test_counts_per_identity() {
        let store = InMemoryCounterStore::new();
        let window = window_at(10);

        assert_eq!(store.increment("alice", &window).await.unwrap(), 1);
        assert_eq!(store.increment("alice", &window).await.unwrap(), 2);
        assert_eq!(store.increment("bob", &window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_new_window_restarts_count() {
        let store = InMemoryCounterStore::new();
        store.increment("alice", &window_at(10)).await.unwrap();
        store.increment("alice", &window_at(20)).await.unwrap();

        assert_eq!(store.increment("alice", &window_at(70)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_windows_are_pruned() {
        let store = InMemoryCounterStore::new();
        let old = window_at(10);
        for i in 0..=PRUNE_THRESHOLD {
            store.increment(&format!("caller-{i}"), &old).await.unwrap();
        }
        assert_eq!(store.tracked(), PRUNE_THRESHOLD + 1);

        store.increment("fresh", &window_at(70)).await.unwrap();
        assert_eq!(store.tracked(), 1);
    }

    #[tokio::test]
    async fn test_sweep_runs_once_per_window() {
        let store = InMemoryCounterStore::new();
        let live = window_at(10);
        for i in 0..=PRUNE_THRESHOLD {
            store.increment(&format!("caller-{i}"), &live).await.unwrap();
        }
        assert_eq!(store.swept_window_ms(), None);

        store.increment("caller-0", &live).await.unwrap();
        assert_eq!(store.swept_window_ms(), Some(live.start_ms()));
        assert_eq!(store.tracked(), PRUNE_THRESHOLD + 1);

        // Still over the threshold, but this window was already swept.
        store.increment("late", &live).await.unwrap();
        assert_eq!(store.tracked(), PRUNE_THRESHOLD + 2);

        let next = window_at(70);
        store.increment("fresh", &next).await.unwrap();
        assert_eq!(store.swept_window_ms(), Some(next.start_ms()));
        assert_eq!(store.tracked(), 1);
    }
}
