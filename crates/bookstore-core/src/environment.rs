//! # Environment
//!
//! The two nondeterministic inputs of the lifecycle engine: the current time
//! and fresh order ids. Both sit behind traits so tests can pin them.
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────────────┐
//! │ Clock                │      │ OrderIdGenerator             │
//! │  ├── SystemClock     │      │  ├── UuidOrderIds (default)  │
//! │  └── ManualClock     │      │  └── SequentialOrderIds      │
//! └──────────────────────┘      └──────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

// =============================================================================
// Clock
// =============================================================================

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// ## Example
/// ```rust
/// use bookstore_core::environment::{Clock, ManualClock};
/// use chrono::{Duration, Utc};
///
/// let start = Utc::now();
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::hours(2));
/// assert_eq!(clock.now(), start + Duration::hours(2));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    time: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        ManualClock {
            time: Mutex::new(time),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Order Ids
// =============================================================================

/// Source of fresh order ids.
pub trait OrderIdGenerator: Send + Sync {
    fn next_id(&self, buyer_id: &str, store_id: &str) -> String;
}

/// `{buyer}_{store}_{uuid}`, unique without coordination.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidOrderIds;

impl OrderIdGenerator for UuidOrderIds {
    fn next_id(&self, buyer_id: &str, store_id: &str) -> String {
        format!("{}_{}_{}", buyer_id, store_id, Uuid::new_v4())
    }
}

/// `order-1`, `order-2`, ... for readable test assertions.
#[derive(Debug, Default)]
pub struct SequentialOrderIds {
    next: AtomicU64,
}

impl SequentialOrderIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderIdGenerator for SequentialOrderIds {
    fn next_id(&self, _buyer_id: &str, _store_id: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("order-{}", n)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_uuid_order_ids_are_unique_and_prefixed() {
        let ids = UuidOrderIds;
        let a = ids.next_id("alice", "s1");
        let b = ids.next_id("alice", "s1");
        assert!(a.starts_with("alice_s1_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sequential_order_ids() {
        let ids = SequentialOrderIds::new();
        assert_eq!(ids.next_id("a", "s"), "order-1");
        assert_eq!(ids.next_id("b", "t"), "order-2");
    }
}
