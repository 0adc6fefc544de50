//! # Busy Retry
//!
//! SQLite allows one writer at a time. A connection that loses the race sees
//! `SQLITE_BUSY` (after its busy timeout), `SQLITE_LOCKED`, or
//! `SQLITE_BUSY_SNAPSHOT` when its read snapshot went stale before it could
//! write. None of these can be fixed inside the transaction, so the whole
//! transaction is rerun from `BEGIN` and every condition is evaluated again.
//!
//! ```text
//! attempt 1 ──► BEGIN … UPDATE … ✗ Busy ──► sleep 5ms
//! attempt 2 ──► BEGIN … UPDATE … ✗ Busy ──► sleep 10ms
//! attempt 3 ──► BEGIN … UPDATE … COMMIT ✓
//!
//! Domain errors (stock, funds, state) return immediately.
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{DbError, DbResult};

/// Attempts before a busy transaction is reported as failed.
pub const MAX_BUSY_ATTEMPTS: u32 = 20;

const BASE_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(250);

fn backoff(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(8);
    BASE_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Runs `attempt` until it succeeds, fails with a non-busy error, or runs
/// out of attempts.
pub async fn with_busy_retry<T, F, Fut>(operation: &'static str, mut attempt: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(err) if err.is_busy() => {
                if tries >= MAX_BUSY_ATTEMPTS {
                    warn!(operation, tries, error = %err, "Giving up on busy transaction");
                    return Err(DbError::TransactionFailed(format!(
                        "{} still busy after {} attempts",
                        operation, tries
                    )));
                }

                let wait = backoff(tries);
                warn!(operation, tries, wait_ms = wait.as_millis() as u64, "Store busy, rerunning transaction");
                tokio::time::sleep(wait).await;
                tries += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::CoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff(1), Duration::from_millis(5));
        assert_eq!(backoff(2), Duration::from_millis(10));
        assert_eq!(backoff(MAX_BUSY_ATTEMPTS), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_retries_busy_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let result = with_busy_retry("test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DbError::Busy("database is locked".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: DbResult<()> = with_busy_retry("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::OrderNotFound("o1".into()).into())
        })
        .await;

        assert!(matches!(result, Err(DbError::Domain(CoreError::OrderNotFound(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: DbResult<()> = with_busy_retry("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::Busy("database is locked".into()))
        })
        .await;

        assert!(matches!(result, Err(DbError::TransactionFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_BUSY_ATTEMPTS);
    }
}
