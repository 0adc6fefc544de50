//! # Order Lifecycle Rules
//!
//! The pure half of the order lifecycle engine: which transitions are legal,
//! who may perform them, and how totals and sweep cut-offs are computed.
//! bookstore-db applies these rules inside its transactions.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create_order ──► CREATED ──pay──► PAID ──ship──► SHIPPED ──receive──► │
//! │                       │                                     RECEIVED    │
//! │                       │ cancel / auto-cancel                            │
//! │                       ▼                                                 │
//! │                   CANCELLED (stock restored, order removed)             │
//! │                                                                         │
//! │   Nothing ever moves backwards. RECEIVED and CANCELLED are terminal.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Order, OrderLine, OrderStatus, StoreOwnership};

impl OrderStatus {
    /// Whether `self → next` is an edge of the state machine.
    pub const fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Created, OrderStatus::Paid)
                | (OrderStatus::Paid, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Received)
                | (OrderStatus::Created, OrderStatus::Cancelled)
        )
    }

    /// No transition leaves a terminal status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Received | OrderStatus::Cancelled)
    }
}

/// Fails with `InvalidTransition` unless `current → next` is legal.
pub fn ensure_transition(order_id: &str, current: OrderStatus, next: OrderStatus) -> CoreResult<()> {
    if current.can_transition_to(next) {
        return Ok(());
    }

    Err(CoreError::InvalidTransition {
        order_id: order_id.to_string(),
        current,
        requested: next,
    })
}

/// Fails unless `caller` placed the order.
pub fn ensure_buyer(order: &Order, caller: &str) -> CoreResult<()> {
    if order.buyer_id == caller {
        return Ok(());
    }

    Err(CoreError::unauthorized(format!(
        "{} is not the buyer of order {}",
        caller, order.order_id
    )))
}

/// Fails unless `caller` owns the store.
pub fn ensure_owner(ownership: &StoreOwnership, caller: &str) -> CoreResult<()> {
    if ownership.owner_id == caller {
        return Ok(());
    }

    Err(CoreError::unauthorized(format!(
        "{} does not own store {}",
        caller, ownership.store_id
    )))
}

/// Sum of unit price × quantity over the snapshot lines.
///
/// ## Example
/// ```rust
/// use bookstore_core::lifecycle::order_total;
/// use bookstore_core::OrderLine;
///
/// let lines = vec![OrderLine {
///     order_id: "o1".into(),
///     book_id: "b1".into(),
///     quantity: 2,
///     unit_price_cents: 100,
/// }];
/// assert_eq!(order_total(&lines).unwrap().cents(), 200);
/// ```
pub fn order_total(lines: &[OrderLine]) -> CoreResult<Money> {
    lines.iter().try_fold(Money::zero(), |acc, line| {
        line.line_total()
            .and_then(|line_total| acc.checked_add(line_total))
            .ok_or_else(|| {
                ValidationError::Overflow {
                    field: "order total".to_string(),
                }
                .into()
            })
    })
}

/// Creation time at or before which an unpaid order is stale.
pub fn stale_cutoff(now: DateTime<Utc>, threshold_secs: i64) -> CoreResult<DateTime<Utc>> {
    let threshold = Duration::try_seconds(threshold_secs).ok_or_else(|| ValidationError::Overflow {
        field: "timeout".to_string(),
    })?;

    now.checked_sub_signed(threshold).ok_or_else(|| {
        ValidationError::Overflow {
            field: "timeout".to_string(),
        }
        .into()
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
