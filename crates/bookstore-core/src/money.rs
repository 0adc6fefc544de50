//! # Money Module
//!
//! Provides the `Money` type for balances, prices and order totals.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CONSERVATION OF FUNDS                                                  │
//! │                                                                         │
//! │  Payment moves `total` from buyer to seller:                           │
//! │    buyer.balance  -= total                                             │
//! │    seller.balance += total                                             │
//! │                                                                         │
//! │  With floats, -x then +x does not always cancel out.                   │
//! │  With integer cents it always does: no money is created or destroyed.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bookstore_core::money::Money;
//!
//! let price = Money::from_cents(100);
//! let line_total = price.checked_mul_quantity(2).unwrap();
//! assert_eq!(line_total.cents(), 200);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// An amount in cents. Balances, prices and order totals all use it.
///
/// Signed so that it maps onto SQLite INTEGER without conversion; the store
/// keeps balances non-negative. There is no unchecked arithmetic: every sum
/// a caller can influence goes through the `checked_*` helpers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use bookstore_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Multiplies a unit price by a quantity, returning `None` on overflow.
    ///
    /// ```text
    /// unit price 100 × quantity 2 ──► line total 200
    /// unit price i64::MAX × 2     ──► None
    /// ```
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

/// Renders as a plain decimal (`10.99`, `-5.50`); no currency symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
