//! # Domain Types
//!
//! Core domain types used throughout the bookstore ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Account      │   │ StoreOwnership  │   │ InventoryLine   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  user_id        │◄──│  owner_id       │   │  store_id (FK)  │       │
//! │  │  credential     │   │  store_id       │◄──│  book_id        │       │
//! │  │  balance_cents  │   └─────────────────┘   │  price_cents    │       │
//! │  └─────────────────┘                         │  stock_level    │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │   OrderLine     │   │  OrderStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  order_id       │◄──│  order_id (FK)  │   │  Created        │       │
//! │  │  buyer_id       │   │  book_id        │   │  Paid           │       │
//! │  │  store_id       │   │  quantity       │   │  Shipped        │       │
//! │  │  status         │   │  unit_price     │   │  Received       │       │
//! │  └─────────────────┘   │   (snapshot)    │   │  Cancelled      │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Account
// =============================================================================

/// A registered user. Buyers and sellers are both accounts.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Account {
    pub user_id: String,

    /// Argon2 PHC string. Never leaves the process.
    #[serde(skip)]
    pub credential_hash: String,

    /// Balance in cents, never negative.
    pub balance_cents: i64,

    /// Session token issued by the caller's auth layer.
    pub session_token: Option<String>,

    #[ts(as = "Option<String>")]
    pub token_issued_at: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Returns the balance as Money.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

// =============================================================================
// Store Ownership
// =============================================================================

/// Maps a store to the one account that owns it, for the store's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StoreOwnership {
    pub store_id: String,
    pub owner_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory
// =============================================================================

/// Descriptive book metadata. Stored as JSON next to the inventory line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookInfo {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub pages: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl BookInfo {
    /// Metadata with just a title, for tests and seeding.
    pub fn titled(title: impl Into<String>) -> Self {
        BookInfo {
            title: title.into(),
            ..BookInfo::default()
        }
    }
}

/// A book listed in a store, with its current price and stock level.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryLine {
    pub store_id: String,
    pub book_id: String,

    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub book_info: BookInfo,

    /// Current catalog price in cents. Orders snapshot this value.
    pub price_cents: i64,

    /// Units on hand, never negative.
    pub stock_level: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryLine {
    /// Returns the price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The status of an order.
///
/// Legal paths are `created → paid → shipped → received` and
/// `created → cancelled`; see [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Stock reserved, awaiting payment.
    Created,
    /// Buyer has paid, seller credited.
    Paid,
    /// Seller has shipped.
    Shipped,
    /// Buyer confirmed receipt.
    Received,
    /// Cancelled before payment, stock restored.
    Cancelled,
}

impl OrderStatus {
    /// Lowercase name, identical to the stored value.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Received => "received",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Created
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order placed by a buyer against one store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub order_id: String,
    pub buyer_id: String,
    pub store_id: String,
    pub status: OrderStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub shipped_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub received_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Order Line
// =============================================================================

/// A line of an order.
/// Uses snapshot pattern to freeze the unit price at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub order_id: String,
    pub book_id: String,
    /// Units reserved; restored exactly on cancellation.
    pub quantity: i64,
    /// Unit price in cents at time of order (frozen).
    pub unit_price_cents: i64,
}

impl OrderLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns unit price × quantity, `None` on overflow.
    #[inline]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price().checked_mul_quantity(self.quantity)
    }
}

/// One requested (book, quantity) pair of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLineRequest {
    pub book_id: String,
    pub quantity: i64,
}

impl OrderLineRequest {
    pub fn new(book_id: impl Into<String>, quantity: i64) -> Self {
        OrderLineRequest {
            book_id: book_id.into(),
            quantity,
        }
    }
}

/// An order together with its lines and snapshot total.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetail {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub total_cents: i64,
}

impl OrderDetail {
    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Sweep Report
// =============================================================================

/// Outcome of one auto-cancel sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SweepReport {
    /// Stale unpaid orders found.
    pub examined: u32,
    /// Orders cancelled and restocked.
    pub cancelled: u32,
    /// Orders whose cancellation failed; left for the next sweep.
    pub failed: u32,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_default_and_display() {
        assert_eq!(OrderStatus::default(), OrderStatus::Created);
        assert_eq!(OrderStatus::Shipped.to_string(), "shipped");
    }

    #[test]
    fn test_order_status_serde_matches_stored_value() {
        let json = serde_json::to_string(&OrderStatus::Received).unwrap();
        assert_eq!(json, "\"received\"");
    }

    #[test]
    fn test_line_total() {
        let line = OrderLine {
            order_id: "o".into(),
            book_id: "b".into(),
            quantity: 2,
            unit_price_cents: 100,
        };
        assert_eq!(line.line_total(), Some(Money::from_cents(200)));
    }

    #[test]
    fn test_book_info_accepts_sparse_json() {
        let info: BookInfo = serde_json::from_str(r#"{"title":"Dune"}"#).unwrap();
        assert_eq!(info, BookInfo::titled("Dune"));
    }
}
