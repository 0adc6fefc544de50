//! # bookstore-core: Pure Domain Rules for the Bookstore Ledger
//!
//! Types, money arithmetic, validation and the order state machine, with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Bookstore Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              External caller (HTTP layer, CLI, cron)            │   │
//! │  │        register, new_order, payment, ship, receive, sweep       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Reply { code, message, payload }       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            bookstore-db (ledger store + lifecycle engine)       │   │
//! │  │       transactions, conditional writes, retries, migrations     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ bookstore-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌───────────┐          │   │
//! │  │   │  types  │ │  money  │ │ lifecycle │ │ validation│          │   │
//! │  │   └─────────┘ └─────────┘ └───────────┘ └───────────┘          │   │
//! │  │   ┌─────────┐ ┌─────────────┐ ┌─────────┐                       │   │
//! │  │   │  error  │ │ environment │ │  reply  │                       │   │
//! │  │   └─────────┘ └─────────────┘ └─────────┘                       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Account, InventoryLine, Order, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Error taxonomy and result codes
//! - [`validation`] - Input validation
//! - [`lifecycle`] - Order state machine, authorization and totals
//! - [`environment`] - Clock and order id seams
//! - [`reply`] - Caller-facing reply envelope
//!
//! ## Example Usage
//!
//! ```rust
//! use bookstore_core::{Money, OrderStatus};
//!
//! let price = Money::from_cents(100);
//! assert_eq!(price.checked_mul_quantity(2), Some(Money::from_cents(200)));
//! assert!(OrderStatus::Created.can_transition_to(OrderStatus::Paid));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod reply;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use environment::{Clock, ManualClock, OrderIdGenerator, SequentialOrderIds, SystemClock, UuidOrderIds};
pub use error::{Classify, CoreError, CoreResult, Entity, ErrorKind, ValidationError};
pub use money::Money;
pub use reply::{IntoReply, Reply};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest quantity accepted on one order line.
pub const MAX_LINE_QUANTITY: i64 = 10_000;

/// Largest stock level, and largest single stock adjustment.
pub const MAX_STOCK_LEVEL: i64 = 1_000_000_000;

/// Most distinct books accepted in one order.
pub const MAX_ORDER_LINES: usize = 100;

/// Longest accepted account, store or book identifier, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Age after which an unpaid order is auto-cancelled, unless configured.
pub const DEFAULT_UNPAID_TIMEOUT_SECS: i64 = 3600;
