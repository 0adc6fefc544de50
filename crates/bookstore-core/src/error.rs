//! # Error Types
//!
//! Domain-specific error types for bookstore-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bookstore-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule outcomes                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bookstore-db errors (separate crate)                                  │
//! │  └── DbError          - Store failures, wraps CoreError                │
//! │                                                                         │
//! │  Reply (reply.rs)                                                      │
//! │  └── code + message   - What the external caller sees                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → Reply → Caller          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (order id, book id, ...)
//! 3. Every error classifies into exactly one [`ErrorKind`]
//! 4. Business errors are never retried

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::types::OrderStatus;

// =============================================================================
// Error Taxonomy
// =============================================================================

/// Entity named by a not-found / already-exists outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Account,
    Store,
    Book,
    Order,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Account => "account",
            Entity::Store => "store",
            Entity::Book => "book",
            Entity::Order => "order",
        };
        f.write_str(name)
    }
}

/// Result category reported to the caller.
///
/// ## Result Codes
/// ```text
/// ┌──────────────────────────────────┬──────┐
/// │ Category                         │ Code │
/// ├──────────────────────────────────┼──────┤
/// │ InvalidInput                     │ 400  │
/// │ AuthorizationFailure             │ 401  │
/// │ NotFound(Account) / AlreadyExists│ 511 / 512 │
/// │ NotFound(Store)   / AlreadyExists│ 513 / 514 │
/// │ NotFound(Book)    / AlreadyExists│ 515 / 516 │
/// │ StockInsufficient                │ 517  │
/// │ NotFound(Order)                  │ 518  │
/// │ FundsInsufficient                │ 519  │
/// │ AlreadyExists(Order)             │ 520  │
/// │ InvalidStateTransition           │ 521  │
/// │ InternalStoreFailure             │ 528  │
/// └──────────────────────────────────┴──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound(Entity),
    AlreadyExists(Entity),
    AuthorizationFailure,
    StockInsufficient,
    FundsInsufficient,
    InvalidStateTransition,
    InvalidInput,
    InternalStoreFailure,
}

impl ErrorKind {
    /// Numeric result code for this category.
    pub const fn code(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::AuthorizationFailure => 401,
            ErrorKind::NotFound(Entity::Account) => 511,
            ErrorKind::AlreadyExists(Entity::Account) => 512,
            ErrorKind::NotFound(Entity::Store) => 513,
            ErrorKind::AlreadyExists(Entity::Store) => 514,
            ErrorKind::NotFound(Entity::Book) => 515,
            ErrorKind::AlreadyExists(Entity::Book) => 516,
            ErrorKind::StockInsufficient => 517,
            ErrorKind::NotFound(Entity::Order) => 518,
            ErrorKind::FundsInsufficient => 519,
            ErrorKind::AlreadyExists(Entity::Order) => 520,
            ErrorKind::InvalidStateTransition => 521,
            ErrorKind::InternalStoreFailure => 528,
        }
    }

    /// True for outcomes caused by the store rather than by business rules.
    pub const fn is_internal(&self) -> bool {
        matches!(self, ErrorKind::InternalStoreFailure)
    }
}

/// Anything that can be mapped onto the caller-facing taxonomy.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule outcomes.
///
/// Each variant is a definitive answer for the caller, surfaced synchronously
/// and never retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    /// Book is not listed in the given store.
    #[error("Book {book_id} not found in store {store_id}")]
    BookNotFound { store_id: String, book_id: String },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Store already exists: {0}")]
    StoreAlreadyExists(String),

    #[error("Book {book_id} already listed in store {store_id}")]
    BookAlreadyExists { store_id: String, book_id: String },

    /// Generated order id collided with an existing order.
    #[error("Order already exists: {0}")]
    OrderAlreadyExists(String),

    /// Wrong owner, wrong buyer or bad credential.
    ///
    /// ## User Workflow
    /// ```text
    /// ship_order(seller="bob", order)
    ///      │
    ///      ▼
    /// store owner is "alice"
    ///      │
    ///      ▼
    /// AuthorizationFailed { reason: "bob does not own store s1" }
    /// ```
    #[error("Authorization failed: {reason}")]
    AuthorizationFailed { reason: String },

    /// Requested quantity exceeds the stock available at write time.
    #[error("Insufficient stock for {book_id}: available {available}, requested {requested}")]
    InsufficientStock {
        book_id: String,
        available: i64,
        requested: i64,
    },

    #[error("Insufficient funds for order {order_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        order_id: String,
        balance: i64,
        required: i64,
    },

    /// Order is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Shipping an order that is still `created`
    /// - Receiving an order that is only `paid`
    /// - Cancelling or paying an order that is already `paid`
    #[error("Order {order_id} is {current}, cannot move to {requested}")]
    InvalidTransition {
        order_id: String,
        current: OrderStatus,
        requested: OrderStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an AuthorizationFailed error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        CoreError::AuthorizationFailed {
            reason: reason.into(),
        }
    }

    /// Creates a BookNotFound error.
    pub fn book_not_found(store_id: impl Into<String>, book_id: impl Into<String>) -> Self {
        CoreError::BookNotFound {
            store_id: store_id.into(),
            book_id: book_id.into(),
        }
    }
}

impl Classify for CoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            CoreError::AccountNotFound(_) => ErrorKind::NotFound(Entity::Account),
            CoreError::StoreNotFound(_) => ErrorKind::NotFound(Entity::Store),
            CoreError::BookNotFound { .. } => ErrorKind::NotFound(Entity::Book),
            CoreError::OrderNotFound(_) => ErrorKind::NotFound(Entity::Order),
            CoreError::AccountAlreadyExists(_) => ErrorKind::AlreadyExists(Entity::Account),
            CoreError::StoreAlreadyExists(_) => ErrorKind::AlreadyExists(Entity::Store),
            CoreError::BookAlreadyExists { .. } => ErrorKind::AlreadyExists(Entity::Book),
            CoreError::OrderAlreadyExists(_) => ErrorKind::AlreadyExists(Entity::Order),
            CoreError::AuthorizationFailed { .. } => ErrorKind::AuthorizationFailure,
            CoreError::InsufficientStock { .. } => ErrorKind::StockInsufficient,
            CoreError::InsufficientFunds { .. } => ErrorKind::FundsInsufficient,
            CoreError::InvalidTransition { .. } => ErrorKind::InvalidStateTransition,
            CoreError::Validation(_) => ErrorKind::InvalidInput,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., control characters in an identifier).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., the same book twice in one order).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },

    /// Arithmetic on money or stock would overflow.
    #[error("{field} overflows")]
    Overflow { field: String },
}

impl Classify for ValidationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
