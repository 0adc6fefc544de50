//! # Validation Module
//!
//! Input validation for bookstore operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (before any transaction opens)                   │
//! │  ├── Empty / oversized identifiers                                     │
//! │  ├── Non-positive quantities, negative prices                          │
//! │  └── Duplicate books within one order                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Conditional writes (bookstore-db)                            │
//! │  ├── stock_level >= n re-checked at write time                         │
//! │  └── balance_cents >= total re-checked at write time                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── PRIMARY KEY on store_id, (store_id, book_id)                      │
//! │  └── CHECK (stock_level >= 0), CHECK (balance_cents >= 0)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bookstore_core::validation::{validate_identifier, validate_quantity};
//!
//! validate_identifier("store_id", "store-1").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::OrderLineRequest;
use crate::{MAX_IDENTIFIER_LEN, MAX_LINE_QUANTITY, MAX_ORDER_LINES, MAX_STOCK_LEVEL};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an account, store, book or order identifier.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most `MAX_IDENTIFIER_LEN` bytes
/// - No control characters
///
/// ## Example
/// ```rust
/// use bookstore_core::validation::validate_identifier;
///
/// assert!(validate_identifier("book_id", "978-0131103627").is_ok());
/// assert!(validate_identifier("book_id", "").is_err());
/// ```
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if value.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

/// Validates a credential before hashing or verification.
///
/// Only emptiness is checked; strength rules belong to the caller.
pub fn validate_credential(credential: &str) -> ValidationResult<()> {
    if credential.is_empty() {
        return Err(ValidationError::Required {
            field: "credential".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a per-line order quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `MAX_LINE_QUANTITY`
///
/// ## User Workflow
/// ```text
/// new_order(buyer, store, [(b1, 2), (b2, 0)])
///       │
///       ▼
/// validate_quantity(0) ← THIS FUNCTION
///       │
///       ├── qty <= 0?      → MustBePositive (400)
///       ├── qty too large? → OutOfRange (400)
///       └── OK → reserve stock
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a book price in cents. Zero is allowed.
///
/// ## Example
/// ```rust
/// use bookstore_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the stock a book is first listed with. Zero is allowed.
pub fn validate_initial_stock(stock: i64) -> ValidationResult<()> {
    if !(0..=MAX_STOCK_LEVEL).contains(&stock) {
        return Err(ValidationError::OutOfRange {
            field: "stock_level".to_string(),
            min: 0,
            max: MAX_STOCK_LEVEL,
        });
    }

    Ok(())
}

/// Validates a stock adjustment. Negative deltas remove stock.
pub fn validate_stock_delta(delta: i64) -> ValidationResult<()> {
    if !(-MAX_STOCK_LEVEL..=MAX_STOCK_LEVEL).contains(&delta) {
        return Err(ValidationError::OutOfRange {
            field: "stock delta".to_string(),
            min: -MAX_STOCK_LEVEL,
            max: MAX_STOCK_LEVEL,
        });
    }

    Ok(())
}

/// Validates an amount added to an account balance.
pub fn validate_funds_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates the unpaid-order age threshold of a sweep.
pub fn validate_timeout_secs(secs: i64) -> ValidationResult<()> {
    if secs < 0 {
        return Err(ValidationError::OutOfRange {
            field: "timeout".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the line list of a new order.
///
/// ## Rules
/// - At least one line, at most `MAX_ORDER_LINES`
/// - Every book id and quantity valid
/// - No book repeated within one request
pub fn validate_order_lines(lines: &[OrderLineRequest]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "order lines".to_string(),
        });
    }

    if lines.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "order lines".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        validate_identifier("book_id", &line.book_id)?;
        validate_quantity(line.quantity)?;

        if !seen.insert(line.book_id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "book_id".to_string(),
                value: line.book_id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("store_id", "store-1").is_ok());
        assert!(validate_identifier("store_id", "书店").is_ok());

        assert!(matches!(
            validate_identifier("store_id", ""),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_identifier("store_id", "   ").is_err());
        assert!(validate_identifier("store_id", "a\nb").is_err());
        assert!(matches!(
            validate_identifier("store_id", &"x".repeat(MAX_IDENTIFIER_LEN + 1)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());

        assert!(validate_initial_stock(0).is_ok());
        assert!(validate_initial_stock(-5).is_err());
        assert!(validate_initial_stock(MAX_STOCK_LEVEL + 1).is_err());

        assert!(validate_stock_delta(-3).is_ok());
        assert!(validate_stock_delta(MAX_STOCK_LEVEL).is_ok());
        assert!(validate_stock_delta(-MAX_STOCK_LEVEL - 1).is_err());

        assert!(validate_funds_amount(1).is_ok());
        assert!(validate_funds_amount(0).is_err());
        assert!(validate_funds_amount(-100).is_err());

        assert!(validate_timeout_secs(0).is_ok());
        assert!(validate_timeout_secs(-1).is_err());
    }

    #[test]
    fn test_validate_credential() {
        assert!(validate_credential("hunter2").is_ok());
        assert!(validate_credential("").is_err());
    }

    #[test]
    fn test_validate_order_lines() {
        let ok = vec![OrderLineRequest::new("b1", 2), OrderLineRequest::new("b2", 1)];
        assert!(validate_order_lines(&ok).is_ok());

        assert!(matches!(
            validate_order_lines(&[]),
            Err(ValidationError::Required { .. })
        ));

        let zero = vec![OrderLineRequest::new("b1", 0)];
        assert!(matches!(
            validate_order_lines(&zero),
            Err(ValidationError::MustBePositive { .. })
        ));

        let repeated = vec![OrderLineRequest::new("b1", 1), OrderLineRequest::new("b1", 2)];
        assert!(matches!(
            validate_order_lines(&repeated),
            Err(ValidationError::Duplicate { .. })
        ));

        let too_many: Vec<_> = (0..=MAX_ORDER_LINES)
            .map(|i| OrderLineRequest::new(format!("b{}", i), 1))
            .collect();
        assert!(validate_order_lines(&too_many).is_err());
    }
}
