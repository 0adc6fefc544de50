//! # Database Error Types
//!
//! Error types for ledger store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Business rule outcome (CoreError)      SQLite error (sqlx::Error)     │
//! │       │                                      │                          │
//! │       ▼                                      ▼                          │
//! │  DbError::Domain                        DbError (this module)          │
//! │       │                                 ├── Busy → transaction rerun   │
//! │       │                                 └── other → 528                │
//! │       ▼                                      │                          │
//! │  Reply { code, message } ◄───────────────────┘                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bookstore_core::{Classify, CoreError, ErrorKind, ValidationError};
use thiserror::Error;

/// SQLite primary result codes that mean "another connection is in the way".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Ledger store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule refused the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Unique constraint violation not already mapped to a domain outcome.
    ///
    /// ## When This Occurs
    /// - A racing insert on a key the repository did not pre-check
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Inventory row for a store that does not exist
    /// - Order line for an order that was removed mid-transaction
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Another connection holds the lock (`SQLITE_BUSY`, `SQLITE_LOCKED`,
    /// `SQLITE_BUSY_SNAPSHOT`). The whole transaction may be rerun.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not be committed after all retries.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True when rerunning the transaction may succeed.
    pub fn is_busy(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }

    /// The business outcome, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

impl Classify for DbError {
    fn kind(&self) -> ErrorKind {
        match self {
            DbError::Domain(err) => err.kind(),
            _ => ErrorKind::InternalStoreFailure,
        }
    }
}

/// Primary SQLite result code from an extended code string such as `"517"`.
fn primary_code(code: &str) -> Option<i32> {
    code.parse::<i32>().ok().map(|extended| extended & 0xff)
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database  → code 5/6 (any extended) → DbError::Busy
///                        → "UNIQUE constraint failed" → UniqueViolation
///                        → "FOREIGN KEY constraint failed" → ForeignKeyViolation
/// sqlx::Error::PoolTimedOut → DbError::PoolExhausted
/// Other                     → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code().and_then(|c| primary_code(&c));

                if matches!(code, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
                    || msg.contains("database is locked")
                {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::Entity;

    #[test]
    fn test_primary_code() {
        assert_eq!(primary_code("5"), Some(SQLITE_BUSY));
        assert_eq!(primary_code("517"), Some(SQLITE_BUSY)); // BUSY_SNAPSHOT
        assert_eq!(primary_code("262"), Some(SQLITE_LOCKED)); // LOCKED_SHAREDCACHE
        assert_eq!(primary_code("2067"), Some(19)); // CONSTRAINT_UNIQUE
        assert_eq!(primary_code("nope"), None);
    }

    #[test]
    fn test_classification() {
        let err: DbError = CoreError::OrderNotFound("o1".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Order));
        assert_eq!(err.to_string(), "Order not found: o1");

        let err: DbError = ValidationError::Required {
            field: "store_id".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(DbError::PoolExhausted.kind(), ErrorKind::InternalStoreFailure);
        assert_eq!(DbError::Busy("locked".into()).kind().code(), 528);
    }

    #[test]
    fn test_only_busy_is_retryable() {
        assert!(DbError::Busy("database is locked".into()).is_busy());
        assert!(!DbError::PoolExhausted.is_busy());
        assert!(!DbError::Domain(CoreError::StoreAlreadyExists("s".into())).is_busy());
    }
}
