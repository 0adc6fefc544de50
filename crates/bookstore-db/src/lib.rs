//! # bookstore-db: Ledger Store and Order Lifecycle Engine
//!
//! Persistent accounts, stores, inventory and orders on SQLite, with every
//! multi-row change inside one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bookstore Data Flow                              │
//! │                                                                         │
//! │  Caller (HTTP handler, seed, sweep)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bookstore-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ AccountRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ StoreRepo      │    │ 001_initial_ │  │   │
//! │  │   │ Clock         │    │ InventoryRepo  │    │  schema.sql  │  │   │
//! │  │   │ OrderIds      │    │ OrderRepo      │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 SQLite Database (WAL)                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`transaction`] - Whole-transaction retry on SQLite contention
//! - [`credential`] - Argon2 credential hashing
//! - [`config`] - Environment configuration for the binaries
//! - [`repository`] - Account, store, inventory and order repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookstore_core::OrderLineRequest;
//! use bookstore_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bookstore.db")).await?;
//!
//! db.accounts().register("alice", "secret").await?;
//! let order_id = db
//!     .orders()
//!     .new_order("alice", "s1", &[OrderLineRequest::new("b1", 2)])
//!     .await?;
//! db.orders().payment("alice", "secret", &order_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod credential;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod transaction;

use tracing::Level;
use tracing_subscriber::EnvFilter;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, SweepConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::AccountRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::order::OrderRepository;
pub use repository::store::StoreRepository;

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=bookstore_db=trace` - Show trace for this crate only
/// - Default: INFO, with debug for the bookstore crates
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bookstore_db=debug,bookstore_core=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}
