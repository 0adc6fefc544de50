//! # Inventory Repository
//!
//! Books listed in stores: metadata, price and stock.
//!
//! ## Stock Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every stock change is ONE conditional UPDATE:                          │
//! │                                                                         │
//! │    UPDATE inventory SET stock_level = stock_level + :delta              │
//! │    WHERE store_id = :s AND book_id = :b                                 │
//! │      AND stock_level + :delta BETWEEN 0 AND :max                        │
//! │                                                                         │
//! │  No read-then-write window: the condition is evaluated by the writer   │
//! │  that holds the lock. 0 rows → classify (unknown book / not enough).   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Order reservations use the same shape from inside the order transaction
//! (see `repository::order`).

use std::sync::Arc;

use bookstore_core::validation::{
    validate_identifier, validate_initial_stock, validate_price_cents, validate_stock_delta,
};
use bookstore_core::{BookInfo, Clock, CoreError, InventoryLine, ValidationError, MAX_STOCK_LEVEL};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::store::{fetch_ownership, require_owner};
use crate::transaction::with_busy_retry;

/// Repository for inventory operations.
#[derive(Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        InventoryRepository { pool, clock }
    }

    /// Gets one inventory line.
    pub async fn get(&self, store_id: &str, book_id: &str) -> DbResult<Option<InventoryLine>> {
        let line = sqlx::query_as::<_, InventoryLine>(
            r#"
            SELECT store_id, book_id, book_info, price_cents, stock_level,
                   created_at, updated_at
            FROM inventory
            WHERE store_id = ?1 AND book_id = ?2
            "#,
        )
        .bind(store_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(line)
    }

    /// Lists every book of a store, ordered by book id.
    pub async fn list(&self, store_id: &str) -> DbResult<Vec<InventoryLine>> {
        if fetch_ownership(&self.pool, store_id).await?.is_none() {
            return Err(CoreError::StoreNotFound(store_id.to_string()).into());
        }

        let lines = sqlx::query_as::<_, InventoryLine>(
            r#"
            SELECT store_id, book_id, book_info, price_cents, stock_level,
                   created_at, updated_at
            FROM inventory
            WHERE store_id = ?1
            ORDER BY book_id
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Current stock of a listed book.
    pub async fn stock_level(&self, store_id: &str, book_id: &str) -> DbResult<i64> {
        current_stock(&self.pool, store_id, book_id)
            .await?
            .ok_or_else(|| CoreError::book_not_found(store_id, book_id).into())
    }

    /// Lists a book in a store owned by `user_id`.
    ///
    /// ## Errors
    /// - `AccountNotFound` / `StoreNotFound`
    /// - `AuthorizationFailure` if `user_id` does not own the store
    /// - `BookAlreadyExists` if the book is already listed there
    pub async fn add_book(
        &self,
        user_id: &str,
        store_id: &str,
        book_id: &str,
        book_info: &BookInfo,
        price_cents: i64,
        stock_level: i64,
    ) -> DbResult<()> {
        validate_identifier("store_id", store_id)?;
        validate_identifier("book_id", book_id)?;
        validate_price_cents(price_cents)?;
        validate_initial_stock(stock_level)?;

        require_owner(&self.pool, user_id, store_id).await?;

        let info_json = serde_json::to_string(book_info)
            .map_err(|e| DbError::Internal(format!("Failed to encode book info: {}", e)))?;
        let info_json = info_json.as_str();
        let now = self.clock.now();

        let inserted = with_busy_retry("add_book", move || async move {
            let result = sqlx::query(
                r#"
                INSERT INTO inventory (
                    store_id, book_id, book_info, price_cents, stock_level,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                ON CONFLICT(store_id, book_id) DO NOTHING
                "#,
            )
            .bind(store_id)
            .bind(book_id)
            .bind(info_json)
            .bind(price_cents)
            .bind(stock_level)
            .bind(now)
            .execute(&self.pool)
            .await?;
            Ok::<_, DbError>(result.rows_affected())
        })
        .await?;

        if inserted == 0 {
            return Err(CoreError::BookAlreadyExists {
                store_id: store_id.to_string(),
                book_id: book_id.to_string(),
            }
            .into());
        }

        info!(store_id = %store_id, book_id = %book_id, price_cents, stock_level, "Book listed");
        Ok(())
    }

    /// Adjusts stock by `delta` (negative removes stock).
    ///
    /// ## Returns
    /// The new stock level.
    ///
    /// ## Errors
    /// - `BookNotFound` if the book is not listed
    /// - `InsufficientStock` if the result would be negative
    /// - `InvalidInput` if an increase would pass `MAX_STOCK_LEVEL`;
    ///   removals are only bounded below
    pub async fn add_stock(&self, user_id: &str, store_id: &str, book_id: &str, delta: i64) -> DbResult<i64> {
        validate_stock_delta(delta)?;
        require_owner(&self.pool, user_id, store_id).await?;

        let now = self.clock.now();
        let updated = with_busy_retry("add_stock", move || async move {
            let level: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE inventory
                SET stock_level = stock_level + ?1, updated_at = ?2
                WHERE store_id = ?3 AND book_id = ?4
                  AND stock_level + ?1 >= 0
                  AND (?1 <= 0 OR stock_level + ?1 <= ?5)
                RETURNING stock_level
                "#,
            )
            .bind(delta)
            .bind(now)
            .bind(store_id)
            .bind(book_id)
            .bind(MAX_STOCK_LEVEL)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, DbError>(level)
        })
        .await?;

        if let Some(level) = updated {
            info!(store_id = %store_id, book_id = %book_id, delta, stock_level = level, "Stock adjusted");
            return Ok(level);
        }

        // Refused: work out why.
        match current_stock(&self.pool, store_id, book_id).await? {
            None => Err(CoreError::book_not_found(store_id, book_id).into()),
            Some(available) if available + delta < 0 => Err(CoreError::InsufficientStock {
                book_id: book_id.to_string(),
                available,
                requested: -delta,
            }
            .into()),
            Some(_) if delta > 0 => Err(ValidationError::Overflow {
                field: "stock_level".to_string(),
            }
            .into()),
            // Refused at a lower level that was restocked before this read.
            Some(available) => Err(CoreError::InsufficientStock {
                book_id: book_id.to_string(),
                available,
                requested: -delta,
            }
            .into()),
        }
    }

    /// Changes a listed book's price. Existing orders keep their snapshot.
    pub async fn set_price(&self, user_id: &str, store_id: &str, book_id: &str, price_cents: i64) -> DbResult<()> {
        validate_price_cents(price_cents)?;
        require_owner(&self.pool, user_id, store_id).await?;

        let now = self.clock.now();
        let updated = with_busy_retry("set_price", move || async move {
            let result = sqlx::query(
                r#"
                UPDATE inventory SET price_cents = ?1, updated_at = ?2
                WHERE store_id = ?3 AND book_id = ?4
                "#,
            )
            .bind(price_cents)
            .bind(now)
            .bind(store_id)
            .bind(book_id)
            .execute(&self.pool)
            .await?;
            Ok::<_, DbError>(result.rows_affected())
        })
        .await?;

        if updated == 0 {
            return Err(CoreError::book_not_found(store_id, book_id).into());
        }

        info!(store_id = %store_id, book_id = %book_id, price_cents, "Price changed");
        Ok(())
    }
}

async fn current_stock(pool: &SqlitePool, store_id: &str, book_id: &str) -> DbResult<Option<i64>> {
    let level = sqlx::query_scalar(
        "SELECT stock_level FROM inventory WHERE store_id = ?1 AND book_id = ?2",
    )
    .bind(store_id)
    .bind(book_id)
    .fetch_optional(pool)
    .await?;

    Ok(level)
}

// =============================================================================
// Unit Tests
// =============================================================================
