//! # Store Repository
//!
//! Store creation and ownership lookups.
//!
//! ## Concurrent Creation
//! ```text
//! seller A: create_store("s1") ─┐
//!                               ├─► INSERT ... ON CONFLICT(store_id) DO NOTHING
//! seller B: create_store("s1") ─┘
//!
//!   rows_affected = 1 ──► Ok            (exactly one caller)
//!   rows_affected = 0 ──► StoreAlreadyExists
//! ```
//! The primary key is the only serialization point; no in-process lock.

use std::sync::Arc;

use bookstore_core::lifecycle::ensure_owner;
use bookstore_core::validation::validate_identifier;
use bookstore_core::{Clock, CoreError, StoreOwnership};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::account::account_exists;
use crate::transaction::with_busy_retry;

/// Repository for store operations.
#[derive(Clone)]
pub struct StoreRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl StoreRepository {
    /// Creates a new StoreRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        StoreRepository { pool, clock }
    }

    /// Gets a store's ownership record.
    pub async fn get(&self, store_id: &str) -> DbResult<Option<StoreOwnership>> {
        fetch_ownership(&self.pool, store_id).await
    }

    /// Lists the stores owned by an account.
    pub async fn list_by_owner(&self, owner_id: &str) -> DbResult<Vec<StoreOwnership>> {
        let stores = sqlx::query_as::<_, StoreOwnership>(
            r#"
            SELECT store_id, owner_id, created_at
            FROM stores
            WHERE owner_id = ?1
            ORDER BY store_id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(stores)
    }

    /// Registers a store owned by `user_id`.
    ///
    /// ## Errors
    /// - `StoreAlreadyExists` if the store id is taken, including by a
    ///   concurrent caller that won the insert
    /// - `AccountNotFound` if the owner account does not exist
    pub async fn create_store(&self, user_id: &str, store_id: &str) -> DbResult<()> {
        validate_identifier("user_id", user_id)?;
        validate_identifier("store_id", store_id)?;

        if fetch_ownership(&self.pool, store_id).await?.is_some() {
            return Err(CoreError::StoreAlreadyExists(store_id.to_string()).into());
        }

        if !account_exists(&self.pool, user_id).await? {
            return Err(CoreError::AccountNotFound(user_id.to_string()).into());
        }

        let now = self.clock.now();
        let inserted = with_busy_retry("create_store", move || async move {
            let result = sqlx::query(
                r#"
                INSERT INTO stores (store_id, owner_id, created_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(store_id) DO NOTHING
                "#,
            )
            .bind(store_id)
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await?;
            Ok::<_, DbError>(result.rows_affected())
        })
        .await?;

        if inserted == 0 {
            debug!(store_id = %store_id, user_id = %user_id, "Lost store creation race");
            return Err(CoreError::StoreAlreadyExists(store_id.to_string()).into());
        }

        info!(store_id = %store_id, owner_id = %user_id, "Store created");
        Ok(())
    }
}

/// Loads a store's ownership record.
pub(crate) async fn fetch_ownership(pool: &SqlitePool, store_id: &str) -> DbResult<Option<StoreOwnership>> {
    let ownership = sqlx::query_as::<_, StoreOwnership>(
        "SELECT store_id, owner_id, created_at FROM stores WHERE store_id = ?1",
    )
    .bind(store_id)
    .fetch_optional(pool)
    .await?;

    Ok(ownership)
}

/// Resolves the caller's right to manage a store.
///
/// ## Errors
/// - `AccountNotFound` for an unknown caller
/// - `StoreNotFound` for an unknown store
/// - `AuthorizationFailure` when the caller does not own it
pub(crate) async fn require_owner(pool: &SqlitePool, user_id: &str, store_id: &str) -> DbResult<StoreOwnership> {
    if !account_exists(pool, user_id).await? {
        return Err(CoreError::AccountNotFound(user_id.to_string()).into());
    }

    let ownership = fetch_ownership(pool, store_id)
        .await?
        .ok_or_else(|| CoreError::StoreNotFound(store_id.to_string()))?;

    ensure_owner(&ownership, user_id)?;
    Ok(ownership)
}

// =============================================================================
// Unit Tests
// =============================================================================
