//! # Account Repository
//!
//! Registration, credentials, session tokens and balances.
//!
//! ## Credential Flow
//! ```text
//! register(id, credential)
//!      │  argon2 hash (random salt)
//!      ▼
//! accounts.credential_hash = "$argon2id$..."
//!
//! add_funds / unregister / login / payment
//!      │  load hash → verify
//!      ├── unknown account ──► AuthorizationFailure
//!      ├── mismatch ─────────► AuthorizationFailure
//!      └── ok ───────────────► continue
//! ```

use std::sync::Arc;

use bookstore_core::validation::{validate_credential, validate_funds_amount, validate_identifier};
use bookstore_core::{Account, Clock, CoreError, Money, ValidationError};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::credential::{hash_credential_blocking_pool, verify_credential_blocking_pool};
use crate::error::{DbError, DbResult};
use crate::transaction::with_busy_retry;

/// Repository for account operations.
#[derive(Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        AccountRepository { pool, clock }
    }

    /// Gets an account by id.
    pub async fn get(&self, user_id: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT user_id, credential_hash, balance_cents,
                   session_token, token_issued_at, created_at
            FROM accounts
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Returns whether an account exists.
    pub async fn exists(&self, user_id: &str) -> DbResult<bool> {
        account_exists(&self.pool, user_id).await
    }

    /// Current balance of an account.
    pub async fn balance(&self, user_id: &str) -> DbResult<Money> {
        let cents: Option<i64> =
            sqlx::query_scalar("SELECT balance_cents FROM accounts WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        cents
            .map(Money::from_cents)
            .ok_or_else(|| CoreError::AccountNotFound(user_id.to_string()).into())
    }

    /// Registers a new account with a zero balance.
    ///
    /// ## Errors
    /// - `AccountAlreadyExists` if the id is taken
    pub async fn register(&self, user_id: &str, credential: &str) -> DbResult<()> {
        validate_identifier("user_id", user_id)?;
        validate_credential(credential)?;

        let credential_hash = hash_credential_blocking_pool(credential).await?;
        let hash = credential_hash.as_str();
        let now = self.clock.now();

        let inserted = with_busy_retry("register", move || async move {
            let result = sqlx::query(
                r#"
                INSERT INTO accounts (user_id, credential_hash, balance_cents, created_at)
                VALUES (?1, ?2, 0, ?3)
                ON CONFLICT(user_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(hash)
            .bind(now)
            .execute(&self.pool)
            .await?;

            Ok::<_, DbError>(result.rows_affected())
        })
        .await?;

        if inserted == 0 {
            return Err(CoreError::AccountAlreadyExists(user_id.to_string()).into());
        }

        info!(user_id = %user_id, "Account registered");
        Ok(())
    }

    /// Checks a credential.
    ///
    /// Unknown accounts and wrong credentials both fail with
    /// `AuthorizationFailure`.
    pub async fn verify(&self, user_id: &str, credential: &str) -> DbResult<()> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT credential_hash FROM accounts WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let matched = match hash {
            Some(hash) => Some(verify_credential_blocking_pool(credential, hash).await?),
            None => None,
        };

        match matched {
            Some(true) => Ok(()),
            Some(false) => {
                debug!(user_id = %user_id, "Credential mismatch");
                Err(CoreError::unauthorized(format!("bad credential for {}", user_id)).into())
            }
            None => Err(CoreError::unauthorized(format!("unknown account {}", user_id)).into()),
        }
    }

    /// Deletes an account after checking its credential.
    pub async fn unregister(&self, user_id: &str, credential: &str) -> DbResult<()> {
        self.verify(user_id, credential).await?;

        let deleted = with_busy_retry("unregister", move || async move {
            let result = sqlx::query("DELETE FROM accounts WHERE user_id = ?1")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok::<_, DbError>(result.rows_affected())
        })
        .await?;

        if deleted == 0 {
            return Err(CoreError::unauthorized(format!("unknown account {}", user_id)).into());
        }

        info!(user_id = %user_id, "Account unregistered");
        Ok(())
    }

    /// Replaces the credential after checking the old one.
    pub async fn change_credential(
        &self,
        user_id: &str,
        old_credential: &str,
        new_credential: &str,
    ) -> DbResult<()> {
        validate_credential(new_credential)?;
        self.verify(user_id, old_credential).await?;

        let new_hash = hash_credential_blocking_pool(new_credential).await?;
        let hash = new_hash.as_str();

        with_busy_retry("change_credential", move || async move {
            // Existing sessions end with the old credential.
            sqlx::query(
                r#"
                UPDATE accounts
                SET credential_hash = ?1, session_token = NULL, token_issued_at = NULL
                WHERE user_id = ?2
                "#,
            )
            .bind(hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
            Ok::<_, DbError>(())
        })
        .await?;

        info!(user_id = %user_id, "Credential changed");
        Ok(())
    }

    // =========================================================================
    // Session tokens
    // =========================================================================

    /// Checks the credential and records a caller-issued session token.
    pub async fn login(&self, user_id: &str, credential: &str, session_token: &str) -> DbResult<()> {
        if session_token.is_empty() {
            return Err(ValidationError::Required {
                field: "session_token".to_string(),
            }
            .into());
        }
        self.verify(user_id, credential).await?;

        let now = self.clock.now();
        with_busy_retry("login", move || async move {
            sqlx::query(
                "UPDATE accounts SET session_token = ?1, token_issued_at = ?2 WHERE user_id = ?3",
            )
            .bind(session_token)
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
            Ok::<_, DbError>(())
        })
        .await?;

        debug!(user_id = %user_id, "Session token stored");
        Ok(())
    }

    /// Fails with `AuthorizationFailure` unless `session_token` is the
    /// account's current token.
    pub async fn check_token(&self, user_id: &str, session_token: &str) -> DbResult<()> {
        let stored: Option<Option<String>> =
            sqlx::query_scalar("SELECT session_token FROM accounts WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        match stored.flatten() {
            Some(token) if token == session_token => Ok(()),
            _ => Err(CoreError::unauthorized(format!("invalid session for {}", user_id)).into()),
        }
    }

    /// Clears the session token if it matches.
    pub async fn logout(&self, user_id: &str, session_token: &str) -> DbResult<()> {
        let cleared = with_busy_retry("logout", move || async move {
            let result = sqlx::query(
                r#"
                UPDATE accounts SET session_token = NULL, token_issued_at = NULL
                WHERE user_id = ?1 AND session_token = ?2
                "#,
            )
            .bind(user_id)
            .bind(session_token)
            .execute(&self.pool)
            .await?;
            Ok::<_, DbError>(result.rows_affected())
        })
        .await?;

        if cleared == 0 {
            return Err(CoreError::unauthorized(format!("invalid session for {}", user_id)).into());
        }

        debug!(user_id = %user_id, "Session token cleared");
        Ok(())
    }

    // =========================================================================
    // Funds
    // =========================================================================

    /// Adds a positive amount to the balance after checking the credential.
    ///
    /// ## Returns
    /// The new balance.
    pub async fn add_funds(&self, user_id: &str, credential: &str, amount_cents: i64) -> DbResult<Money> {
        validate_funds_amount(amount_cents)?;
        self.verify(user_id, credential).await?;

        let new_balance = with_busy_retry("add_funds", move || async move {
            // SQLite turns an overflowing integer into a REAL; refuse instead.
            let balance: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE accounts SET balance_cents = balance_cents + ?1
                WHERE user_id = ?2 AND balance_cents <= ?3
                RETURNING balance_cents
                "#,
            )
            .bind(amount_cents)
            .bind(user_id)
            .bind(i64::MAX - amount_cents)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, DbError>(balance)
        })
        .await?;

        let balance = new_balance.ok_or_else(|| ValidationError::Overflow {
            field: "balance".to_string(),
        })?;

        info!(user_id = %user_id, amount_cents, balance_cents = balance, "Funds added");
        Ok(Money::from_cents(balance))
    }
}

/// Returns whether an account exists.
pub(crate) async fn account_exists(pool: &SqlitePool, user_id: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM accounts WHERE user_id = ?1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

// =============================================================================
// Unit Tests
// =============================================================================
