//! Argon2 credential hashing.
//!
//! Accounts store a PHC string (`$argon2id$v=19$...`), never the credential.
//!
//! Hashing and verification are CPU-bound for tens of milliseconds.
//! Repository code calls the `*_blocking_pool` variants, which run them on
//! tokio's blocking pool instead of a runtime worker.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::{DbError, DbResult};

/// Hash a credential with a fresh random salt.
pub fn hash_credential(credential: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(credential.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash credential: {}", e)))?;

    Ok(hash.to_string())
}

/// Check a credential against a stored PHC string.
///
/// A malformed stored hash never verifies.
pub fn verify_credential(credential: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(credential.as_bytes(), &parsed_hash)
        .is_ok()
}

/// [`hash_credential`] on the blocking pool.
pub async fn hash_credential_blocking_pool(credential: &str) -> DbResult<String> {
    let credential = credential.to_owned();
    tokio::task::spawn_blocking(move || hash_credential(&credential))
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {e}");
            DbError::Internal(format!("credential hashing task failed: {}", e))
        })?
}

/// [`verify_credential`] on the blocking pool.
pub async fn verify_credential_blocking_pool(credential: &str, hash: String) -> DbResult<bool> {
    let credential = credential.to_owned();
    tokio::task::spawn_blocking(move || verify_credential(&credential, &hash))
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {e}");
            DbError::Internal(format!("credential check task failed: {}", e))
        })
}
