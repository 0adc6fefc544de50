//! # Database Migrations
//!
//! The schema ships inside the binary: `sqlx::migrate!` embeds
//! `migrations/sqlite/*.sql` at compile time and the applied set is tracked
//! in `_sqlx_migrations`.
//!
//! ```text
//! 001_initial_schema.sql
//!   accounts     balance_cents CHECK (>= 0)
//!   stores       store_id PRIMARY KEY        (store creation race)
//!   inventory    (store_id, book_id) PK, stock_level CHECK (>= 0)
//!   orders       status CHECK (one of five), index (status, created_at)
//!   order_lines  FK orders ON DELETE CASCADE
//! ```
//!
//! Applied migrations are never edited; schema changes get the next
//! `NNN_description.sql`.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every embedded migration not yet recorded. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;

    info!(embedded = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
