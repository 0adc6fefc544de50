//! # Auto-Cancel Sweep
//!
//! Runs one pass of the unpaid-order sweep and exits. Scheduling is left to
//! cron, a systemd timer or whatever drives the deployment.
//!
//! ## Usage
//! ```bash
//! BOOKSTORE_DB_PATH=./bookstore.db \
//! BOOKSTORE_UNPAID_TIMEOUT_SECS=3600 \
//!     cargo run -p bookstore-db --bin sweep
//! ```
//!
//! Exits non-zero when any stale order could not be cancelled.

use anyhow::{bail, Context, Result};
use bookstore_db::{init_tracing, Database, SweepConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = SweepConfig::from_env()?;
    info!(
        database = %config.database_path.display(),
        unpaid_timeout_secs = config.unpaid_timeout_secs,
        "Starting auto-cancel sweep"
    );

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;

    let report = db
        .orders()
        .auto_cancel_unpaid(config.unpaid_timeout_secs)
        .await
        .context("running sweep")?;

    db.close().await;

    if report.failed > 0 {
        bail!(
            "{} of {} stale orders could not be cancelled",
            report.failed,
            report.examined
        );
    }

    info!(
        examined = report.examined,
        cancelled = report.cancelled,
        "Sweep complete"
    );
    Ok(())
}
