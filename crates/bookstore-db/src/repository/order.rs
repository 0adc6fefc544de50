//! # Order Repository
//!
//! The order lifecycle engine: reservation, payment, shipment, receipt,
//! cancellation and the auto-cancel sweep.
//!
//! ## Transaction Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  new_order                                                              │
//! │    BEGIN                                                                │
//! │    INSERT orders (status = created)                                     │
//! │    for each line:                                                       │
//! │      UPDATE inventory SET stock -= n WHERE stock >= n RETURNING price   │
//! │      INSERT order_lines (quantity, unit_price snapshot)                 │
//! │    COMMIT                    any failure → dropped tx → ROLLBACK        │
//! │                                                                         │
//! │  payment                                                                │
//! │    BEGIN                                                                │
//! │    UPDATE orders SET status = paid WHERE status = created               │
//! │    UPDATE accounts SET balance -= total WHERE balance >= total (buyer)  │
//! │    UPDATE accounts SET balance += total                      (seller)   │
//! │    COMMIT                                                               │
//! │                                                                         │
//! │  cancel / auto-cancel                                                   │
//! │    BEGIN                                                                │
//! │    UPDATE orders SET status = cancelled WHERE status = created          │
//! │    UPDATE inventory SET stock += line.quantity   (per stored line)      │
//! │    DELETE orders              (lines cascade)                           │
//! │    COMMIT                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each transaction opens with a write, so SQLite takes the write lock
//! before anything is read and every later read in the transaction sees
//! the state it is about to change. Contention surfaces as `DbError::Busy`
//! and the whole transaction is rerun by [`with_busy_retry`].

use std::collections::HashMap;
use std::sync::Arc;

use bookstore_core::lifecycle::{ensure_buyer, ensure_owner, ensure_transition, order_total, stale_cutoff};
use bookstore_core::validation::{validate_identifier, validate_order_lines, validate_timeout_secs};
use bookstore_core::{
    Clock, CoreError, Order, OrderDetail, OrderIdGenerator, OrderLine, OrderLineRequest, OrderStatus,
    SweepReport, ValidationError,
};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::account::{account_exists, AccountRepository};
use crate::repository::store::fetch_ownership;
use crate::transaction::with_busy_retry;

const ORDER_COLUMNS: &str =
    "order_id, buyer_id, store_id, status, created_at, paid_at, shipped_at, received_at";

/// Repository for order operations.
#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    order_ids: Arc<dyn OrderIdGenerator>,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, order_ids: Arc<dyn OrderIdGenerator>) -> Self {
        OrderRepository {
            pool,
            clock,
            order_ids,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Loads one order with its lines and total.
    pub async fn get_order(&self, order_id: &str) -> DbResult<OrderDetail> {
        let order = fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT order_id, book_id, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY book_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        detail(order, lines)
    }

    /// Lists every order of a buyer, oldest first, each with lines and total.
    pub async fn orders_for_buyer(&self, buyer_id: &str) -> DbResult<Vec<OrderDetail>> {
        if !account_exists(&self.pool, buyer_id).await? {
            return Err(CoreError::AccountNotFound(buyer_id.to_string()).into());
        }

        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE buyer_id = ?1 ORDER BY created_at, order_id",
            ORDER_COLUMNS
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;

        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT l.order_id, l.book_id, l.quantity, l.unit_price_cents
            FROM order_lines l
            JOIN orders o ON o.order_id = l.order_id
            WHERE o.buyer_id = ?1
            ORDER BY l.order_id, l.book_id
            "#,
        )
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<String, Vec<OrderLine>> = HashMap::new();
        for line in lines {
            by_order.entry(line.order_id.clone()).or_default().push(line);
        }

        orders
            .into_iter()
            .map(|order| {
                let lines = by_order.remove(&order.order_id).unwrap_or_default();
                detail(order, lines)
            })
            .collect()
    }

    // =========================================================================
    // Order Creation
    // =========================================================================

    /// Places an order, reserving stock for every line.
    ///
    /// ## Returns
    /// The new order id.
    ///
    /// ## Errors
    /// - `InvalidInput` for an empty list, a non-positive quantity or a
    ///   repeated book
    /// - `AccountNotFound` / `StoreNotFound` / `BookNotFound`
    /// - `InsufficientStock` if any line can't be reserved; nothing is kept
    pub async fn new_order(&self, buyer_id: &str, store_id: &str, lines: &[OrderLineRequest]) -> DbResult<String> {
        validate_identifier("user_id", buyer_id)?;
        validate_identifier("store_id", store_id)?;
        validate_order_lines(lines)?;

        if !account_exists(&self.pool, buyer_id).await? {
            return Err(CoreError::AccountNotFound(buyer_id.to_string()).into());
        }
        if fetch_ownership(&self.pool, store_id).await?.is_none() {
            return Err(CoreError::StoreNotFound(store_id.to_string()).into());
        }

        let order_id = self.order_ids.next_id(buyer_id, store_id);
        let new_id = order_id.as_str();
        let now = self.clock.now();

        let total = with_busy_retry("new_order", move || {
            self.try_new_order(new_id, buyer_id, store_id, lines, now)
        })
        .await?;

        info!(
            order_id = %order_id,
            buyer_id = %buyer_id,
            store_id = %store_id,
            lines = lines.len(),
            total_cents = total,
            "Order created"
        );
        Ok(order_id)
    }

    async fn try_new_order(
        &self,
        order_id: &str,
        buyer_id: &str,
        store_id: &str,
        lines: &[OrderLineRequest],
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, buyer_id, store_id, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(order_id)
        .bind(buyer_id)
        .bind(store_id)
        .bind(OrderStatus::Created)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => CoreError::OrderAlreadyExists(order_id.to_string()).into(),
            other => other,
        })?;

        let mut snapshot = Vec::with_capacity(lines.len());
        for line in lines {
            let unit_price = reserve_stock(&mut tx, store_id, line, now).await?;

            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, book_id, quantity, unit_price_cents)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(order_id)
            .bind(&line.book_id)
            .bind(line.quantity)
            .bind(unit_price)
            .execute(&mut *tx)
            .await?;

            snapshot.push(OrderLine {
                order_id: order_id.to_string(),
                book_id: line.book_id.clone(),
                quantity: line.quantity,
                unit_price_cents: unit_price,
            });
        }

        // A total that can't be represented could never be paid.
        let total = order_total(&snapshot)?;

        tx.commit().await?;
        Ok(total.cents())
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Pays for an order: debits the buyer, credits the store owner.
    ///
    /// ## Errors
    /// - `OrderNotFound`
    /// - `AuthorizationFailure` if the caller is not the buyer or the
    ///   credential does not match
    /// - `InvalidStateTransition` unless the order is `created`
    /// - `FundsInsufficient` if the balance is below the total
    /// - `StoreNotFound` / `AccountNotFound` if the seller can't be resolved
    ///
    /// Nothing changes unless every step succeeds.
    pub async fn payment(&self, buyer_id: &str, credential: &str, order_id: &str) -> DbResult<()> {
        let order = fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        ensure_buyer(&order, buyer_id)?;

        AccountRepository::new(self.pool.clone(), self.clock.clone())
            .verify(buyer_id, credential)
            .await?;

        ensure_transition(order_id, order.status, OrderStatus::Paid)?;

        let now = self.clock.now();
        let (seller_id, total) = with_busy_retry("payment", move || self.try_payment(order_id, buyer_id, now)).await?;

        info!(
            order_id = %order_id,
            buyer_id = %buyer_id,
            seller_id = %seller_id,
            total_cents = total,
            "Order paid"
        );
        Ok(())
    }

    async fn try_payment(&self, order_id: &str, buyer_id: &str, now: DateTime<Utc>) -> DbResult<(String, i64)> {
        let mut tx = self.pool.begin().await?;

        let claimed: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE orders SET status = ?1, paid_at = ?2
            WHERE order_id = ?3 AND status = ?4
            RETURNING store_id
            "#,
        )
        .bind(OrderStatus::Paid)
        .bind(now)
        .bind(order_id)
        .bind(OrderStatus::Created)
        .fetch_optional(&mut *tx)
        .await?;

        let store_id = match claimed {
            Some(store_id) => store_id,
            None => return Err(refused_transition(&mut tx, order_id, OrderStatus::Paid).await),
        };

        let lines = sqlx::query_as::<_, OrderLine>(
            "SELECT order_id, book_id, quantity, unit_price_cents FROM order_lines WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;
        let total = order_total(&lines)?.cents();

        let debited = sqlx::query(
            r#"
            UPDATE accounts SET balance_cents = balance_cents - ?1
            WHERE user_id = ?2 AND balance_cents >= ?1
            "#,
        )
        .bind(total)
        .bind(buyer_id)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            let balance: Option<i64> =
                sqlx::query_scalar("SELECT balance_cents FROM accounts WHERE user_id = ?1")
                    .bind(buyer_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match balance {
                None => CoreError::AccountNotFound(buyer_id.to_string()).into(),
                Some(balance) => CoreError::InsufficientFunds {
                    order_id: order_id.to_string(),
                    balance,
                    required: total,
                }
                .into(),
            });
        }

        let seller_id: String = sqlx::query_scalar("SELECT owner_id FROM stores WHERE store_id = ?1")
            .bind(&store_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::StoreNotFound(store_id.clone()))?;

        let credited = sqlx::query(
            r#"
            UPDATE accounts SET balance_cents = balance_cents + ?1
            WHERE user_id = ?2 AND balance_cents <= ?3
            "#,
        )
        .bind(total)
        .bind(&seller_id)
        .bind(i64::MAX - total)
        .execute(&mut *tx)
        .await?;

        if credited.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM accounts WHERE user_id = ?1")
                .bind(&seller_id)
                .fetch_optional(&mut *tx)
                .await?;

            return Err(match exists {
                None => CoreError::AccountNotFound(seller_id).into(),
                Some(_) => ValidationError::Overflow {
                    field: "seller balance".to_string(),
                }
                .into(),
            });
        }

        tx.commit().await?;
        Ok((seller_id, total))
    }

    // =========================================================================
    // Shipment and Receipt
    // =========================================================================

    /// Marks a paid order as shipped. Only the store owner may ship.
    pub async fn ship_order(&self, seller_id: &str, order_id: &str) -> DbResult<()> {
        let order = fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let ownership = fetch_ownership(&self.pool, &order.store_id)
            .await?
            .ok_or_else(|| CoreError::StoreNotFound(order.store_id.clone()))?;
        ensure_owner(&ownership, seller_id)?;

        self.advance(order_id, order.status, OrderStatus::Shipped).await?;

        info!(order_id = %order_id, seller_id = %seller_id, "Order shipped");
        Ok(())
    }

    /// Marks a shipped order as received. Only the buyer may confirm.
    pub async fn receive_order(&self, buyer_id: &str, order_id: &str) -> DbResult<()> {
        let order = fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        ensure_buyer(&order, buyer_id)?;

        self.advance(order_id, order.status, OrderStatus::Received).await?;

        info!(order_id = %order_id, buyer_id = %buyer_id, "Order received");
        Ok(())
    }

    /// Moves `paid → shipped` or `shipped → received`, stamping the time.
    async fn advance(&self, order_id: &str, observed: OrderStatus, next: OrderStatus) -> DbResult<()> {
        ensure_transition(order_id, observed, next)?;

        let (from, stamp_column) = match next {
            OrderStatus::Shipped => (OrderStatus::Paid, "shipped_at"),
            OrderStatus::Received => (OrderStatus::Shipped, "received_at"),
            other => {
                return Err(CoreError::InvalidTransition {
                    order_id: order_id.to_string(),
                    current: observed,
                    requested: other,
                }
                .into())
            }
        };

        let sql = format!(
            "UPDATE orders SET status = ?1, {} = ?2 WHERE order_id = ?3 AND status = ?4",
            stamp_column
        );
        let sql = sql.as_str();
        let now = self.clock.now();

        with_busy_retry("advance_order", move || async move {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(sql)
                .bind(next)
                .bind(now)
                .bind(order_id)
                .bind(from)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(refused_transition(&mut tx, order_id, next).await);
            }

            tx.commit().await?;
            Ok::<_, DbError>(())
        })
        .await
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels an unpaid order and returns its stock.
    ///
    /// ## Errors
    /// - `OrderNotFound`
    /// - `AuthorizationFailure` if the caller is not the buyer
    /// - `InvalidStateTransition` unless the order is `created`
    pub async fn cancel_order(&self, buyer_id: &str, order_id: &str) -> DbResult<()> {
        let order = fetch_order(&self.pool, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        ensure_buyer(&order, buyer_id)?;
        ensure_transition(order_id, order.status, OrderStatus::Cancelled)?;

        let now = self.clock.now();
        let restored = with_busy_retry("cancel_order", move || self.try_cancel(order_id, now)).await?;

        info!(order_id = %order_id, buyer_id = %buyer_id, restored_units = restored, "Order cancelled");
        Ok(())
    }

    /// Restore-and-delete routine shared by cancellation and the sweep.
    ///
    /// ## Returns
    /// Units returned to stock.
    async fn try_cancel(&self, order_id: &str, now: DateTime<Utc>) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;

        let claimed: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE orders SET status = ?1
            WHERE order_id = ?2 AND status = ?3
            RETURNING store_id
            "#,
        )
        .bind(OrderStatus::Cancelled)
        .bind(order_id)
        .bind(OrderStatus::Created)
        .fetch_optional(&mut *tx)
        .await?;

        let store_id = match claimed {
            Some(store_id) => store_id,
            None => return Err(refused_transition(&mut tx, order_id, OrderStatus::Cancelled).await),
        };

        let reserved: Vec<(String, i64)> =
            sqlx::query_as("SELECT book_id, quantity FROM order_lines WHERE order_id = ?1")
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await?;

        let mut restored = 0;
        for (book_id, quantity) in &reserved {
            let result = sqlx::query(
                r#"
                UPDATE inventory SET stock_level = stock_level + ?1, updated_at = ?2
                WHERE store_id = ?3 AND book_id = ?4
                "#,
            )
            .bind(quantity)
            .bind(now)
            .bind(&store_id)
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

            // Units with nowhere to go would vanish; keep the order instead.
            if result.rows_affected() == 0 {
                warn!(order_id = %order_id, store_id = %store_id, book_id = %book_id, "Reserved book no longer listed");
                return Err(CoreError::book_not_found(&store_id, book_id).into());
            }
            restored += quantity;
        }

        sqlx::query("DELETE FROM orders WHERE order_id = ?1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(restored)
    }

    // =========================================================================
    // Auto-Cancel Sweep
    // =========================================================================

    /// Cancels every `created` order whose creation time is at or before
    /// `now - threshold_secs`.
    ///
    /// ## Sweep Flow
    /// ```text
    /// cutoff = clock.now() - threshold
    ///      │
    ///      ▼
    /// SELECT created orders WHERE created_at <= cutoff
    ///      │
    ///      ▼
    /// for each: own transaction (restore stock, delete)
    ///      ├── ok ───────────────► cancelled += 1
    ///      ├── paid/cancelled
    ///      │   meanwhile ────────► skipped (logged)
    ///      └── store failure ────► failed += 1, sweep continues
    /// ```
    pub async fn auto_cancel_unpaid(&self, threshold_secs: i64) -> DbResult<SweepReport> {
        validate_timeout_secs(threshold_secs)?;

        let now = self.clock.now();
        let cutoff = stale_cutoff(now, threshold_secs)?;

        let stale: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT order_id FROM orders
            WHERE status = ?1 AND julianday(created_at) <= julianday(?2)
            ORDER BY created_at, order_id
            "#,
        )
        .bind(OrderStatus::Created)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut report = SweepReport {
            examined: u32::try_from(stale.len()).unwrap_or(u32::MAX),
            ..SweepReport::default()
        };

        for order_id in &stale {
            let id = order_id.as_str();
            match with_busy_retry("auto_cancel", move || self.try_cancel(id, now)).await {
                Ok(restored) => {
                    report.cancelled += 1;
                    debug!(order_id = %order_id, restored_units = restored, "Stale order cancelled");
                }
                Err(DbError::Domain(CoreError::OrderNotFound(_)))
                | Err(DbError::Domain(CoreError::InvalidTransition { .. })) => {
                    debug!(order_id = %order_id, "Order resolved before the sweep reached it");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(order_id = %order_id, error = %err, "Failed to cancel stale order");
                }
            }
        }

        info!(
            threshold_secs,
            cutoff = %cutoff,
            examined = report.examined,
            cancelled = report.cancelled,
            failed = report.failed,
            "Auto-cancel sweep finished"
        );
        Ok(report)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_order(pool: &SqlitePool, order_id: &str) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE order_id = ?1",
        ORDER_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(order)
}

fn detail(order: Order, lines: Vec<OrderLine>) -> DbResult<OrderDetail> {
    let total_cents = order_total(&lines)?.cents();
    Ok(OrderDetail {
        order,
        lines,
        total_cents,
    })
}

/// Takes `quantity` units of one book, refusing to go below zero.
///
/// ## Returns
/// The book's current price, captured as the line's snapshot.
async fn reserve_stock(
    conn: &mut SqliteConnection,
    store_id: &str,
    line: &OrderLineRequest,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    let price: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE inventory
        SET stock_level = stock_level - ?1, updated_at = ?2
        WHERE store_id = ?3 AND book_id = ?4 AND stock_level >= ?1
        RETURNING price_cents
        "#,
    )
    .bind(line.quantity)
    .bind(now)
    .bind(store_id)
    .bind(&line.book_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(price) = price {
        return Ok(price);
    }

    let available: Option<i64> =
        sqlx::query_scalar("SELECT stock_level FROM inventory WHERE store_id = ?1 AND book_id = ?2")
            .bind(store_id)
            .bind(&line.book_id)
            .fetch_optional(&mut *conn)
            .await?;

    Err(match available {
        None => CoreError::book_not_found(store_id, &line.book_id).into(),
        Some(available) => CoreError::InsufficientStock {
            book_id: line.book_id.clone(),
            available,
            requested: line.quantity,
        }
        .into(),
    })
}

/// Explains why a status-guarded write matched no row.
async fn refused_transition(conn: &mut SqliteConnection, order_id: &str, requested: OrderStatus) -> DbError {
    let current: Result<Option<OrderStatus>, sqlx::Error> =
        sqlx::query_scalar("SELECT status FROM orders WHERE order_id = ?1")
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await;

    match current {
        Ok(None) => CoreError::OrderNotFound(order_id.to_string()).into(),
        Ok(Some(current)) => CoreError::InvalidTransition {
            order_id: order_id.to_string(),
            current,
            requested,
        }
        .into(),
        Err(err) => err.into(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use bookstore_core::{BookInfo, Classify, Entity, ErrorKind, ManualClock, SequentialOrderIds};
    use chrono::{Duration, TimeZone};

    struct Fixture {
        db: Database,
        clock: Arc<ManualClock>,
    }

    /// alice (buyer, 1000), bob owns s1 with b1 (price 100, stock 5)
    /// and b2 (price 250, stock 2).
    async fn setup() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()));
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(clock.clone())
            .with_order_ids(Arc::new(SequentialOrderIds::new()));

        db.accounts().register("alice", "a-pw").await.unwrap();
        db.accounts().register("bob", "b-pw").await.unwrap();
        db.accounts().add_funds("alice", "a-pw", 1000).await.unwrap();
        db.stores().create_store("bob", "s1").await.unwrap();
        db.inventory()
            .add_book("bob", "s1", "b1", &BookInfo::titled("Dune"), 100, 5)
            .await
            .unwrap();
        db.inventory()
            .add_book("bob", "s1", "b2", &BookInfo::titled("Emma"), 250, 2)
            .await
            .unwrap();

        Fixture { db, clock }
    }

    fn line(book: &str, qty: i64) -> OrderLineRequest {
        OrderLineRequest::new(book, qty)
    }

    async fn stock(db: &Database, book: &str) -> i64 {
        db.inventory().stock_level("s1", book).await.unwrap()
    }

    async fn balance(db: &Database, user: &str) -> i64 {
        db.accounts().balance(user).await.unwrap().cents()
    }

    #[tokio::test]
    async fn test_new_order_reserves_and_snapshots() {
        let f = setup().await;
        let order_id = f
            .db
            .orders()
            .new_order("alice", "s1", &[line("b1", 2), line("b2", 1)])
            .await
            .unwrap();
        assert_eq!(order_id, "order-1");

        assert_eq!(stock(&f.db, "b1").await, 3);
        assert_eq!(stock(&f.db, "b2").await, 1);

        let detail = f.db.orders().get_order(&order_id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Created);
        assert_eq!(detail.order.created_at, f.clock.now());
        assert_eq!(detail.lines.len(), 2);
        assert_eq!(detail.total_cents, 450);
    }

    #[tokio::test]
    async fn test_new_order_is_all_or_nothing() {
        let f = setup().await;
        let err = f
            .db
            .orders()
            .new_order("alice", "s1", &[line("b1", 2), line("b2", 3)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StockInsufficient);

        // b1 reservation rolled back with the failing b2 line
        assert_eq!(stock(&f.db, "b1").await, 5);
        assert_eq!(stock(&f.db, "b2").await, 2);
        assert!(f.db.orders().orders_for_buyer("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_order_errors() {
        let f = setup().await;
        let orders = f.db.orders();

        let err = orders.new_order("ghost", "s1", &[line("b1", 1)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Account));

        let err = orders.new_order("alice", "s9", &[line("b1", 1)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Store));

        let err = orders.new_order("alice", "s1", &[line("nope", 1)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Book));

        let err = orders.new_order("alice", "s1", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = orders.new_order("alice", "s1", &[line("b1", 0)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = orders
            .new_order("alice", "s1", &[line("b1", 1), line("b1", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(stock(&f.db, "b1").await, 5);
    }

    #[tokio::test]
    async fn test_create_then_cancel_restores_stock() {
        let f = setup().await;
        let orders = f.db.orders();
        let order_id = orders
            .new_order("alice", "s1", &[line("b1", 3), line("b2", 2)])
            .await
            .unwrap();
        assert_eq!(stock(&f.db, "b2").await, 0);

        orders.cancel_order("alice", &order_id).await.unwrap();

        assert_eq!(stock(&f.db, "b1").await, 5);
        assert_eq!(stock(&f.db, "b2").await, 2);
        let err = orders.get_order(&order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Order));
    }

    #[tokio::test]
    async fn test_cancel_requires_buyer() {
        let f = setup().await;
        let order_id = f.db.orders().new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();

        let err = f.db.orders().cancel_order("bob", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);
        assert_eq!(stock(&f.db, "b1").await, 4);
    }

    #[tokio::test]
    async fn test_payment_moves_funds() {
        let f = setup().await;
        let orders = f.db.orders();
        let order_id = orders.new_order("alice", "s1", &[line("b1", 2)]).await.unwrap();

        f.clock.advance(Duration::minutes(5));
        orders.payment("alice", "a-pw", &order_id).await.unwrap();

        assert_eq!(balance(&f.db, "alice").await, 800);
        assert_eq!(balance(&f.db, "bob").await, 200);

        let detail = orders.get_order(&order_id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Paid);
        assert_eq!(detail.order.paid_at, Some(f.clock.now()));
    }

    #[tokio::test]
    async fn test_payment_insufficient_funds_changes_nothing() {
        let f = setup().await;
        let orders = f.db.orders();
        f.db.inventory().add_stock("bob", "s1", "b2", 10).await.unwrap();
        let order_id = orders.new_order("alice", "s1", &[line("b2", 5)]).await.unwrap();

        let err = orders.payment("alice", "a-pw", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FundsInsufficient);

        assert_eq!(balance(&f.db, "alice").await, 1000);
        assert_eq!(balance(&f.db, "bob").await, 0);
        let detail = orders.get_order(&order_id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Created);
        assert!(detail.order.paid_at.is_none());
    }

    #[tokio::test]
    async fn test_payment_authorization() {
        let f = setup().await;
        let orders = f.db.orders();
        let order_id = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();

        let err = orders.payment("alice", "wrong", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);

        let err = orders.payment("bob", "b-pw", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);

        let err = orders.payment("alice", "a-pw", "missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Order));

        assert_eq!(balance(&f.db, "alice").await, 1000);
    }

    #[tokio::test]
    async fn test_payment_twice_is_invalid_transition() {
        let f = setup().await;
        let orders = f.db.orders();
        let order_id = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();
        orders.payment("alice", "a-pw", &order_id).await.unwrap();

        let err = orders.payment("alice", "a-pw", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
        assert_eq!(balance(&f.db, "alice").await, 900);
    }

    #[tokio::test]
    async fn test_payment_to_unregistered_seller() {
        let f = setup().await;
        let orders = f.db.orders();
        let order_id = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();
        f.db.accounts().unregister("bob", "b-pw").await.unwrap();

        let err = orders.payment("alice", "a-pw", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Account));
        assert_eq!(balance(&f.db, "alice").await, 1000);
        assert_eq!(
            orders.get_order(&order_id).await.unwrap().order.status,
            OrderStatus::Created
        );
    }

    #[tokio::test]
    async fn test_illegal_transitions_leave_state_unchanged() {
        let f = setup().await;
        let orders = f.db.orders();
        let order_id = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();

        // ship while created
        let err = orders.ship_order("bob", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

        orders.payment("alice", "a-pw", &order_id).await.unwrap();

        // receive while paid
        let err = orders.receive_order("alice", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

        // cancel while paid
        let err = orders.cancel_order("alice", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

        let detail = orders.get_order(&order_id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Paid);
        assert!(detail.order.shipped_at.is_none());
        assert_eq!(stock(&f.db, "b1").await, 4);
    }

    #[tokio::test]
    async fn test_ship_and_receive() {
        let f = setup().await;
        let orders = f.db.orders();
        f.db.accounts().register("mallory", "m-pw").await.unwrap();
        let order_id = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();
        orders.payment("alice", "a-pw", &order_id).await.unwrap();

        let err = orders.ship_order("mallory", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);

        orders.ship_order("bob", &order_id).await.unwrap();

        let err = orders.receive_order("mallory", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);

        orders.receive_order("alice", &order_id).await.unwrap();

        let detail = orders.get_order(&order_id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Received);
        assert!(detail.order.shipped_at.is_some());
        assert!(detail.order.received_at.is_some());

        let err = orders.receive_order("alice", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }

    #[tokio::test]
    async fn test_price_change_keeps_snapshot() {
        let f = setup().await;
        let orders = f.db.orders();
        let order_id = orders.new_order("alice", "s1", &[line("b1", 2)]).await.unwrap();

        f.db.inventory().set_price("bob", "s1", "b1", 999).await.unwrap();

        assert_eq!(orders.get_order(&order_id).await.unwrap().total_cents, 200);
        orders.payment("alice", "a-pw", &order_id).await.unwrap();
        assert_eq!(balance(&f.db, "alice").await, 800);
    }

    #[tokio::test]
    async fn test_orders_for_buyer() {
        let f = setup().await;
        let orders = f.db.orders();
        let first = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();
        f.clock.advance(Duration::seconds(1));
        let second = orders
            .new_order("alice", "s1", &[line("b1", 1), line("b2", 1)])
            .await
            .unwrap();

        let listed = orders.orders_for_buyer("alice").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].order.order_id, first);
        assert_eq!(listed[0].total_cents, 100);
        assert_eq!(listed[1].order.order_id, second);
        assert_eq!(listed[1].lines.len(), 2);
        assert_eq!(listed[1].total_cents, 350);

        assert!(orders.orders_for_buyer("bob").await.unwrap().is_empty());
        let err = orders.orders_for_buyer("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Account));
    }

    #[tokio::test]
    async fn test_sweep_cancels_only_stale_unpaid_orders() {
        let f = setup().await;
        let orders = f.db.orders();

        let stale = orders.new_order("alice", "s1", &[line("b1", 3)]).await.unwrap();
        let paid = orders.new_order("alice", "s1", &[line("b2", 1)]).await.unwrap();
        orders.payment("alice", "a-pw", &paid).await.unwrap();

        f.clock.advance(Duration::minutes(30));
        let fresh = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();
        assert_eq!(stock(&f.db, "b1").await, 1);

        f.clock.advance(Duration::minutes(31));
        let report = orders.auto_cancel_unpaid(3600).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                examined: 1,
                cancelled: 1,
                failed: 0
            }
        );

        assert!(orders.get_order(&stale).await.is_err());
        assert_eq!(orders.get_order(&paid).await.unwrap().order.status, OrderStatus::Paid);
        assert_eq!(orders.get_order(&fresh).await.unwrap().order.status, OrderStatus::Created);
        assert_eq!(stock(&f.db, "b1").await, 4);

        // immediately again: nothing left to do
        let again = orders.auto_cancel_unpaid(3600).await.unwrap();
        assert_eq!(again.cancelled, 0);
    }

    #[tokio::test]
    async fn test_sweep_cutoff_is_inclusive() {
        let f = setup().await;
        let orders = f.db.orders();
        let order_id = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();

        f.clock.advance(Duration::seconds(59));
        assert_eq!(orders.auto_cancel_unpaid(60).await.unwrap().cancelled, 0);

        f.clock.advance(Duration::seconds(1));
        assert_eq!(orders.auto_cancel_unpaid(60).await.unwrap().cancelled, 1);
        assert!(orders.get_order(&order_id).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_keeps_order_when_a_book_is_gone() {
        let f = setup().await;
        let orders = f.db.orders();
        let order_id = orders
            .new_order("alice", "s1", &[line("b1", 2), line("b2", 1)])
            .await
            .unwrap();

        sqlx::query("DELETE FROM inventory WHERE store_id = 's1' AND book_id = 'b2'")
            .execute(f.db.pool())
            .await
            .unwrap();

        let err = orders.cancel_order("alice", &order_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Book));

        // rolled back: b1 stays reserved, order stays open
        assert_eq!(stock(&f.db, "b1").await, 3);
        let detail = orders.get_order(&order_id).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Created);
        assert_eq!(detail.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_counts_failure_and_continues() {
        let f = setup().await;
        let orders = f.db.orders();
        let first = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();
        let stuck = orders.new_order("alice", "s1", &[line("b1", 1)]).await.unwrap();
        let last = orders.new_order("alice", "s1", &[line("b2", 1)]).await.unwrap();
        assert_eq!(stuck, "order-2");

        sqlx::query(
            r#"
            CREATE TRIGGER refuse_order_2 BEFORE DELETE ON orders
            WHEN OLD.order_id = 'order-2'
            BEGIN
                SELECT RAISE(ABORT, 'order-2 is pinned');
            END
            "#,
        )
        .execute(f.db.pool())
        .await
        .unwrap();

        f.clock.advance(Duration::hours(2));
        let report = orders.auto_cancel_unpaid(3600).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                examined: 3,
                cancelled: 2,
                failed: 1
            }
        );

        assert!(orders.get_order(&first).await.is_err());
        assert!(orders.get_order(&last).await.is_err());
        assert_eq!(orders.get_order(&stuck).await.unwrap().order.status, OrderStatus::Created);
        assert_eq!(stock(&f.db, "b1").await, 4);
        assert_eq!(stock(&f.db, "b2").await, 2);

        // the failed order is picked up by the next sweep
        sqlx::query("DROP TRIGGER refuse_order_2")
            .execute(f.db.pool())
            .await
            .unwrap();
        let retry = orders.auto_cancel_unpaid(3600).await.unwrap();
        assert_eq!(retry.cancelled, 1);
        assert_eq!(retry.failed, 0);
        assert_eq!(stock(&f.db, "b1").await, 5);
    }

    #[tokio::test]
    async fn test_sweep_rejects_negative_threshold() {
        let f = setup().await;
        let err = f.db.orders().auto_cancel_unpaid(-1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
