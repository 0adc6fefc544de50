//! End-to-end order scenarios against a file-backed database.

use std::sync::Arc;

use bookstore_core::{
    BookInfo, Classify, Entity, ErrorKind, IntoReply, ManualClock, OrderLineRequest, OrderStatus,
    SequentialOrderIds, MAX_STOCK_LEVEL,
};
use bookstore_db::{Database, DbConfig};
use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

struct Shop {
    _dir: TempDir,
    db: Database,
    clock: Arc<ManualClock>,
}

/// buyer "alice" (credential "a-pw", 1000), seller "bob" (credential
/// "b-pw") owning "s1" with "b1" at 100 and 5 in stock.
async fn open_shop() -> Shop {
    let dir = TempDir::new().expect("temp dir");
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap(),
    ));

    let db = Database::new(DbConfig::new(dir.path().join("ledger.db")).max_connections(4))
        .await
        .expect("open database")
        .with_clock(clock.clone())
        .with_order_ids(Arc::new(SequentialOrderIds::new()));

    db.accounts().register("alice", "a-pw").await.unwrap();
    db.accounts().register("bob", "b-pw").await.unwrap();
    db.accounts().add_funds("alice", "a-pw", 1000).await.unwrap();
    db.stores().create_store("bob", "s1").await.unwrap();
    db.inventory()
        .add_book("bob", "s1", "b1", &BookInfo::titled("Solaris"), 100, 5)
        .await
        .unwrap();

    Shop {
        _dir: dir,
        db,
        clock,
    }
}

async fn balance(db: &Database, user: &str) -> i64 {
    db.accounts().balance(user).await.unwrap().cents()
}

async fn stock(db: &Database) -> i64 {
    db.inventory().stock_level("s1", "b1").await.unwrap()
}

#[tokio::test]
async fn order_pay_ship_receive() {
    let shop = open_shop().await;
    let db = &shop.db;

    let order_id = db
        .orders()
        .new_order("alice", "s1", &[OrderLineRequest::new("b1", 2)])
        .await
        .unwrap();
    assert_eq!(stock(db).await, 3);
    assert_eq!(db.orders().get_order(&order_id).await.unwrap().total_cents, 200);

    db.orders().payment("alice", "a-pw", &order_id).await.unwrap();
    assert_eq!(balance(db, "alice").await, 800);
    assert_eq!(balance(db, "bob").await, 200);

    let err = db.orders().ship_order("alice", &order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);

    db.orders().ship_order("bob", &order_id).await.unwrap();
    db.orders().receive_order("alice", &order_id).await.unwrap();

    let detail = db.orders().get_order(&order_id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Received);
    assert_eq!(stock(db).await, 3);
}

#[tokio::test]
async fn paid_order_cannot_be_cancelled_or_swept() {
    let shop = open_shop().await;
    let db = &shop.db;

    let order_id = db
        .orders()
        .new_order("alice", "s1", &[OrderLineRequest::new("b1", 1)])
        .await
        .unwrap();
    db.orders().payment("alice", "a-pw", &order_id).await.unwrap();

    let err = db.orders().cancel_order("alice", &order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    shop.clock.advance(Duration::days(2));
    let report = db.orders().auto_cancel_unpaid(3600).await.unwrap();
    assert_eq!(report.examined, 0);

    assert_eq!(db.orders().get_order(&order_id).await.unwrap().order.status, OrderStatus::Paid);
    assert_eq!(stock(db).await, 4);
}

#[tokio::test]
async fn failed_payment_changes_nothing() {
    let shop = open_shop().await;
    let db = &shop.db;

    db.inventory().set_price("bob", "s1", "b1", 400).await.unwrap();
    let order_id = db
        .orders()
        .new_order("alice", "s1", &[OrderLineRequest::new("b1", 3)])
        .await
        .unwrap();

    let err = db.orders().payment("alice", "a-pw", &order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FundsInsufficient);

    assert_eq!(balance(db, "alice").await, 1000);
    assert_eq!(balance(db, "bob").await, 0);
    assert_eq!(stock(db).await, 2);
    assert_eq!(
        db.orders().get_order(&order_id).await.unwrap().order.status,
        OrderStatus::Created
    );

    // topping up makes the same order payable
    db.accounts().add_funds("alice", "a-pw", 200).await.unwrap();
    db.orders().payment("alice", "a-pw", &order_id).await.unwrap();
    assert_eq!(balance(db, "alice").await, 0);
    assert_eq!(balance(db, "bob").await, 1200);
}

#[tokio::test]
async fn sweep_cancels_once_after_timeout() {
    let shop = open_shop().await;
    let db = &shop.db;

    let order_id = db
        .orders()
        .new_order("alice", "s1", &[OrderLineRequest::new("b1", 4)])
        .await
        .unwrap();
    assert_eq!(stock(db).await, 1);

    shop.clock.advance(Duration::seconds(3599));
    assert_eq!(db.orders().auto_cancel_unpaid(3600).await.unwrap().cancelled, 0);

    shop.clock.advance(Duration::seconds(2));
    let report = db.orders().auto_cancel_unpaid(3600).await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(stock(db).await, 5);

    let err = db.orders().get_order(&order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Order));

    let err = db.orders().payment("alice", "a-pw", &order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound(Entity::Order));

    let again = db.orders().auto_cancel_unpaid(3600).await.unwrap();
    assert_eq!(again.examined, 0);
    assert_eq!(again.cancelled, 0);
}

#[tokio::test]
async fn stock_adjustments_respect_reservations() {
    let shop = open_shop().await;
    let db = &shop.db;

    db.orders()
        .new_order("alice", "s1", &[OrderLineRequest::new("b1", 4)])
        .await
        .unwrap();

    let err = db.inventory().add_stock("bob", "s1", "b1", -2).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StockInsufficient);
    assert_eq!(db.inventory().add_stock("bob", "s1", "b1", -1).await.unwrap(), 0);

    let err = db
        .orders()
        .new_order("alice", "s1", &[OrderLineRequest::new("b1", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StockInsufficient);
}

#[tokio::test]
async fn stock_above_cap_after_cancel_can_still_be_removed() {
    let shop = open_shop().await;
    let db = &shop.db;

    db.inventory()
        .add_book("bob", "s1", "bulk", &BookInfo::titled("Catalogue"), 1, MAX_STOCK_LEVEL)
        .await
        .unwrap();
    let order_id = db
        .orders()
        .new_order("alice", "s1", &[OrderLineRequest::new("bulk", 10)])
        .await
        .unwrap();
    db.inventory().add_stock("bob", "s1", "bulk", 10).await.unwrap();

    // returning the reservation lands above the cap
    db.orders().cancel_order("alice", &order_id).await.unwrap();
    let level = db.inventory().stock_level("s1", "bulk").await.unwrap();
    assert_eq!(level, MAX_STOCK_LEVEL + 10);

    assert_eq!(
        db.inventory().add_stock("bob", "s1", "bulk", -5).await.unwrap(),
        MAX_STOCK_LEVEL + 5
    );

    let err = db.inventory().add_stock("bob", "s1", "bulk", 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    // beyond the largest single adjustment
    let err = db
        .inventory()
        .add_stock("bob", "s1", "bulk", -(MAX_STOCK_LEVEL + 6))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(
        db.inventory().add_stock("bob", "s1", "bulk", -MAX_STOCK_LEVEL).await.unwrap(),
        5
    );
    let err = db.inventory().add_stock("bob", "s1", "bulk", -6).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StockInsufficient);
}

#[tokio::test]
async fn replies_carry_result_codes() {
    let shop = open_shop().await;
    let db = &shop.db;

    let reply = db.accounts().register("alice", "again").await.into_reply();
    assert_eq!(reply.code, 512);

    let reply = db
        .orders()
        .new_order("alice", "s1", &[OrderLineRequest::new("b1", 9)])
        .await
        .into_reply();
    assert_eq!(reply.code, 517);
    assert!(reply.payload.is_none());

    let reply = db
        .orders()
        .new_order("alice", "s1", &[OrderLineRequest::new("b1", 1)])
        .await
        .into_reply();
    assert!(reply.is_ok());
    let order_id = reply.payload.unwrap();

    let reply = db.orders().payment("alice", "nope", &order_id).await.into_reply();
    assert_eq!(reply.code, 401);

    let reply = db.orders().receive_order("alice", &order_id).await.into_reply();
    assert_eq!(reply.code, 521);

    let reply = db.orders().get_order("missing").await.into_reply();
    assert_eq!(reply.code, 518);

    let reply = db.orders().payment("alice", "a-pw", &order_id).await.into_reply();
    assert_eq!(reply.code, 200);
}
