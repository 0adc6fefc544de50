//! # Repository Module
//!
//! One repository per aggregate of the ledger.
//!
//! ```text
//! Database
//!   ├── accounts()   AccountRepository    register, login, funds
//!   ├── stores()     StoreRepository      store creation, ownership
//!   ├── inventory()  InventoryRepository  listings, stock, prices
//!   └── orders()     OrderRepository      order lifecycle, sweep
//! ```
//!
//! Repositories are cheap to construct (a pool handle and two `Arc`s) and
//! hold no state of their own; every invariant lives in SQLite.
//!
//! - [`AccountRepository`](account::AccountRepository)
//! - [`StoreRepository`](store::StoreRepository)
//! - [`InventoryRepository`](inventory::InventoryRepository)
//! - [`OrderRepository`](order::OrderRepository)

pub mod account;
pub mod inventory;
pub mod order;
pub mod store;
