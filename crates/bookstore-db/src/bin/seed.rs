//! # Seed Data Generator
//!
//! Populates the database with demo sellers, stores and books for
//! development.
//!
//! ## Usage
//! ```bash
//! # Default: 3 stores with 40 books each
//! cargo run -p bookstore-db --bin seed
//!
//! # Custom sizes
//! cargo run -p bookstore-db --bin seed -- --stores 10 --books 200
//!
//! # Database path comes from the environment
//! BOOKSTORE_DB_PATH=./data/bookstore.db cargo run -p bookstore-db --bin seed
//! ```
//!
//! ## Generated Data
//! - `seller-{n}` accounts (credential `seller-{n}`), each owning `store-{n}`
//! - `{store}-book-{i}` listings with a title, author and tags
//! - One `buyer-demo` account (credential `buyer-demo`) with 1,000.00 funds
//!
//! Price: 5.99 - 44.99, stock: 0 - 49, derived from the index so reruns on
//! a fresh database produce the same catalog.

use std::env;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use bookstore_core::BookInfo;
use bookstore_db::{init_tracing, Database, SweepConfig};

const AUTHORS: &[&str] = &[
    "Ursula K. Le Guin",
    "Italo Calvino",
    "Jorge Luis Borges",
    "Toni Morrison",
    "Stanisław Lem",
    "Chinua Achebe",
    "Haruki Murakami",
    "Clarice Lispector",
];

const GENRES: &[&str] = &["fiction", "science-fiction", "poetry", "history", "essays", "mystery"];

const TITLE_WORDS: &[&str] = &[
    "Silent", "River", "Glass", "Winter", "Cities", "Garden", "Lantern", "Harbor", "Paper", "Orchard",
];

const BUYER: &str = "buyer-demo";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut stores: usize = 3;
    let mut books: usize = 40;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stores" | "-s" => {
                stores = args
                    .get(i + 1)
                    .context("--stores needs a value")?
                    .parse::<usize>()
                    .context("--stores must be a number")?;
                i += 1;
            }
            "--books" | "-b" => {
                books = args
                    .get(i + 1)
                    .context("--books needs a value")?
                    .parse::<usize>()
                    .context("--books must be a number")?;
                i += 1;
            }
            "--help" | "-h" => {
                println!("Bookstore Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --stores <N>   Number of demo stores (default: 3)");
                println!("  -b, --books <N>    Books per store (default: 40)");
                println!("  -h, --help         Show this help message");
                println!();
                println!("Environment: BOOKSTORE_DB_PATH, BOOKSTORE_DB_MAX_CONNECTIONS");
                return Ok(());
            }
            other => bail!("unknown argument: {}", other),
        }
        i += 1;
    }

    let config = SweepConfig::from_env()?;

    println!("🌱 Bookstore Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database_path.display());
    println!("Stores:   {}", stores);
    println!("Books:    {} per store", books);
    println!();

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if db.accounts().exists(BUYER).await? {
        println!("⚠ Database already has demo data");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = Instant::now();

    db.accounts().register(BUYER, BUYER).await?;
    db.accounts().add_funds(BUYER, BUYER, 100_000).await?;
    println!("✓ Buyer {} registered with 1000.00", BUYER);

    let mut listed = 0;
    for s in 1..=stores {
        let seller = format!("seller-{}", s);
        let store_id = format!("store-{}", s);

        db.accounts().register(&seller, &seller).await?;
        db.stores().create_store(&seller, &store_id).await?;

        for b in 0..books {
            let seed = s * 1000 + b;
            let book_id = format!("{}-book-{:03}", store_id, b);
            let info = generate_book_info(seed);
            let price_cents = 599 + ((seed * 37) % 40) as i64 * 100;
            let stock = ((seed * 13) % 50) as i64;

            if let Err(e) = db
                .inventory()
                .add_book(&seller, &store_id, &book_id, &info, price_cents, stock)
                .await
            {
                eprintln!("Failed to list {}: {}", book_id, e);
                continue;
            }
            listed += 1;
        }

        println!("  {} ready ({} books)", store_id, books);
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Listed {} books in {:?}", listed, elapsed);
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Builds deterministic metadata for one demo book.
fn generate_book_info(seed: usize) -> BookInfo {
    let first = TITLE_WORDS[seed % TITLE_WORDS.len()];
    let second = TITLE_WORDS[(seed / 7) % TITLE_WORDS.len()];

    BookInfo {
        author: Some(AUTHORS[seed % AUTHORS.len()].to_string()),
        pages: Some(120 + ((seed * 31) % 500) as i64),
        tags: vec![GENRES[seed % GENRES.len()].to_string()],
        ..BookInfo::titled(format!("The {} {}", first, second))
    }
}
