//! # Seed Data Generator
//!
//! Creates (or migrates) a live database and inserts the demo floor plan.
//!
//! ## Usage
//! ```bash
//! cargo run -p tableside-db --bin seed
//! cargo run -p tableside-db --bin seed -- --db ./data/tableside.db
//! ```
//!
//! Every store scope gets "Table 1" (4 seats, indoor), "Table 2" (2 seats,
//! outdoor) and one open cash register. Scopes that already have tables are
//! left alone.

use std::env;

use tableside_core::StoreScope;
use tableside_db::{Database, DbConfig, TableStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tableside_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tableside Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tableside_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tableside Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let inserted = db.seed_demo().await?;
    if inserted == 0 {
        println!("⚠ Every store already has tables, nothing to seed.");
    } else {
        println!("✓ Inserted {} tables", inserted);
    }

    for scope in StoreScope::ALL {
        let tables = db.tables().list_active(scope).await?;
        println!("  {}: {} active tables", scope, tables.len());
    }

    db.close().await;
    Ok(())
}
