//! # tableside-db: Store Layer for Tableside
//!
//! The collaborator traits the workflow talks to, and two backends for them.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tableside Data Flow                              │
//! │                                                                         │
//! │  TableRegistry / Finalizer (tableside-service)                         │
//! │       │                                                                 │
//! │       ▼  Arc<dyn TableStore>, Arc<dyn SaleStore>, ...                  │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  tableside-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   store.rs    │    │  repository/  │    │  memory.rs   │  │   │
//! │  │   │  (traits)     │◄───│  (SQLite)     │    │  (demo)      │  │   │
//! │  │   │               │◄───┼───────────────┼────│              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                                │   │
//! │  │                        pool.rs + migrations.rs                  │   │
//! │  └────────────────────────────────┼────────────────────────────────┘   │
//! │                                   ▼                                     │
//! │                           SQLite database                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - Store traits and their input types
//! - [`memory`] - In-memory demo backend
//! - [`pool`] - SQLite connection pool and repository access
//! - [`migrations`] - Embedded database migrations
//! - [`repository`] - SQLite trait implementations
//! - [`seed`] - Demo dataset
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tableside_db::{Database, DbConfig, TableStore};
//!
//! let db = Database::new(DbConfig::new("tableside.db")).await?;
//! let tables = db.tables().list_active(StoreScope::Store1).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod seed;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use pool::{Database, DbConfig};
pub use store::{
    CashRegisterStore, NewCashEntry, NewSale, SaleClosing, SaleItemStore, SaleStore, TablePatch,
    TableStore,
};

pub use repository::cash::CashRegisterRepository;
pub use repository::sale::{SaleItemRepository, SaleRepository};
pub use repository::table::TableRepository;
