//! # Repository Module
//!
//! SQLite implementations of the store traits.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Service layer                                                         │
//! │       │                                                                 │
//! │       │  Arc<dyn TableStore>::transition(scope, id, [free], occupied)  │
//! │       ▼                                                                 │
//! │  TableRepository                                                       │
//! │       │                                                                 │
//! │       │  UPDATE tables SET ... WHERE store_id = ? AND status IN (...)  │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are mapped by hand: enums are stored as TEXT and parsed back through
//! their `FromStr` impls in tableside-core.
//!
//! ## Available Repositories
//!
//! - [`TableRepository`](table::TableRepository) - Floor plan and status transitions
//! - [`SaleRepository`](sale::SaleRepository) - Sale headers
//! - [`SaleItemRepository`](sale::SaleItemRepository) - Committed sale lines
//! - [`CashRegisterRepository`](cash::CashRegisterRepository) - Registers and ledger entries

pub mod cash;
pub mod sale;
pub mod table;

use std::fmt::Display;
use std::str::FromStr;

use tableside_core::StoreScope;

use crate::error::{StoreError, StoreResult};

/// Parses a TEXT column into a domain enum.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Internal(format!("invalid {column} '{value}': {e}")))
}

/// Maps a `store_id` column back to its scope.
pub(crate) fn parse_scope(store_id: i64) -> StoreResult<StoreScope> {
    StoreScope::from_id(store_id)
        .ok_or_else(|| StoreError::Internal(format!("invalid store_id {store_id}")))
}
