//! # Store Traits
//!
//! The four collaborator seams the service layer talks to. Every call is
//! scoped by a [`StoreScope`]; implementations never read or write rows of a
//! different store.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   TableStore        SaleStore        SaleItemStore   CashRegisterStore  │
//! │        │                │                  │                 │          │
//! │        ├────────────────┴─────────┬────────┴─────────────────┤          │
//! │        ▼                          ▼                          ▼          │
//! │   repository::*  (SQLite, live)        memory::MemoryStore (demo)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conditional Writes
//! Status changes are compare-and-set: the caller names the statuses it
//! expects, and the store answers [`StoreError::Conflict`] when the row has
//! moved on. This is what keeps two terminals from opening the same table.
//!
//! [`StoreError::Conflict`]: crate::error::StoreError::Conflict

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tableside_core::{
    CashEntry, CashEntryType, CashRegister, LineItem, Money, PaymentMethod, Sale, SaleItem,
    StoreScope, Table, TableStatus,
};

use crate::error::StoreResult;

// =============================================================================
// Inputs
// =============================================================================

/// Target state of a table status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePatch {
    pub status: TableStatus,
    pub current_sale_id: Option<String>,
}

impl TablePatch {
    /// Seats a sale at the table.
    pub fn occupied_by(sale_id: impl Into<String>) -> Self {
        TablePatch {
            status: TableStatus::Occupied,
            current_sale_id: Some(sale_id.into()),
        }
    }

    /// Any non-occupied status; the sale link is cleared.
    pub fn vacated(status: TableStatus) -> Self {
        TablePatch {
            status,
            current_sale_id: None,
        }
    }
}

/// A sale about to be opened at a table.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub store: StoreScope,
    pub table_id: String,
    pub operator_name: String,
    pub customer_count: i64,
}

/// Everything written when a sale is closed.
#[derive(Debug, Clone)]
pub struct SaleClosing {
    pub customer_name: Option<String>,
    pub customer_count: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub change: Money,
    pub notes: Option<String>,
    pub closed_at: DateTime<Utc>,
}

/// A ledger line to append to a register.
#[derive(Debug, Clone)]
pub struct NewCashEntry {
    pub store: StoreScope,
    pub register_id: String,
    pub entry_type: CashEntryType,
    pub amount: Money,
    pub description: String,
    pub payment_method: PaymentMethod,
}

// =============================================================================
// Traits
// =============================================================================

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Active tables ordered by number. `current_sale` is left empty.
    async fn list_active(&self, scope: StoreScope) -> StoreResult<Vec<Table>>;

    async fn get(&self, scope: StoreScope, table_id: &str) -> StoreResult<Table>;

    /// Compare-and-set: applies `patch` only while the table is in one of
    /// `expected`, and returns the updated row.
    async fn transition(
        &self,
        scope: StoreScope,
        table_id: &str,
        expected: &[TableStatus],
        patch: TablePatch,
    ) -> StoreResult<Table>;
}

#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Inserts an open sale with zero totals, assigning the next sale number
    /// of the store.
    async fn insert(&self, sale: NewSale) -> StoreResult<Sale>;

    /// Loads the sale row only; `items` comes back empty.
    async fn get(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Sale>;

    /// Closes a sale that is still open; `Conflict` otherwise.
    async fn close(
        &self,
        scope: StoreScope,
        sale_id: &str,
        closing: SaleClosing,
    ) -> StoreResult<Sale>;

    /// Cancels a sale that is still open; `Conflict` otherwise.
    async fn cancel(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Sale>;
}

#[async_trait]
pub trait SaleItemStore: Send + Sync {
    /// Persists cart lines in order, positions starting at 0.
    async fn insert_batch(
        &self,
        scope: StoreScope,
        sale_id: &str,
        lines: &[LineItem],
    ) -> StoreResult<Vec<SaleItem>>;

    async fn list(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Vec<SaleItem>>;
}

#[async_trait]
pub trait CashRegisterStore: Send + Sync {
    /// The most recently opened register that is not closed, if any.
    async fn find_open_register(&self, scope: StoreScope) -> StoreResult<Option<CashRegister>>;

    async fn open_register(
        &self,
        scope: StoreScope,
        operator_name: Option<&str>,
    ) -> StoreResult<CashRegister>;

    async fn close_register(&self, scope: StoreScope, register_id: &str)
        -> StoreResult<CashRegister>;

    /// Appends an entry to an open register; `Conflict` if it was closed.
    async fn insert_entry(&self, entry: NewCashEntry) -> StoreResult<CashEntry>;

    async fn list_entries(
        &self,
        scope: StoreScope,
        register_id: &str,
    ) -> StoreResult<Vec<CashEntry>>;
}
