//! # In-Memory Store
//!
//! Demo backend implementing every store trait over a mutex-guarded state.
//! It follows the same conditional-write rules as the SQLite repositories so
//! the service layer behaves identically on either backend.
//!
//! ```rust
//! use tableside_db::MemoryStore;
//!
//! let store = MemoryStore::demo();
//! assert_eq!(store.table_count(), 4);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use tableside_core::{
    CashEntry, CashRegister, LineItem, Sale, SaleItem, SaleStatus, StoreScope, Table, TableStatus,
};

use crate::error::{StoreError, StoreResult};
use crate::seed::{SeedTable, DEMO_REGISTER_OPERATOR, DEMO_TABLES};
use crate::store::{
    CashRegisterStore, NewCashEntry, NewSale, SaleClosing, SaleItemStore, SaleStore, TablePatch,
    TableStore,
};

#[derive(Debug, Default)]
struct MemoryState {
    tables: Vec<Table>,
    sales: HashMap<String, Sale>,
    items: HashMap<String, Vec<SaleItem>>,
    registers: Vec<CashRegister>,
    entries: Vec<CashEntry>,
}

/// Shared in-memory store. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// A store seeded with the demo floor plan and one open register per
    /// scope.
    pub fn demo() -> Self {
        let now = Utc::now();
        let mut state = MemoryState::default();

        for scope in StoreScope::ALL {
            for seed in DEMO_TABLES {
                state.tables.push(seeded_table(scope, seed));
            }
            state.registers.push(CashRegister {
                id: Uuid::new_v4().to_string(),
                store: scope,
                operator_name: Some(DEMO_REGISTER_OPERATOR.to_string()),
                opened_at: now,
                closed_at: None,
            });
        }

        MemoryStore {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Adds a table to the floor plan.
    pub fn add_table(&self, scope: StoreScope, seed: SeedTable) -> StoreResult<Table> {
        let table = seeded_table(scope, seed);
        self.lock()?.tables.push(table.clone());
        Ok(table)
    }

    /// Number of tables across all scopes.
    pub fn table_count(&self) -> usize {
        self.lock().map(|state| state.tables.len()).unwrap_or(0)
    }

    /// Number of sales across all scopes.
    pub fn sale_count(&self) -> usize {
        self.lock().map(|state| state.sales.len()).unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".to_string()))
    }
}

fn seeded_table(scope: StoreScope, seed: SeedTable) -> Table {
    let now = Utc::now();
    Table {
        id: Uuid::new_v4().to_string(),
        store: scope,
        number: seed.number,
        name: seed.name.to_string(),
        capacity: seed.capacity,
        status: TableStatus::Free,
        location: Some(seed.location.to_string()),
        is_active: true,
        current_sale_id: None,
        current_sale: None,
        created_at: now,
        updated_at: now,
    }
}

impl MemoryState {
    fn sale_mut(&mut self, scope: StoreScope, sale_id: &str) -> StoreResult<&mut Sale> {
        self.sales
            .get_mut(sale_id)
            .filter(|sale| sale.store == scope)
            .ok_or_else(|| StoreError::not_found("Sale", sale_id))
    }

    fn register(&self, scope: StoreScope, register_id: &str) -> StoreResult<&CashRegister> {
        self.registers
            .iter()
            .find(|r| r.id == register_id && r.store == scope)
            .ok_or_else(|| StoreError::not_found("CashRegister", register_id))
    }
}

// =============================================================================
// Tables
// =============================================================================

#[async_trait]
impl TableStore for MemoryStore {
    async fn list_active(&self, scope: StoreScope) -> StoreResult<Vec<Table>> {
        let state = self.lock()?;
        let mut tables: Vec<Table> = state
            .tables
            .iter()
            .filter(|t| t.store == scope && t.is_active)
            .cloned()
            .collect();
        tables.sort_by_key(|t| t.number);
        Ok(tables)
    }

    async fn get(&self, scope: StoreScope, table_id: &str) -> StoreResult<Table> {
        let state = self.lock()?;
        state
            .tables
            .iter()
            .find(|t| t.id == table_id && t.store == scope)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Table", table_id))
    }

    async fn transition(
        &self,
        scope: StoreScope,
        table_id: &str,
        expected: &[TableStatus],
        patch: TablePatch,
    ) -> StoreResult<Table> {
        let mut state = self.lock()?;
        let table = state
            .tables
            .iter_mut()
            .find(|t| t.id == table_id && t.store == scope)
            .ok_or_else(|| StoreError::not_found("Table", table_id))?;

        if !expected.contains(&table.status) {
            return Err(StoreError::conflict(
                "Table",
                table_id,
                format!("status is {}", table.status),
            ));
        }

        debug!(table_id, from = %table.status, to = %patch.status, "Table transition");

        table.status = patch.status;
        table.current_sale_id = patch.current_sale_id;
        table.updated_at = Utc::now();
        Ok(table.clone())
    }
}

// =============================================================================
// Sales
// =============================================================================

#[async_trait]
impl SaleStore for MemoryStore {
    async fn insert(&self, new: NewSale) -> StoreResult<Sale> {
        let mut state = self.lock()?;
        let sale_number = state
            .sales
            .values()
            .filter(|s| s.store == new.store)
            .map(|s| s.sale_number)
            .max()
            .unwrap_or(0)
            + 1;

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            store: new.store,
            table_id: new.table_id,
            sale_number,
            operator_name: new.operator_name,
            customer_name: None,
            customer_count: new.customer_count,
            subtotal_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            payment_method: None,
            change_cents: 0,
            status: SaleStatus::Open,
            notes: None,
            opened_at: now,
            closed_at: None,
            updated_at: now,
            items: Vec::new(),
        };

        debug!(sale_id = %sale.id, sale_number, "Inserted sale");
        state.sales.insert(sale.id.clone(), sale.clone());
        Ok(sale)
    }

    async fn get(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Sale> {
        let mut state = self.lock()?;
        state.sale_mut(scope, sale_id).map(|sale| sale.clone())
    }

    async fn close(
        &self,
        scope: StoreScope,
        sale_id: &str,
        closing: SaleClosing,
    ) -> StoreResult<Sale> {
        let mut state = self.lock()?;
        let sale = state.sale_mut(scope, sale_id)?;

        if sale.status != SaleStatus::Open {
            return Err(StoreError::conflict(
                "Sale",
                sale_id,
                format!("status is {}", sale.status),
            ));
        }

        sale.customer_name = closing.customer_name;
        sale.customer_count = closing.customer_count;
        sale.subtotal_cents = closing.subtotal.cents();
        sale.discount_cents = closing.discount.cents();
        sale.total_cents = closing.total.cents();
        sale.payment_method = Some(closing.payment_method);
        sale.change_cents = closing.change.cents();
        sale.notes = closing.notes;
        sale.status = SaleStatus::Closed;
        sale.closed_at = Some(closing.closed_at);
        sale.updated_at = closing.closed_at;
        Ok(sale.clone())
    }

    async fn cancel(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Sale> {
        let mut state = self.lock()?;
        let sale = state.sale_mut(scope, sale_id)?;

        if sale.status != SaleStatus::Open {
            return Err(StoreError::conflict(
                "Sale",
                sale_id,
                format!("status is {}", sale.status),
            ));
        }

        sale.status = SaleStatus::Cancelled;
        sale.updated_at = Utc::now();
        Ok(sale.clone())
    }
}

#[async_trait]
impl SaleItemStore for MemoryStore {
    async fn insert_batch(
        &self,
        scope: StoreScope,
        sale_id: &str,
        lines: &[LineItem],
    ) -> StoreResult<Vec<SaleItem>> {
        let mut state = self.lock()?;
        state.sale_mut(scope, sale_id)?;

        let now = Utc::now();
        let items: Vec<SaleItem> = lines
            .iter()
            .enumerate()
            .map(|(position, line)| {
                SaleItem::from_line(Uuid::new_v4().to_string(), sale_id, position, line, now)
            })
            .collect();

        state
            .items
            .entry(sale_id.to_string())
            .or_default()
            .extend(items.iter().cloned());
        Ok(items)
    }

    async fn list(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Vec<SaleItem>> {
        let mut state = self.lock()?;
        state.sale_mut(scope, sale_id)?;
        Ok(state.items.get(sale_id).cloned().unwrap_or_default())
    }
}

// =============================================================================
// Cash Registers
// =============================================================================

#[async_trait]
impl CashRegisterStore for MemoryStore {
    async fn find_open_register(&self, scope: StoreScope) -> StoreResult<Option<CashRegister>> {
        let state = self.lock()?;
        Ok(state
            .registers
            .iter()
            .filter(|r| r.store == scope && r.is_open())
            .max_by_key(|r| r.opened_at)
            .cloned())
    }

    async fn open_register(
        &self,
        scope: StoreScope,
        operator_name: Option<&str>,
    ) -> StoreResult<CashRegister> {
        let register = CashRegister {
            id: Uuid::new_v4().to_string(),
            store: scope,
            operator_name: operator_name.map(str::to_string),
            opened_at: Utc::now(),
            closed_at: None,
        };
        self.lock()?.registers.push(register.clone());
        Ok(register)
    }

    async fn close_register(
        &self,
        scope: StoreScope,
        register_id: &str,
    ) -> StoreResult<CashRegister> {
        let mut state = self.lock()?;
        let register = state
            .registers
            .iter_mut()
            .find(|r| r.id == register_id && r.store == scope)
            .ok_or_else(|| StoreError::not_found("CashRegister", register_id))?;

        if !register.is_open() {
            return Err(StoreError::conflict("CashRegister", register_id, "already closed"));
        }

        register.closed_at = Some(Utc::now());
        Ok(register.clone())
    }

    async fn insert_entry(&self, new: NewCashEntry) -> StoreResult<CashEntry> {
        let mut state = self.lock()?;
        if !state.register(new.store, &new.register_id)?.is_open() {
            return Err(StoreError::conflict(
                "CashRegister",
                &new.register_id,
                "register is closed",
            ));
        }

        let entry = CashEntry {
            id: Uuid::new_v4().to_string(),
            register_id: new.register_id,
            entry_type: new.entry_type,
            amount_cents: new.amount.cents(),
            description: new.description,
            payment_method: new.payment_method,
            created_at: Utc::now(),
        };
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_entries(
        &self,
        scope: StoreScope,
        register_id: &str,
    ) -> StoreResult<Vec<CashEntry>> {
        let state = self.lock()?;
        state.register(scope, register_id)?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.register_id == register_id)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
