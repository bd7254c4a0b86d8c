//! Fault-injecting store wrapper for workflow tests.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use tableside_core::{
    CashEntry, CashRegister, LineItem, Sale, SaleItem, StoreScope, Table, TableStatus,
};
use tableside_db::{
    CashRegisterStore, MemoryStore, NewCashEntry, NewSale, SaleClosing, SaleItemStore, SaleStore,
    StoreError, StoreResult, TablePatch, TableStore,
};

use crate::backend::{Backend, Mode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    ListTables,
    GetTable,
    Transition,
    InsertSale,
    GetSale,
    CloseSale,
    CancelSale,
    InsertItems,
    ListItems,
    FindRegister,
    OpenRegister,
    CloseRegister,
    InsertEntry,
    ListEntries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Every call of this kind fails with `Unavailable` until cleared.
    Unavailable(Op),
    /// Every call of this kind never completes until cleared.
    Hang(Op),
    /// Fires once: another terminal occupies the table right as the sale is
    /// inserted.
    RivalOccupiesOnInsert,
}

enum Injected {
    Fail,
    Hang,
    Pass,
}

#[derive(Clone)]
pub(crate) struct FaultyStore {
    inner: MemoryStore,
    faults: Arc<Mutex<Vec<Fault>>>,
    last_sale: Arc<Mutex<Option<String>>>,
}

impl FaultyStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        FaultyStore {
            inner,
            faults: Arc::new(Mutex::new(Vec::new())),
            last_sale: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn inject(&self, fault: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fault);
    }

    pub(crate) fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn backend(&self) -> Backend {
        let store = Arc::new(self.clone());
        Backend::from_stores(Mode::Demo, store.clone(), store.clone(), store.clone(), store)
    }

    pub(crate) fn last_inserted_sale(&self) -> Option<String> {
        self.last_sale
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn injected(&self, op: Op) -> Injected {
        let faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        if faults.contains(&Fault::Hang(op)) {
            Injected::Hang
        } else if faults.contains(&Fault::Unavailable(op)) {
            Injected::Fail
        } else {
            Injected::Pass
        }
    }

    async fn gate(&self, op: Op) -> StoreResult<()> {
        match self.injected(op) {
            Injected::Pass => Ok(()),
            Injected::Fail => Err(StoreError::Unavailable(format!("injected fault on {:?}", op))),
            Injected::Hang => std::future::pending().await,
        }
    }

    fn take_rival(&self) -> bool {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        match faults.iter().position(|f| *f == Fault::RivalOccupiesOnInsert) {
            Some(index) => {
                faults.remove(index);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl TableStore for FaultyStore {
    async fn list_active(&self, scope: StoreScope) -> StoreResult<Vec<Table>> {
        self.gate(Op::ListTables).await?;
        self.inner.list_active(scope).await
    }

    async fn get(&self, scope: StoreScope, table_id: &str) -> StoreResult<Table> {
        self.gate(Op::GetTable).await?;
        TableStore::get(&self.inner, scope, table_id).await
    }

    async fn transition(
        &self,
        scope: StoreScope,
        table_id: &str,
        expected: &[TableStatus],
        patch: TablePatch,
    ) -> StoreResult<Table> {
        self.gate(Op::Transition).await?;
        self.inner.transition(scope, table_id, expected, patch).await
    }
}

#[async_trait]
impl SaleStore for FaultyStore {
    async fn insert(&self, sale: NewSale) -> StoreResult<Sale> {
        self.gate(Op::InsertSale).await?;

        if self.take_rival() {
            self.inner
                .transition(
                    sale.store,
                    &sale.table_id,
                    &[TableStatus::Free],
                    TablePatch::occupied_by("rival-sale"),
                )
                .await?;
        }

        let sale = self.inner.insert(sale).await?;
        *self.last_sale.lock().unwrap_or_else(PoisonError::into_inner) = Some(sale.id.clone());
        Ok(sale)
    }

    async fn get(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Sale> {
        self.gate(Op::GetSale).await?;
        SaleStore::get(&self.inner, scope, sale_id).await
    }

    async fn close(
        &self,
        scope: StoreScope,
        sale_id: &str,
        closing: SaleClosing,
    ) -> StoreResult<Sale> {
        self.gate(Op::CloseSale).await?;
        self.inner.close(scope, sale_id, closing).await
    }

    async fn cancel(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Sale> {
        self.gate(Op::CancelSale).await?;
        self.inner.cancel(scope, sale_id).await
    }
}

#[async_trait]
impl SaleItemStore for FaultyStore {
    async fn insert_batch(
        &self,
        scope: StoreScope,
        sale_id: &str,
        lines: &[LineItem],
    ) -> StoreResult<Vec<SaleItem>> {
        self.gate(Op::InsertItems).await?;
        self.inner.insert_batch(scope, sale_id, lines).await
    }

    async fn list(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Vec<SaleItem>> {
        self.gate(Op::ListItems).await?;
        self.inner.list(scope, sale_id).await
    }
}

#[async_trait]
impl CashRegisterStore for FaultyStore {
    async fn find_open_register(&self, scope: StoreScope) -> StoreResult<Option<CashRegister>> {
        self.gate(Op::FindRegister).await?;
        self.inner.find_open_register(scope).await
    }

    async fn open_register(
        &self,
        scope: StoreScope,
        operator_name: Option<&str>,
    ) -> StoreResult<CashRegister> {
        self.gate(Op::OpenRegister).await?;
        self.inner.open_register(scope, operator_name).await
    }

    async fn close_register(
        &self,
        scope: StoreScope,
        register_id: &str,
    ) -> StoreResult<CashRegister> {
        self.gate(Op::CloseRegister).await?;
        self.inner.close_register(scope, register_id).await
    }

    async fn insert_entry(&self, entry: NewCashEntry) -> StoreResult<CashEntry> {
        self.gate(Op::InsertEntry).await?;
        self.inner.insert_entry(entry).await
    }

    async fn list_entries(
        &self,
        scope: StoreScope,
        register_id: &str,
    ) -> StoreResult<Vec<CashEntry>> {
        self.gate(Op::ListEntries).await?;
        self.inner.list_entries(scope, register_id).await
    }
}
