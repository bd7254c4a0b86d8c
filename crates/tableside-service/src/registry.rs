//! # Table Registry
//!
//! Floor listing and the table status transitions outside finalization.
//!
//! ## Open Table Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  open_table(scope, table_id, operator)                                 │
//! │       │                                                                 │
//! │       ├── get table ───────────── not free? → Precondition (no writes)  │
//! │       │                                                                 │
//! │       ├── insert sale (open, customer_count 1, zero totals)            │
//! │       │                                                                 │
//! │       ├── transition free → occupied (compare-and-set)                 │
//! │       │        │                                                        │
//! │       │        └── lost the race? → cancel the new sale, Precondition  │
//! │       ▼                                                                 │
//! │  SaleSession { table, sale, empty cart }                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{info, warn};

use tableside_core::validation::validate_operator_name;
use tableside_core::{StoreScope, Table, TableStatus, DEFAULT_CUSTOMER_COUNT};
use tableside_db::{NewSale, TablePatch};

use crate::backend::Backend;
use crate::error::{Step, WorkflowError, WorkflowResult};
use crate::session::SaleSession;

/// Table-level operations for one backend.
#[derive(Debug, Clone)]
pub struct TableRegistry {
    backend: Backend,
}

impl TableRegistry {
    pub fn new(backend: Backend) -> Self {
        TableRegistry { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Active tables ordered by number, each with its open sale attached.
    pub async fn list_active(&self, scope: StoreScope) -> WorkflowResult<Vec<Table>> {
        let backend = &self.backend;
        let scope_id = scope.to_string();

        let mut tables = backend
            .call(Step::ListTables, &scope_id, backend.tables.list_active(scope))
            .await?;

        for table in &mut tables {
            if let Some(sale_id) = table.current_sale_id.clone() {
                let sale = backend
                    .call(Step::LoadSale, &sale_id, backend.sales.get(scope, &sale_id))
                    .await?;
                table.current_sale = Some(sale);
            }
        }

        Ok(tables)
    }

    /// Seats guests: opens a sale and marks the table occupied.
    pub async fn open_table(
        &self,
        scope: StoreScope,
        table_id: &str,
        operator_name: &str,
    ) -> WorkflowResult<SaleSession> {
        validate_operator_name(operator_name)?;

        let backend = &self.backend;
        let table = backend
            .call(Step::LoadTable, table_id, backend.tables.get(scope, table_id))
            .await?;
        table
            .ensure_status(&[TableStatus::Free])
            .map_err(|e| WorkflowError::from(e).at(Step::LoadTable, table_id))?;

        let sale = backend
            .call(
                Step::InsertSale,
                table_id,
                backend.sales.insert(NewSale {
                    store: scope,
                    table_id: table_id.to_string(),
                    operator_name: operator_name.trim().to_string(),
                    customer_count: DEFAULT_CUSTOMER_COUNT,
                }),
            )
            .await?;

        let occupied = backend
            .call(
                Step::OccupyTable,
                table_id,
                backend.tables.transition(
                    scope,
                    table_id,
                    &[TableStatus::Free],
                    TablePatch::occupied_by(&sale.id),
                ),
            )
            .await;

        match occupied {
            Ok(table) => {
                info!(
                    table_id,
                    sale_id = %sale.id,
                    sale_number = sale.sale_number,
                    "Table opened"
                );
                Ok(SaleSession::new(scope, table, sale))
            }
            // A timed-out transition may still have landed; leave the sale.
            Err(err @ WorkflowError::Timeout { .. }) => Err(err),
            Err(err) => {
                warn!(table_id, sale_id = %sale.id, error = %err, "Occupying table failed, cancelling sale");
                if let Err(cancel_err) = backend
                    .call(Step::CancelSale, &sale.id, backend.sales.cancel(scope, &sale.id))
                    .await
                {
                    warn!(sale_id = %sale.id, error = %cancel_err, "Cancelling orphaned sale failed");
                }
                Err(err)
            }
        }
    }

    /// Rebuilds a session for an occupied table, with an empty cart.
    pub async fn resume(&self, scope: StoreScope, table_id: &str) -> WorkflowResult<SaleSession> {
        let backend = &self.backend;
        let table = backend
            .call(Step::LoadTable, table_id, backend.tables.get(scope, table_id))
            .await?;
        table
            .ensure_status(&[TableStatus::Occupied])
            .map_err(|e| WorkflowError::from(e).at(Step::LoadTable, table_id))?;

        let sale_id = table.current_sale_id.clone().ok_or_else(|| {
            WorkflowError::precondition(format!("Table {} has no current sale", table_id))
                .at(Step::LoadTable, table_id)
        })?;

        let sale = backend
            .call(Step::LoadSale, &sale_id, backend.sales.get(scope, &sale_id))
            .await?;
        sale.ensure_open().map_err(|e| WorkflowError::from(e).at(Step::LoadSale, &sale_id))?;

        Ok(SaleSession::new(scope, table, sale))
    }

    /// `awaiting_payment → cleaning`.
    pub async fn mark_cleaning(&self, scope: StoreScope, table_id: &str) -> WorkflowResult<Table> {
        let backend = &self.backend;
        let table = backend
            .call(
                Step::MarkCleaning,
                table_id,
                backend.tables.transition(
                    scope,
                    table_id,
                    &[TableStatus::AwaitingPayment],
                    TablePatch::vacated(TableStatus::Cleaning),
                ),
            )
            .await?;

        info!(table_id, "Table marked for cleaning");
        Ok(table)
    }

    /// `awaiting_payment | cleaning → free`.
    pub async fn release_table(&self, scope: StoreScope, table_id: &str) -> WorkflowResult<Table> {
        let backend = &self.backend;
        let table = backend
            .call(Step::LoadTable, table_id, backend.tables.get(scope, table_id))
            .await?;
        table
            .ensure_status(&TableStatus::RELEASABLE)
            .map_err(|e| WorkflowError::from(e).at(Step::LoadTable, table_id))?;

        let table = backend
            .call(
                Step::ReleaseTable,
                table_id,
                backend.tables.transition(
                    scope,
                    table_id,
                    &TableStatus::RELEASABLE,
                    TablePatch::vacated(TableStatus::Free),
                ),
            )
            .await?;

        info!(table_id, "Table released");
        Ok(table)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fault, FaultyStore, Op};
    use tableside_core::{ItemSpec, Money, SaleStatus};
    use tableside_db::{MemoryStore, SaleStore, TableStore};

    const SCOPE: StoreScope = StoreScope::Store1;

    async fn first_table(registry: &TableRegistry) -> Table {
        registry.list_active(SCOPE).await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_open_table_occupies_and_opens_sale() {
        let registry = TableRegistry::new(Backend::demo());
        let table = first_table(&registry).await;

        let session = registry.open_table(SCOPE, &table.id, "Ana").await.unwrap();

        assert_eq!(session.table().status, TableStatus::Occupied);
        assert_eq!(
            session.table().current_sale_id.as_deref(),
            Some(session.sale().id.as_str())
        );
        assert_eq!(session.sale().status, SaleStatus::Open);
        assert_eq!(session.sale().customer_count, 1);
        assert_eq!(session.sale().total_cents, 0);
        assert_eq!(session.sale().operator_name, "Ana");
        assert!(session.cart().is_empty());
    }

    #[tokio::test]
    async fn test_list_attaches_open_sale() {
        let registry = TableRegistry::new(Backend::demo());
        let table = first_table(&registry).await;
        let session = registry.open_table(SCOPE, &table.id, "Ana").await.unwrap();

        let tables = registry.list_active(SCOPE).await.unwrap();
        assert_eq!(
            tables[0].current_sale.as_ref().map(|s| s.id.as_str()),
            Some(session.sale().id.as_str())
        );
        assert!(tables[1].current_sale.is_none());
    }

    #[tokio::test]
    async fn test_open_non_free_table_writes_nothing() {
        let store = MemoryStore::demo();
        let registry = TableRegistry::new(Backend::memory(store.clone()));
        let table = first_table(&registry).await;
        registry.open_table(SCOPE, &table.id, "Ana").await.unwrap();
        let sales_before = store.sale_count();

        let err = registry.open_table(SCOPE, &table.id, "Bruno").await.unwrap_err();

        assert!(matches!(
            &err,
            WorkflowError::Precondition {
                step: Some(Step::LoadTable),
                entity_id: Some(id),
                ..
            } if *id == table.id
        ));
        assert_eq!(store.sale_count(), sales_before);
        let after = registry.backend().tables.get(SCOPE, &table.id).await.unwrap();
        assert_eq!(after.status, TableStatus::Occupied);
    }

    #[tokio::test]
    async fn test_open_table_race_cancels_new_sale() {
        let store = FaultyStore::new(MemoryStore::demo());
        store.inject(Fault::RivalOccupiesOnInsert);
        let registry = TableRegistry::new(store.backend());
        let table = first_table(&registry).await;

        let err = registry.open_table(SCOPE, &table.id, "Ana").await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Precondition {
                step: Some(Step::OccupyTable),
                ..
            }
        ));

        let sale_id = store.last_inserted_sale().unwrap();
        let sale = registry.backend().sales.get(SCOPE, &sale_id).await.unwrap();
        assert_eq!(sale.status, SaleStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_open_table_rejects_blank_operator() {
        let registry = TableRegistry::new(Backend::demo());
        let table = first_table(&registry).await;

        let err = registry.open_table(SCOPE, &table.id, " ").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_surfaces_transport_failure() {
        let store = FaultyStore::new(MemoryStore::demo());
        store.inject(Fault::Unavailable(Op::ListTables));
        let registry = TableRegistry::new(store.backend());

        let err = registry.list_active(SCOPE).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::RemoteWrite {
                step: Step::ListTables,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_resume_returns_open_sale() {
        let registry = TableRegistry::new(Backend::demo());
        let table = first_table(&registry).await;
        let mut opened = registry.open_table(SCOPE, &table.id, "Ana").await.unwrap();
        opened
            .add_item(ItemSpec::unit("SODA", "Soda", 1, Money::from_cents(650)))
            .unwrap();

        let resumed = registry.resume(SCOPE, &table.id).await.unwrap();
        assert_eq!(resumed.sale().id, opened.sale().id);
        assert!(resumed.cart().is_empty());

        let other = registry.list_active(SCOPE).await.unwrap().remove(1);
        assert!(registry.resume(SCOPE, &other.id).await.unwrap_err().is_precondition());
    }

    #[tokio::test]
    async fn test_release_requires_releasable_status() {
        let registry = TableRegistry::new(Backend::demo());
        let table = first_table(&registry).await;

        // free
        assert!(registry
            .release_table(SCOPE, &table.id)
            .await
            .unwrap_err()
            .is_precondition());

        // occupied
        registry.open_table(SCOPE, &table.id, "Ana").await.unwrap();
        assert!(registry
            .release_table(SCOPE, &table.id)
            .await
            .unwrap_err()
            .is_precondition());
        assert!(registry
            .mark_cleaning(SCOPE, &table.id)
            .await
            .unwrap_err()
            .is_precondition());
    }

    #[tokio::test]
    async fn test_cleaning_then_release() {
        let registry = TableRegistry::new(Backend::demo());
        let table = first_table(&registry).await;
        registry
            .backend()
            .tables
            .transition(
                SCOPE,
                &table.id,
                &[TableStatus::Free],
                TablePatch::vacated(TableStatus::AwaitingPayment),
            )
            .await
            .unwrap();

        let cleaning = registry.mark_cleaning(SCOPE, &table.id).await.unwrap();
        assert_eq!(cleaning.status, TableStatus::Cleaning);

        let free = registry.release_table(SCOPE, &table.id).await.unwrap();
        assert_eq!(free.status, TableStatus::Free);
        assert_eq!(free.current_sale_id, None);
    }
}
