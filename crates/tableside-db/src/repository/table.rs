//! # Table Repository
//!
//! Floor plan reads and compare-and-set status transitions.
//!
//! ## Transition Guard
//! ```text
//! UPDATE tables SET status = 'occupied', current_sale_id = ?
//!  WHERE store_id = ? AND id = ? AND status IN ('free')
//!        │
//!        ├── 1 row  → transition applied, re-read and return
//!        └── 0 rows → NotFound (no such table) or Conflict (status moved on)
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use tableside_core::{StoreScope, Table, TableStatus};

use super::{parse_column, parse_scope};
use crate::error::{StoreError, StoreResult};
use crate::store::{TablePatch, TableStore};

const TABLE_COLUMNS: &str = "id, store_id, number, name, capacity, status, location, \
                             is_active, current_sale_id, created_at, updated_at";

/// Repository for table rows.
#[derive(Debug, Clone)]
pub struct TableRepository {
    pool: SqlitePool,
}

impl TableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TableRepository { pool }
    }

    async fn fetch(&self, scope: StoreScope, table_id: &str) -> StoreResult<Table> {
        let sql = format!("SELECT {TABLE_COLUMNS} FROM tables WHERE store_id = ? AND id = ?");

        let row = sqlx::query(&sql)
            .bind(scope.id())
            .bind(table_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("Table", table_id))?;

        table_from_row(&row)
    }
}

fn table_from_row(row: &SqliteRow) -> StoreResult<Table> {
    let status: String = row.try_get("status")?;

    Ok(Table {
        id: row.try_get("id")?,
        store: parse_scope(row.try_get("store_id")?)?,
        number: row.try_get("number")?,
        name: row.try_get("name")?,
        capacity: row.try_get("capacity")?,
        status: parse_column("table status", &status)?,
        location: row.try_get("location")?,
        is_active: row.try_get("is_active")?,
        current_sale_id: row.try_get("current_sale_id")?,
        current_sale: None,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl TableStore for TableRepository {
    async fn list_active(&self, scope: StoreScope) -> StoreResult<Vec<Table>> {
        let sql = format!(
            "SELECT {TABLE_COLUMNS} FROM tables WHERE store_id = ? AND is_active = 1 ORDER BY number"
        );

        let rows = sqlx::query(&sql)
            .bind(scope.id())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(table_from_row).collect()
    }

    async fn get(&self, scope: StoreScope, table_id: &str) -> StoreResult<Table> {
        self.fetch(scope, table_id).await
    }

    async fn transition(
        &self,
        scope: StoreScope,
        table_id: &str,
        expected: &[TableStatus],
        patch: TablePatch,
    ) -> StoreResult<Table> {
        if expected.is_empty() {
            return Err(StoreError::Internal(
                "table transition needs at least one expected status".to_string(),
            ));
        }

        debug!(table_id, to = %patch.status, "Table transition");

        let placeholders = vec!["?"; expected.len()].join(", ");
        let sql = format!(
            r#"
            UPDATE tables SET
                status = ?,
                current_sale_id = ?,
                updated_at = ?
            WHERE store_id = ? AND id = ? AND status IN ({placeholders})
            "#
        );

        let mut query = sqlx::query(&sql)
            .bind(patch.status.as_str())
            .bind(patch.current_sale_id.as_deref())
            .bind(Utc::now())
            .bind(scope.id())
            .bind(table_id);
        for status in expected {
            query = query.bind(status.as_str());
        }

        let result = query.execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            let current = self.fetch(scope, table_id).await?;
            return Err(StoreError::conflict(
                "Table",
                table_id,
                format!("status is {}", current.status),
            ));
        }

        self.fetch(scope, table_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn seeded() -> (Database, Table) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.seed_demo().await.unwrap();
        let table = db
            .tables()
            .list_active(StoreScope::Store1)
            .await
            .unwrap()
            .remove(0);
        (db, table)
    }

    #[tokio::test]
    async fn test_list_active_ordered_by_number() {
        let (db, _) = seeded().await;

        let tables = db.tables().list_active(StoreScope::Store2).await.unwrap();
        let numbers: Vec<_> = tables.iter().map(|t| t.number).collect();
        assert_eq!(numbers, [1, 2]);
        assert!(tables.iter().all(|t| t.store == StoreScope::Store2));
        assert_eq!(tables[0].location.as_deref(), Some("Indoor"));
    }

    #[tokio::test]
    async fn test_transition_applies_and_guards() {
        let (db, table) = seeded().await;
        let repo = db.tables();

        // The sale id is not checked against the sales table.
        let occupied = repo
            .transition(
                StoreScope::Store1,
                &table.id,
                &[TableStatus::Free],
                TablePatch::occupied_by("s-1"),
            )
            .await
            .unwrap();
        assert_eq!(occupied.status, TableStatus::Occupied);
        assert!(occupied.is_consistent());

        let err = repo
            .transition(
                StoreScope::Store1,
                &table.id,
                &TableStatus::RELEASABLE,
                TablePatch::vacated(TableStatus::Free),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let released = repo
            .transition(
                StoreScope::Store1,
                &table.id,
                &[TableStatus::Occupied],
                TablePatch::vacated(TableStatus::AwaitingPayment),
            )
            .await
            .unwrap();
        assert_eq!(released.current_sale_id, None);
    }

    #[tokio::test]
    async fn test_other_scope_is_not_found() {
        let (db, table) = seeded().await;

        let err = db
            .tables()
            .get(StoreScope::Store2, &table.id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = db
            .tables()
            .transition(
                StoreScope::Store2,
                &table.id,
                &[TableStatus::Free],
                TablePatch::occupied_by("s-1"),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
