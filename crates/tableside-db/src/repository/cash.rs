//! # Cash Register Repository
//!
//! Register sessions and their append-only ledger.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use tableside_core::{CashEntry, CashEntryType, CashRegister, PaymentMethod, StoreScope};

use super::{parse_column, parse_scope};
use crate::error::{StoreError, StoreResult};
use crate::store::{CashRegisterStore, NewCashEntry};

const REGISTER_COLUMNS: &str = "id, store_id, operator_name, opened_at, closed_at";

const ENTRY_COLUMNS: &str =
    "id, register_id, entry_type, amount_cents, description, payment_method, created_at";

/// Repository for cash registers and cash entries.
#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    async fn fetch(&self, scope: StoreScope, register_id: &str) -> StoreResult<CashRegister> {
        let sql =
            format!("SELECT {REGISTER_COLUMNS} FROM cash_registers WHERE store_id = ? AND id = ?");

        let row = sqlx::query(&sql)
            .bind(scope.id())
            .bind(register_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("CashRegister", register_id))?;

        register_from_row(&row)
    }

    /// NotFound when the register is missing, Conflict when it is closed.
    async fn explain_miss(&self, scope: StoreScope, register_id: &str) -> StoreError {
        match self.fetch(scope, register_id).await {
            Ok(_) => StoreError::conflict("CashRegister", register_id, "register is closed"),
            Err(err) => err,
        }
    }
}

fn register_from_row(row: &SqliteRow) -> StoreResult<CashRegister> {
    Ok(CashRegister {
        id: row.try_get("id")?,
        store: parse_scope(row.try_get("store_id")?)?,
        operator_name: row.try_get("operator_name")?,
        opened_at: row.try_get("opened_at")?,
        closed_at: row.try_get("closed_at")?,
    })
}

fn entry_from_row(row: &SqliteRow) -> StoreResult<CashEntry> {
    let entry_type: String = row.try_get("entry_type")?;
    let payment_method: String = row.try_get("payment_method")?;

    Ok(CashEntry {
        id: row.try_get("id")?,
        register_id: row.try_get("register_id")?,
        entry_type: parse_column::<CashEntryType>("cash entry type", &entry_type)?,
        amount_cents: row.try_get("amount_cents")?,
        description: row.try_get("description")?,
        payment_method: parse_column::<PaymentMethod>("payment method", &payment_method)?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl CashRegisterStore for CashRegisterRepository {
    async fn find_open_register(&self, scope: StoreScope) -> StoreResult<Option<CashRegister>> {
        let sql = format!(
            r#"
            SELECT {REGISTER_COLUMNS} FROM cash_registers
            WHERE store_id = ? AND closed_at IS NULL
            ORDER BY opened_at DESC
            LIMIT 1
            "#
        );

        let row = sqlx::query(&sql)
            .bind(scope.id())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(register_from_row).transpose()
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

        debug!(register_id = %register.id, %scope, "Opening cash register");

        sqlx::query(
            r#"
            INSERT INTO cash_registers (id, store_id, operator_name, opened_at, closed_at)
            VALUES (?, ?, ?, ?, NULL)
            "#,
        )
        .bind(&register.id)
        .bind(scope.id())
        .bind(register.operator_name.as_deref())
        .bind(register.opened_at)
        .execute(&self.pool)
        .await?;

        Ok(register)
    }

    async fn close_register(
        &self,
        scope: StoreScope,
        register_id: &str,
    ) -> StoreResult<CashRegister> {
        let result = sqlx::query(
            r#"
            UPDATE cash_registers SET closed_at = ?
            WHERE store_id = ? AND id = ? AND closed_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(scope.id())
        .bind(register_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_miss(scope, register_id).await);
        }

        self.fetch(scope, register_id).await
    }

    async fn insert_entry(&self, new: NewCashEntry) -> StoreResult<CashEntry> {
        let entry = CashEntry {
            id: Uuid::new_v4().to_string(),
            register_id: new.register_id,
            entry_type: new.entry_type,
            amount_cents: new.amount.cents(),
            description: new.description,
            payment_method: new.payment_method,
            created_at: Utc::now(),
        };

        debug!(
            register_id = %entry.register_id,
            amount = entry.amount_cents,
            "Appending cash entry"
        );

        // Only lands while the register is still open.
        let result = sqlx::query(
            r#"
            INSERT INTO cash_entries (
                id, store_id, register_id, entry_type, amount_cents,
                description, payment_method, created_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (
                SELECT 1 FROM cash_registers
                WHERE id = ? AND store_id = ? AND closed_at IS NULL
            )
            "#,
        )
        .bind(&entry.id)
        .bind(new.store.id())
        .bind(&entry.register_id)
        .bind(entry.entry_type.as_str())
        .bind(entry.amount_cents)
        .bind(&entry.description)
        .bind(entry.payment_method.as_str())
        .bind(entry.created_at)
        .bind(&entry.register_id)
        .bind(new.store.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_miss(new.store, &entry.register_id).await);
        }

        Ok(entry)
    }

    async fn list_entries(
        &self,
        scope: StoreScope,
        register_id: &str,
    ) -> StoreResult<Vec<CashEntry>> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM cash_entries
            WHERE store_id = ? AND register_id = ?
            ORDER BY created_at, rowid
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(scope.id())
            .bind(register_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(entry_from_row).collect()
    }
}
