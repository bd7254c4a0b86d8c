//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── insert() → Sale { status: open, sale_number: max + 1 }         │
//! │                                                                         │
//! │  2. CLOSE (finalization)                                               │
//! │     └── close() → Sale { status: closed }   WHERE status = 'open'      │
//! │     └── insert_batch() → SaleItem × n, in cart order                   │
//! │                                                                         │
//! │  2'. CANCEL (lost the race for the table)                              │
//! │     └── cancel() → Sale { status: cancelled } WHERE status = 'open'    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use tableside_core::{LineItem, PaymentMethod, Sale, SaleItem, SaleStatus, StoreScope};

use super::{parse_column, parse_scope};
use crate::error::{StoreError, StoreResult};
use crate::store::{NewSale, SaleClosing, SaleItemStore, SaleStore};

const SALE_COLUMNS: &str = "id, store_id, table_id, sale_number, operator_name, customer_name, \
                            customer_count, subtotal_cents, discount_cents, total_cents, \
                            payment_method, change_cents, status, notes, opened_at, closed_at, \
                            updated_at";

const ITEM_COLUMNS: &str = "id, sale_id, position, product_code, product_name, quantity, \
                            weight_grams, unit_price_cents, price_per_gram_millicents, \
                            discount_cents, subtotal_cents, notes, created_at";

// =============================================================================
// Sales
// =============================================================================

/// Repository for sale headers.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    async fn fetch(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Sale> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE store_id = ? AND id = ?");

        let row = sqlx::query(&sql)
            .bind(scope.id())
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("Sale", sale_id))?;

        sale_from_row(&row)
    }

    /// Turns a zero-row conditional update into NotFound or Conflict.
    async fn explain_miss(&self, scope: StoreScope, sale_id: &str) -> StoreError {
        match self.fetch(scope, sale_id).await {
            Ok(sale) => StoreError::conflict("Sale", sale_id, format!("status is {}", sale.status)),
            Err(err) => err,
        }
    }
}

fn sale_from_row(row: &SqliteRow) -> StoreResult<Sale> {
    let status: String = row.try_get("status")?;
    let payment_method: Option<String> = row.try_get("payment_method")?;

    Ok(Sale {
        id: row.try_get("id")?,
        store: parse_scope(row.try_get("store_id")?)?,
        table_id: row.try_get("table_id")?,
        sale_number: row.try_get("sale_number")?,
        operator_name: row.try_get("operator_name")?,
        customer_name: row.try_get("customer_name")?,
        customer_count: row.try_get("customer_count")?,
        subtotal_cents: row.try_get("subtotal_cents")?,
        discount_cents: row.try_get("discount_cents")?,
        total_cents: row.try_get("total_cents")?,
        payment_method: payment_method
            .as_deref()
            .map(|method| parse_column::<PaymentMethod>("payment method", method))
            .transpose()?,
        change_cents: row.try_get("change_cents")?,
        status: parse_column::<SaleStatus>("sale status", &status)?,
        notes: row.try_get("notes")?,
        opened_at: row.try_get("opened_at")?,
        closed_at: row.try_get("closed_at")?,
        updated_at: row.try_get("updated_at")?,
        items: Vec::new(),
    })
}

#[async_trait]
impl SaleStore for SaleRepository {
    async fn insert(&self, new: NewSale) -> StoreResult<Sale> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        // The number is computed by the INSERT itself so two terminals never
        // read the same maximum.
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, store_id, table_id, sale_number, operator_name, customer_count,
                subtotal_cents, discount_cents, total_cents, change_cents,
                status, opened_at, updated_at
            )
            SELECT ?, ?, ?, COALESCE(MAX(sale_number), 0) + 1, ?, ?, 0, 0, 0, 0, 'open', ?, ?
            FROM sales WHERE store_id = ?
            "#,
        )
        .bind(&id)
        .bind(new.store.id())
        .bind(&new.table_id)
        .bind(&new.operator_name)
        .bind(new.customer_count)
        .bind(now)
        .bind(now)
        .bind(new.store.id())
        .execute(&mut *tx)
        .await?;

        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id).fetch_one(&mut *tx).await?;
        let sale = sale_from_row(&row)?;

        tx.commit().await?;

        debug!(sale_id = %sale.id, sale_number = sale.sale_number, "Inserted sale");
        Ok(sale)
    }

    async fn get(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Sale> {
        self.fetch(scope, sale_id).await
    }

    async fn close(
        &self,
        scope: StoreScope,
        sale_id: &str,
        closing: SaleClosing,
    ) -> StoreResult<Sale> {
        debug!(sale_id, total = closing.total.cents(), "Closing sale");

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                customer_name = ?,
                customer_count = ?,
                subtotal_cents = ?,
                discount_cents = ?,
                total_cents = ?,
                payment_method = ?,
                change_cents = ?,
                notes = ?,
                status = 'closed',
                closed_at = ?,
                updated_at = ?
            WHERE store_id = ? AND id = ? AND status = 'open'
            "#,
        )
        .bind(closing.customer_name.as_deref())
        .bind(closing.customer_count)
        .bind(closing.subtotal.cents())
        .bind(closing.discount.cents())
        .bind(closing.total.cents())
        .bind(closing.payment_method.as_str())
        .bind(closing.change.cents())
        .bind(closing.notes.as_deref())
        .bind(closing.closed_at)
        .bind(closing.closed_at)
        .bind(scope.id())
        .bind(sale_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_miss(scope, sale_id).await);
        }

        self.fetch(scope, sale_id).await
    }

    async fn cancel(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Sale> {
        debug!(sale_id, "Cancelling sale");

        let result = sqlx::query(
            r#"
            UPDATE sales SET status = 'cancelled', updated_at = ?
            WHERE store_id = ? AND id = ? AND status = 'open'
            "#,
        )
        .bind(Utc::now())
        .bind(scope.id())
        .bind(sale_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_miss(scope, sale_id).await);
        }

        self.fetch(scope, sale_id).await
    }
}

// =============================================================================
// Sale Items
// =============================================================================

/// Repository for committed sale lines.
#[derive(Debug, Clone)]
pub struct SaleItemRepository {
    pool: SqlitePool,
}

impl SaleItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleItemRepository { pool }
    }

    async fn ensure_sale(&self, scope: StoreScope, sale_id: &str) -> StoreResult<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE store_id = ? AND id = ?")
            .bind(scope.id())
            .bind(sale_id)
            .fetch_one(&self.pool)
            .await?;

        if count == 0 {
            return Err(StoreError::not_found("Sale", sale_id));
        }
        Ok(())
    }
}

fn item_from_row(row: &SqliteRow) -> StoreResult<SaleItem> {
    Ok(SaleItem {
        id: row.try_get("id")?,
        sale_id: row.try_get("sale_id")?,
        position: row.try_get("position")?,
        product_code: row.try_get("product_code")?,
        product_name: row.try_get("product_name")?,
        quantity: row.try_get("quantity")?,
        weight_grams: row.try_get("weight_grams")?,
        unit_price_cents: row.try_get("unit_price_cents")?,
        price_per_gram_millicents: row.try_get("price_per_gram_millicents")?,
        discount_cents: row.try_get("discount_cents")?,
        subtotal_cents: row.try_get("subtotal_cents")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl SaleItemStore for SaleItemRepository {
    async fn insert_batch(
        &self,
        scope: StoreScope,
        sale_id: &str,
        lines: &[LineItem],
    ) -> StoreResult<Vec<SaleItem>> {
        self.ensure_sale(scope, sale_id).await?;

        debug!(sale_id, count = lines.len(), "Inserting sale items");

        let now = Utc::now();
        let items: Vec<SaleItem> = lines
            .iter()
            .enumerate()
            .map(|(position, line)| {
                SaleItem::from_line(Uuid::new_v4().to_string(), sale_id, position, line, now)
            })
            .collect();

        let mut tx = self.pool.begin().await?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, store_id, sale_id, position, product_code, product_name,
                    quantity, weight_grams, unit_price_cents, price_per_gram_millicents,
                    discount_cents, subtotal_cents, notes, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(scope.id())
            .bind(&item.sale_id)
            .bind(item.position)
            .bind(&item.product_code)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.weight_grams)
            .bind(item.unit_price_cents)
            .bind(item.price_per_gram_millicents)
            .bind(item.discount_cents)
            .bind(item.subtotal_cents)
            .bind(item.notes.as_deref())
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(items)
    }

    async fn list(&self, scope: StoreScope, sale_id: &str) -> StoreResult<Vec<SaleItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE store_id = ? AND sale_id = ? ORDER BY position"
        );

        let rows = sqlx::query(&sql)
            .bind(scope.id())
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(item_from_row).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::store::TableStore;
    use tableside_core::{GramRate, ItemSpec, Money, Table, Weight};

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

    fn new_sale(table: &Table) -> NewSale {
        NewSale {
            store: table.store,
            table_id: table.id.clone(),
            operator_name: "Ana".to_string(),
            customer_count: 1,
        }
    }

    fn closing(total_cents: i64) -> SaleClosing {
        SaleClosing {
            customer_name: Some("Maria".to_string()),
            customer_count: 3,
            subtotal: Money::from_cents(total_cents),
            discount: Money::zero(),
            total: Money::from_cents(total_cents),
            payment_method: PaymentMethod::Pix,
            change: Money::zero(),
            notes: None,
            closed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sale_numbers() {
        let (db, table) = seeded().await;
        let sales = db.sales();

        let first = sales.insert(new_sale(&table)).await.unwrap();
        let second = sales.insert(new_sale(&table)).await.unwrap();

        assert_eq!(first.sale_number, 1);
        assert_eq!(second.sale_number, 2);
        assert_eq!(first.status, SaleStatus::Open);
        assert_eq!(first.customer_count, 1);
        assert_eq!(first.total_cents, 0);
        assert_eq!(first.payment_method, None);
    }

    #[tokio::test]
    async fn test_close_is_conditional_on_open() {
        let (db, table) = seeded().await;
        let sales = db.sales();
        let sale = sales.insert(new_sale(&table)).await.unwrap();

        let closed = sales
            .close(StoreScope::Store1, &sale.id, closing(3000))
            .await
            .unwrap();
        assert_eq!(closed.status, SaleStatus::Closed);
        assert_eq!(closed.customer_name.as_deref(), Some("Maria"));
        assert_eq!(closed.payment_method, Some(PaymentMethod::Pix));
        assert!(closed.closed_at.is_some());

        let err = sales
            .close(StoreScope::Store1, &sale.id, closing(3000))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let err = sales
            .close(StoreScope::Store1, "missing", closing(3000))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancel_open_sale() {
        let (db, table) = seeded().await;
        let sale = db.sales().insert(new_sale(&table)).await.unwrap();

        let cancelled = db.sales().cancel(StoreScope::Store1, &sale.id).await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert!(db
            .sales()
            .cancel(StoreScope::Store1, &sale.id)
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn test_items_round_trip_both_pricing_modes() {
        let (db, table) = seeded().await;
        let sale = db.sales().insert(new_sale(&table)).await.unwrap();

        let lines = vec![
            LineItem::new(ItemSpec::unit("SODA", "Soda", 3, Money::from_cents(650))).unwrap(),
            LineItem::new(ItemSpec::weighed(
                "BUFFET",
                "Buffet per kilo",
                Weight::from_grams(420),
                GramRate::from_price_per_kg(Money::from_cents(6990)),
            ))
            .unwrap(),
        ];

        db.sale_items()
            .insert_batch(StoreScope::Store1, &sale.id, &lines)
            .await
            .unwrap();

        let items = db.sale_items().list(StoreScope::Store1, &sale.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_code, "SODA");
        assert_eq!(items[0].subtotal_cents, 1950);
        assert_eq!(items[1].weight_grams, Some(420));
        assert_eq!(items[1].unit_price_cents, None);
        // 0.420 kg × 69.90/kg = 29.358 → 29.36
        assert_eq!(items[1].subtotal_cents, 2936);
        assert_eq!(items[1].pricing(), Some(*lines[1].pricing()));
    }

    #[tokio::test]
    async fn test_items_for_unknown_sale_rejected() {
        let (db, _) = seeded().await;
        let lines =
            vec![LineItem::new(ItemSpec::unit("SODA", "Soda", 1, Money::from_cents(650))).unwrap()];

        let err = db
            .sale_items()
            .insert_batch(StoreScope::Store1, "missing", &lines)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
