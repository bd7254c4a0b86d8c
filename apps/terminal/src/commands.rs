//! Command handlers. Each returns a serializable result that `main` prints.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tableside_core::status::{badge, StatusBadge};
use tableside_core::{Cart, Money, StoreScope, Table, TableStatus};
use tableside_db::{Database, DbConfig, TableStore};
use tableside_service::{
    Backend, Checkout, FinalizeOutcome, Finalizer, SaleSession, TableRegistry, TablesideConfig,
    WorkflowError,
};

use crate::cli::SellArgs;
use crate::error::CliError;

/// A table as listed on the floor view.
#[derive(Debug, Serialize)]
pub struct TableView {
    #[serde(flatten)]
    pub table: Table,
    pub badge: StatusBadge,
}

#[derive(Debug, Serialize)]
pub struct SeedReport {
    pub database_path: String,
    pub inserted: usize,
    pub tables: Vec<ScopeCount>,
}

#[derive(Debug, Serialize)]
pub struct ScopeCount {
    pub store: StoreScope,
    pub active_tables: usize,
}

/// One store's registry and finalizer over the configured backend.
pub struct Terminal {
    scope: StoreScope,
    operator_name: String,
    registry: TableRegistry,
    finalizer: Finalizer,
}

impl Terminal {
    /// Builds the configured backend. In demo mode that is a fresh in-memory
    /// floor, so nothing carries over to the next invocation.
    pub async fn connect(config: &TablesideConfig) -> Result<Self, CliError> {
        let backend = config.connect().await?;
        Ok(Terminal::new(config, backend))
    }

    pub fn new(config: &TablesideConfig, backend: Backend) -> Self {
        Terminal {
            scope: config.scope(),
            operator_name: config.store.operator_name.clone(),
            registry: TableRegistry::new(backend.clone()),
            finalizer: Finalizer::new(backend, config.policy()),
        }
    }

    /// Finds an active table by number, falling back to id.
    async fn resolve_table(&self, reference: &str) -> Result<Table, CliError> {
        let tables = self.registry.list_active(self.scope).await?;
        let number = reference.trim().parse::<i64>().ok();

        tables
            .into_iter()
            .find(|t| Some(t.number) == number || t.id == reference)
            .ok_or_else(|| CliError::table_not_found(reference))
    }

    pub async fn tables(&self) -> Result<Vec<TableView>, CliError> {
        let tables = self.registry.list_active(self.scope).await?;
        Ok(tables
            .into_iter()
            .map(|table| TableView {
                badge: badge(table.status),
                table,
            })
            .collect())
    }

    pub async fn open(
        &self,
        reference: &str,
        operator: Option<&str>,
    ) -> Result<SaleSession, CliError> {
        let table = self.resolve_table(reference).await?;
        let operator = operator.unwrap_or(&self.operator_name);
        Ok(self.registry.open_table(self.scope, &table.id, operator).await?)
    }

    /// Opens (or resumes) the table, fills the cart and finalizes.
    ///
    /// Items and checkout are validated before the table is touched.
    pub async fn sell(
        &self,
        args: &SellArgs,
        cancel: &CancellationToken,
    ) -> Result<FinalizeOutcome, CliError> {
        let mut cart = Cart::new();
        for spec in args.all_items() {
            cart.add_item(spec.clone())?;
        }

        let checkout = Checkout {
            customer_name: args.customer.clone(),
            customer_count: args.guests,
            discount: Money::from_cents(args.discount),
            payment_method: args.payment,
            change: Money::from_cents(args.change),
            notes: args.notes.clone(),
        };
        checkout.validate(&cart).map_err(WorkflowError::from)?;

        let table = self.resolve_table(&args.table).await?;
        let mut session = match table.status {
            TableStatus::Free => {
                self.registry
                    .open_table(self.scope, &table.id, &self.operator_name)
                    .await?
            }
            _ => self.registry.resume(self.scope, &table.id).await?,
        };
        *session.cart_mut() = cart;

        Ok(self.finalizer.finalize(&mut session, checkout, cancel).await?)
    }

    pub async fn clean(&self, reference: &str) -> Result<Table, CliError> {
        let table = self.resolve_table(reference).await?;
        Ok(self.registry.mark_cleaning(self.scope, &table.id).await?)
    }

    pub async fn release(&self, reference: &str) -> Result<Table, CliError> {
        let table = self.resolve_table(reference).await?;
        Ok(self.registry.release_table(self.scope, &table.id).await?)
    }
}

/// Seeds the configured live database, whatever the backend mode.
pub async fn seed(config: &TablesideConfig) -> Result<SeedReport, CliError> {
    let path = config.database_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::invalid_input(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }

    let db = Database::new(DbConfig::new(&path)).await?;
    let inserted = db.seed_demo().await?;
    info!(inserted, path = %path.display(), "Demo floor seeded");

    let mut tables = Vec::new();
    for store in StoreScope::ALL {
        let active = db.tables().list_active(store).await?;
        tables.push(ScopeCount {
            store,
            active_tables: active.len(),
        });
    }
    db.close().await;

    Ok(SeedReport {
        database_path: path.display().to_string(),
        inserted,
        tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parse_unit_item;
    use crate::error::ErrorCode;
    use tableside_core::status::StatusTone;
    use tableside_core::{PaymentMethod, SaleStatus};

    fn terminal() -> Terminal {
        Terminal::new(&TablesideConfig::default(), Backend::demo())
    }

    fn sell_args(table: &str, items: &[&str]) -> SellArgs {
        SellArgs {
            table: table.to_string(),
            items: items.iter().map(|i| parse_unit_item(i).unwrap()).collect(),
            weighed: Vec::new(),
            discount: 0,
            change: 0,
            payment: PaymentMethod::Cash,
            customer: None,
            guests: 2,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_tables_carry_badges() {
        let views = terminal().tables().await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].badge.label, "Free");
        assert_eq!(views[0].badge.tone, StatusTone::Green);

        let json = serde_json::to_value(&views[0]).unwrap();
        assert_eq!(json["number"], 1);
        assert_eq!(json["badge"]["tone"], "green");
    }

    #[tokio::test]
    async fn test_open_by_number_and_id() {
        let terminal = terminal();
        let session = terminal.open("1", Some("Ana")).await.unwrap();
        assert_eq!(session.table().number, 1);
        assert_eq!(session.sale().operator_name, "Ana");

        let second = terminal.tables().await.unwrap().remove(1).table;
        let session = terminal.open(&second.id, None).await.unwrap();
        assert_eq!(session.sale().operator_name, "Operator");
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let err = terminal().open("42", None).await.err().unwrap();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_sell_opens_and_finalizes() {
        let terminal = terminal();
        let outcome = terminal
            .sell(
                &sell_args("2", &["PIZZA:Pizza:1:4000", "SODA:Soda:2:500"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.sale.status, SaleStatus::Closed);
        assert_eq!(outcome.sale.total_cents, 5000);
        assert_eq!(outcome.sale.customer_count, 2);
        assert_eq!(outcome.table.status, TableStatus::AwaitingPayment);

        let table = terminal.clean("2").await.unwrap();
        assert_eq!(table.status, TableStatus::Cleaning);
        let table = terminal.release("2").await.unwrap();
        assert_eq!(table.status, TableStatus::Free);
    }

    #[tokio::test]
    async fn test_invalid_items_leave_table_free() {
        let terminal = terminal();
        let err = terminal
            .sell(&sell_args("1", &["PIZZA:Pizza:0:4000"]), &CancellationToken::new())
            .await
            .err()
            .unwrap();

        assert_eq!(err.code, ErrorCode::ValidationError);
        let views = terminal.tables().await.unwrap();
        assert_eq!(views[0].table.status, TableStatus::Free);
    }

    #[tokio::test]
    async fn test_invalid_checkout_leaves_table_free() {
        let terminal = terminal();
        let mut args = sell_args("1", &["PIZZA:Pizza:1:4000"]);
        args.discount = 9999;

        let err = terminal
            .sell(&args, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let mut args = sell_args("1", &[]);
        args.guests = 0;
        let err = terminal
            .sell(&args, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let table = &terminal.tables().await.unwrap()[0].table;
        assert_eq!(table.status, TableStatus::Free);
        assert_eq!(table.current_sale_id, None);
    }

    #[tokio::test]
    async fn test_demo_invocations_start_from_a_fresh_floor() {
        let config = TablesideConfig::default();
        let first = Terminal::connect(&config).await.unwrap();
        first.open("1", None).await.unwrap();

        let second = Terminal::connect(&config).await.unwrap();
        let views = second.tables().await.unwrap();
        assert_eq!(views[0].table.status, TableStatus::Free);
    }
}
