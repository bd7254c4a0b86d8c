//! # Finalization Workflow
//!
//! Turns an open sale plus its cart into a closed sale, committed lines, a
//! cash entry and a table that is no longer occupied.
//!
//! ## Saga Stages
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Finalization Saga                                 │
//! │                                                                         │
//! │  guards (no writes)                                                    │
//! │   ├── cart non-empty, sale open, 0 ≤ discount ≤ subtotal, count ≥ 1    │
//! │   └── in-flight lock on sale id                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Priced ──close sale──► SalePersisted ──insert lines──► ItemsPersisted │
//! │                                                             │           │
//! │        ┌───────────── post cash entry (best effort) ◄───────┘           │
//! │        ▼                                                                │
//! │  CashPosted ──transition table──► TableReleased ──► FinalizeOutcome    │
//! │                                                                         │
//! │  Failure before SalePersisted:  nothing written (RemoteWrite/Timeout)  │
//! │  Failure after SalePersisted:   PartialCommit { completed, step }      │
//! │  Cash entry problems:           FinalizeWarning, saga continues        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every store call runs under the backend's per-call timeout. The
//! cancellation token is checked before each step. Nothing is retried and
//! nothing is rolled back.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tableside_core::validation::{validate_change, validate_customer_count, validate_discount};
use tableside_core::{
    sale_entry_description, Cart, CashEntry, CashEntryType, Money, PaymentMethod, Sale,
    StoreScope, Table, TableStatus, ValidationError,
};
use tableside_db::{NewCashEntry, SaleClosing, TablePatch};

use crate::backend::Backend;
use crate::error::{Stage, Step, WorkflowError, WorkflowResult};
use crate::session::SaleSession;

// =============================================================================
// Policy
// =============================================================================

/// Where a table goes once its sale is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSaleStatus {
    #[default]
    AwaitingPayment,
    Cleaning,
}

impl PostSaleStatus {
    pub const fn table_status(&self) -> TableStatus {
        match self {
            PostSaleStatus::AwaitingPayment => TableStatus::AwaitingPayment,
            PostSaleStatus::Cleaning => TableStatus::Cleaning,
        }
    }
}

impl FromStr for PostSaleStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "awaiting_payment" => Ok(PostSaleStatus::AwaitingPayment),
            "cleaning" => Ok(PostSaleStatus::Cleaning),
            other => Err(WorkflowError::Config(format!(
                "Unknown post-sale status: '{}'. Valid options: awaiting_payment, cleaning",
                other
            ))),
        }
    }
}

/// Which payments produce a cash register entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashEntryPolicy {
    /// Every sale is posted to the open register.
    #[default]
    Always,
    /// Only cash and mixed payments are posted.
    CashBearingOnly,
}

impl CashEntryPolicy {
    pub fn admits(&self, method: PaymentMethod) -> bool {
        match self {
            CashEntryPolicy::Always => true,
            CashEntryPolicy::CashBearingOnly => method.is_cash_bearing(),
        }
    }
}

impl FromStr for CashEntryPolicy {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(CashEntryPolicy::Always),
            "cash_bearing_only" => Ok(CashEntryPolicy::CashBearingOnly),
            other => Err(WorkflowError::Config(format!(
                "Unknown cash entry policy: '{}'. Valid options: always, cash_bearing_only",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinalizationPolicy {
    pub post_sale_status: PostSaleStatus,
    pub cash_entry: CashEntryPolicy,
}

// =============================================================================
// Input / Output
// =============================================================================

/// What the operator enters when closing the bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub customer_name: Option<String>,
    pub customer_count: i64,
    pub discount: Money,
    pub payment_method: PaymentMethod,
    pub change: Money,
    pub notes: Option<String>,
}

impl Default for Checkout {
    fn default() -> Self {
        Checkout {
            customer_name: None,
            customer_count: tableside_core::DEFAULT_CUSTOMER_COUNT,
            discount: Money::zero(),
            payment_method: PaymentMethod::default(),
            change: Money::zero(),
            notes: None,
        }
    }
}

impl Checkout {
    /// Checks the checkout against the cart it will close.
    ///
    /// Pure: callers can run it before opening a table, so bad input never
    /// reaches a store.
    pub fn validate(&self, cart: &Cart) -> Result<(), ValidationError> {
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart);
        }

        validate_discount(self.discount, cart.total())?;
        validate_customer_count(self.customer_count)?;
        validate_change(self.change)
    }
}

/// A non-fatal cash register problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalizeWarning {
    /// The store has no open register; nothing was posted.
    NoOpenRegister,
    /// Looking up the open register failed.
    RegisterLookupFailed { reason: String },
    /// The register was found but the entry was not appended.
    CashEntryFailed { register_id: String, reason: String },
}

impl fmt::Display for FinalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeWarning::NoOpenRegister => write!(f, "no open cash register"),
            FinalizeWarning::RegisterLookupFailed { reason } => {
                write!(f, "cash register lookup failed: {}", reason)
            }
            FinalizeWarning::CashEntryFailed {
                register_id,
                reason,
            } => write!(f, "cash entry on register {} failed: {}", register_id, reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    /// The closed sale with its committed lines.
    pub sale: Sale,
    pub table: Table,
    pub cash_entry: Option<CashEntry>,
    pub warnings: Vec<FinalizeWarning>,
}

// =============================================================================
// Stages
// =============================================================================

struct Priced {
    scope: StoreScope,
    sale_id: String,
    table_id: String,
    table_number: i64,
    subtotal: Money,
    discount: Money,
    total: Money,
}

struct SalePersisted {
    priced: Priced,
    sale: Sale,
}

struct ItemsPersisted {
    priced: Priced,
    sale: Sale,
}

struct CashPosted {
    priced: Priced,
    sale: Sale,
    cash_entry: Option<CashEntry>,
    warnings: Vec<FinalizeWarning>,
}

struct TableReleased {
    sale: Sale,
    table: Table,
    cash_entry: Option<CashEntry>,
    warnings: Vec<FinalizeWarning>,
}

// =============================================================================
// In-flight lock
// =============================================================================

type InFlight = Arc<Mutex<HashSet<String>>>;

/// Holds a sale id in the in-flight set until dropped.
struct InFlightGuard {
    in_flight: InFlight,
    sale_id: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, sale_id: &str) -> WorkflowResult<Self> {
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(sale_id.to_string()) {
            return Err(WorkflowError::AlreadyInProgress {
                sale_id: sale_id.to_string(),
            });
        }

        Ok(InFlightGuard {
            in_flight: Arc::clone(in_flight),
            sale_id: sale_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.sale_id);
    }
}

// =============================================================================
// Finalizer
// =============================================================================

/// Runs the finalization saga. Clones share the in-flight set.
#[derive(Debug, Clone)]
pub struct Finalizer {
    backend: Backend,
    policy: FinalizationPolicy,
    in_flight: InFlight,
}

impl Finalizer {
    pub fn new(backend: Backend, policy: FinalizationPolicy) -> Self {
        Finalizer {
            backend,
            policy,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn policy(&self) -> FinalizationPolicy {
        self.policy
    }

    /// Closes the session's sale.
    ///
    /// On success the session's cart is cleared and its table and sale are
    /// replaced with the committed rows. On failure the session is left as it
    /// was, so the operator can inspect the cart.
    pub async fn finalize(
        &self,
        session: &mut SaleSession,
        checkout: Checkout,
        cancel: &CancellationToken,
    ) -> WorkflowResult<FinalizeOutcome> {
        let priced = self.guard(session, &checkout)?;
        let _lock = InFlightGuard::acquire(&self.in_flight, &priced.sale_id)?;

        info!(
            sale_id = %priced.sale_id,
            table_id = %priced.table_id,
            total = priced.total.cents(),
            "Finalizing sale"
        );

        check_cancel(cancel, Step::CloseSale, None, &priced.sale_id)?;
        let persisted = self.persist_sale(priced, checkout).await?;

        check_cancel(
            cancel,
            Step::InsertItems,
            Some(Stage::SalePersisted),
            &persisted.priced.sale_id,
        )?;
        let items = self.persist_items(persisted, session).await?;

        check_cancel(
            cancel,
            Step::FindRegister,
            Some(Stage::ItemsPersisted),
            &items.priced.sale_id,
        )?;
        let posted = self.post_cash(items).await;

        check_cancel(
            cancel,
            Step::TransitionTable,
            Some(Stage::CashPosted),
            &posted.priced.sale_id,
        )?;
        let released = self.release_table(posted).await?;

        info!(
            sale_id = %released.sale.id,
            sale_number = released.sale.sale_number,
            table_status = %released.table.status,
            warnings = released.warnings.len(),
            "Sale finalized"
        );

        session.complete(released.table.clone(), released.sale.clone());

        Ok(FinalizeOutcome {
            sale: released.sale,
            table: released.table,
            cash_entry: released.cash_entry,
            warnings: released.warnings,
        })
    }

    /// Validates everything that can be checked without a store call.
    fn guard(&self, session: &SaleSession, checkout: &Checkout) -> WorkflowResult<Priced> {
        checkout.validate(session.cart())?;
        session
            .sale()
            .ensure_open()
            .map_err(|e| WorkflowError::from(e).at(Step::CloseSale, &session.sale().id))?;

        let subtotal = session.cart().total();

        Ok(Priced {
            scope: session.scope(),
            sale_id: session.sale().id.clone(),
            table_id: session.table().id.clone(),
            table_number: session.table().number,
            subtotal,
            discount: checkout.discount,
            total: subtotal - checkout.discount,
        })
    }

    async fn persist_sale(&self, priced: Priced, checkout: Checkout) -> WorkflowResult<SalePersisted> {
        let closing = SaleClosing {
            customer_name: non_blank(checkout.customer_name),
            customer_count: checkout.customer_count,
            subtotal: priced.subtotal,
            discount: priced.discount,
            total: priced.total,
            payment_method: checkout.payment_method,
            change: checkout.change,
            notes: non_blank(checkout.notes),
            closed_at: Utc::now(),
        };

        let backend = &self.backend;
        let sale = backend
            .call(
                Step::CloseSale,
                &priced.sale_id,
                backend.sales.close(priced.scope, &priced.sale_id, closing),
            )
            .await
            .inspect_err(|err| error!(sale_id = %priced.sale_id, error = %err, "Closing sale failed"))?;

        Ok(SalePersisted { priced, sale })
    }

    async fn persist_items(
        &self,
        stage: SalePersisted,
        session: &SaleSession,
    ) -> WorkflowResult<ItemsPersisted> {
        let SalePersisted { priced, mut sale } = stage;
        let backend = &self.backend;

        let items = backend
            .call(
                Step::InsertItems,
                &priced.sale_id,
                backend
                    .items
                    .insert_batch(priced.scope, &priced.sale_id, session.cart().items()),
            )
            .await
            .map_err(|err| {
                error!(sale_id = %priced.sale_id, error = %err, "Persisting sale items failed");
                err.into_partial(Stage::SalePersisted, Step::InsertItems, &priced.sale_id)
            })?;

        debug!(sale_id = %priced.sale_id, count = items.len(), "Sale items persisted");
        sale.items = items;
        Ok(ItemsPersisted { priced, sale })
    }

    /// Best effort: every failure here becomes a warning.
    async fn post_cash(&self, stage: ItemsPersisted) -> CashPosted {
        let ItemsPersisted { priced, sale } = stage;
        let mut warnings = Vec::new();
        let backend = &self.backend;
        let method = sale.payment_method.unwrap_or_default();

        let scope_id = priced.scope.to_string();
        let register = match backend
            .call(
                Step::FindRegister,
                &scope_id,
                backend.registers.find_open_register(priced.scope),
            )
            .await
        {
            Ok(Some(register)) => register,
            Ok(None) => {
                warn!(sale_id = %sale.id, "No open cash register, skipping cash entry");
                warnings.push(FinalizeWarning::NoOpenRegister);
                return CashPosted {
                    priced,
                    sale,
                    cash_entry: None,
                    warnings,
                };
            }
            Err(err) => {
                warn!(sale_id = %sale.id, error = %err, "Cash register lookup failed");
                warnings.push(FinalizeWarning::RegisterLookupFailed {
                    reason: err.to_string(),
                });
                return CashPosted {
                    priced,
                    sale,
                    cash_entry: None,
                    warnings,
                };
            }
        };

        if !self.policy.cash_entry.admits(method) {
            debug!(sale_id = %sale.id, %method, "Payment method not posted to the register");
            return CashPosted {
                priced,
                sale,
                cash_entry: None,
                warnings,
            };
        }

        let entry = NewCashEntry {
            store: priced.scope,
            register_id: register.id.clone(),
            entry_type: CashEntryType::Income,
            amount: priced.total,
            description: sale_entry_description(priced.table_number, sale.sale_number),
            payment_method: method,
        };

        let cash_entry = match backend
            .call(Step::PostCashEntry, &register.id, backend.registers.insert_entry(entry))
            .await
        {
            Ok(entry) => {
                debug!(sale_id = %sale.id, entry_id = %entry.id, "Cash entry posted");
                Some(entry)
            }
            Err(err) => {
                warn!(
                    sale_id = %sale.id,
                    register_id = %register.id,
                    error = %err,
                    "Cash entry failed"
                );
                warnings.push(FinalizeWarning::CashEntryFailed {
                    register_id: register.id,
                    reason: err.to_string(),
                });
                None
            }
        };

        CashPosted {
            priced,
            sale,
            cash_entry,
            warnings,
        }
    }

    async fn release_table(&self, stage: CashPosted) -> WorkflowResult<TableReleased> {
        let CashPosted {
            priced,
            sale,
            cash_entry,
            warnings,
        } = stage;
        let backend = &self.backend;

        let table = backend
            .call(
                Step::TransitionTable,
                &priced.table_id,
                backend.tables.transition(
                    priced.scope,
                    &priced.table_id,
                    &[TableStatus::Occupied],
                    TablePatch::vacated(self.policy.post_sale_status.table_status()),
                ),
            )
            .await
            .map_err(|err| {
                error!(
                    sale_id = %priced.sale_id,
                    table_id = %priced.table_id,
                    error = %err,
                    "Releasing table failed"
                );
                err.into_partial(Stage::CashPosted, Step::TransitionTable, &priced.table_id)
            })?;

        Ok(TableReleased {
            sale,
            table,
            cash_entry,
            warnings,
        })
    }
}

/// Fails with `Cancelled`, or with a partial commit once something is
/// persisted.
fn check_cancel(
    cancel: &CancellationToken,
    step: Step,
    completed: Option<Stage>,
    sale_id: &str,
) -> WorkflowResult<()> {
    if !cancel.is_cancelled() {
        return Ok(());
    }

    warn!(sale_id, %step, "Finalization cancelled");
    let err = WorkflowError::Cancelled { step };
    match completed {
        None => Err(err),
        Some(stage) => Err(err.into_partial(stage, step, sale_id)),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::registry::TableRegistry;
    use crate::testing::{Fault, FaultyStore, Op};
    use tableside_core::{GramRate, ItemSpec, SaleStatus, Weight};
    use tableside_db::{CashRegisterStore, MemoryStore, SaleStore, TableStore};

    const SCOPE: StoreScope = StoreScope::Store1;

    struct Floor {
        registry: TableRegistry,
        finalizer: Finalizer,
    }

    fn floor(backend: Backend, policy: FinalizationPolicy) -> Floor {
        Floor {
            registry: TableRegistry::new(backend.clone()),
            finalizer: Finalizer::new(backend, policy),
        }
    }

    async fn open_first(floor: &Floor) -> SaleSession {
        open_nth(floor, 0).await
    }

    async fn open_nth(floor: &Floor, index: usize) -> SaleSession {
        let table = floor.registry.list_active(SCOPE).await.unwrap().remove(index);
        floor
            .registry
            .open_table(SCOPE, &table.id, "Ana")
            .await
            .unwrap()
    }

    fn fifty_reais(session: &mut SaleSession) {
        session
            .add_item(ItemSpec::unit("PIZZA", "Pizza", 2, Money::from_cents(2000)))
            .unwrap();
        session
            .add_item(ItemSpec::unit("SODA", "Soda", 2, Money::from_cents(500)))
            .unwrap();
    }

    fn checkout(discount: i64, method: PaymentMethod) -> Checkout {
        Checkout {
            discount: Money::from_cents(discount),
            payment_method: method,
            ..Checkout::default()
        }
    }

    async fn register_entries(backend: &Backend) -> Vec<CashEntry> {
        let register = backend
            .registers
            .find_open_register(SCOPE)
            .await
            .unwrap()
            .unwrap();
        backend
            .registers
            .list_entries(SCOPE, &register.id)
            .await
            .unwrap()
    }

    #[test]
    fn test_policy_defaults() {
        let policy = FinalizationPolicy::default();
        assert_eq!(policy.post_sale_status, PostSaleStatus::AwaitingPayment);
        assert_eq!(policy.cash_entry, CashEntryPolicy::Always);
        assert!(CashEntryPolicy::Always.admits(PaymentMethod::Credit));
        assert!(CashEntryPolicy::CashBearingOnly.admits(PaymentMethod::Mixed));
        assert!(!CashEntryPolicy::CashBearingOnly.admits(PaymentMethod::Pix));
        assert_eq!("cleaning".parse::<PostSaleStatus>().unwrap(), PostSaleStatus::Cleaning);
    }

    #[test]
    fn test_checkout_validation_is_pure() {
        let mut cart = Cart::new();
        assert!(matches!(
            Checkout::default().validate(&cart),
            Err(ValidationError::EmptyCart)
        ));

        cart.add_item(ItemSpec::unit("PIZZA", "Pizza", 1, Money::from_cents(4000)))
            .unwrap();
        assert!(Checkout::default().validate(&cart).is_ok());
        assert!(checkout(4000, PaymentMethod::Cash).validate(&cart).is_ok());
        assert!(checkout(4001, PaymentMethod::Cash).validate(&cart).is_err());
        assert!(checkout(-1, PaymentMethod::Cash).validate(&cart).is_err());

        let no_guests = Checkout {
            customer_count: 0,
            ..Checkout::default()
        };
        assert!(no_guests.validate(&cart).is_err());

        let negative_change = Checkout {
            change: Money::from_cents(-50),
            ..Checkout::default()
        };
        assert!(negative_change.validate(&cart).is_err());
    }

    #[tokio::test]
    async fn test_happy_path_with_discount() {
        let backend = Backend::demo();
        let floor = floor(backend.clone(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);

        let outcome = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(500, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.sale.status, SaleStatus::Closed);
        assert_eq!(outcome.sale.subtotal_cents, 5000);
        assert_eq!(outcome.sale.discount_cents, 500);
        assert_eq!(outcome.sale.total_cents, 4500);
        assert_eq!(outcome.sale.items.len(), 2);
        assert_eq!(outcome.table.status, TableStatus::AwaitingPayment);
        assert_eq!(outcome.table.current_sale_id, None);
        assert!(outcome.warnings.is_empty());

        let entry = outcome.cash_entry.unwrap();
        assert_eq!(entry.amount_cents, 4500);
        assert_eq!(entry.entry_type, CashEntryType::Income);
        assert_eq!(
            entry.description,
            format!("Table #1 - Sale #{}", outcome.sale.sale_number)
        );

        let entries = register_entries(&backend).await;
        assert_eq!(entries.len(), 1);

        assert!(session.cart().is_empty());
        assert!(!session.sale().is_open());
    }

    #[tokio::test]
    async fn test_cleaning_policy_and_weighed_lines() {
        let policy = FinalizationPolicy {
            post_sale_status: PostSaleStatus::Cleaning,
            ..FinalizationPolicy::default()
        };
        let floor = floor(Backend::demo(), policy);
        let mut session = open_first(&floor).await;
        session
            .add_item(ItemSpec::weighed(
                "BUFFET",
                "Buffet per kilo",
                Weight::from_grams(500),
                GramRate::from_price_per_kg(Money::from_cents(5990)),
            ))
            .unwrap();

        let outcome = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(0, PaymentMethod::Debit),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.table.status, TableStatus::Cleaning);
        assert_eq!(outcome.sale.total_cents, 2995);
        assert_eq!(outcome.sale.items[0].weight_grams, Some(500));
    }

    #[tokio::test]
    async fn test_cash_bearing_only_skips_card_payments() {
        let backend = Backend::demo();
        let policy = FinalizationPolicy {
            cash_entry: CashEntryPolicy::CashBearingOnly,
            ..FinalizationPolicy::default()
        };
        let floor = floor(backend.clone(), policy);
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);

        let outcome = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(0, PaymentMethod::Credit),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.cash_entry.is_none());
        assert!(outcome.warnings.is_empty());
        assert!(register_entries(&backend).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_writes_nothing() {
        let backend = Backend::demo();
        let floor = floor(backend.clone(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;

        let err = floor
            .finalizer
            .finalize(&mut session, Checkout::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::EmptyCart)
        ));
        let sale = backend.sales.get(SCOPE, &session.sale().id).await.unwrap();
        assert!(sale.is_open());
        let table = backend.tables.get(SCOPE, &session.table().id).await.unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
    }

    #[tokio::test]
    async fn test_discount_above_subtotal_rejected() {
        let floor = floor(Backend::demo(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);

        let err = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(5001, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(session.cart().len(), 2);
    }

    #[tokio::test]
    async fn test_no_open_register_is_a_warning() {
        let backend = Backend::demo();
        let register = backend
            .registers
            .find_open_register(SCOPE)
            .await
            .unwrap()
            .unwrap();
        backend
            .registers
            .close_register(SCOPE, &register.id)
            .await
            .unwrap();

        let floor = floor(backend.clone(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);

        let outcome = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(0, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.sale.status, SaleStatus::Closed);
        assert_eq!(outcome.table.status, TableStatus::AwaitingPayment);
        assert!(outcome.cash_entry.is_none());
        assert_eq!(outcome.warnings, vec![FinalizeWarning::NoOpenRegister]);
        let entries = backend
            .registers
            .list_entries(SCOPE, &register.id)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_register_failures_are_warnings() {
        let store = FaultyStore::new(MemoryStore::demo());
        store.inject(Fault::Unavailable(Op::InsertEntry));
        let floor = floor(store.backend(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);

        let outcome = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(0, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(matches!(
            outcome.warnings.as_slice(),
            [FinalizeWarning::CashEntryFailed { .. }]
        ));
        assert_eq!(outcome.table.status, TableStatus::AwaitingPayment);

        store.clear_faults();
        store.inject(Fault::Unavailable(Op::FindRegister));
        let mut session = open_nth(&floor, 1).await;
        fifty_reais(&mut session);
        let outcome = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(0, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome.warnings.as_slice(),
            [FinalizeWarning::RegisterLookupFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_item_failure_is_partial_commit() {
        let store = FaultyStore::new(MemoryStore::demo());
        store.inject(Fault::Unavailable(Op::InsertItems));
        let backend = store.backend();
        let floor = floor(backend.clone(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);

        let err = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(0, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::PartialCommit {
                completed: Stage::SalePersisted,
                step: Step::InsertItems,
                ..
            }
        ));

        // The sale stays closed and the table stays occupied; nothing is undone.
        let sale = backend.sales.get(SCOPE, &session.sale().id).await.unwrap();
        assert_eq!(sale.status, SaleStatus::Closed);
        let table = backend.tables.get(SCOPE, &session.table().id).await.unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(session.cart().len(), 2);
    }

    #[tokio::test]
    async fn test_table_failure_is_partial_commit() {
        let store = FaultyStore::new(MemoryStore::demo());
        let floor = floor(store.backend(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);
        store.inject(Fault::Unavailable(Op::Transition));

        let err = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(0, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.committed_stage(), Some(Stage::CashPosted));
        assert!(matches!(
            err,
            WorkflowError::PartialCommit {
                step: Step::TransitionTable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_closed_sale_is_a_precondition_failure() {
        let backend = Backend::demo();
        let floor = floor(backend.clone(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);
        let mut stale = session.clone();

        floor
            .finalizer
            .finalize(
                &mut session,
                checkout(0, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let err = floor
            .finalizer
            .finalize(
                &mut stale,
                checkout(0, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(register_entries(&backend).await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_close_leaves_sale_untouched() {
        let backend = Backend::demo();
        let floor = floor(backend.clone(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = floor
            .finalizer
            .finalize(&mut session, checkout(0, PaymentMethod::Cash), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Cancelled {
                step: Step::CloseSale
            }
        ));
        let sale = backend.sales.get(SCOPE, &session.sale().id).await.unwrap();
        assert!(sale.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_timeout_writes_nothing() {
        let store = FaultyStore::new(MemoryStore::demo());
        let backend = store.backend().with_call_timeout(Duration::from_millis(200));
        let floor = floor(backend.clone(), FinalizationPolicy::default());
        let mut session = open_first(&floor).await;
        fifty_reais(&mut session);
        store.inject(Fault::Hang(Op::CloseSale));

        let err = floor
            .finalizer
            .finalize(
                &mut session,
                checkout(0, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Timeout {
                step: Step::CloseSale,
                ..
            }
        ));
        store.clear_faults();
        let sale = backend.sales.get(SCOPE, &session.sale().id).await.unwrap();
        assert!(sale.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_finalize_rejected() {
        let store = FaultyStore::new(MemoryStore::demo());
        let backend = store.backend().with_call_timeout(Duration::from_secs(30));
        let floor = floor(backend, FinalizationPolicy::default());
        let mut first = open_first(&floor).await;
        fifty_reais(&mut first);
        let mut second = first.clone();
        store.inject(Fault::Hang(Op::CloseSale));

        let finalizer = floor.finalizer.clone();
        let running = tokio::spawn(async move {
            finalizer
                .finalize(
                    &mut first,
                    checkout(0, PaymentMethod::Cash),
                    &CancellationToken::new(),
                )
                .await
        });
        tokio::task::yield_now().await;

        let err = floor
            .finalizer
            .finalize(
                &mut second,
                checkout(0, PaymentMethod::Cash),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyInProgress { .. }));

        let first_result = running.await.unwrap();
        assert!(matches!(first_result, Err(WorkflowError::Timeout { .. })));
    }
}
