//! # Domain Types
//!
//! Core domain types used throughout Tableside.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Table       │   │      Sale       │   │    SaleItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  table_id       │◄──│  sale_id        │       │
//! │  │  number         │   │  sale_number    │   │  position       │       │
//! │  │  status         │   │  status         │   │  product_code   │       │
//! │  │  current_sale_id│──►│  total_cents    │   │  subtotal_cents │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CashRegister   │◄──│   CashEntry     │   │   StoreScope    │       │
//! │  │  opened_at      │   │  amount_cents   │   │  Store1 | Store2│       │
//! │  │  closed_at      │   │  entry_type     │   │  (every row)    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Table Status Machine
//! ```text
//!   free ──open_table──► occupied ──finalize──► awaiting_payment ──► cleaning
//!    ▲                                                │                  │
//!    └──────────────────────release_table─────────────┴──────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{LineItem, Pricing};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{GramRate, Money, Weight};

// =============================================================================
// Store Scope
// =============================================================================

/// The physical store whose data partition an operation targets.
///
/// Every persisted row carries the scope's numeric id; there is one schema,
/// never one set of tables per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum StoreScope {
    Store1,
    Store2,
}

impl StoreScope {
    pub const ALL: [StoreScope; 2] = [StoreScope::Store1, StoreScope::Store2];

    /// Numeric id stored in the `store_id` columns.
    pub const fn id(self) -> i64 {
        match self {
            StoreScope::Store1 => 1,
            StoreScope::Store2 => 2,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(StoreScope::Store1),
            2 => Some(StoreScope::Store2),
            _ => None,
        }
    }
}

impl TryFrom<i64> for StoreScope {
    type Error = ValidationError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        StoreScope::from_id(id).ok_or(ValidationError::OutOfRange {
            field: "store".to_string(),
            min: 1,
            max: 2,
        })
    }
}

impl From<StoreScope> for i64 {
    fn from(scope: StoreScope) -> Self {
        scope.id()
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store{}", self.id())
    }
}

impl FromStr for StoreScope {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().to_lowercase();
        let digits = digits.strip_prefix("store").unwrap_or(&digits);
        digits
            .parse::<i64>()
            .map_err(|_| ValidationError::not_allowed("store", &["1", "2"]))
            .and_then(StoreScope::try_from)
    }
}

// =============================================================================
// Table Status
// =============================================================================

/// Where a physical table is in its service cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Empty and ready for guests.
    Free,
    /// Guests seated, a sale is open.
    Occupied,
    /// Sale closed, bill requested but not cleared.
    AwaitingPayment,
    /// Guests gone, table being reset.
    Cleaning,
}

impl TableStatus {
    pub const ALL: [TableStatus; 4] = [
        TableStatus::Free,
        TableStatus::Occupied,
        TableStatus::AwaitingPayment,
        TableStatus::Cleaning,
    ];

    /// Statuses a table may be released from.
    pub const RELEASABLE: [TableStatus; 2] = [TableStatus::AwaitingPayment, TableStatus::Cleaning];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Free => "free",
            TableStatus::Occupied => "occupied",
            TableStatus::AwaitingPayment => "awaiting_payment",
            TableStatus::Cleaning => "cleaning",
        }
    }

    /// Returns true if a new sale may be opened on a table in this status.
    pub const fn can_open(&self) -> bool {
        matches!(self, TableStatus::Free)
    }

    /// Returns true if a table in this status may be released to free.
    pub const fn can_release(&self) -> bool {
        matches!(self, TableStatus::AwaitingPayment | TableStatus::Cleaning)
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::not_allowed(
                    "table status",
                    &["free", "occupied", "awaiting_payment", "cleaning"],
                )
            })
    }
}

// =============================================================================
// Table
// =============================================================================

/// A physical seating unit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Table {
    pub id: String,

    #[ts(type = "number")]
    pub store: StoreScope,

    /// Display number, also the listing order.
    pub number: i64,

    pub name: String,

    pub capacity: i64,

    pub status: TableStatus,

    /// Free-form area label ("Indoor", "Terrace").
    pub location: Option<String>,

    /// Inactive tables are hidden from the floor.
    pub is_active: bool,

    /// Set iff `status == Occupied`.
    pub current_sale_id: Option<String>,

    /// The open sale, attached when listing the floor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_sale: Option<Sale>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Table {
    /// Fails unless the table is in one of `expected`.
    pub fn ensure_status(&self, expected: &[TableStatus]) -> CoreResult<()> {
        if expected.contains(&self.status) {
            return Ok(());
        }

        Err(CoreError::InvalidTableStatus {
            table_id: self.id.clone(),
            current: self.status.to_string(),
            expected: expected
                .iter()
                .map(TableStatus::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Checks the `current_sale_id` / status pairing.
    pub fn is_consistent(&self) -> bool {
        self.current_sale_id.is_some() == (self.status == TableStatus::Occupied)
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a table sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Items may still be added.
    #[default]
    Open,
    /// Finalized; immutable.
    Closed,
    /// Abandoned before finalization.
    Cancelled,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Open => "open",
            SaleStatus::Closed => "closed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SaleStatus::Open),
            "closed" => Ok(SaleStatus::Closed),
            "cancelled" => Ok(SaleStatus::Cancelled),
            _ => Err(ValidationError::not_allowed(
                "sale status",
                &["open", "closed", "cancelled"],
            )),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the guest settled the bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Pix,
    Credit,
    Debit,
    Voucher,
    /// Split across several methods, part of it cash.
    Mixed,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::Pix,
        PaymentMethod::Credit,
        PaymentMethod::Debit,
        PaymentMethod::Voucher,
        PaymentMethod::Mixed,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Debit => "debit",
            PaymentMethod::Voucher => "voucher",
            PaymentMethod::Mixed => "mixed",
        }
    }

    /// Returns true if physical cash may land in the drawer.
    pub const fn is_cash_bearing(&self) -> bool {
        matches!(self, PaymentMethod::Cash | PaymentMethod::Mixed)
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| {
                ValidationError::not_allowed(
                    "payment method",
                    &["cash", "pix", "credit", "debit", "voucher", "mixed"],
                )
            })
    }
}

// =============================================================================
// Sale
// =============================================================================

/// One customer-facing transaction bound to a table.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,

    #[ts(type = "number")]
    pub store: StoreScope,

    pub table_id: String,

    /// Monotonic per store, assigned by the store on insert.
    pub sale_number: i64,

    pub operator_name: String,
    pub customer_name: Option<String>,
    pub customer_count: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    /// Always `subtotal_cents - discount_cents`.
    pub total_cents: i64,
    pub payment_method: Option<PaymentMethod>,
    pub change_cents: i64,
    pub status: SaleStatus,
    pub notes: Option<String>,

    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Persisted lines, filled once the sale is closed.
    #[serde(default)]
    pub items: Vec<SaleItem>,
}

impl Sale {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SaleStatus::Open
    }

    /// Fails unless the sale still accepts items.
    pub fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::InvalidSaleStatus {
                sale_id: self.id.clone(),
                current_status: self.status.to_string(),
            })
        }
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A committed line of a closed sale.
///
/// Exactly one of the unit / weighed column pairs is set, mirroring the
/// line's pricing mode.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// Cart order, starting at 0.
    pub position: i64,
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    pub weight_grams: Option<i64>,
    pub unit_price_cents: Option<i64>,
    /// Milli-cents per gram.
    pub price_per_gram_millicents: Option<i64>,
    pub discount_cents: i64,
    pub subtotal_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Freezes a cart line for persistence.
    pub fn from_line(
        id: String,
        sale_id: &str,
        position: usize,
        line: &LineItem,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (quantity, weight_grams, unit_price_cents, price_per_gram_millicents) =
            match line.pricing() {
                Pricing::Unit {
                    quantity,
                    unit_price,
                } => (*quantity, None, Some(unit_price.cents()), None),
                Pricing::Weighed {
                    weight,
                    price_per_gram,
                } => (
                    1,
                    Some(weight.grams()),
                    None,
                    Some(price_per_gram.millicents()),
                ),
            };

        SaleItem {
            id,
            sale_id: sale_id.to_string(),
            position: position as i64,
            product_code: line.product_code().to_string(),
            product_name: line.product_name().to_string(),
            quantity,
            weight_grams,
            unit_price_cents,
            price_per_gram_millicents,
            discount_cents: 0,
            subtotal_cents: line.subtotal().cents(),
            notes: line.notes().map(str::to_string),
            created_at,
        }
    }

    /// Rebuilds the pricing mode from the stored columns.
    pub fn pricing(&self) -> Option<Pricing> {
        match (
            self.unit_price_cents,
            self.weight_grams,
            self.price_per_gram_millicents,
        ) {
            (Some(unit_price), None, None) => Some(Pricing::Unit {
                quantity: self.quantity,
                unit_price: Money::from_cents(unit_price),
            }),
            (None, Some(grams), Some(rate)) => Some(Pricing::Weighed {
                weight: Weight::from_grams(grams),
                price_per_gram: GramRate::from_millicents(rate),
            }),
            _ => None,
        }
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Cash Register
// =============================================================================

/// A cash drawer session for one store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashRegister {
    pub id: String,

    #[ts(type = "number")]
    pub store: StoreScope,

    pub operator_name: Option<String>,

    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,

    /// `None` while the register is open.
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl CashRegister {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// Direction of a cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashEntryType {
    Income,
    Expense,
}

impl CashEntryType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CashEntryType::Income => "income",
            CashEntryType::Expense => "expense",
        }
    }
}

impl FromStr for CashEntryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(CashEntryType::Income),
            "expense" => Ok(CashEntryType::Expense),
            _ => Err(ValidationError::not_allowed(
                "cash entry type",
                &["income", "expense"],
            )),
        }
    }
}

/// An append-only ledger line on a cash register.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashEntry {
    pub id: String,
    pub register_id: String,
    pub entry_type: CashEntryType,
    pub amount_cents: i64,
    pub description: String,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashEntry {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Ledger description tying a cash entry back to its table and sale.
pub fn sale_entry_description(table_number: i64, sale_number: i64) -> String {
    format!("Table #{} - Sale #{}", table_number, sale_number)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table(status: TableStatus, current_sale_id: Option<&str>) -> Table {
        Table {
            id: "t-1".to_string(),
            store: StoreScope::Store1,
            number: 1,
            name: "Table 1".to_string(),
            capacity: 4,
            status,
            location: None,
            is_active: true,
            current_sale_id: current_sale_id.map(str::to_string),
            current_sale: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_store_scope_parsing() {
        assert_eq!("1".parse::<StoreScope>().unwrap(), StoreScope::Store1);
        assert_eq!("store2".parse::<StoreScope>().unwrap(), StoreScope::Store2);
        assert!("3".parse::<StoreScope>().is_err());
        assert!("downtown".parse::<StoreScope>().is_err());
        assert_eq!(StoreScope::Store2.to_string(), "store2");
    }

    #[test]
    fn test_store_scope_serializes_as_number() {
        assert_eq!(serde_json::to_string(&StoreScope::Store2).unwrap(), "2");
        let scope: StoreScope = serde_json::from_str("1").unwrap();
        assert_eq!(scope, StoreScope::Store1);
        assert!(serde_json::from_str::<StoreScope>("7").is_err());
    }

    #[test]
    fn test_table_status_round_trips_through_str() {
        for status in TableStatus::ALL {
            assert_eq!(status.as_str().parse::<TableStatus>().unwrap(), status);
        }
        assert!("closed".parse::<TableStatus>().is_err());
    }

    #[test]
    fn test_table_status_rules() {
        assert!(TableStatus::Free.can_open());
        assert!(!TableStatus::Occupied.can_open());
        assert!(TableStatus::AwaitingPayment.can_release());
        assert!(TableStatus::Cleaning.can_release());
        assert!(!TableStatus::Occupied.can_release());
        assert!(!TableStatus::Free.can_release());
    }

    #[test]
    fn test_ensure_status() {
        let t = table(TableStatus::Occupied, Some("s-1"));
        assert!(t.ensure_status(&[TableStatus::Occupied]).is_ok());

        let err = t.ensure_status(&TableStatus::RELEASABLE).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Table t-1 is occupied, expected one of: awaiting_payment, cleaning"
        );
    }

    #[test]
    fn test_table_consistency() {
        assert!(table(TableStatus::Free, None).is_consistent());
        assert!(table(TableStatus::Occupied, Some("s-1")).is_consistent());
        assert!(!table(TableStatus::Occupied, None).is_consistent());
        assert!(!table(TableStatus::AwaitingPayment, Some("s-1")).is_consistent());
    }

    #[test]
    fn test_payment_method() {
        assert_eq!("PIX".parse::<PaymentMethod>().unwrap(), PaymentMethod::Pix);
        assert!("cheque".parse::<PaymentMethod>().is_err());
        assert!(PaymentMethod::Cash.is_cash_bearing());
        assert!(PaymentMethod::Mixed.is_cash_bearing());
        assert!(!PaymentMethod::Credit.is_cash_bearing());
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Voucher).unwrap(),
            "\"voucher\""
        );
    }

    #[test]
    fn test_sale_status_default() {
        assert_eq!(SaleStatus::default(), SaleStatus::Open);
        assert_eq!("cancelled".parse::<SaleStatus>().unwrap(), SaleStatus::Cancelled);
    }

    #[test]
    fn test_entry_description() {
        assert_eq!(sale_entry_description(4, 1001), "Table #4 - Sale #1001");
    }
}
