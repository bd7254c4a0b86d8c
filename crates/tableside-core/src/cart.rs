//! # Cart Engine
//!
//! The in-memory, pre-commit list of lines for the sale being edited.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Operator Action          Cart Method             Effect                │
//! │  ───────────────          ───────────             ──────                │
//! │                                                                         │
//! │  Add dish / weigh plate ──► add_item(spec) ──────► lines.push(line)     │
//! │                                                                         │
//! │  Change quantity ─────────► update_quantity(i, n) ► recompute line i    │
//! │                             (n ≤ 0 behaves as remove_item(i))           │
//! │                                                                         │
//! │  Remove line ─────────────► remove_item(i) ──────► lines.remove(i)      │
//! │                                                                         │
//! │  Close sale ──────────────► total() ─────────────► Σ line subtotals     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines keep insertion order; adding the same product twice adds two lines
//! - Each line has exactly one pricing mode
//! - A line's subtotal is derived from its pricing and never set directly

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{GramRate, Money, Weight};
use crate::validation::{
    validate_cart_size, validate_gram_rate, validate_product_code, validate_product_name,
    validate_quantity, validate_unit_price, validate_weight,
};

// =============================================================================
// Pricing
// =============================================================================

/// How a line is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pricing {
    /// `quantity × unit_price`
    Unit { quantity: i64, unit_price: Money },
    /// `weight_kg × 1000 × price_per_gram`
    Weighed {
        weight: Weight,
        price_per_gram: GramRate,
    },
}

impl Pricing {
    /// The line subtotal this pricing yields.
    pub fn subtotal(&self) -> Money {
        match self {
            Pricing::Unit {
                quantity,
                unit_price,
            } => unit_price.multiply_quantity(*quantity),
            Pricing::Weighed {
                weight,
                price_per_gram,
            } => price_per_gram.price(*weight),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Pricing::Unit {
                quantity,
                unit_price,
            } => {
                validate_quantity(*quantity)?;
                validate_unit_price(*unit_price)
            }
            Pricing::Weighed {
                weight,
                price_per_gram,
            } => {
                validate_weight(*weight)?;
                validate_gram_rate(*price_per_gram)
            }
        }
    }
}

// =============================================================================
// Item Spec
// =============================================================================

/// What the operator asked to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub product_code: String,
    pub product_name: String,
    pub pricing: Pricing,
    pub notes: Option<String>,
}

impl ItemSpec {
    /// A unit-priced line.
    pub fn unit(
        product_code: impl Into<String>,
        product_name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        ItemSpec {
            product_code: product_code.into(),
            product_name: product_name.into(),
            pricing: Pricing::Unit {
                quantity,
                unit_price,
            },
            notes: None,
        }
    }

    /// A weighed line.
    pub fn weighed(
        product_code: impl Into<String>,
        product_name: impl Into<String>,
        weight: Weight,
        price_per_gram: GramRate,
    ) -> Self {
        ItemSpec {
            product_code: product_code.into(),
            product_name: product_name.into(),
            pricing: Pricing::Weighed {
                weight,
                price_per_gram,
            },
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// A validated cart line.
///
/// Fields are private so the subtotal can only change through
/// [`Cart::update_quantity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct LineItem {
    product_code: String,
    product_name: String,
    pricing: Pricing,
    subtotal: Money,
    notes: Option<String>,
}

impl LineItem {
    /// Validates a spec and prices it.
    ///
    /// ## Rules
    /// - product code and name must be non-blank
    /// - unit lines: `1 ≤ quantity ≤ MAX_ITEM_QUANTITY`,
    ///   `1 ≤ unit_price ≤ MAX_UNIT_PRICE_CENTS`
    /// - weighed lines: `1 ≤ weight ≤ MAX_WEIGHT_GRAMS`,
    ///   `1 ≤ price_per_gram ≤ MAX_PRICE_PER_KG_CENTS`
    pub fn new(spec: ItemSpec) -> Result<Self, ValidationError> {
        validate_product_code(&spec.product_code)?;
        validate_product_name(&spec.product_name)?;
        spec.pricing.validate()?;

        let notes = spec
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(LineItem {
            product_code: spec.product_code.trim().to_string(),
            product_name: spec.product_name.trim().to_string(),
            subtotal: spec.pricing.subtotal(),
            pricing: spec.pricing,
            notes,
        })
    }

    pub fn product_code(&self) -> &str {
        &self.product_code
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Unit quantity; weighed lines always count as one.
    pub fn quantity(&self) -> i64 {
        match self.pricing {
            Pricing::Unit { quantity, .. } => quantity,
            Pricing::Weighed { .. } => 1,
        }
    }

    fn set_quantity(&mut self, new_qty: i64) {
        // Weighed lines keep their weight.
        if let Pricing::Unit { quantity, .. } = &mut self.pricing {
            *quantity = new_qty;
        }
        self.subtotal = self.pricing.subtotal();
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The cart for one sale-editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart { items: Vec::new() }
    }

    /// Validates and appends a line, returning its index.
    ///
    /// ## Example
    /// ```rust
    /// use tableside_core::cart::{Cart, ItemSpec};
    /// use tableside_core::money::Money;
    ///
    /// let mut cart = Cart::new();
    /// let idx = cart.add_item(ItemSpec::unit("SODA", "Soda", 2, Money::from_cents(600))).unwrap();
    /// assert_eq!(idx, 0);
    /// assert_eq!(cart.total().cents(), 1200);
    /// ```
    pub fn add_item(&mut self, spec: ItemSpec) -> CoreResult<usize> {
        if validate_cart_size(self.items.len()).is_err() {
            return Err(CoreError::CartTooLarge {
                max: crate::MAX_CART_ITEMS,
            });
        }

        let line = LineItem::new(spec)?;
        self.items.push(line);
        Ok(self.items.len() - 1)
    }

    /// Changes the quantity of the line at `index`.
    ///
    /// ## Behavior
    /// - `new_qty ≤ 0`: removes the line
    /// - unit lines: subtotal becomes `new_qty × unit_price`
    /// - weighed lines: weight and subtotal are unchanged
    pub fn update_quantity(&mut self, index: usize, new_qty: i64) -> CoreResult<()> {
        self.check_index(index)?;

        if new_qty <= 0 {
            self.items.remove(index);
            return Ok(());
        }

        validate_quantity(new_qty)?;
        self.items[index].set_quantity(new_qty);
        Ok(())
    }

    /// Removes and returns the line at `index`; later lines shift down.
    pub fn remove_item(&mut self, index: usize) -> CoreResult<LineItem> {
        self.check_index(index)?;
        Ok(self.items.remove(index))
    }

    /// Sum of all line subtotals.
    pub fn total(&self) -> Money {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&LineItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn check_index(&self, index: usize) -> Result<(), ValidationError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(ValidationError::OutOfRange {
                field: "item index".to_string(),
                min: 0,
                max: self.items.len() as i64 - 1,
            })
        }
    }
}
