//! # tableside-core: Pure Business Logic for Tableside
//!
//! This crate holds the table-sale domain as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tableside Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Floor UI / terminal (external)                  │   │
//! │  │    Table grid ──► Open table ──► Cart ──► Close sale            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            tableside-service (registry + finalization)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ tableside-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │  status   │  │   │
//! │  │   │  Table    │  │   Money   │  │   Cart    │  │  badges   │  │   │
//! │  │   │   Sale    │  │ GramRate  │  │ LineItem  │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Table, Sale, SaleItem, CashEntry, ...)
//! - [`money`] - Integer money, weights and per-gram rates
//! - [`cart`] - The in-memory cart engine
//! - [`status`] - Status label/tone mapping for presentation layers
//! - [`validation`] - Input validation rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tableside_core::cart::{Cart, ItemSpec};
//! use tableside_core::money::{GramRate, Money, Weight};
//!
//! let mut cart = Cart::new();
//! cart.add_item(ItemSpec::unit("ACAI-500", "Acai 500ml", 2, Money::from_cents(1000))).unwrap();
//! cart.add_item(ItemSpec::weighed(
//!     "BUFFET",
//!     "Buffet per kilo",
//!     Weight::from_grams(500),
//!     GramRate::from_price_per_kg(Money::from_cents(5990)),
//! )).unwrap();
//!
//! // 2 × 10.00 + 0.5 kg × 59.90/kg
//! assert_eq!(cart.total().cents(), 2000 + 2995);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, ItemSpec, LineItem};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{GramRate, Money, Weight};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
///
/// ## Business Reason
/// Keeps a table's tab at a size the floor staff can still review.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single unit-priced line.
///
/// ## Business Reason
/// Catches fat-finger entries (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum unit price, in cents (R$ 100,000.00).
///
/// ## Business Reason
/// No dish costs more than this; anything above is a keying error. Together
/// with the quantity and cart limits it keeps every total well inside i64.
pub const MAX_UNIT_PRICE_CENTS: i64 = 10_000_000;

/// Maximum scale reading on a weighed line, in grams (100 kg).
pub const MAX_WEIGHT_GRAMS: i64 = 100_000;

/// Maximum per-kilo price on a weighed line, in cents (R$ 100,000.00/kg).
pub const MAX_PRICE_PER_KG_CENTS: i64 = 10_000_000;

/// Customer count recorded when a table is opened.
pub const DEFAULT_CUSTOMER_COUNT: i64 = 1;
