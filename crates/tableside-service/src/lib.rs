//! # tableside-service: Table Sales Workflow
//!
//! Opening tables, building carts, and finalizing sales against the stores in
//! `tableside-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tableside Data Flow                              │
//! │                                                                         │
//! │  tableside (terminal CLI)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               tableside-service (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   TableRegistry ──open_table──► SaleSession ──► Finalizer      │   │
//! │  │         │                        (cart)            │            │   │
//! │  │         └──────────────┬───────────────────────────┘            │   │
//! │  │                        ▼                                        │   │
//! │  │              Backend (per-call timeout)                         │   │
//! │  └────────────────────────┼────────────────────────────────────────┘   │
//! │                           ▼                                             │
//! │            MemoryStore (demo) │ SQLite repositories (live)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`registry`] - Table listing and status transitions
//! - [`session`] - Sale-editing session holding the cart
//! - [`finalize`] - The finalization saga
//! - [`backend`] - Store handles and call timeouts
//! - [`config`] - TOML and environment configuration
//! - [`error`] - Workflow error types

pub mod backend;
pub mod config;
pub mod error;
pub mod finalize;
pub mod registry;
pub mod session;

#[cfg(test)]
mod testing;

pub use backend::{Backend, Mode, DEFAULT_CALL_TIMEOUT};
pub use config::TablesideConfig;
pub use error::{Stage, Step, WorkflowError, WorkflowResult};
pub use finalize::{
    CashEntryPolicy, Checkout, FinalizationPolicy, FinalizeOutcome, FinalizeWarning, Finalizer,
    PostSaleStatus,
};
pub use registry::TableRegistry;
pub use session::SaleSession;

// Cancellation handle accepted by `Finalizer::finalize`.
pub use tokio_util::sync::CancellationToken;
