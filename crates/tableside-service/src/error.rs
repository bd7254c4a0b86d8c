//! # Workflow Error Types
//!
//! Every failure a registry or finalization call can report, with enough
//! context for the operator to know what already happened.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Workflow Error Categories                          │
//! │                                                                         │
//! │  Nothing written                  Something written                    │
//! │  ───────────────                  ─────────────────                    │
//! │  Validation                       PartialCommit { completed, step }    │
//! │  Precondition                       └── source: RemoteWrite | Timeout  │
//! │  AlreadyInProgress                              | Cancelled | ...      │
//! │  Cancelled                                                             │
//! │  RemoteWrite (first write failed)                                      │
//! │  Timeout     (outcome unknown)                                         │
//! │  Config                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use tableside_core::{CoreError, ValidationError};
use tableside_db::StoreError;

/// Result type alias for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

// =============================================================================
// Step / Stage
// =============================================================================

/// A single remote call made by the registry or the finalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Connect,
    ListTables,
    LoadTable,
    LoadSale,
    InsertSale,
    OccupyTable,
    CancelSale,
    MarkCleaning,
    ReleaseTable,
    CloseSale,
    InsertItems,
    FindRegister,
    PostCashEntry,
    TransitionTable,
}

impl Step {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Step::Connect => "connect",
            Step::ListTables => "list_tables",
            Step::LoadTable => "load_table",
            Step::LoadSale => "load_sale",
            Step::InsertSale => "insert_sale",
            Step::OccupyTable => "occupy_table",
            Step::CancelSale => "cancel_sale",
            Step::MarkCleaning => "mark_cleaning",
            Step::ReleaseTable => "release_table",
            Step::CloseSale => "close_sale",
            Step::InsertItems => "insert_items",
            Step::FindRegister => "find_register",
            Step::PostCashEntry => "post_cash_entry",
            Step::TransitionTable => "transition_table",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The last finalization stage that fully committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Priced,
    SalePersisted,
    ItemsPersisted,
    CashPosted,
    TableReleased,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Priced => "priced",
            Stage::SalePersisted => "sale_persisted",
            Stage::ItemsPersisted => "items_persisted",
            Stage::CashPosted => "cash_posted",
            Stage::TableReleased => "table_released",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Workflow Error
// =============================================================================

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input rejected before any store call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The entity is not in a state that allows the operation.
    ///
    /// ## When This Occurs
    /// - Opening a table that is not free
    /// - Finalizing a sale that is no longer open
    /// - Releasing a table that is still occupied
    #[error("Precondition failed{}: {reason}", precondition_context(.step, .entity_id))]
    Precondition {
        /// The store call that reported it, when one did.
        step: Option<Step>,
        entity_id: Option<String>,
        reason: String,
    },

    /// A store call failed before anything was committed.
    #[error("{step} failed for {entity_id}: {source}")]
    RemoteWrite {
        step: Step,
        entity_id: String,
        #[source]
        source: StoreError,
    },

    /// A later step failed after earlier writes committed. Nothing is rolled
    /// back; `completed` names what is already persisted.
    #[error("Partial commit of {entity_id}: completed {completed}, {step} failed: {source}")]
    PartialCommit {
        completed: Stage,
        step: Step,
        entity_id: String,
        #[source]
        source: Box<WorkflowError>,
    },

    /// A store call did not answer within the configured timeout.
    #[error("{step} timed out after {after_ms}ms for {entity_id}")]
    Timeout {
        step: Step,
        entity_id: String,
        after_ms: u64,
    },

    /// Another finalization of the same sale is running.
    #[error("Sale {sale_id} is already being finalized")]
    AlreadyInProgress { sale_id: String },

    /// The operator cancelled before `step` started.
    #[error("Cancelled before {step}")]
    Cancelled { step: Step },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WorkflowError {
    /// Wraps a store failure. Conflicts and missing rows are precondition
    /// failures; everything else is a failed remote write.
    pub fn store(step: Step, entity_id: impl Into<String>, err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } | StoreError::NotFound { .. } => {
                WorkflowError::Precondition {
                    step: Some(step),
                    entity_id: Some(entity_id.into()),
                    reason: err.to_string(),
                }
            }
            source => WorkflowError::RemoteWrite {
                step,
                entity_id: entity_id.into(),
                source,
            },
        }
    }

    /// A precondition failure detected without a store call.
    pub fn precondition(reason: impl Into<String>) -> Self {
        WorkflowError::Precondition {
            step: None,
            entity_id: None,
            reason: reason.into(),
        }
    }

    /// Attaches the step and entity to a precondition failure that has none.
    pub fn at(self, at_step: Step, at_entity: &str) -> Self {
        match self {
            WorkflowError::Precondition {
                step: None,
                entity_id: None,
                reason,
            } => WorkflowError::Precondition {
                step: Some(at_step),
                entity_id: Some(at_entity.to_string()),
                reason,
            },
            other => other,
        }
    }

    /// Re-labels a failure that happened after `completed` committed.
    pub fn into_partial(self, completed: Stage, step: Step, entity_id: impl Into<String>) -> Self {
        WorkflowError::PartialCommit {
            completed,
            step,
            entity_id: entity_id.into(),
            source: Box::new(self),
        }
    }

    /// The stage already persisted when this error was raised, if any.
    pub fn committed_stage(&self) -> Option<Stage> {
        match self {
            WorkflowError::PartialCommit { completed, .. } => Some(*completed),
            _ => None,
        }
    }

    /// Returns true if the workflow may have left data behind.
    pub fn is_partial(&self) -> bool {
        matches!(self, WorkflowError::PartialCommit { .. })
    }

    /// Returns true if the error is a precondition failure.
    pub fn is_precondition(&self) -> bool {
        matches!(self, WorkflowError::Precondition { .. })
    }
}

fn precondition_context(step: &Option<Step>, entity_id: &Option<String>) -> String {
    match (step, entity_id) {
        (Some(step), Some(id)) => format!(" at {} for {}", step, id),
        (Some(step), None) => format!(" at {}", step),
        (None, Some(id)) => format!(" for {}", id),
        (None, None) => String::new(),
    }
}

impl From<CoreError> for WorkflowError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => WorkflowError::Validation(v),
            CoreError::CartTooLarge { max } => WorkflowError::Validation(ValidationError::OutOfRange {
                field: "cart items".to_string(),
                min: 0,
                max: max as i64,
            }),
            other => WorkflowError::precondition(other.to_string()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_becomes_precondition() {
        let err = WorkflowError::store(
            Step::OccupyTable,
            "t-1",
            StoreError::conflict("Table", "t-1", "status is occupied"),
        );
        assert!(err.is_precondition());
        assert!(matches!(
            &err,
            WorkflowError::Precondition {
                step: Some(Step::OccupyTable),
                entity_id: Some(id),
                ..
            } if id == "t-1"
        ));
        assert!(err.to_string().starts_with("Precondition failed at occupy_table for t-1: "));
    }

    #[test]
    fn test_precondition_context_is_attached_once() {
        let err = WorkflowError::precondition("table is occupied");
        assert_eq!(err.to_string(), "Precondition failed: table is occupied");

        let err = err.at(Step::LoadTable, "t-2");
        assert_eq!(
            err.to_string(),
            "Precondition failed at load_table for t-2: table is occupied"
        );

        let err = err.at(Step::ReleaseTable, "t-9");
        assert_eq!(
            err.to_string(),
            "Precondition failed at load_table for t-2: table is occupied"
        );
    }

    #[test]
    fn test_other_store_errors_are_remote_writes() {
        let err = WorkflowError::store(
            Step::CloseSale,
            "s-1",
            StoreError::Unavailable("pool is closed".to_string()),
        );
        assert!(matches!(
            err,
            WorkflowError::RemoteWrite {
                step: Step::CloseSale,
                ..
            }
        ));
    }

    #[test]
    fn test_partial_commit_names_stage() {
        let err = WorkflowError::store(
            Step::InsertItems,
            "s-1",
            StoreError::QueryFailed("disk I/O error".to_string()),
        )
        .into_partial(Stage::SalePersisted, Step::InsertItems, "s-1");

        assert_eq!(err.committed_stage(), Some(Stage::SalePersisted));
        assert_eq!(
            err.to_string(),
            "Partial commit of s-1: completed sale_persisted, insert_items failed: \
             insert_items failed for s-1: Query failed: disk I/O error"
        );
    }

    #[test]
    fn test_core_errors_map() {
        let err: WorkflowError = CoreError::CartTooLarge { max: 100 }.into();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let err: WorkflowError = CoreError::InvalidSaleStatus {
            sale_id: "s-1".to_string(),
            current_status: "closed".to_string(),
        }
        .into();
        assert!(err.is_precondition());
    }
}
