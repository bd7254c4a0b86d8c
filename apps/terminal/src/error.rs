//! # Terminal Error Handling
//!
//! Every failed command prints one JSON object:
//! ```json
//! {
//!   "code": "PARTIAL_COMMIT",
//!   "message": "Partial commit of 7c1e...: completed sale_persisted, ...",
//!   "completed": "sale_persisted"
//! }
//! ```

use serde::Serialize;

use tableside_core::CoreError;
use tableside_db::StoreError;
use tableside_service::{Stage, WorkflowError};

/// Error printed when a command fails.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    pub code: ErrorCode,
    pub message: String,

    /// Last committed finalization stage, for partial commits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad arguments or table reference
    InvalidInput,
    NotFound,
    ValidationError,
    PreconditionFailed,
    RemoteWriteFailed,
    PartialCommit,
    Timeout,
    AlreadyInProgress,
    Cancelled,
    ConfigError,
    DatabaseError,
    Internal,
}

impl CliError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
            completed: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::Internal, message)
    }

    pub fn table_not_found(reference: &str) -> Self {
        CliError::new(ErrorCode::NotFound, format!("Table not found: {}", reference))
    }
}

impl From<WorkflowError> for CliError {
    fn from(err: WorkflowError) -> Self {
        let code = match &err {
            WorkflowError::Validation(_) => ErrorCode::ValidationError,
            WorkflowError::Precondition { .. } => ErrorCode::PreconditionFailed,
            WorkflowError::RemoteWrite { .. } => ErrorCode::RemoteWriteFailed,
            WorkflowError::PartialCommit { .. } => ErrorCode::PartialCommit,
            WorkflowError::Timeout { .. } => ErrorCode::Timeout,
            WorkflowError::AlreadyInProgress { .. } => ErrorCode::AlreadyInProgress,
            WorkflowError::Cancelled { .. } => ErrorCode::Cancelled,
            WorkflowError::Config(_) => ErrorCode::ConfigError,
        };

        CliError {
            code,
            message: err.to_string(),
            completed: err.committed_stage(),
        }
    }
}

/// Cart edits fail with core errors before any store call.
impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        CliError::from(WorkflowError::from(err))
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        CliError::new(ErrorCode::DatabaseError, err.to_string())
    }
}
