//! # Store Error Types
//!
//! Error types shared by every store implementation.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        MemoryStore (lock poisoned, ...)    │
//! │       │                                   │                             │
//! │       └─────────────┬─────────────────────┘                             │
//! │                     ▼                                                   │
//! │  StoreError (this module) ← one vocabulary for both backends           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  WorkflowError (service) ← adds the failed step and entity id          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found in the given store scope.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A conditional write found the row in an unexpected state.
    ///
    /// ## When This Occurs
    /// - Table status compare-and-set lost a race
    /// - Closing a sale that is no longer open
    /// - Posting to a register that was closed meanwhile
    #[error("{entity} {id} conflict: {message}")]
    Conflict {
        entity: String,
        id: String,
        message: String,
    },

    /// Constraint violation or runtime SQL error.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The backend cannot serve requests right now (pool exhausted or closed).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Internal store error.
    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        StoreError::Conflict {
            entity: entity.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    /// Returns true for a failed conditional write.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Returns true if the entity was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → StoreError::NotFound
/// sqlx::Error::Database       → StoreError::QueryFailed
/// sqlx::Error::PoolTimedOut   → StoreError::Unavailable
/// sqlx::Error::PoolClosed     → StoreError::Unavailable
/// sqlx::Error::Io             → StoreError::ConnectionFailed
/// Other                       → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => StoreError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => {
                StoreError::Unavailable("connection pool exhausted".to_string())
            }
            sqlx::Error::PoolClosed => StoreError::Unavailable("pool is closed".to_string()),
            sqlx::Error::Io(io_err) => StoreError::ConnectionFailed(io_err.to_string()),
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
