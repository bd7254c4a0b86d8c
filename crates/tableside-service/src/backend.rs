//! # Backend
//!
//! The four store handles the workflow runs against, plus the per-call
//! timeout every remote call goes through.
//!
//! ## Mode Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Mode::Demo  ──► MemoryStore::demo()   (two tables per store, one      │
//! │                                          open register, nothing saved) │
//! │                                                                         │
//! │  Mode::Live  ──► Database::new(DbConfig) ──► SQLite repositories        │
//! │                                                                         │
//! │  The mode is chosen once, at construction. Nothing downstream asks     │
//! │  "is a store configured?".                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tableside_db::{
    CashRegisterStore, Database, DbConfig, MemoryStore, SaleItemStore, SaleStore, StoreResult,
    TableStore,
};

use crate::error::{Step, WorkflowError, WorkflowResult};

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Mode
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// In-memory demo data.
    #[default]
    Demo,
    /// SQLite database on disk.
    Live,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Demo => write!(f, "demo"),
            Mode::Live => write!(f, "live"),
        }
    }
}

impl FromStr for Mode {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "demo" => Ok(Mode::Demo),
            "live" => Ok(Mode::Live),
            other => Err(WorkflowError::Config(format!(
                "Unknown backend mode: '{}'. Valid options: demo, live",
                other
            ))),
        }
    }
}

// =============================================================================
// Backend
// =============================================================================

/// Store handles shared by the registry and the finalizer. Cheap to clone.
#[derive(Clone)]
pub struct Backend {
    mode: Mode,
    pub tables: Arc<dyn TableStore>,
    pub sales: Arc<dyn SaleStore>,
    pub items: Arc<dyn SaleItemStore>,
    pub registers: Arc<dyn CashRegisterStore>,
    call_timeout: Duration,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("mode", &self.mode)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl Backend {
    /// A fresh demo backend.
    pub fn demo() -> Self {
        Backend::memory(MemoryStore::demo())
    }

    /// A demo backend over an existing in-memory store.
    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Backend {
            mode: Mode::Demo,
            tables: store.clone(),
            sales: store.clone(),
            items: store.clone(),
            registers: store,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// A live backend over an already-open database.
    pub fn database(db: &Database) -> Self {
        Backend {
            mode: Mode::Live,
            tables: Arc::new(db.tables()),
            sales: Arc::new(db.sales()),
            items: Arc::new(db.sale_items()),
            registers: Arc::new(db.cash_registers()),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Opens (and migrates) the SQLite database and wraps it.
    pub async fn live(config: DbConfig) -> WorkflowResult<Self> {
        let path = config.database_path.display().to_string();
        let db = Database::new(config)
            .await
            .map_err(|e| WorkflowError::store(Step::Connect, path, e))?;
        Ok(Backend::database(&db))
    }

    /// Assembles a backend from arbitrary store implementations.
    pub fn from_stores(
        mode: Mode,
        tables: Arc<dyn TableStore>,
        sales: Arc<dyn SaleStore>,
        items: Arc<dyn SaleItemStore>,
        registers: Arc<dyn CashRegisterStore>,
    ) -> Self {
        Backend {
            mode,
            tables,
            sales,
            items,
            registers,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Runs one store call under the per-call timeout.
    pub(crate) async fn call<T, F>(&self, step: Step, entity_id: &str, fut: F) -> WorkflowResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        debug!(%step, entity_id, "Store call");

        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(WorkflowError::store(step, entity_id, err)),
            Err(_) => Err(WorkflowError::Timeout {
                step,
                entity_id: entity_id.to_string(),
                after_ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Logs which backend is in use.
pub(crate) fn log_backend(backend: &Backend) {
    info!(
        mode = %backend.mode,
        call_timeout_ms = backend.call_timeout.as_millis() as u64,
        "Backend ready"
    );
}
