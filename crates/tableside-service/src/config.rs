//! # Tableside Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TABLESIDE_MODE=live                                                │
//! │     TABLESIDE_STORE=2                                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tableside/tableside.toml (Linux)                         │
//! │     ~/Library/Application Support/com.tableside.tableside/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     demo mode, store 1, 5s call timeout                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [backend]
//! mode = "live"                  # demo | live
//! database_path = "/var/lib/tableside/tableside.db"
//!
//! [store]
//! scope = 1                      # 1 | 2
//! operator_name = "Ana"
//!
//! [workflow]
//! call_timeout_ms = 5000
//! post_sale_status = "awaiting_payment"   # awaiting_payment | cleaning
//! cash_entry = "always"                   # always | cash_bearing_only
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tableside_core::validation::validate_operator_name;
use tableside_core::StoreScope;
use tableside_db::DbConfig;

use crate::backend::{log_backend, Backend, Mode};
use crate::error::{WorkflowError, WorkflowResult};
use crate::finalize::{CashEntryPolicy, FinalizationPolicy, PostSaleStatus};

const CONFIG_FILE: &str = "tableside.toml";
const DATABASE_FILE: &str = "tableside.db";

// =============================================================================
// Sections
// =============================================================================

/// Which backend serves the store calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub mode: Mode,

    /// SQLite file for live mode. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// The store this terminal works for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_scope")]
    pub scope: StoreScope,

    /// Recorded on every sale opened from this terminal.
    #[serde(default = "default_operator_name")]
    pub operator_name: String,
}

fn default_scope() -> StoreScope {
    StoreScope::Store1
}

fn default_operator_name() -> String {
    "Operator".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            scope: default_scope(),
            operator_name: default_operator_name(),
        }
    }
}

/// Finalization behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default)]
    pub post_sale_status: PostSaleStatus,

    #[serde(default)]
    pub cash_entry: CashEntryPolicy,
}

fn default_call_timeout_ms() -> u64 {
    5000
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        WorkflowSettings {
            call_timeout_ms: default_call_timeout_ms(),
            post_sale_status: PostSaleStatus::default(),
            cash_entry: CashEntryPolicy::default(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablesideConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub workflow: WorkflowSettings,
}

impl TablesideConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (an explicit path must exist)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> WorkflowResult<Self> {
        let explicit = config_path.is_some();
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    WorkflowError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                config = Self::from_toml(&contents)?;
            } else if explicit {
                return Err(WorkflowError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing sections fall back to defaults.
    pub fn from_toml(contents: &str) -> WorkflowResult<Self> {
        toml::from_str(contents).map_err(|e| WorkflowError::Config(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.workflow.call_timeout_ms == 0 {
            return Err(WorkflowError::Config(
                "call_timeout_ms must be greater than 0".into(),
            ));
        }

        validate_operator_name(&self.store.operator_name)
            .map_err(|e| WorkflowError::Config(e.to_string()))?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `TABLESIDE_*` overrides from `lookup`. Unparseable values are
    /// logged and ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(mode) = lookup("TABLESIDE_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding backend mode from environment");
                    self.backend.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown backend mode in environment"),
            }
        }

        if let Some(path) = lookup("TABLESIDE_DB_PATH") {
            self.backend.database_path = Some(PathBuf::from(path));
        }

        if let Some(store) = lookup("TABLESIDE_STORE") {
            match store.parse() {
                Ok(scope) => self.store.scope = scope,
                Err(_) => warn!(store = %store, "Unknown store in environment"),
            }
        }

        if let Some(operator) = lookup("TABLESIDE_OPERATOR") {
            self.store.operator_name = operator;
        }

        if let Some(timeout) = lookup("TABLESIDE_CALL_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.workflow.call_timeout_ms = ms,
                Err(_) => warn!(timeout = %timeout, "Invalid call timeout in environment"),
            }
        }

        if let Some(status) = lookup("TABLESIDE_POST_SALE_STATUS") {
            match status.parse() {
                Ok(parsed) => self.workflow.post_sale_status = parsed,
                Err(_) => warn!(status = %status, "Unknown post-sale status in environment"),
            }
        }

        if let Some(policy) = lookup("TABLESIDE_CASH_ENTRY") {
            match policy.parse() {
                Ok(parsed) => self.workflow.cash_entry = parsed,
                Err(_) => warn!(policy = %policy, "Unknown cash entry policy in environment"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "tableside", "tableside")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn scope(&self) -> StoreScope {
        self.store.scope
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.workflow.call_timeout_ms)
    }

    pub fn policy(&self) -> FinalizationPolicy {
        FinalizationPolicy {
            post_sale_status: self.workflow.post_sale_status,
            cash_entry: self.workflow.cash_entry,
        }
    }

    /// The live database file: configured path, else the platform data dir,
    /// else the working directory.
    pub fn database_path(&self) -> PathBuf {
        self.backend
            .database_path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join(DATABASE_FILE)))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE))
    }

    /// Builds the backend this configuration selects.
    pub async fn connect(&self) -> WorkflowResult<Backend> {
        let backend = match self.backend.mode {
            Mode::Demo => Backend::demo(),
            Mode::Live => {
                let path = self.database_path();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        WorkflowError::Config(format!("cannot create {}: {}", parent.display(), e))
                    })?;
                }
                Backend::live(DbConfig::new(path)).await?
            }
        }
        .with_call_timeout(self.call_timeout());

        log_backend(&backend);
        Ok(backend)
    }
}
