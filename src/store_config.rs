//! Runtime configuration for opening a record store.

use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

/// Default LMDB map size: 10 MiB is far more than a client's tables need.
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024;

/// Number of history entries kept, newest first.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Options for [`AppDbState`](crate::local_db_state::AppDbState) and
/// [`RecordStore`](crate::record_store::RecordStore).
///
/// Every field has a default, so `{}` and a partial JSON document are both
/// valid input to [`StoreConfig::from_json`].
///
/// ```json
/// { "path": "quickhelp", "history_limit": 50, "seed_defaults": false }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base name of the database; the LMDB directory is `<path>.lmdb`.
    pub path: String,

    /// Maximum size of the LMDB memory map in bytes.
    pub map_size: usize,

    /// Maximum number of entries kept in `services_history`.
    pub history_limit: usize,

    /// Whether first-time initialization writes the example accounts.
    pub seed_defaults: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "quickhelp".to_string(),
            map_size: DEFAULT_MAP_SIZE,
            history_limit: DEFAULT_HISTORY_LIMIT,
            seed_defaults: true,
        }
    }
}

impl StoreConfig {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, AppResponse> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppResponse> {
        if self.path.trim().is_empty() {
            return Err(AppResponse::ValidationError(
                "Database path cannot be empty".to_string(),
            ));
        }
        if self.map_size == 0 {
            return Err(AppResponse::ValidationError(
                "map_size must be greater than zero".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(AppResponse::ValidationError(
                "history_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory the LMDB environment lives in.
    pub fn lmdb_dir(&self) -> String {
        format!("{}.lmdb", self.path)
    }
}
