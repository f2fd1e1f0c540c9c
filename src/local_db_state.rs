//! LMDB-backed storage medium.
//!
//! [`AppDbState`] owns one LMDB environment with a single unnamed database.
//! Every table of the record store is a single key in that database whose
//! value is the table's JSON text, so each [`KeyValueStore::set`] is one
//! committed write transaction.

use std::fs;
use std::path::{Path, PathBuf};

use lmdb::{Database, DatabaseFlags, Environment, Error as LmdbError, Transaction, WriteFlags};
use log::{debug, info, warn};

use crate::app_response::AppResponse;
use crate::storage::KeyValueStore;
use crate::store_config::StoreConfig;

pub struct AppDbState {
    env: Option<Environment>,
    db: Database,
    path: PathBuf,
}

impl AppDbState {
    /// Opens (creating if needed) `<name>.lmdb` with default settings.
    pub fn init(name: String) -> Result<Self, AppResponse> {
        Self::open(&StoreConfig::with_path(name))
    }

    /// Opens the environment described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, AppResponse> {
        config.validate()?;

        let path = PathBuf::from(config.lmdb_dir());
        if !path.exists() {
            info!("Creating LMDB directory at: {}", path.display());
            fs::create_dir_all(&path)?;
        }

        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(config.map_size)
            .open(&path)?;
        let db = env.create_db(None, DatabaseFlags::empty())?;

        info!("LMDB environment opened at: {}", path.display());

        Ok(Self {
            env: Some(env),
            db,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.env.is_some()
    }

    /// Flushes and releases the environment. Later calls fail with
    /// `DatabaseError`; closing twice is allowed.
    pub fn close_database(&mut self) -> Result<(), AppResponse> {
        match self.env.take() {
            Some(env) => {
                if let Err(e) = env.sync(true) {
                    warn!("Sync before close failed: {e}");
                }
                drop(env);
                info!("LMDB environment closed: {}", self.path.display());
                Ok(())
            }
            None => {
                debug!("close_database called on an already closed environment");
                Ok(())
            }
        }
    }

    fn env(&self) -> Result<&Environment, AppResponse> {
        self.env
            .as_ref()
            .ok_or_else(|| AppResponse::DatabaseError("Database is closed".to_string()))
    }
}

impl KeyValueStore for AppDbState {
    fn get(&self, key: &str) -> Result<Option<String>, AppResponse> {
        let env = self.env()?;
        let txn = env.begin_ro_txn()?;

        let value = match txn.get(self.db, &key) {
            Ok(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Some(text.to_owned()),
                Err(e) => {
                    return Err(AppResponse::SerializationError(format!(
                        "Invalid UTF-8 stored under '{key}': {e}"
                    )))
                }
            },
            Err(LmdbError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        txn.commit()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        let env = self.env()?;
        let mut txn = env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        debug!("Wrote {} bytes under '{}'", value.len(), key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, AppResponse> {
        let env = self.env()?;
        let mut txn = env.begin_rw_txn()?;
        match txn.del(self.db, &key, None) {
            Ok(()) => {
                txn.commit()?;
                Ok(true)
            }
            Err(LmdbError::NotFound) => {
                txn.abort();
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), AppResponse> {
        let env = self.env()?;
        let mut txn = env.begin_rw_txn()?;
        txn.clear_db(self.db)?;
        txn.commit()?;
        info!("All documents cleared from {}", self.path.display());
        Ok(())
    }
}
