//! The storage port the record store is written against.
//!
//! Each table is one named UTF-8 JSON document. The store only ever asks for
//! a whole document by key and writes a whole document back, so any medium
//! that can do that (LMDB, a browser's `localStorage`, a plain map) can back
//! it. [`MemoryStorage`] is the in-process implementation used by tests and
//! by callers that do not need durability.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::app_response::AppResponse;

/// Synchronous named-document storage.
pub trait KeyValueStore {
    /// Returns the document stored under `key`, or `None` if it was never written.
    fn get(&self, key: &str) -> Result<Option<String>, AppResponse>;

    /// Replaces the document stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), AppResponse>;

    /// Deletes `key`. Returns `true` if something was removed.
    fn remove(&self, key: &str) -> Result<bool, AppResponse>;

    /// Deletes every document.
    fn clear(&self) -> Result<(), AppResponse>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>, AppResponse> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, AppResponse> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), AppResponse> {
        (**self).clear()
    }
}

/// In-memory [`KeyValueStore`]. Not `Sync`; one owner at a time.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AppResponse> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, AppResponse> {
        Ok(self.entries.borrow_mut().remove(key).is_some())
    }

    fn clear(&self) -> Result<(), AppResponse> {
        self.entries.borrow_mut().clear();
        Ok(())
    }
}
