//! Durable key-value store abstraction
//!
//! The registry and session store only talk to [`KeyValueStore`]. In the
//! browser that is LocalStorage (see `platform::LocalStorage`); everywhere
//! else, and in tests, it is [`MemoryStore`].

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::error::StoreError;

/// Synchronous, string-keyed store with LocalStorage semantics.
///
/// Methods take `&self` because the browser store is a shared handle;
/// implementations use interior mutability.
pub trait KeyValueStore {
    /// Get a value, `Ok(None)` if the key is absent
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store
///
/// Optionally enforces a byte quota (sum of key and value lengths) so that
/// write failures can be reproduced outside a browser.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<BTreeMap<String, String>>,
    quota: Option<usize>,
    writes: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once `bytes` would be exceeded
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Build a store from a `{ key: value }` snapshot
    pub fn from_snapshot(snapshot: BTreeMap<String, String>) -> Self {
        Self {
            items: RefCell::new(snapshot),
            ..Self::default()
        }
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.items.borrow().clone()
    }

    /// Number of successful `set`/`remove` calls that changed a key
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.borrow().contains_key(key)
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.items
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > quota {
                return Err(StoreError::Write {
                    key: key.to_string(),
                    reason: format!("quota exceeded ({} > {} bytes)", needed, quota),
                });
            }
        }
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.items.borrow_mut().remove(key).is_some() {
            self.writes.set(self.writes.get() + 1);
        }
        Ok(())
    }
}

/// Store whose reads always fail, wrapping a [`MemoryStore`] for writes
#[cfg(test)]
pub(crate) struct UnreadableStore {
    pub inner: MemoryStore,
}

#[cfg(test)]
impl KeyValueStore for UnreadableStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Read {
            key: key.to_string(),
            reason: "SecurityError".to_string(),
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}
