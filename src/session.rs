//! Active-session persistence
//!
//! The front-end owns the session format. We store whatever it sends under
//! one key and hand it back at the next bootstrap.

use std::rc::Rc;

use serde_json::value::RawValue;

use crate::config::BridgeConfig;
use crate::storage::KeyValueStore;

/// Opaque serialized sessions, stored verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBlob(String);

impl SessionBlob {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The blob as embeddable JSON, bytes unchanged; `None` if it is not JSON
    pub fn to_raw(&self) -> Option<Box<RawValue>> {
        match RawValue::from_string(self.0.clone()) {
            Ok(raw) => Some(raw),
            Err(e) => {
                log::warn!("Ignoring malformed session blob: {}", e);
                None
            }
        }
    }
}

pub struct SessionStore {
    store: Rc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    pub fn new(store: Rc<dyn KeyValueStore>, config: &BridgeConfig) -> Self {
        Self {
            store,
            key: config.sessions_key(),
        }
    }

    pub fn load(&self) -> Option<SessionBlob> {
        match self.store.get(&self.key) {
            Ok(Some(raw)) => {
                log::info!("Loaded session blob ({} bytes)", raw.len());
                Some(SessionBlob(raw))
            }
            Ok(None) => {
                log::info!("No active sessions");
                None
            }
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }

    /// Overwrite the stored blob. Best effort: failures are only logged.
    pub fn save(&self, blob: &SessionBlob) {
        match self.store.set(&self.key, blob.as_str()) {
            Ok(()) => log::info!("Sessions saved"),
            Err(e) => log::warn!("Sessions not persisted: {}", e),
        }
    }

    pub fn clear(&self) {
        match self.store.remove(&self.key) {
            Ok(()) => log::info!("Sessions cleared"),
            Err(e) => log::warn!("Sessions not cleared: {}", e),
        }
    }
}
