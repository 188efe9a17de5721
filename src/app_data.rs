//! Pending app-registration records
//!
//! Persisted to LocalStorage as one JSON array. Records older than the
//! expiry window are pruned at bootstrap; the front-end adds records with
//! `saveAppData` and drops them with `deleteAppData`.

use std::rc::Rc;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{BridgeConfig, SavePolicy};
use crate::error::{BridgeError, BridgeResult, StoreError};
use crate::storage::KeyValueStore;

/// Ordered collection of records, insertion order preserved
pub type AppDataCollection = Vec<AppDataRecord>;

/// A single OAuth client-registration attempt
///
/// Only `uuid` and `createdAt` are interpreted. Every other field (client
/// id/secret, server, ...) is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDataRecord {
    /// Identity of the registration attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Seconds since the Unix epoch, stamped on save
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: i64,
    /// Opaque registration payload
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl AppDataRecord {
    /// Create a record with an empty payload
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            created_at: 0,
            payload: Map::new(),
        }
    }

    /// Add a payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Parse the JSON text of a `saveAppData` message
    ///
    /// The message must be an object with a string `uuid`. Any `createdAt`
    /// it carries is discarded; the registry stamps its own.
    pub fn from_message(json: &str) -> BridgeResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| BridgeError::MalformedMessage(format!("saveAppData: {}", e)))?;
        let Value::Object(mut fields) = value else {
            return Err(BridgeError::MalformedMessage(
                "saveAppData: expected a JSON object".to_string(),
            ));
        };
        if !matches!(fields.get("uuid"), Some(Value::String(_))) {
            return Err(BridgeError::MalformedMessage(
                "saveAppData: missing string uuid".to_string(),
            ));
        }
        fields.remove("createdAt");
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| BridgeError::MalformedMessage(format!("saveAppData: {}", e)))
    }

    pub fn has_uuid(&self, uuid: &str) -> bool {
        self.uuid.as_deref() == Some(uuid)
    }

    /// Age in seconds at `now`; negative if created in the future
    pub fn age(&self, now: i64) -> i64 {
        now.saturating_sub(self.created_at)
    }

    pub fn is_expired(&self, now: i64, window: i64) -> bool {
        self.age(now) >= window
    }
}

/// Records still younger than `window` at `now`, order preserved
pub fn prune_expired(collection: &[AppDataRecord], now: i64, window: i64) -> AppDataCollection {
    collection
        .iter()
        .filter(|record| !record.is_expired(now, window))
        .cloned()
        .collect()
}

/// Where a loaded collection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Neither key present
    Absent,
    /// The collection key
    Current,
    /// The single-record key of the oldest client
    Legacy,
    /// A key was present but did not parse
    Malformed,
}

impl Origin {
    /// Whether the on-disk state should be rewritten even if nothing was pruned
    pub fn needs_rewrite(&self) -> bool {
        matches!(self, Origin::Legacy | Origin::Malformed)
    }
}

/// Lifecycle manager for the persisted app-data collection
pub struct AppDataRegistry {
    store: Rc<dyn KeyValueStore>,
    key: String,
    legacy_key: String,
    expiry_window: i64,
    policy: SavePolicy,
}

impl AppDataRegistry {
    pub fn new(store: Rc<dyn KeyValueStore>, config: &BridgeConfig) -> Self {
        Self {
            store,
            key: config.app_datas_key(),
            legacy_key: config.legacy_app_data_key(),
            expiry_window: config.expiry_window_secs,
            policy: config.save_policy,
        }
    }

    pub fn expiry_window(&self) -> i64 {
        self.expiry_window
    }

    /// Load the persisted collection. Missing or malformed data yields an
    /// empty collection.
    pub fn load(&self) -> AppDataCollection {
        self.load_with_origin().0
    }

    /// Load the persisted collection and report which key it came from.
    /// A store read failure is logged and treated as absent.
    pub fn load_with_origin(&self) -> (AppDataCollection, Origin) {
        match self.try_load_with_origin() {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("{}", e);
                (Vec::new(), Origin::Absent)
            }
        }
    }

    /// Like [`Self::load_with_origin`] but reports store read failures, so
    /// callers holding an in-memory copy can keep it instead.
    pub fn try_load_with_origin(&self) -> Result<(AppDataCollection, Origin), StoreError> {
        if let Some(json) = self.store.get(&self.key)? {
            return Ok(match serde_json::from_str::<Value>(&json) {
                Ok(Value::Array(items)) => {
                    let records = records_from_array(items, &self.key);
                    log::info!("Loaded {} app data records", records.len());
                    (records, Origin::Current)
                }
                Ok(_) => {
                    log::warn!("Ignoring app data in {}: not a JSON array", self.key);
                    (Vec::new(), Origin::Malformed)
                }
                Err(e) => {
                    log::warn!("Ignoring malformed app data in {}: {}", self.key, e);
                    (Vec::new(), Origin::Malformed)
                }
            });
        }

        let Some(json) = self.store.get(&self.legacy_key)? else {
            log::info!("No app data found, starting fresh");
            return Ok((Vec::new(), Origin::Absent));
        };

        Ok(match parse_legacy(&json, &self.legacy_key) {
            Ok(records) => {
                log::info!(
                    "Loaded {} app data records from legacy key {}",
                    records.len(),
                    self.legacy_key
                );
                (records, Origin::Legacy)
            }
            Err(e) => {
                log::warn!("Ignoring malformed app data in {}: {}", self.legacy_key, e);
                (Vec::new(), Origin::Malformed)
            }
        })
    }

    /// Write `pruned` back if it is shorter than `original`.
    /// Returns whether a write was attempted.
    pub fn persist_if_changed(&self, original: &[AppDataRecord], pruned: &[AppDataRecord]) -> bool {
        if original.len() == pruned.len() {
            return false;
        }
        log::info!(
            "Pruned {} expired app data records",
            original.len().abs_diff(pruned.len())
        );
        self.write(pruned);
        true
    }

    /// Stamp `payload` with `now`, append it and persist the whole collection
    pub fn append(
        &self,
        collection: &[AppDataRecord],
        mut payload: AppDataRecord,
        now: i64,
    ) -> AppDataCollection {
        let mut records: AppDataCollection = match (self.policy, payload.uuid.as_deref()) {
            (SavePolicy::ReplaceByUuid, Some(uuid)) => collection
                .iter()
                .filter(|record| !record.has_uuid(uuid))
                .cloned()
                .collect(),
            _ => collection.to_vec(),
        };

        payload.created_at = now;
        records.push(payload);
        self.write(&records);
        records
    }

    /// Drop every record with `uuid`. No match is a no-op.
    pub fn remove_by_uuid(&self, collection: &[AppDataRecord], uuid: &str) -> AppDataCollection {
        let remaining: AppDataCollection = collection
            .iter()
            .filter(|record| !record.has_uuid(uuid))
            .cloned()
            .collect();

        if remaining.len() == collection.len() {
            log::debug!("No app data with uuid {}", uuid);
            return remaining;
        }

        self.write(&remaining);
        remaining
    }

    /// Overwrite the collection. Empty collections remove the key.
    /// Failures are logged; the caller's in-memory copy stays authoritative.
    pub(crate) fn write(&self, records: &[AppDataRecord]) {
        let result = if records.is_empty() {
            self.store.remove(&self.key).map_err(BridgeError::from)
        } else {
            serde_json::to_string(records)
                .map_err(BridgeError::from)
                .and_then(|json| self.store.set(&self.key, &json).map_err(BridgeError::from))
        };

        match result {
            Ok(()) => {
                log::info!("App data saved ({} records)", records.len());
                self.drop_legacy();
            }
            Err(e) => log::warn!("App data not persisted: {}", e),
        }
    }

    fn drop_legacy(&self) {
        if self.read(&self.legacy_key).is_none() {
            return;
        }
        match self.store.remove(&self.legacy_key) {
            Ok(()) => log::info!("Removed legacy key {}", self.legacy_key),
            Err(e) => log::warn!("Could not remove legacy key {}: {}", self.legacy_key, e),
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }
}

/// Deserialize each element on its own; entries that do not fit are
/// dropped without taking their neighbours with them
fn records_from_array(items: Vec<Value>, key: &str) -> AppDataCollection {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping app data entry {} in {}: {}", index, key, e);
                None
            }
        })
        .collect()
}

/// The oldest client wrote one bare record; later ones an array
fn parse_legacy(json: &str, key: &str) -> Result<AppDataCollection, serde_json::Error> {
    match serde_json::from_str::<Value>(json)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(records_from_array(items, key)),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// `createdAt` as written by any client: integer, float (truncated) or null
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(|| de::Error::custom(format!("createdAt out of range: {}", n))),
        Some(other) => Err(de::Error::custom(format!("invalid createdAt: {}", other))),
    }
}
