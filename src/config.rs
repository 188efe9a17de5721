//! Bridge configuration
//!
//! Built in code at startup. Nothing here is read back from storage.

use crate::consts;

/// What `saveAppData` does when a record with the same uuid already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePolicy {
    /// Always append; duplicate uuids may coexist
    #[default]
    Append,
    /// Drop existing records with the same uuid, then append
    ReplaceByUuid,
}

impl SavePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavePolicy::Append => "append",
            SavePolicy::ReplaceByUuid => "replace",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "append" => Some(SavePolicy::Append),
            "replace" | "replace_by_uuid" | "dedup" => Some(SavePolicy::ReplaceByUuid),
            _ => None,
        }
    }
}

/// Storage layout and lifecycle parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Namespace prepended to every storage key
    pub key_prefix: String,
    /// Maximum age (seconds) of a pending app-data record
    pub expiry_window_secs: i64,
    /// Bound of the inbound port queue
    pub inbox_capacity: usize,
    /// Dedup behavior of `saveAppData`
    pub save_policy: SavePolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            key_prefix: consts::KEY_PREFIX.to_string(),
            expiry_window_secs: consts::APP_DATA_EXPIRY_SECS,
            inbox_capacity: consts::INBOX_CAPACITY,
            save_policy: SavePolicy::Append,
        }
    }
}

impl BridgeConfig {
    pub fn with_save_policy(mut self, policy: SavePolicy) -> Self {
        self.save_policy = policy;
        self
    }

    /// Defaults with the save policy named by `name`; `None` if unknown
    pub fn with_policy_name(name: &str) -> Option<Self> {
        SavePolicy::from_str(name).map(|policy| Self::default().with_save_policy(policy))
    }

    /// Key holding the app-data collection
    pub fn app_datas_key(&self) -> String {
        format!("{}{}", self.key_prefix, consts::APP_DATAS_KEY)
    }

    /// Key the oldest client used for its single record
    pub fn legacy_app_data_key(&self) -> String {
        format!("{}{}", self.key_prefix, consts::LEGACY_APP_DATA_KEY)
    }

    /// Key holding the session blob
    pub fn sessions_key(&self) -> String {
        format!("{}{}", self.key_prefix, consts::SESSIONS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keys() {
        let config = BridgeConfig::default();
        assert_eq!(config.app_datas_key(), "fedirelm.app_datas");
        assert_eq!(config.legacy_app_data_key(), "fedirelm.app_data");
        assert_eq!(config.sessions_key(), "fedirelm.app_sessions");
        assert_eq!(config.expiry_window_secs, 3600);
        assert_eq!(config.save_policy, SavePolicy::Append);
    }

    #[test]
    fn test_save_policy_from_str() {
        assert_eq!(SavePolicy::from_str("Append"), Some(SavePolicy::Append));
        assert_eq!(SavePolicy::from_str("replace"), Some(SavePolicy::ReplaceByUuid));
        assert_eq!(SavePolicy::from_str("upsert"), None);
        let policy = SavePolicy::ReplaceByUuid;
        assert_eq!(SavePolicy::from_str(policy.as_str()), Some(policy));
    }

    #[test]
    fn test_with_policy_name() {
        let config = BridgeConfig::with_policy_name("dedup").unwrap();
        assert_eq!(config.save_policy, SavePolicy::ReplaceByUuid);
        assert_eq!(config.app_datas_key(), "fedirelm.app_datas");
        assert!(BridgeConfig::with_policy_name("").is_none());
    }
}
