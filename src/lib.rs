//! fedirelm bridge - LocalStorage persistence for the fedirelm client
//!
//! Core modules:
//! - `app_data`: Pending app-registration records (expiry, pruning, persistence)
//! - `session`: Opaque active-session blob
//! - `bootstrap`: One-time startup payload for the front-end
//! - `ports`: Ordered inbound message queue from the front-end
//! - `platform`: Browser/native platform abstraction
//! - `storage`: Key-value store trait and in-memory backend

pub mod app_data;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod platform;
pub mod ports;
pub mod seeds;
pub mod session;
pub mod storage;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use app_data::{AppDataCollection, AppDataRecord, AppDataRegistry};
pub use bootstrap::BootstrapPayload;
pub use config::{BridgeConfig, SavePolicy};
pub use error::{BridgeError, BridgeResult, StoreError};
pub use ports::{Bridge, PortInbox, PortMessage};
pub use seeds::{OsSeedSource, RandomSeedSet, SeedSource};
pub use session::{SessionBlob, SessionStore};
pub use storage::{KeyValueStore, MemoryStore};

/// Bridge configuration constants
pub mod consts {
    /// Namespace of every storage key
    pub const KEY_PREFIX: &str = "fedirelm.";
    /// Collection of pending app registrations
    pub const APP_DATAS_KEY: &str = "app_datas";
    /// Single-record key written by the oldest client
    pub const LEGACY_APP_DATA_KEY: &str = "app_data";
    /// Active session blob
    pub const SESSIONS_KEY: &str = "app_sessions";

    /// Pending registrations older than this are pruned (1 hour)
    pub const APP_DATA_EXPIRY_SECS: i64 = 3600;
    /// Inbound port queue bound
    pub const INBOX_CAPACITY: usize = 64;
}
