//! Error types for the bridge.
//!
//! Most storage faults are recovered where they happen (logged and treated as
//! "absent"). Only the variants that must reach a caller live here.

use thiserror::Error;

/// Failure reported by a [`crate::storage::KeyValueStore`] backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store cannot be opened (no window, storage disabled, ...)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Reading a key failed
    #[error("Failed to read {key}: {reason}")]
    Read { key: String, reason: String },

    /// Writing or removing a key failed (quota exceeded, private mode, ...)
    #[error("Failed to write {key}: {reason}")]
    Write { key: String, reason: String },
}

/// Error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No entropy could be drawn; bootstrap must not continue with
    /// predictable seeds.
    #[error("Randomness unavailable: {0}")]
    RandomnessUnavailable(String),

    /// A front-end message could not be interpreted
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// The inbound message queue is at capacity
    #[error("Inbox full, message dropped")]
    InboxFull,

    /// The receiving side of the inbound queue is gone
    #[error("Inbox closed")]
    InboxClosed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
