//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Wall clock time
//! - Page location
//! - Storage (LocalStorage on web)

#[cfg(target_arch = "wasm32")]
mod local_storage;

#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorage;

/// Source of "now" in whole seconds since the Unix epoch
pub trait Clock {
    fn now_secs(&self) -> i64;
}

/// The real wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        now_secs()
    }
}

/// Current time in seconds (WASM: `Date.now()`)
#[cfg(target_arch = "wasm32")]
pub fn now_secs() -> i64 {
    (js_sys::Date::now() / 1000.0).floor() as i64
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Current page URL (WASM only; empty string if unavailable)
#[cfg(target_arch = "wasm32")]
pub fn current_location() -> String {
    web_sys::window()
        .and_then(|w| w.location().href().ok())
        .unwrap_or_default()
}

/// Native stub
#[cfg(not(target_arch = "wasm32"))]
pub fn current_location() -> String {
    String::new()
}
