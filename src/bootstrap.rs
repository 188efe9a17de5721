//! Startup payload for the front-end
//!
//! Runs once per page load: prune stale registrations, draw seeds, read the
//! session blob and package everything with the current location.

use serde::Serialize;
use serde_json::value::RawValue;

use crate::app_data::{AppDataCollection, AppDataRegistry, prune_expired};
use crate::error::BridgeResult;
use crate::seeds::{RandomSeedSet, SeedSource};
use crate::session::SessionStore;

/// Flags passed to the front-end at init
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapPayload {
    pub location: String,
    pub app_datas: AppDataCollection,
    pub seeds: RandomSeedSet,
    /// Stored session blob, embedded byte for byte
    pub sessions: Option<Box<RawValue>>,
}

impl BootstrapPayload {
    pub fn to_json(&self) -> BridgeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Build the bootstrap payload at `now`.
///
/// Storage faults are recovered as empty state. Only a missing entropy
/// source is an error.
pub fn assemble(
    registry: &AppDataRegistry,
    sessions: &SessionStore,
    seeds: &mut dyn SeedSource,
    location: &str,
    now: i64,
) -> BridgeResult<BootstrapPayload> {
    let (loaded, origin) = registry.load_with_origin();
    let app_datas = prune_expired(&loaded, now, registry.expiry_window());
    if origin.needs_rewrite() {
        registry.write(&app_datas);
    } else {
        registry.persist_if_changed(&loaded, &app_datas);
    }

    let seeds = RandomSeedSet::draw(seeds)?;
    let sessions = sessions.load().and_then(|blob| blob.to_raw());

    log::info!(
        "Bootstrap ready: {} app data records, sessions {}",
        app_datas.len(),
        if sessions.is_some() { "present" } else { "absent" }
    );

    Ok(BootstrapPayload {
        location: location.to_string(),
        app_datas,
        seeds,
        sessions,
    })
}
