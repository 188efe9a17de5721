//! JavaScript bindings
//!
//! ```js
//! import init, { PortBridge } from "./pkg/fedirelm_bridge.js";
//! await init();
//! const bridge = new PortBridge(); // or PortBridge.with_policy("replace")
//! const app = Elm.Main.init({ flags: JSON.parse(bridge.bootstrap()) });
//! app.ports.saveAppData.subscribe((json) => bridge.save_app_data(json));
//! app.ports.deleteAppData.subscribe((uuid) => bridge.delete_app_data(uuid));
//! app.ports.saveSessions.subscribe((json) => bridge.save_sessions(json));
//! ```

use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::config::BridgeConfig;
use crate::platform::{self, LocalStorage, SystemClock};
use crate::ports::{Bridge, PortInbox, PortMessage};
use crate::seeds::OsSeedSource;
use crate::storage::{KeyValueStore, MemoryStore};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&format!("fedirelm-bridge logger: {}", e).into());
    }
}

/// The bridge as seen from JavaScript
#[wasm_bindgen]
pub struct PortBridge {
    bridge: Bridge,
    inbox: PortInbox,
}

#[wasm_bindgen]
impl PortBridge {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PortBridge {
        Self::open(&BridgeConfig::default())
    }

    /// Bridge whose `saveAppData` follows the named policy ("append" or "replace")
    pub fn with_policy(policy: &str) -> Result<PortBridge, JsValue> {
        let config = BridgeConfig::with_policy_name(policy)
            .ok_or_else(|| JsValue::from_str(&format!("unknown save policy: {}", policy)))?;
        log::info!("Save policy: {}", config.save_policy.as_str());
        Ok(Self::open(&config))
    }

    /// Flags JSON for the front-end. Throws only if no entropy is available.
    pub fn bootstrap(&mut self) -> Result<String, JsValue> {
        let location = platform::current_location();
        let payload = self
            .bridge
            .bootstrap(&mut OsSeedSource, &location)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        payload.to_json().map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn save_app_data(&mut self, json: String) {
        self.deliver(PortMessage::SaveAppData(json));
    }

    pub fn delete_app_data(&mut self, uuid: String) {
        self.deliver(PortMessage::DeleteAppData(uuid));
    }

    pub fn save_sessions(&mut self, json: String) {
        self.deliver(PortMessage::SaveSessions(json));
    }

    pub fn clear_sessions(&mut self) {
        self.deliver(PortMessage::ClearSessions);
    }

    fn open(config: &BridgeConfig) -> PortBridge {
        let store: Rc<dyn KeyValueStore> = match LocalStorage::open() {
            Ok(storage) => Rc::new(storage),
            Err(e) => {
                log::warn!("{}; nothing will persist this session", e);
                Rc::new(MemoryStore::new())
            }
        };
        let (bridge, inbox) = Bridge::new(store, config, Box::new(SystemClock));
        PortBridge { bridge, inbox }
    }

    fn deliver(&mut self, message: PortMessage) {
        let name = message.name();
        if let Err(e) = self.inbox.send(message) {
            log::warn!("Dropped {}: {}", name, e);
        }
        self.bridge.drain();
    }
}

impl Default for PortBridge {
    fn default() -> Self {
        Self::new()
    }
}
