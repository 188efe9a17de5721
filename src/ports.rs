//! Inbound messages from the front-end
//!
//! The front-end fires `saveAppData`, `deleteAppData` and `saveSessions`
//! without waiting for a reply. Messages go through a bounded FIFO and the
//! [`Bridge`] applies them one at a time, each to completion.

use std::rc::Rc;
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, TrySendError, sync_channel};

use crate::app_data::{AppDataCollection, AppDataRecord, AppDataRegistry};
use crate::bootstrap::{self, BootstrapPayload};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::platform::Clock;
use crate::seeds::SeedSource;
use crate::session::{SessionBlob, SessionStore};
use crate::storage::KeyValueStore;

/// A front-end port message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortMessage {
    /// JSON text of one app-data record
    SaveAppData(String),
    /// uuid, bare or JSON-quoted
    DeleteAppData(String),
    /// Opaque session blob
    SaveSessions(String),
    ClearSessions,
}

impl PortMessage {
    pub fn name(&self) -> &'static str {
        match self {
            PortMessage::SaveAppData(_) => "saveAppData",
            PortMessage::DeleteAppData(_) => "deleteAppData",
            PortMessage::SaveSessions(_) => "saveSessions",
            PortMessage::ClearSessions => "clearSessions",
        }
    }
}

/// Sending half of the port queue
#[derive(Debug, Clone)]
pub struct PortInbox {
    sender: SyncSender<PortMessage>,
}

impl PortInbox {
    /// Enqueue without blocking
    pub fn send(&self, message: PortMessage) -> BridgeResult<()> {
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(BridgeError::InboxFull),
            Err(TrySendError::Disconnected(_)) => Err(BridgeError::InboxClosed),
        }
    }
}

/// Owns the persisted state and applies port messages to it
pub struct Bridge {
    registry: AppDataRegistry,
    sessions: SessionStore,
    app_datas: AppDataCollection,
    receiver: Receiver<PortMessage>,
    clock: Box<dyn Clock>,
}

impl Bridge {
    /// Create a bridge over `store` and the inbox that feeds it
    pub fn new(
        store: Rc<dyn KeyValueStore>,
        config: &BridgeConfig,
        clock: Box<dyn Clock>,
    ) -> (Self, PortInbox) {
        let (sender, receiver) = sync_channel(config.inbox_capacity.max(1));
        let bridge = Self {
            registry: AppDataRegistry::new(store.clone(), config),
            sessions: SessionStore::new(store, config),
            app_datas: Vec::new(),
            receiver,
            clock,
        };
        (bridge, PortInbox { sender })
    }

    /// Assemble the startup payload and adopt its collection as the
    /// in-memory state
    pub fn bootstrap(
        &mut self,
        seeds: &mut dyn SeedSource,
        location: &str,
    ) -> BridgeResult<BootstrapPayload> {
        let now = self.clock.now_secs();
        let payload = bootstrap::assemble(&self.registry, &self.sessions, seeds, location, now)?;
        self.app_datas = payload.app_datas.clone();
        Ok(payload)
    }

    /// Collection as of the last message or bootstrap
    pub fn app_datas(&self) -> &[AppDataRecord] {
        &self.app_datas
    }

    /// Apply one message
    ///
    /// App-data messages re-read the stored collection first, since other
    /// tabs of the origin write to the same key.
    pub fn handle(&mut self, message: PortMessage) -> BridgeResult<()> {
        match message {
            PortMessage::SaveAppData(json) => {
                let record = AppDataRecord::from_message(&json)?;
                let current = self.stored_app_datas();
                let now = self.clock.now_secs();
                self.app_datas = self.registry.append(&current, record, now);
            }
            PortMessage::DeleteAppData(uuid) => {
                let uuid = normalize_uuid(&uuid);
                let current = self.stored_app_datas();
                self.app_datas = self.registry.remove_by_uuid(&current, &uuid);
            }
            PortMessage::SaveSessions(raw) => self.sessions.save(&SessionBlob::new(raw)),
            PortMessage::ClearSessions => self.sessions.clear(),
        }
        Ok(())
    }

    /// Persisted collection, or the in-memory one if the store can't be read
    fn stored_app_datas(&self) -> AppDataCollection {
        match self.registry.try_load_with_origin() {
            Ok((records, _)) => records,
            Err(e) => {
                log::warn!("{}; using in-memory app data", e);
                self.app_datas.clone()
            }
        }
    }

    /// Apply every queued message in order. Returns how many were handled.
    ///
    /// A bad message is logged and skipped; it does not stop the queue.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(message) => {
                    let name = message.name();
                    if let Err(e) = self.handle(message) {
                        log::warn!("Dropped {}: {}", name, e);
                    }
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        handled
    }
}

/// `deleteAppData` may carry the uuid JSON-encoded. Bare uuids are taken
/// verbatim, matching what `saveAppData` stored.
fn normalize_uuid(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') {
        if let Ok(uuid) = serde_json::from_str::<String>(trimmed) {
            return uuid;
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SavePolicy;
    use crate::storage::{MemoryStore, UnreadableStore};
    use serde_json::{Value, json};
    use std::cell::Cell;

    struct TestClock(Rc<Cell<i64>>);

    impl Clock for TestClock {
        fn now_secs(&self) -> i64 {
            self.0.get()
        }
    }

    struct FixedSeeds;

    impl SeedSource for FixedSeeds {
        fn next_u32(&mut self) -> BridgeResult<u32> {
            Ok(1)
        }
    }

    struct Harness {
        store: Rc<MemoryStore>,
        time: Rc<Cell<i64>>,
        bridge: Bridge,
        inbox: PortInbox,
    }

    fn setup(config: BridgeConfig) -> Harness {
        let store = Rc::new(MemoryStore::new());
        let time = Rc::new(Cell::new(1000));
        let (bridge, inbox) = Bridge::new(store.clone(), &config, Box::new(TestClock(time.clone())));
        Harness {
            store,
            time,
            bridge,
            inbox,
        }
    }

    fn stored_app_datas(store: &MemoryStore) -> Option<Value> {
        store
            .get("fedirelm.app_datas")
            .unwrap()
            .map(|json| serde_json::from_str(&json).unwrap())
    }

    #[test]
    fn test_save_app_data_scenario() {
        let mut h = setup(BridgeConfig::default());
        h.bridge.bootstrap(&mut FixedSeeds, "").unwrap();

        h.inbox
            .send(PortMessage::SaveAppData(r#"{"uuid":"a","clientId":"x"}"#.to_string()))
            .unwrap();
        assert_eq!(h.bridge.drain(), 1);

        assert_eq!(
            stored_app_datas(&h.store),
            Some(json!([{"uuid": "a", "clientId": "x", "createdAt": 1000}]))
        );
        assert_eq!(h.bridge.app_datas().len(), 1);
    }

    #[test]
    fn test_delete_app_data_scenario() {
        let mut h = setup(BridgeConfig::default());
        h.bridge.bootstrap(&mut FixedSeeds, "").unwrap();

        h.inbox
            .send(PortMessage::SaveAppData(r#"{"uuid":"a"}"#.to_string()))
            .unwrap();
        h.inbox
            .send(PortMessage::SaveAppData(r#"{"uuid":"b"}"#.to_string()))
            .unwrap();
        h.inbox
            .send(PortMessage::DeleteAppData("a".to_string()))
            .unwrap();
        assert_eq!(h.bridge.drain(), 3);

        assert_eq!(
            stored_app_datas(&h.store),
            Some(json!([{"uuid": "b", "createdAt": 1000}]))
        );
    }

    #[test]
    fn test_delete_accepts_quoted_uuid() {
        let mut h = setup(BridgeConfig::default());
        h.bridge
            .handle(PortMessage::SaveAppData(r#"{"uuid":"a"}"#.to_string()))
            .unwrap();
        h.bridge
            .handle(PortMessage::DeleteAppData("\"a\"".to_string()))
            .unwrap();
        assert!(h.bridge.app_datas().is_empty());
        assert!(!h.store.contains_key("fedirelm.app_datas"));
    }

    #[test]
    fn test_messages_use_current_time() {
        let mut h = setup(BridgeConfig::default());
        h.bridge
            .handle(PortMessage::SaveAppData(r#"{"uuid":"a"}"#.to_string()))
            .unwrap();
        h.time.set(2000);
        h.bridge
            .handle(PortMessage::SaveAppData(r#"{"uuid":"b"}"#.to_string()))
            .unwrap();

        let stamps: Vec<i64> = h.bridge.app_datas().iter().map(|r| r.created_at).collect();
        assert_eq!(stamps, vec![1000, 2000]);
    }

    #[test]
    fn test_bootstrap_after_restart_prunes() {
        let config = BridgeConfig::default();
        let mut h = setup(config.clone());
        h.time.set(0);
        h.bridge
            .handle(PortMessage::SaveAppData(r#"{"uuid":"old"}"#.to_string()))
            .unwrap();
        h.time.set(1800);
        h.bridge
            .handle(PortMessage::SaveAppData(r#"{"uuid":"recent"}"#.to_string()))
            .unwrap();

        // Next page load
        let time = Rc::new(Cell::new(3601));
        let (mut bridge, _inbox) =
            Bridge::new(h.store.clone(), &config, Box::new(TestClock(time)));
        let payload = bridge.bootstrap(&mut FixedSeeds, "https://app.example/").unwrap();

        assert_eq!(payload.app_datas.len(), 1);
        assert_eq!(payload.app_datas[0].uuid.as_deref(), Some("recent"));
        assert_eq!(bridge.app_datas(), payload.app_datas.as_slice());
    }

    #[test]
    fn test_sessions_round_trip() {
        let mut h = setup(BridgeConfig::default());
        h.inbox
            .send(PortMessage::SaveSessions(r#"[{"acct":"me"}]"#.to_string()))
            .unwrap();
        h.bridge.drain();
        assert_eq!(
            h.store.get("fedirelm.app_sessions").unwrap().as_deref(),
            Some(r#"[{"acct":"me"}]"#)
        );

        h.inbox.send(PortMessage::ClearSessions).unwrap();
        h.bridge.drain();
        assert!(!h.store.contains_key("fedirelm.app_sessions"));
    }

    #[test]
    fn test_bad_message_does_not_stop_queue() {
        let mut h = setup(BridgeConfig::default());
        h.inbox
            .send(PortMessage::SaveAppData("{oops".to_string()))
            .unwrap();
        h.inbox
            .send(PortMessage::SaveAppData(r#"{"uuid":"ok"}"#.to_string()))
            .unwrap();

        assert_eq!(h.bridge.drain(), 2);
        assert_eq!(h.bridge.app_datas().len(), 1);
    }

    #[test]
    fn test_malformed_save_is_an_error() {
        let mut h = setup(BridgeConfig::default());
        let err = h
            .bridge
            .handle(PortMessage::SaveAppData("42".to_string()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::MalformedMessage(_)));
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn test_inbox_is_bounded_and_ordered() {
        let config = BridgeConfig {
            inbox_capacity: 2,
            ..BridgeConfig::default()
        };
        let mut h = setup(config);

        h.inbox
            .send(PortMessage::SaveAppData(r#"{"uuid":"1"}"#.to_string()))
            .unwrap();
        h.inbox
            .send(PortMessage::SaveAppData(r#"{"uuid":"2"}"#.to_string()))
            .unwrap();
        let err = h
            .inbox
            .send(PortMessage::SaveAppData(r#"{"uuid":"3"}"#.to_string()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InboxFull));

        h.bridge.drain();
        let uuids: Vec<_> = h
            .bridge
            .app_datas()
            .iter()
            .map(|r| r.uuid.clone().unwrap())
            .collect();
        assert_eq!(uuids, vec!["1", "2"]);
    }

    #[test]
    fn test_inbox_closed_after_bridge_dropped() {
        let h = setup(BridgeConfig::default());
        let inbox = h.inbox.clone();
        drop(h);
        let err = inbox.send(PortMessage::ClearSessions).unwrap_err();
        assert!(matches!(err, BridgeError::InboxClosed));
    }

    #[test]
    fn test_replace_policy_through_bridge() {
        let config = BridgeConfig::default().with_save_policy(SavePolicy::ReplaceByUuid);
        let mut h = setup(config);
        for _ in 0..3 {
            h.bridge
                .handle(PortMessage::SaveAppData(r#"{"uuid":"a"}"#.to_string()))
                .unwrap();
        }
        assert_eq!(h.bridge.app_datas().len(), 1);
    }

    #[test]
    fn test_save_before_bootstrap_keeps_stored_records() {
        let h = setup(BridgeConfig::default());
        h.store
            .set("fedirelm.app_datas", r#"[{"uuid":"x","createdAt":900}]"#)
            .unwrap();
        let mut bridge = h.bridge;

        bridge
            .handle(PortMessage::SaveAppData(r#"{"uuid":"a"}"#.to_string()))
            .unwrap();

        assert_eq!(
            stored_app_datas(&h.store),
            Some(json!([
                {"uuid": "x", "createdAt": 900},
                {"uuid": "a", "createdAt": 1000},
            ]))
        );
    }

    #[test]
    fn test_two_tabs_share_one_store() {
        let config = BridgeConfig::default();
        let store = Rc::new(MemoryStore::new());
        let time = Rc::new(Cell::new(1000));
        let (mut tab_a, _) = Bridge::new(store.clone(), &config, Box::new(TestClock(time.clone())));
        let (mut tab_b, _) = Bridge::new(store.clone(), &config, Box::new(TestClock(time)));
        tab_a.bootstrap(&mut FixedSeeds, "").unwrap();
        tab_b.bootstrap(&mut FixedSeeds, "").unwrap();

        tab_a
            .handle(PortMessage::SaveAppData(r#"{"uuid":"a"}"#.to_string()))
            .unwrap();
        tab_b
            .handle(PortMessage::SaveAppData(r#"{"uuid":"b"}"#.to_string()))
            .unwrap();
        assert_eq!(
            stored_app_datas(&store),
            Some(json!([
                {"uuid": "a", "createdAt": 1000},
                {"uuid": "b", "createdAt": 1000},
            ]))
        );

        tab_a
            .handle(PortMessage::DeleteAppData("a".to_string()))
            .unwrap();
        assert_eq!(
            stored_app_datas(&store),
            Some(json!([{"uuid": "b", "createdAt": 1000}]))
        );
        assert_eq!(tab_a.app_datas().len(), 1);
    }

    #[test]
    fn test_unreadable_store_uses_in_memory_copy() {
        let store = Rc::new(UnreadableStore {
            inner: MemoryStore::new(),
        });
        let time = Rc::new(Cell::new(1000));
        let (mut bridge, _) =
            Bridge::new(store.clone(), &BridgeConfig::default(), Box::new(TestClock(time)));

        bridge
            .handle(PortMessage::SaveAppData(r#"{"uuid":"a"}"#.to_string()))
            .unwrap();
        bridge
            .handle(PortMessage::SaveAppData(r#"{"uuid":"b"}"#.to_string()))
            .unwrap();

        assert_eq!(bridge.app_datas().len(), 2);
        assert_eq!(
            stored_app_datas(&store.inner),
            Some(json!([
                {"uuid": "a", "createdAt": 1000},
                {"uuid": "b", "createdAt": 1000},
            ]))
        );
    }

    #[test]
    fn test_delete_bare_uuid_is_verbatim() {
        let mut h = setup(BridgeConfig::default());
        h.bridge
            .handle(PortMessage::SaveAppData(r#"{"uuid":" a "}"#.to_string()))
            .unwrap();
        h.bridge
            .handle(PortMessage::DeleteAppData(" a ".to_string()))
            .unwrap();
        assert!(h.bridge.app_datas().is_empty());
        assert!(!h.store.contains_key("fedirelm.app_datas"));
    }

    #[test]
    fn test_normalize_uuid() {
        assert_eq!(normalize_uuid("abc"), "abc");
        assert_eq!(normalize_uuid("\"abc\""), "abc");
        assert_eq!(normalize_uuid(" \"abc\"\n"), "abc");
        assert_eq!(normalize_uuid(" abc "), " abc ");
        assert_eq!(normalize_uuid("\"unterminated"), "\"unterminated");
    }
}
