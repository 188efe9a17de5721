//! fedirelm bridge native entry point
//!
//! Replays the startup sequence against an exported LocalStorage dump:
//!
//! ```text
//! fedirelm-bridge [snapshot.json]
//! ```
//!
//! The snapshot is a JSON object of `{ "key": "value" }` pairs. Prints the
//! bootstrap payload, then the storage contents after pruning.

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use clap::Parser;

    let args = native::Args::parse();
    env_logger::init();
    log::info!("fedirelm-bridge (native) starting...");

    native::run(args)
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is `wasm::start`, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::collections::BTreeMap;
    use std::error::Error;
    use std::path::PathBuf;
    use std::rc::Rc;

    use clap::Parser;
    use fedirelm_bridge::platform::SystemClock;
    use fedirelm_bridge::{Bridge, BridgeConfig, MemoryStore, OsSeedSource};

    /// Replay the bridge startup against a LocalStorage dump
    #[derive(Parser)]
    #[command(name = "fedirelm-bridge")]
    #[command(version)]
    pub struct Args {
        /// JSON object of LocalStorage key/value pairs; empty store if omitted
        pub snapshot: Option<PathBuf>,
    }

    pub fn run(args: Args) -> Result<(), Box<dyn Error>> {
        let snapshot: BTreeMap<String, String> = match args.snapshot {
            Some(path) => {
                let json = std::fs::read_to_string(&path)?;
                let snapshot: BTreeMap<String, String> = serde_json::from_str(&json)?;
                log::info!("Loaded {} keys from {}", snapshot.len(), path.display());
                snapshot
            }
            None => BTreeMap::new(),
        };

        let store = Rc::new(MemoryStore::from_snapshot(snapshot));
        let (mut bridge, _inbox) =
            Bridge::new(store.clone(), &BridgeConfig::default(), Box::new(SystemClock));
        let payload = bridge.bootstrap(&mut OsSeedSource, "")?;

        println!("{}", serde_json::to_string_pretty(&payload)?);
        println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
        Ok(())
    }
}
