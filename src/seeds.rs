//! Random seeds handed to the front-end at startup
//!
//! Drawn fresh from the OS (Web Crypto on wasm) on every bootstrap and
//! never persisted. There is no fallback: without entropy, bootstrap fails.

use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Supplier of cryptographically strong `u32`s
pub trait SeedSource {
    fn next_u32(&mut self) -> BridgeResult<u32>;
}

/// OS entropy via `rand::rngs::OsRng`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSeedSource;

impl SeedSource for OsSeedSource {
    fn next_u32(&mut self) -> BridgeResult<u32> {
        OsRng
            .try_next_u32()
            .map_err(|e| BridgeError::RandomnessUnavailable(e.to_string()))
    }
}

/// Four independent seeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomSeedSet {
    pub seed1: u32,
    pub seed2: u32,
    pub seed3: u32,
    pub seed4: u32,
}

impl RandomSeedSet {
    pub fn draw(source: &mut dyn SeedSource) -> BridgeResult<Self> {
        Ok(Self {
            seed1: source.next_u32()?,
            seed2: source.next_u32()?,
            seed3: source.next_u32()?,
            seed4: source.next_u32()?,
        })
    }
}
