//! # Job storage
//!
//! Persistent data of a job contract. The layout is fixed; changing any
//! width changes every derived address.
//!
//! | Field              | Encoding          |
//! |--------------------|-------------------|
//! | `initialized`      | 1 bit             |
//! | `next_call_time`   | uint32            |
//! | `repeat_every`     | uint32            |
//! | `salt`             | uint32            |
//! | `reward`           | Coins             |
//! | `owner`            | MsgAddressInt     |
//! | `message`          | ^Cell             |
//! | `init_state_hash`  | bits256           |
//! | `init_state_depth` | uint10            |
//!
//! `init_state_hash` / `init_state_depth` are zero until the contract first
//! runs; the contract stamps them itself.

use std::sync::Arc;

use tracing::warn;

use crate::address::Address;
use crate::boc;
use crate::cell::{Cell, CellBuilder};
use crate::errors::Result;

const INIT_STATE_DEPTH_BITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractStateRecord {
    pub initialized: bool,
    pub next_call_time: u32,
    pub repeat_every: u32,
    /// Creation nonce; held constant to redeploy at a preserved identity.
    pub salt: u32,
    pub reward: u128,
    pub owner: Address,
    /// The pre-built message the job sends to its owner every cycle.
    pub message: Arc<Cell>,
    pub init_state_hash: [u8; 32],
    pub init_state_depth: u16,
}

impl ContractStateRecord {
    /// A record as built client-side before deployment.
    pub fn new(
        owner: Address,
        next_call_time: u32,
        repeat_every: u32,
        salt: u32,
        reward: u128,
        message: Arc<Cell>,
    ) -> Self {
        ContractStateRecord {
            initialized: false,
            next_call_time,
            repeat_every,
            salt,
            reward,
            owner,
            message,
            init_state_hash: [0u8; 32],
            init_state_depth: 0,
        }
    }

    pub fn encode(&self) -> Result<Cell> {
        let mut b = CellBuilder::new();
        b.store_bit(self.initialized)?
            .store_uint(self.next_call_time as u128, 32)?
            .store_uint(self.repeat_every as u128, 32)?
            .store_uint(self.salt as u128, 32)?
            .store_coins(self.reward)?
            .store_address(&self.owner)?
            .store_ref(self.message.clone())?
            .store_bytes(&self.init_state_hash)?
            .store_uint(self.init_state_depth as u128, INIT_STATE_DEPTH_BITS)?;
        b.build()
    }

    pub fn decode(cell: &Cell) -> Result<Self> {
        let mut s = cell.parse();
        let initialized = s.load_bit()?;
        let next_call_time = s.load_u32(32)?;
        let repeat_every = s.load_u32(32)?;
        let salt = s.load_u32(32)?;
        let reward = s.load_coins()?;
        let owner = s.load_address()?;
        let message = s.load_ref()?;
        let init_state_hash = s.load_hash()?;
        let init_state_depth = s.load_uint(INIT_STATE_DEPTH_BITS)? as u16;
        Ok(ContractStateRecord {
            initialized,
            next_call_time,
            repeat_every,
            salt,
            reward,
            owner,
            message,
            init_state_hash,
            init_state_depth,
        })
    }

    /// Decode a serialized `data` cell, e.g. an indexer's `data_boc`.
    pub fn decode_boc(bytes: &[u8]) -> Result<Self> {
        let cell = boc::decode(bytes)?;
        Self::decode(&cell)
    }

    /// Like [`Self::decode_boc`] for base64 input, degrading to `None`.
    pub fn try_from_base64(data_boc: &str) -> Option<Self> {
        match boc::decode_base64(data_boc).and_then(|cell| Self::decode(&cell)) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Failed to parse job data: {e}");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
