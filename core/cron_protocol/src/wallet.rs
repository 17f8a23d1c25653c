//! # Owner wallet
//!
//! Jobs are registered as extensions of a v5 wallet. This module reads the
//! wallet's storage to list those extensions and builds the unsigned request
//! bodies that carry job actions to the wallet:
//!
//! ```text
//! contract_state$_ is_signature_allowed:Bool seqno:uint32 wallet_id:uint32
//!                  public_key:bits256 extensions_dict:(HashmapE 256 Bool) = ContractState;
//!
//! signed_request$_ op:uint32 wallet_id:uint32 valid_until:uint32 msg_seqno:uint32
//!                  inner:InnerRequest signature:bits512 = SignedRequest;
//! ```
//!
//! Signing and submission are left to the caller: the signature is computed
//! over the hash of the returned body and appended to it.

use std::sync::Arc;

use tracing::warn;

use crate::actions::{store_action_list, ActionList};
use crate::address::Address;
use crate::boc;
use crate::cell::{Cell, CellBuilder};
use crate::derive::JOB_WORKCHAIN;
use crate::dict;
use crate::errors::Result;

const OP_EXTERNAL_SIGNED: u128 = 0x7369_676e;
const OP_INTERNAL_SIGNED: u128 = 0x7369_6e74;

/// Wallet id of a v5r1 wallet on the default subwallet.
pub const DEFAULT_WALLET_ID: u32 = 0x7fff_ff11;
/// How long a signed request stays valid.
pub const REQUEST_TTL_SECS: u32 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletState {
    pub signature_allowed: bool,
    pub seqno: u32,
    pub wallet_id: u32,
    pub public_key: [u8; 32],
    pub extensions: Option<Arc<Cell>>,
}

impl WalletState {
    pub fn decode(cell: &Cell) -> Result<Self> {
        let mut s = cell.parse();
        Ok(WalletState {
            signature_allowed: s.load_bit()?,
            seqno: s.load_u32(32)?,
            wallet_id: s.load_u32(32)?,
            public_key: s.load_hash()?,
            extensions: s.load_maybe_ref()?,
        })
    }

    pub fn try_from_base64(data_boc: &str) -> Option<Self> {
        match boc::decode_base64(data_boc).and_then(|cell| Self::decode(&cell)) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Failed to parse wallet data: {e}");
                None
            }
        }
    }

    /// Addresses of all registered extensions; every key is a basechain hash.
    pub fn extension_addresses(&self) -> Result<Vec<Address>> {
        let Some(root) = &self.extensions else {
            return Ok(Vec::new());
        };
        Ok(dict::keys_256(root)?
            .into_iter()
            .map(|hash| Address::new(JOB_WORKCHAIN, hash))
            .collect())
    }
}

/// How the request reaches the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Sent as an external message.
    ExternalSigned,
    /// Carried in the body of an internal message.
    InternalSigned,
}

impl RequestKind {
    fn op(&self) -> u128 {
        match self {
            Self::ExternalSigned => OP_EXTERNAL_SIGNED,
            Self::InternalSigned => OP_INTERNAL_SIGNED,
        }
    }
}

/// Unsigned request body; the caller signs its hash and appends the signature.
pub fn request_body(
    kind: RequestKind,
    wallet_id: u32,
    valid_until: u32,
    seqno: u32,
    actions: &ActionList,
) -> Result<Cell> {
    let mut b = CellBuilder::new();
    b.store_uint(kind.op(), 32)?
        .store_uint(wallet_id as u128, 32)?
        .store_uint(valid_until as u128, 32)?
        .store_uint(seqno as u128, 32)?;
    store_action_list(&mut b, actions)?;
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ExtendedAction;

    fn wallet_cell(extensions: Option<Arc<Cell>>) -> Cell {
        let mut b = CellBuilder::new();
        b.store_bit(true)
            .unwrap()
            .store_uint(42, 32)
            .unwrap()
            .store_uint(DEFAULT_WALLET_ID as u128, 32)
            .unwrap()
            .store_bytes(&[7u8; 32])
            .unwrap()
            .store_maybe_ref(extensions)
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn state_without_extensions() {
        let state = WalletState::decode(&wallet_cell(None)).unwrap();
        assert!(state.signature_allowed);
        assert_eq!(state.seqno, 42);
        assert_eq!(state.wallet_id, DEFAULT_WALLET_ID);
        assert_eq!(state.public_key, [7u8; 32]);
        assert!(state.extension_addresses().unwrap().is_empty());
    }

    #[test]
    fn extensions_become_basechain_addresses() {
        let keys = [[1u8; 32], [0xEEu8; 32]];
        let state = WalletState::decode(&wallet_cell(Some(dict::build_256(&keys)))).unwrap();
        let got = state.extension_addresses().unwrap();
        assert_eq!(got, vec![Address::new(0, [1; 32]), Address::new(0, [0xEE; 32])]);
    }

    #[test]
    fn request_header_layout() {
        let mut actions = ActionList::new();
        actions
            .extended
            .push(ExtendedAction::AddExtension(Address::new(0, [5; 32])));
        let body = request_body(RequestKind::ExternalSigned, DEFAULT_WALLET_ID, 1000, 3, &actions)
            .unwrap();
        let mut s = body.parse();
        assert_eq!(s.load_uint(32).unwrap(), OP_EXTERNAL_SIGNED);
        assert_eq!(s.load_u32(32).unwrap(), DEFAULT_WALLET_ID);
        assert_eq!(s.load_u32(32).unwrap(), 1000);
        assert_eq!(s.load_u32(32).unwrap(), 3);
        assert!(!s.load_bit().unwrap()); // no out-list
        assert!(s.load_bit().unwrap()); // has extended actions
        assert_eq!(s.load_uint(8).unwrap(), 0x02);
        assert_eq!(s.load_address().unwrap(), Address::new(0, [5; 32]));
    }

    #[test]
    fn internal_kind_changes_op_only() {
        let actions = ActionList::new();
        let ext = request_body(RequestKind::ExternalSigned, 1, 2, 3, &actions).unwrap();
        let int = request_body(RequestKind::InternalSigned, 1, 2, 3, &actions).unwrap();
        assert_eq!(int.parse().load_uint(32).unwrap(), OP_INTERNAL_SIGNED);
        assert_eq!(ext.bit_len(), int.bit_len());
    }

    #[test]
    fn garbage_state_degrades_to_none() {
        assert!(WalletState::try_from_base64("not base64!").is_none());
    }
}
