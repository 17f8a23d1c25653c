//! # DNS items
//!
//! Decoder for the storage of `.ton` DNS item contracts, used to learn a
//! domain's name and expiry:
//!
//! ```text
//! index:uint256 collection:MsgAddress owner:MsgAddress
//! content:^Cell domain:^Cell auction:(Maybe ^Cell) last_fill_up_time:uint64
//! ```
//!
//! A domain expires one year after its last fill-up.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::address::Address;
use crate::boc;
use crate::cell::Cell;
use crate::errors::Result;

pub const SECONDS_IN_DAY: i64 = 24 * 60 * 60;
pub const SECONDS_IN_YEAR: i64 = 365 * SECONDS_IN_DAY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainItemData {
    pub index: [u8; 32],
    pub collection: Option<Address>,
    pub owner: Option<Address>,
    pub content: Arc<Cell>,
    pub domain: String,
    pub auction: Option<Arc<Cell>>,
    pub last_fill_up_time: u64,
}

impl DomainItemData {
    pub fn decode(cell: &Cell) -> Result<Self> {
        let mut s = cell.parse();
        let index = s.load_hash()?;
        let collection = s.load_maybe_address()?;
        let owner = s.load_maybe_address()?;
        let content = s.load_ref()?;
        let domain = s.load_ref()?.parse().load_string_tail()?;
        let auction = s.load_maybe_ref()?;
        let last_fill_up_time = s.load_u64(64)?;
        Ok(DomainItemData {
            index,
            collection,
            owner,
            content,
            domain,
            auction,
            last_fill_up_time,
        })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let last = i64::try_from(self.last_fill_up_time).ok()?;
        DateTime::from_timestamp(last.checked_add(SECONDS_IN_YEAR)?, 0)
    }
}

/// A domain the owner holds, as cross-referenced against jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainRecord {
    pub address: Address,
    pub name: String,
    pub expires_at: DateTime<Utc>,
}

impl DomainRecord {
    /// Combine the registry's name with the expiry read from the item's storage.
    ///
    /// The indexer-reported name is preferred; the stored one is the fallback.
    pub fn from_item(address: Address, name: Option<&str>, item: &DomainItemData) -> Option<Self> {
        let expires_at = item.expires_at()?;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| item.domain.clone());
        Some(DomainRecord {
            address,
            name,
            expires_at,
        })
    }

    /// Decode a `data_boc` and build the record, logging and skipping bad items.
    pub fn from_data_boc(address: Address, name: Option<&str>, data_boc: &str) -> Option<Self> {
        let item = match boc::decode_base64(data_boc).and_then(|cell| DomainItemData::decode(&cell))
        {
            Ok(item) => item,
            Err(e) => {
                warn!("Failed to parse domain data for {address}: {e}");
                return None;
            }
        };
        Self::from_item(address, name, &item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellBuilder;

    fn item_cell(name: &str, last_fill_up: u64, with_auction: bool) -> Cell {
        let mut domain = CellBuilder::new();
        domain.store_string_tail(name).unwrap();
        let auction = with_auction.then(|| Arc::new(Cell::empty()));

        let mut b = CellBuilder::new();
        b.store_bytes(&[3u8; 32])
            .unwrap()
            .store_address(&Address::new(0, [1; 32]))
            .unwrap()
            .store_address(&Address::new(0, [2; 32]))
            .unwrap()
            .store_ref(Arc::new(Cell::empty()))
            .unwrap()
            .store_ref(Arc::new(domain.build().unwrap()))
            .unwrap()
            .store_maybe_ref(auction)
            .unwrap()
            .store_uint(last_fill_up as u128, 64)
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn item_fields_decode() {
        let item = DomainItemData::decode(&item_cell("example", 1_700_000_000, true)).unwrap();
        assert_eq!(item.domain, "example");
        assert_eq!(item.owner, Some(Address::new(0, [2; 32])));
        assert!(item.auction.is_some());
        assert_eq!(item.last_fill_up_time, 1_700_000_000);
    }

    #[test]
    fn expiry_is_one_year_after_fill_up() {
        let item = DomainItemData::decode(&item_cell("a", 1_700_000_000, false)).unwrap();
        assert_eq!(
            item.expires_at().unwrap().timestamp(),
            1_700_000_000 + SECONDS_IN_YEAR
        );
    }

    #[test]
    fn record_prefers_indexer_name() {
        let item = DomainItemData::decode(&item_cell("stored", 0, false)).unwrap();
        let addr = Address::new(0, [9; 32]);
        let rec = DomainRecord::from_item(addr, Some("indexed.ton"), &item).unwrap();
        assert_eq!(rec.name, "indexed.ton");
        let rec = DomainRecord::from_item(addr, None, &item).unwrap();
        assert_eq!(rec.name, "stored");
    }

    #[test]
    fn record_from_boc_and_garbage() {
        let data = boc::encode_base64(&item_cell("x", 1, false));
        let addr = Address::new(0, [9; 32]);
        assert!(DomainRecord::from_data_boc(addr, None, &data).is_some());
        assert!(DomainRecord::from_data_boc(addr, None, "AAAA").is_none());
    }
}
