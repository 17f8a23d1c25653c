//! Standard (`addr_std`) account addresses.
//!
//! Two textual forms are accepted:
//!
//! * raw: `<workchain>:<64 hex chars>`, e.g. `0:83df…`;
//! * user-friendly: 48 base64 (standard or url-safe) characters encoding
//!   `tag ‖ workchain ‖ hash ‖ crc16` (36 bytes), where `tag` is `0x11`
//!   (bounceable) or `0x51` (non-bounceable), `| 0x80` on testnet.
//!
//! `Display` renders the raw form so the value round-trips through `FromStr`
//! without losing information; [`Address::to_friendly`] renders the
//! user-facing form.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use crc::{Crc, CRC_16_XMODEM};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::Error;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TESTNET: u8 = 0x80;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub workchain: i8,
    pub hash: [u8; 32],
}

impl Address {
    pub const fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Address { workchain, hash }
    }

    /// Render the 48-character url-safe form used by wallets and explorers.
    pub fn to_friendly(&self, bounceable: bool, testnet: bool) -> String {
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if testnet {
            tag |= TAG_TESTNET;
        }
        let mut bytes = Vec::with_capacity(36);
        bytes.push(tag);
        bytes.push(self.workchain as u8);
        bytes.extend_from_slice(&self.hash);
        bytes.extend_from_slice(&CRC16.checksum(&bytes).to_be_bytes());
        URL_SAFE.encode(bytes)
    }

    fn parse_raw(s: &str) -> Result<Self, Error> {
        let (wc, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidAddress(s.to_string()))?;
        let workchain: i8 = wc
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("bad workchain in {s}")))?;
        let bytes =
            hex::decode(hash_hex).map_err(|e| Error::InvalidAddress(format!("{s}: {e}")))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAddress(format!("{s}: hash must be 32 bytes")))?;
        Ok(Address::new(workchain, hash))
    }

    fn parse_friendly(s: &str) -> Result<Self, Error> {
        let bytes = URL_SAFE
            .decode(s)
            .or_else(|_| STANDARD.decode(s))
            .map_err(|e| Error::InvalidAddress(format!("{s}: {e}")))?;
        if bytes.len() != 36 {
            return Err(Error::InvalidAddress(format!("{s}: expected 36 bytes")));
        }
        let tag = bytes[0] & !TAG_TESTNET;
        if tag != TAG_BOUNCEABLE && tag != TAG_NON_BOUNCEABLE {
            return Err(Error::InvalidAddress(format!("{s}: unknown tag {:#04x}", bytes[0])));
        }
        let expected = u16::from_be_bytes([bytes[34], bytes[35]]);
        if CRC16.checksum(&bytes[..34]) != expected {
            return Err(Error::InvalidAddress(format!("{s}: checksum mismatch")));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(Address::new(bytes[1] as i8, hash))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains(':') {
            Self::parse_raw(s)
        } else {
            Self::parse_friendly(s)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.hash))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_form_round_trips() {
        let addr = Address::new(0, [0xab; 32]);
        let text = addr.to_string();
        assert_eq!(text, format!("0:{}", "ab".repeat(32)));
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn raw_form_accepts_uppercase_and_masterchain() {
        let text = format!("-1:{}", "CD".repeat(32));
        let addr: Address = text.parse().unwrap();
        assert_eq!(addr.workchain, -1);
        assert_eq!(addr.hash, [0xcd; 32]);
    }

    #[test]
    fn friendly_form_round_trips_with_flags() {
        let addr = Address::new(0, [7u8; 32]);
        for (bounceable, testnet) in [(true, false), (false, false), (true, true)] {
            let text = addr.to_friendly(bounceable, testnet);
            assert_eq!(text.len(), 48);
            assert_eq!(text.parse::<Address>().unwrap(), addr);
        }
    }

    #[test]
    fn known_collection_address_parses() {
        let addr: Address = "EQC3dNlesgVD8YbAazcauIrXBPfiVhMMr5YYk2in0Mtsz0Bz"
            .parse()
            .unwrap();
        assert_eq!(addr.workchain, 0);
        assert_eq!(
            addr.to_friendly(true, false),
            "EQC3dNlesgVD8YbAazcauIrXBPfiVhMMr5YYk2in0Mtsz0Bz"
        );
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let text = Address::new(0, [1u8; 32]).to_friendly(true, false);
        let mut corrupted: Vec<char> = text.chars().collect();
        corrupted[10] = if corrupted[10] == 'A' { 'B' } else { 'A' };
        let corrupted: String = corrupted.into_iter().collect();
        assert!(corrupted.parse::<Address>().is_err());
    }

    #[test]
    fn serde_uses_raw_string() {
        let addr = Address::new(0, [2u8; 32]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"0:{}\"", "02".repeat(32)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
