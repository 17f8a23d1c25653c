//! Per-network constants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn is_testnet(&self) -> bool {
        matches!(self, Self::Testnet)
    }

    /// The `.ton` DNS collection whose items are renewed.
    pub fn dns_collection(&self) -> Result<Address> {
        match self {
            Self::Mainnet => "EQC3dNlesgVD8YbAazcauIrXBPfiVhMMr5YYk2in0Mtsz0Bz".parse(),
            Self::Testnet => "kQDjPtM6QusgMgWfl9kMcG-EALslbTITnKcH8VZK1pnH3f3K".parse(),
        }
    }

    /// Base64 code hash of DNS item contracts, as reported by indexers.
    pub fn dns_item_code_hash(&self) -> &'static str {
        match self {
            Self::Mainnet => "i1/8nr/TkGTY1fVuRlnIJrt1k5I/XKSHKL5NYK9vUfk=",
            Self::Testnet => "Pwq5JTFwyGqu6/6rst4LwtNbTIVKmOo33Czf/ej06BE=",
        }
    }

    /// Default toncenter v3 endpoint.
    pub fn toncenter_v3_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://toncenter.com/api/v3",
            Self::Testnet => "https://testnet.toncenter.com/api/v3",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        })
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collections_parse_on_both_networks() {
        assert!(Network::Mainnet.dns_collection().is_ok());
        assert!(Network::Testnet.dns_collection().is_ok());
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("TESTNET".parse::<Network>().unwrap(), Network::Testnet);
        assert!("devnet".parse::<Network>().is_err());
    }
}
