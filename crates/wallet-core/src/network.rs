//! Bitcoin network definitions and constants.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Bitcoin network type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Bitcoin mainnet
    #[default]
    Mainnet,
    /// Bitcoin testnet4
    Testnet4,
}

impl Network {
    /// Get the Bech32 human-readable part for this network.
    pub fn bech32_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "bc",
            Network::Testnet4 => "tb",
        }
    }

    /// Get the version byte for P2PKH addresses.
    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet4 => 0x6f,
        }
    }

    /// Get the version byte for P2SH addresses.
    pub fn p2sh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            Network::Testnet4 => 0xc4,
        }
    }

    /// Version byte prefixed to WIF private keys.
    pub fn wif_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet4 => 0xef,
        }
    }

    pub fn from_bech32_hrp(hrp: &str) -> Option<Self> {
        match hrp {
            "bc" => Some(Network::Mainnet),
            "tb" => Some(Network::Testnet4),
            _ => None,
        }
    }

    /// Network and address kind for a Base58Check version byte.
    pub fn from_base58_version(version: u8) -> Option<(Self, bool)> {
        match version {
            0x00 => Some((Network::Mainnet, false)),
            0x05 => Some((Network::Mainnet, true)),
            0x6f => Some((Network::Testnet4, false)),
            0xc4 => Some((Network::Testnet4, true)),
            _ => None,
        }
    }

    pub fn from_wif_version(version: u8) -> Option<Self> {
        match version {
            0x80 => Some(Network::Mainnet),
            0xef => Some(Network::Testnet4),
            _ => None,
        }
    }

    /// Get network name as string.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet4 => "testnet4",
        }
    }

    /// Get display name for UI.
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Mainnet => "Bitcoin Mainnet",
            Network::Testnet4 => "Bitcoin Testnet4",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet4" | "testnet" | "test" => Ok(Network::Testnet4),
            other => Err(Error::operand(format!("unknown network {other:?}"))),
        }
    }
}

impl core::fmt::Display for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}
