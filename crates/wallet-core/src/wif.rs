//! Wallet Import Format private keys.
//!
//! `base58check(version || key(32) || [0x01 if compressed])`. Exported keys may
//! carry a `p2wpkh:` or `p2tr:` prefix naming the script the key is meant for.

use std::fmt;
use std::str::FromStr;

use crate::base58;
use crate::error::{Error, Result};
use crate::keys::PrivateKey;
use crate::network::Network;

const COMPRESSED_FLAG: u8 = 0x01;

/// Script type a stored key is intended to spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyKind {
    #[default]
    P2wpkh,
    P2tr,
}

impl KeyKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            KeyKind::P2wpkh => "p2wpkh",
            KeyKind::P2tr => "p2tr",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for KeyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "p2wpkh" => Ok(KeyKind::P2wpkh),
            "p2tr" => Ok(KeyKind::P2tr),
            other => Err(Error::malformed(format!("unknown key type prefix {other:?}"))),
        }
    }
}

/// A decoded WIF key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifKey {
    pub key: PrivateKey,
    pub network: Network,
    pub compressed: bool,
}

pub fn encode(key: &PrivateKey, network: Network, compressed: bool) -> String {
    let mut payload = Vec::with_capacity(34);
    payload.push(network.wif_version());
    payload.extend_from_slice(&key.to_bytes());
    if compressed {
        payload.push(COMPRESSED_FLAG);
    }
    base58::encode_check(&payload)
}

pub fn decode(wif: &str) -> Result<WifKey> {
    let payload = base58::decode_check(wif.trim())?;
    let (&version, rest) = payload
        .split_first()
        .ok_or_else(|| Error::malformed("empty WIF payload"))?;
    let network = Network::from_wif_version(version)
        .ok_or_else(|| Error::malformed(format!("invalid WIF version byte {version:#04x}")))?;

    let (secret, compressed) = match rest {
        [secret @ .., COMPRESSED_FLAG] if secret.len() == 32 => (secret, true),
        [.., flag] if rest.len() == 33 => {
            return Err(Error::malformed(format!("invalid WIF compression byte {flag:#04x}")))
        }
        secret if secret.len() == 32 => (secret, false),
        _ => return Err(Error::malformed(format!("invalid WIF payload length {}", payload.len()))),
    };

    let key = PrivateKey::from_bytes(secret).map_err(|e| match e {
        Error::InvalidOperand(msg) => Error::MalformedInput(msg),
        other => other,
    })?;
    Ok(WifKey { key, network, compressed })
}

/// `"<kind>:<compressed wif>"`.
pub fn encode_with_kind(key: &PrivateKey, network: Network, kind: KeyKind) -> String {
    format!("{}:{}", kind, encode(key, network, true))
}

/// Split an optional `p2wpkh:` / `p2tr:` prefix. Unprefixed keys are P2WPKH.
pub fn decode_with_kind(text: &str) -> Result<(KeyKind, WifKey)> {
    let text = text.trim();
    let (kind, wif) = match text.split_once(':') {
        Some((prefix, wif)) => (prefix.parse()?, wif),
        None => (KeyKind::default(), text),
    };
    Ok((kind, decode(wif)?))
}
