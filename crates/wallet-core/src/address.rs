//! Bitcoin address validation and scriptPubKey generation.
//!
//! Supports:
//! - P2PKH (Pay to Public Key Hash) - Legacy addresses starting with 1 (mainnet) or m/n (testnet)
//! - P2SH (Pay to Script Hash) - Addresses starting with 3 (mainnet) or 2 (testnet)
//! - P2WPKH (Pay to Witness Public Key Hash) - Native SegWit v0, bc1q.../tb1q...
//! - P2WSH (Pay to Witness Script Hash) - Native SegWit v0, bc1q... (32-byte program)
//! - P2TR (Pay to Taproot) - SegWit v1, bc1p.../tb1p...

use log::debug;

use crate::base58;
use crate::bech32;
use crate::error::{Error, Result};
use crate::hash::sha256;
use crate::keys::PublicKey;
use crate::network::Network;
use crate::script::{self, ScriptKind};

/// A validated Bitcoin address with its scriptPubKey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAddress {
    /// The type of address.
    pub address_type: ScriptKind,
    /// The network this address belongs to.
    pub network: Network,
    /// The scriptPubKey for this address (used in transaction outputs).
    pub script_pubkey: Vec<u8>,
    /// The original address string.
    pub display: String,
}

/// Validate a Bitcoin address and return its details.
pub fn validate_address(address: &str, expected_network: Network) -> Result<ValidatedAddress> {
    let trimmed = address.trim();
    let lower = trimmed.to_lowercase();

    // Try Bech32/Bech32m first (bc1.../tb1...)
    let validated = if lower.starts_with("bc1") || lower.starts_with("tb1") {
        validate_bech32_address(trimmed)?
    } else {
        // Try Base58Check (1.../3.../m.../n.../2...)
        validate_base58_address(trimmed)?
    };

    if validated.network != expected_network {
        return Err(Error::operand(format!(
            "address network mismatch: expected {}, got {}",
            expected_network, validated.network
        )));
    }
    debug!("validated {} address for {}", validated.address_type, validated.network);
    Ok(validated)
}

/// Validate a Base58Check encoded address (P2PKH or P2SH).
fn validate_base58_address(address: &str) -> Result<ValidatedAddress> {
    let payload = base58::decode_check(address)?;

    let (&version, hash) = payload
        .split_first()
        .ok_or_else(|| Error::malformed("empty Base58Check payload"))?;
    let hash: &[u8; 20] = hash
        .try_into()
        .map_err(|_| Error::malformed(format!("expected a 20-byte hash, got {} bytes", hash.len())))?;

    let (network, is_script_hash) = Network::from_base58_version(version)
        .ok_or_else(|| Error::malformed(format!("unknown address version byte {version:#04x}")))?;

    let (address_type, script_pubkey) = if is_script_hash {
        (ScriptKind::P2sh, script::p2sh(hash))
    } else {
        (ScriptKind::P2pkh, script::p2pkh(hash))
    };

    Ok(ValidatedAddress {
        address_type,
        network,
        script_pubkey,
        display: address.to_string(),
    })
}

/// Validate a Bech32/Bech32m encoded address (P2WPKH, P2WSH, or P2TR).
fn validate_bech32_address(address: &str) -> Result<ValidatedAddress> {
    let hrp = address
        .rfind('1')
        .map(|pos| address[..pos].to_lowercase())
        .ok_or_else(|| Error::malformed("Bech32 separator not found"))?;
    let network = Network::from_bech32_hrp(&hrp)
        .ok_or_else(|| Error::malformed(format!("unknown HRP: {hrp}")))?;

    let (version, program) = bech32::decode_segwit(&hrp, address)?;

    let address_type = match (version, program.len()) {
        (0, 20) => ScriptKind::P2wpkh,
        (0, 32) => ScriptKind::P2wsh,
        (1, 32) => ScriptKind::P2tr,
        _ => return Err(Error::NotImplemented("witness versions above 1")),
    };

    Ok(ValidatedAddress {
        address_type,
        network,
        script_pubkey: script::witness_program(version, &program),
        display: address.to_string(),
    })
}

/// Render a locking script as an address, if it has one of the five standard shapes.
pub fn script_to_address(script_pubkey: &[u8], network: Network) -> Option<String> {
    let payload = script::payload(script_pubkey)?;
    match script::classify(script_pubkey) {
        ScriptKind::P2pkh => Some(base58_address(network.p2pkh_version(), payload)),
        ScriptKind::P2sh => Some(base58_address(network.p2sh_version(), payload)),
        ScriptKind::P2wpkh | ScriptKind::P2wsh => {
            bech32::encode_segwit(network.bech32_hrp(), 0, payload).ok()
        }
        ScriptKind::P2tr => bech32::encode_segwit(network.bech32_hrp(), 1, payload).ok(),
        ScriptKind::Unknown => None,
    }
}

fn base58_address(version: u8, hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + hash.len());
    payload.push(version);
    payload.extend_from_slice(hash);
    base58::encode_check(&payload)
}

/// Legacy address of the compressed public key.
pub fn p2pkh_address(public_key: &PublicKey, network: Network) -> String {
    base58_address(network.p2pkh_version(), &public_key.hash160())
}

pub fn p2wpkh_address(public_key: &PublicKey, network: Network) -> Result<String> {
    bech32::encode_segwit(network.bech32_hrp(), 0, &public_key.hash160())
}

/// Address committing to `sha256(witness_script)`.
pub fn p2wsh_address(witness_script: &[u8], network: Network) -> Result<String> {
    bech32::encode_segwit(network.bech32_hrp(), 0, &sha256(witness_script))
}

/// Key-path taproot address using the x-only key directly as the output key.
pub fn p2tr_address(public_key: &PublicKey, network: Network) -> Result<String> {
    bech32::encode_segwit(network.bech32_hrp(), 1, &public_key.x_only())
}
