//! Cryptographic and wire-protocol core for a Bitcoin wallet.
//!
//! This crate provides pure Rust implementations of:
//! - Prime-field arithmetic and the secp256k1 group
//! - SHA-256, RIPEMD-160 and BIP-340 tagged hashes
//! - ECDSA with public-key recovery and BIP-340 Schnorr signatures
//! - Transaction serialization, txid/wtxid, and BIP-143 / BIP-341 sighashes
//! - Base58Check, Bech32/Bech32m, WIF, DER and PSBT encodings
//! - Spend-plan assembly and per-input signing

pub mod address;
pub mod amount;
pub mod base58;
pub mod bech32;
pub mod curve;
pub mod der;
pub mod ecdsa;
pub mod error;
pub mod hash;
pub mod keys;
pub mod modular;
pub mod network;
pub mod psbt;
pub mod schnorr;
pub mod script;
pub mod sighash;
pub mod transaction;
pub mod wallet;
pub mod wif;

pub use address::{script_to_address, validate_address, ValidatedAddress};
pub use amount::{format_btc, parse_btc};
pub use curve::{Curve, Point, SECP256K1};
pub use ecdsa::Signature;
pub use error::{Error, Result};
pub use hash::{double_sha256, sha256, tagged_hash};
pub use keys::{PrivateKey, PublicKey};
pub use network::Network;
pub use psbt::Psbt;
pub use script::ScriptKind;
pub use sighash::SighashType;
pub use transaction::{OutPoint, Transaction, TxIn, TxOut};
pub use wallet::{SignedTransaction, SpendRequest, SpendableOutput, WalletConfig};
pub use wif::KeyKind;
