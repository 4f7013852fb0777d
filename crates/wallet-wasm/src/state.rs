//! Display models handed to JavaScript.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wallet_core::{
    format_btc, hash::hash_to_display_hex, script_to_address, Network, SignedTransaction, Transaction,
};

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
}

/// One input of a parsed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputInfo {
    /// Previous txid (display format).
    pub txid: String,
    pub vout: u32,
    pub sequence: u32,
    /// Number of witness stack items.
    pub witness_items: usize,
}

/// One output of a parsed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputInfo {
    /// Value in satoshis.
    pub value: u64,
    /// Value in BTC, eight decimals.
    pub value_btc: String,
    pub script_pubkey: String,
    /// Address, when the script has a standard shape.
    pub address: Option<String>,
}

/// Transaction summary for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub txid: String,
    pub wtxid: String,
    pub version: u32,
    pub lock_time: u32,
    pub inputs: Vec<InputInfo>,
    pub outputs: Vec<OutputInfo>,
    /// Serialized size including witness data.
    pub size: usize,
    pub vsize: usize,
    pub weight: usize,
}

impl TransactionInfo {
    pub fn from_transaction(tx: &Transaction, network: Network) -> Self {
        TransactionInfo {
            txid: hash_to_display_hex(&tx.txid()),
            wtxid: hash_to_display_hex(&tx.wtxid()),
            version: tx.version,
            lock_time: tx.lock_time,
            inputs: tx
                .inputs
                .iter()
                .map(|input| InputInfo {
                    txid: hash_to_display_hex(&input.previous_output.txid),
                    vout: input.previous_output.vout,
                    sequence: input.sequence,
                    witness_items: input.witness.len(),
                })
                .collect(),
            outputs: tx
                .outputs
                .iter()
                .map(|output| OutputInfo {
                    value: output.value,
                    value_btc: format_btc(output.value),
                    script_pubkey: hex::encode(&output.script_pubkey),
                    address: script_to_address(&output.script_pubkey, network),
                })
                .collect(),
            size: tx.total_size(),
            vsize: tx.vsize(),
            weight: tx.weight(),
        }
    }

    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTxInfo {
    /// Raw transaction hex for broadcast.
    pub hex: String,
    pub txid: String,
    pub wtxid: String,
    pub vsize: usize,
    /// Fee in satoshis, including any dust change.
    pub fee: u64,
    pub fee_btc: String,
}

impl SignedTxInfo {
    pub fn from_signed(signed: &SignedTransaction) -> Self {
        SignedTxInfo {
            hex: hex::encode(&signed.raw),
            txid: hash_to_display_hex(&signed.txid),
            wtxid: hash_to_display_hex(&signed.wtxid),
            vsize: signed.vsize,
            fee: signed.fee,
            fee_btc: format_btc(signed.fee),
        }
    }

    /// Convert to JS value.
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// An unspent output supplied by the UI, typically from a block explorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtxoInfo {
    /// Funding txid (display format).
    pub txid: String,
    pub vout: u32,
    /// Value in satoshis.
    pub value: u64,
    /// Index of the wallet key that owns this output.
    #[serde(default)]
    pub key_index: usize,
}
