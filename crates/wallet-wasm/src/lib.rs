//! WebAssembly bindings for the Bitcoin wallet core.
//!
//! This crate provides JavaScript-accessible APIs for:
//! - Importing, generating and exporting keys (WIF with a script-type prefix)
//! - Deriving receive addresses
//! - Building and signing transactions from a UTXO list
//! - Exporting unsigned PSBTs
//! - Parsing raw transactions for display

use wasm_bindgen::prelude::*;

pub mod logger;
pub mod state;
pub mod wallet;

// Re-export main types for JS access
pub use wallet::Wallet;

/// Initialize the WASM module with better panic messages and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logger::init(log::LevelFilter::Info);
}

/// Change the console log level ("error", "warn", "info", "debug", "trace" or "off").
#[wasm_bindgen]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let level = level
        .parse::<log::LevelFilter>()
        .map_err(|_| JsValue::from_str(&format!("Invalid log level: {}", level)))?;
    logger::init(level);
    Ok(())
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
