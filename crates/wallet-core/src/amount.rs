//! Conversions between satoshis and decimal BTC strings.

use crate::error::{Error, Result};

pub const SATS_PER_BTC: u64 = 100_000_000;
const DECIMALS: usize = 8;

/// `123456789` -> `"1.23456789"`.
pub fn format_btc(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}

/// Parse a decimal BTC amount into satoshis.
///
/// Accepts `"1"`, `"1."`, `".5"` and up to eight fractional digits.
pub fn parse_btc(text: &str) -> Result<u64> {
    let text = text.trim();
    let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(Error::malformed(format!("not an amount: {text:?}")));
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(Error::malformed(format!("not an amount: {text:?}")));
    }
    if frac.len() > DECIMALS {
        return Err(Error::malformed(format!("more than {DECIMALS} decimal places: {text:?}")));
    }

    let overflow = || Error::malformed(format!("amount too large: {text:?}"));
    let whole_sats = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| overflow())?
            .checked_mul(SATS_PER_BTC)
            .ok_or_else(overflow)?
    };
    let frac_sats = if frac.is_empty() {
        0
    } else {
        // Right-pad to eight digits: ".5" is 50_000_000 sats.
        format!("{frac:0<DECIMALS$}").parse::<u64>().map_err(|_| overflow())?
    };
    whole_sats.checked_add(frac_sats).ok_or_else(overflow)
}
