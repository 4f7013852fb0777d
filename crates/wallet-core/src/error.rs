//! Error taxonomy shared by every layer of the core.

use thiserror::Error;

/// Errors surfaced by the arithmetic, curve, signature, codec and encoding layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Truncated buffers, bad checksums, wrong magic bytes, unsupported encodings.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Arithmetic or API preconditions violated.
    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// Coordinates that do not satisfy the curve equation.
    #[error("point is not on the curve")]
    NotOnCurve,

    /// The identity appeared where a proper point is required.
    #[error("unexpected point at infinity")]
    PointAtInfinity,

    /// Degenerate signing randomness.
    #[error("nonce produced a degenerate signature")]
    BadNonce,

    /// A signature did not verify.
    #[error("signature verification failed")]
    VerificationFailed,

    /// The spend plan does not cover amount plus fee.
    #[error("insufficient funds: required {required} sat, available {available} sat")]
    InsufficientFunds { required: u64, available: u64 },

    /// Explicitly unsupported feature.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }

    pub(crate) fn operand(msg: impl Into<String>) -> Self {
        Error::InvalidOperand(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::InsufficientFunds { required: 1_000, available: 10 };
        assert_eq!(
            err.to_string(),
            "insufficient funds: required 1000 sat, available 10 sat"
        );
        assert_eq!(Error::malformed("truncated").to_string(), "malformed input: truncated");
        assert_eq!(Error::NotImplemented("annex").to_string(), "not implemented: annex");
    }
}
