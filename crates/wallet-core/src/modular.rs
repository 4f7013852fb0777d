//! Arithmetic over the integers modulo a prime.
//!
//! Every operation takes operands that are already reduced (`0 <= a < m`) and
//! returns a reduced result. Callers bring arbitrary integers into range with
//! [`PrimeModulus::reduce`]. Values are carried as [`BigUint`]; the fixed byte
//! width of the modulus is enforced at the byte boundary
//! ([`PrimeModulus::from_be_bytes`] / [`PrimeModulus::to_be_bytes`]).

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::{Error, Result};

/// A prime modulus together with its fixed serialization width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeModulus {
    modulus: BigUint,
    byte_len: usize,
}

impl PrimeModulus {
    /// Wrap a prime. The byte width is the minimal big-endian length of `modulus`.
    pub fn new(modulus: BigUint) -> Self {
        let byte_len = ((modulus.bits() + 7) / 8) as usize;
        PrimeModulus { modulus, byte_len }
    }

    /// Parse a hexadecimal prime.
    ///
    /// # Panics
    /// Panics if `hex` is not valid hexadecimal; only used for compile-time constants.
    pub fn from_hex(hex: &str) -> Self {
        let modulus = BigUint::parse_bytes(hex.as_bytes(), 16)
            .unwrap_or_else(|| panic!("invalid modulus constant {hex}"));
        Self::new(modulus)
    }

    /// The modulus itself.
    pub fn value(&self) -> &BigUint {
        &self.modulus
    }

    /// Width in bytes of every serialized residue.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Whether `a` is a reduced residue.
    pub fn contains(&self, a: &BigUint) -> bool {
        a < &self.modulus
    }

    /// Bring an arbitrary integer into `[0, m)`.
    pub fn reduce(&self, a: &BigUint) -> BigUint {
        a % &self.modulus
    }

    fn check(&self, a: &BigUint) -> Result<()> {
        if self.contains(a) {
            Ok(())
        } else {
            Err(Error::operand("operand is not reduced modulo the prime"))
        }
    }

    /// Read a residue from exactly `byte_len` big-endian bytes.
    pub fn from_be_bytes(&self, bytes: &[u8]) -> Result<BigUint> {
        if bytes.len() != self.byte_len {
            return Err(Error::operand(format!(
                "expected {} bytes, got {}",
                self.byte_len,
                bytes.len()
            )));
        }
        let value = BigUint::from_bytes_be(bytes);
        self.check(&value)?;
        Ok(value)
    }

    /// Write a residue as exactly `byte_len` big-endian bytes.
    pub fn to_be_bytes(&self, a: &BigUint) -> Result<Vec<u8>> {
        self.check(a)?;
        Ok(left_pad(&a.to_bytes_be(), self.byte_len))
    }

    pub fn add(&self, a: &BigUint, b: &BigUint) -> Result<BigUint> {
        self.check(a)?;
        self.check(b)?;
        let sum = a + b;
        Ok(if sum >= self.modulus { sum - &self.modulus } else { sum })
    }

    /// `a - b mod m`; the modulus is added first when `a < b`.
    pub fn sub(&self, a: &BigUint, b: &BigUint) -> Result<BigUint> {
        self.check(a)?;
        self.check(b)?;
        if a >= b {
            Ok(a - b)
        } else {
            Ok(a + &self.modulus - b)
        }
    }

    pub fn neg(&self, a: &BigUint) -> Result<BigUint> {
        self.sub(&BigUint::zero(), a)
    }

    pub fn mul(&self, a: &BigUint, b: &BigUint) -> Result<BigUint> {
        self.check(a)?;
        self.check(b)?;
        Ok((a * b) % &self.modulus)
    }

    /// `base^exp mod m` by square-and-multiply, most significant exponent bit first.
    ///
    /// The exponent is an ordinary integer and need not be reduced.
    pub fn pow(&self, base: &BigUint, exp: &BigUint) -> Result<BigUint> {
        self.check(base)?;
        let mut result = self.reduce(&BigUint::one());
        for i in (0..exp.bits()).rev() {
            result = (&result * &result) % &self.modulus;
            if exp.bit(i) {
                result = (&result * base) % &self.modulus;
            }
        }
        Ok(result)
    }

    /// Multiplicative inverse via Fermat: `a^(m-2)`.
    pub fn inverse(&self, a: &BigUint) -> Result<BigUint> {
        self.check(a)?;
        if a.is_zero() {
            return Err(Error::operand("zero has no inverse"));
        }
        let exp = &self.modulus - BigUint::from(2u32);
        self.pow(a, &exp)
    }

    /// Square root for moduli `m ≡ 3 (mod 4)`, computed as `a^((m+1)/4)`.
    ///
    /// Returns one of the two roots; the other is `m - root`.
    pub fn sqrt(&self, a: &BigUint) -> Result<BigUint> {
        self.check(a)?;
        let four = BigUint::from(4u32);
        if &self.modulus % &four != BigUint::from(3u32) {
            return Err(Error::NotImplemented("square root for moduli other than 3 mod 4"));
        }
        let exp = (&self.modulus + BigUint::one()) / four;
        let root = self.pow(a, &exp)?;
        if self.mul(&root, &root)? != *a {
            return Err(Error::operand("not a quadratic residue"));
        }
        Ok(root)
    }
}

/// Left-pad a big-endian byte string with zeros up to `len` bytes.
pub(crate) fn left_pad(bytes: &[u8], len: usize) -> Vec<u8> {
    // BigUint::to_bytes_be yields [0] for zero; strip it before padding.
    let trimmed = match bytes.iter().position(|&b| b != 0) {
        Some(start) => &bytes[start..],
        None => &[][..],
    };
    let mut out = vec![0u8; len.saturating_sub(trimmed.len())];
    out.extend_from_slice(trimmed);
    out
}

/// Big-endian 32-byte encoding of an integer known to fit in 256 bits.
pub(crate) fn to_32_bytes(a: &BigUint) -> [u8; 32] {
    let padded = left_pad(&a.to_bytes_be(), 32);
    let mut out = [0u8; 32];
    out.copy_from_slice(&padded[padded.len() - 32..]);
    out
}
