//! secp256k1 key values.
//!
//! A [`PrivateKey`] holds its scalar and the public key derived from it once at
//! construction; both are immutable afterwards.

use std::fmt;

use log::debug;
use num_bigint::BigUint;
use num_traits::Zero;
use rand_core::{CryptoRng, RngCore};

use crate::curve::{Point, SECP256K1};
use crate::ecdsa::{self, Signature};
use crate::error::{Error, Result};
use crate::hash::{hash160, sha256};
use crate::modular::to_32_bytes;
use crate::schnorr;

/// Attempts at drawing a valid scalar before [`PrivateKey::generate`] gives up.
const MAX_KEYGEN_ATTEMPTS: usize = 64;

/// A validated, non-identity point on secp256k1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    x: BigUint,
    y: BigUint,
}

impl PublicKey {
    /// Wrap a point, rejecting the identity and off-curve coordinates.
    pub fn from_point(point: Point) -> Result<Self> {
        if !SECP256K1.is_on_curve(&point) {
            return Err(Error::NotOnCurve);
        }
        match point {
            Point::Infinity => Err(Error::PointAtInfinity),
            Point::Affine { x, y } => Ok(PublicKey { x, y }),
        }
    }

    /// Parse a 33-byte compressed or 65-byte uncompressed SEC1 encoding.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let curve = &*SECP256K1;
        match (bytes.len(), bytes.first()) {
            (33, Some(&prefix @ (0x02 | 0x03))) => {
                let x = BigUint::from_bytes_be(&bytes[1..]);
                let even = curve.lift_x(&x)?;
                let point = if prefix == 0x03 { curve.point_negate(&even)? } else { even };
                Self::from_point(point)
            }
            (65, Some(&0x04)) => {
                let x = BigUint::from_bytes_be(&bytes[1..33]);
                let y = BigUint::from_bytes_be(&bytes[33..]);
                Self::from_point(curve.point_from_affine(x, y)?)
            }
            (len, prefix) => Err(Error::malformed(format!(
                "unsupported public key encoding: {len} bytes, prefix {prefix:02x?}"
            ))),
        }
    }

    pub fn point(&self) -> Point {
        Point::Affine { x: self.x.clone(), y: self.y.clone() }
    }

    pub fn has_even_y(&self) -> bool {
        !self.y.bit(0)
    }

    /// Parity byte followed by the 32-byte x-coordinate.
    pub fn serialize_compressed(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[0] = if self.has_even_y() { 0x02 } else { 0x03 };
        out[1..].copy_from_slice(&to_32_bytes(&self.x));
        out
    }

    pub fn serialize_uncompressed(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&to_32_bytes(&self.x));
        out[33..].copy_from_slice(&to_32_bytes(&self.y));
        out
    }

    /// BIP-340 x-only form used by taproot.
    pub fn x_only(&self) -> [u8; 32] {
        to_32_bytes(&self.x)
    }

    /// HASH160 of the compressed encoding.
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.serialize_compressed())
    }

    /// Verify an ECDSA signature over `sha256(data)`.
    pub fn verify_ecdsa(&self, data: &[u8], sig: &Signature) -> Result<()> {
        self.verify_ecdsa_digest(&sha256(data), sig)
    }

    pub fn verify_ecdsa_digest(&self, digest: &[u8; 32], sig: &Signature) -> Result<()> {
        if ecdsa::verify(&SECP256K1, &self.point(), digest, sig) {
            Ok(())
        } else {
            Err(Error::VerificationFailed)
        }
    }

    /// Verify a BIP-340 signature against this key's x-only form.
    pub fn verify_schnorr(&self, msg: &[u8], sig: &[u8; 64]) -> Result<()> {
        if schnorr::verify(&SECP256K1, &self.x_only(), msg, sig) {
            Ok(())
        } else {
            Err(Error::VerificationFailed)
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.serialize_compressed()))
    }
}

/// A secret scalar `0 < d < n` with its public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: BigUint,
    public: PublicKey,
}

impl PrivateKey {
    /// Import 32 big-endian bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(Error::operand(format!("private key must be 32 bytes, got {}", bytes.len())));
        }
        Self::from_scalar(BigUint::from_bytes_be(bytes))
    }

    fn from_scalar(secret: BigUint) -> Result<Self> {
        let curve = &*SECP256K1;
        if secret.is_zero() || !curve.order.contains(&secret) {
            return Err(Error::operand("private key out of range"));
        }
        let public = PublicKey::from_point(curve.mul_generator(&secret)?)?;
        Ok(PrivateKey { secret, public })
    }

    /// Draw a fresh key from `rng`.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut bytes = [0u8; 32];
        for _ in 0..MAX_KEYGEN_ATTEMPTS {
            rng.fill_bytes(&mut bytes);
            match Self::from_bytes(&bytes) {
                Ok(key) => {
                    debug!("generated key {}", key.public);
                    return Ok(key);
                }
                Err(Error::InvalidOperand(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::operand("randomness source produced no valid scalar"))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        to_32_bytes(&self.secret)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// ECDSA over `sha256(data)`.
    pub fn sign_ecdsa<R: RngCore + CryptoRng>(&self, data: &[u8], rng: &mut R) -> Result<Signature> {
        self.sign_ecdsa_digest(&sha256(data), rng)
    }

    pub fn sign_ecdsa_digest<R: RngCore + CryptoRng>(
        &self,
        digest: &[u8; 32],
        rng: &mut R,
    ) -> Result<Signature> {
        ecdsa::sign(&SECP256K1, &self.secret, digest, rng)
    }

    /// BIP-340 signature with fresh auxiliary randomness.
    pub fn sign_schnorr<R: RngCore + CryptoRng>(&self, msg: &[u8], rng: &mut R) -> Result<[u8; 64]> {
        schnorr::sign(&SECP256K1, &self.secret, msg, rng)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &self.public.to_string())
            .finish_non_exhaustive()
    }
}
