//! ECDSA signing, verification and public-key recovery.
//!
//! Message hashes enter as 32-byte digests read big-endian and reduced modulo
//! the group order. Produced signatures are always low-S, and the recovery id
//! stored with them matches the encoded `(r, s)`.

use log::{debug, warn};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};

use crate::curve::{Curve, Point};
use crate::der;
use crate::error::{Error, Result};
use crate::modular::to_32_bytes;

/// Fresh nonces drawn before [`sign`] gives up.
const MAX_NONCE_ATTEMPTS: usize = 64;

/// An ECDSA signature with an optional 2-bit recovery id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
    /// Bit 0: parity of `R.y`. Bit 1: `R.x` was at or above the order.
    pub recovery_id: Option<u8>,
}

impl Signature {
    /// DER `SEQUENCE { INTEGER r, INTEGER s }`.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        der::encode_signature(&to_32_bytes(&self.r), &to_32_bytes(&self.s))
    }

    /// Parse a DER signature. Trailing bytes after the SEQUENCE are ignored.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let (r, s) = der::decode_signature(bytes)?;
        Ok(Signature {
            r: BigUint::from_bytes_be(&r),
            s: BigUint::from_bytes_be(&s),
            recovery_id: None,
        })
    }

    pub fn is_low_s(&self, curve: &Curve) -> bool {
        self.s <= curve.order.value() >> 1
    }
}

/// Digest to scalar: big-endian integer reduced mod n.
pub(crate) fn digest_to_scalar(curve: &Curve, digest: &[u8; 32]) -> BigUint {
    curve.order.reduce(&BigUint::from_bytes_be(digest))
}

fn check_secret(curve: &Curve, d: &BigUint) -> Result<()> {
    if d.is_zero() || !curve.order.contains(d) {
        return Err(Error::operand("private scalar must be in [1, n-1]"));
    }
    Ok(())
}

/// Sign `digest` with secret `d` and caller-chosen nonce `k`.
///
/// Fails with [`Error::BadNonce`] if `k` is outside `(1, n)` or produces a zero
/// `r` or `s`. The result is normalized to low-S and self-verified.
///
/// # Panics
/// Panics if the produced signature does not verify against `d·G`.
pub fn sign_with_nonce(
    curve: &Curve,
    d: &BigUint,
    digest: &[u8; 32],
    k: &BigUint,
) -> Result<Signature> {
    check_secret(curve, d)?;
    let n = &curve.order;
    if k <= &BigUint::one() || !n.contains(k) {
        return Err(Error::BadNonce);
    }
    let (rx, ry) = match curve.mul_generator(k)? {
        Point::Infinity => return Err(Error::BadNonce),
        Point::Affine { x, y } => (x, y),
    };

    let mut recovery_id = u8::from(ry.bit(0));
    if !n.contains(&rx) {
        recovery_id |= 2;
    }
    let r = n.reduce(&rx);
    if r.is_zero() {
        return Err(Error::BadNonce);
    }

    let z = digest_to_scalar(curve, digest);
    let rd = n.mul(&r, d)?;
    let s = n.mul(&n.inverse(k)?, &n.add(&z, &rd)?)?;
    if s.is_zero() {
        return Err(Error::BadNonce);
    }

    // Low-S: s and n - s verify alike, the latter against -R.
    let half = n.value() >> 1;
    let s = if s > half {
        recovery_id ^= 1;
        n.neg(&s)?
    } else {
        s
    };

    let sig = Signature { r, s, recovery_id: Some(recovery_id) };
    let public = curve.mul_generator(d)?;
    assert!(
        verify(curve, &public, digest, &sig),
        "freshly produced ECDSA signature failed self-verification"
    );
    Ok(sig)
}

/// Sign `digest` with nonces drawn from `rng`, retrying degenerate nonces.
pub fn sign<R: RngCore + CryptoRng>(
    curve: &Curve,
    d: &BigUint,
    digest: &[u8; 32],
    rng: &mut R,
) -> Result<Signature> {
    check_secret(curve, d)?;
    let mut nonce = [0u8; 32];
    for attempt in 1..=MAX_NONCE_ATTEMPTS {
        rng.fill_bytes(&mut nonce);
        let k = BigUint::from_bytes_be(&nonce);
        match sign_with_nonce(curve, d, digest, &k) {
            Err(Error::BadNonce) => {
                warn!("ECDSA nonce rejected on attempt {attempt}, drawing another");
            }
            other => return other,
        }
    }
    Err(Error::BadNonce)
}

/// Verify `sig` over `digest` against public point `q`.
pub fn verify(curve: &Curve, q: &Point, digest: &[u8; 32], sig: &Signature) -> bool {
    verify_inner(curve, q, digest, sig).unwrap_or(false)
}

fn verify_inner(curve: &Curve, q: &Point, digest: &[u8; 32], sig: &Signature) -> Result<bool> {
    if q.is_infinity() || !curve.is_on_curve(q) {
        return Ok(false);
    }
    // Cofactor check: q must lie in the order-n subgroup
    if !curve.scalar_mult(q, curve.order.value())?.is_infinity() {
        return Ok(false);
    }
    let n = &curve.order;
    for v in [&sig.r, &sig.s] {
        if v.is_zero() || !n.contains(v) {
            return Ok(false);
        }
    }
    let z = digest_to_scalar(curve, digest);
    let w = n.inverse(&sig.s)?;
    let u1 = n.mul(&z, &w)?;
    let u2 = n.mul(&sig.r, &w)?;
    let point = curve.point_add(&curve.mul_generator(&u1)?, &curve.scalar_mult(q, &u2)?)?;
    Ok(match point.x() {
        None => false,
        Some(x) => n.reduce(x) == sig.r,
    })
}

/// Recover the public key for recovery id `id` (0..=3).
///
/// The candidate is returned only if `sig` verifies against it.
pub fn recover_public_key(curve: &Curve, digest: &[u8; 32], sig: &Signature, id: u8) -> Result<Point> {
    if id > 3 {
        return Err(Error::operand(format!("recovery id {id} out of range")));
    }
    let n = &curve.order;
    if sig.r.is_zero() || !n.contains(&sig.r) || sig.s.is_zero() || !n.contains(&sig.s) {
        return Err(Error::operand("signature scalars out of range"));
    }

    let x = if id & 2 != 0 { &sig.r + n.value() } else { sig.r.clone() };
    let lifted = curve.lift_x(&x)?;
    let r_point = if (id & 1 == 1) == lifted.has_even_y() {
        curve.point_negate(&lifted)?
    } else {
        lifted
    };

    // Q = r⁻¹·(s·R - z·G)
    let z = digest_to_scalar(curve, digest);
    let r_inv = n.inverse(&sig.r)?;
    let u1 = n.mul(&n.neg(&z)?, &r_inv)?;
    let u2 = n.mul(&sig.s, &r_inv)?;
    let q = curve.point_add(&curve.mul_generator(&u1)?, &curve.scalar_mult(&r_point, &u2)?)?;
    if q.is_infinity() {
        return Err(Error::PointAtInfinity);
    }
    if !verify(curve, &q, digest, sig) {
        return Err(Error::VerificationFailed);
    }
    Ok(q)
}

/// Try all four recovery ids, keeping every candidate that verifies.
pub fn recover_public_keys(curve: &Curve, digest: &[u8; 32], sig: &Signature) -> Vec<(u8, Point)> {
    let candidates: Vec<(u8, Point)> = (0..4u8)
        .filter_map(|id| recover_public_key(curve, digest, sig, id).ok().map(|q| (id, q)))
        .collect();
    debug!("recovered {} candidate public keys", candidates.len());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::SECP256K1;
    use crate::hash::sha256;
    use proptest::prelude::*;
    use rand_core::OsRng;

    fn int(s: &str) -> BigUint {
        BigUint::parse_bytes(s.as_bytes(), 16).unwrap()
    }

    #[test]
    fn test_sign_verify_fixed_nonce() {
        let curve = &*SECP256K1;
        let d = int("18E14A7B6A307F426A94F8114701E7C8E774E7F9A47E2C2035DB29A206321725");
        let q = curve.mul_generator(&d).unwrap();
        let digest = sha256(b"hello");
        let sig = sign_with_nonce(curve, &d, &digest, &BigUint::from(12345u32)).unwrap();
        assert!(sig.is_low_s(curve));
        assert!(verify(curve, &q, &digest, &sig));
        // Different message fails
        assert!(!verify(curve, &q, &sha256(b"hellp"), &sig));
        // Different key fails
        assert!(!verify(curve, &curve.generator, &digest, &sig));
    }

    #[test]
    fn test_bad_nonces() {
        let curve = &*SECP256K1;
        let d = BigUint::from(7u32);
        let digest = sha256(b"x");
        for k in [BigUint::zero(), BigUint::one(), curve.order.value().clone()] {
            assert_eq!(sign_with_nonce(curve, &d, &digest, &k), Err(Error::BadNonce));
        }
        assert!(matches!(
            sign_with_nonce(curve, &BigUint::zero(), &digest, &BigUint::from(5u32)),
            Err(Error::InvalidOperand(_))
        ));
    }

    #[test]
    fn test_verify_rejects_degenerate_inputs() {
        let curve = &*SECP256K1;
        let digest = sha256(b"x");
        let sig = Signature { r: BigUint::one(), s: BigUint::one(), recovery_id: None };
        assert!(!verify(curve, &Point::Infinity, &digest, &sig));
        let off_curve = Point::Affine { x: BigUint::one(), y: BigUint::one() };
        assert!(!verify(curve, &off_curve, &digest, &sig));
        let zero_r = Signature { r: BigUint::zero(), s: BigUint::one(), recovery_id: None };
        assert!(!verify(curve, &curve.generator, &digest, &zero_r));
        let big_s = Signature { r: BigUint::one(), s: curve.order.value().clone(), recovery_id: None };
        assert!(!verify(curve, &curve.generator, &digest, &big_s));
    }

    #[test]
    fn test_recovery_id_recovers_signer() {
        let curve = &*SECP256K1;
        let d = int("0C28FCA386C7A227600B2FE50B7CAE11EC86D3BF1FBE471BE89827E19D72AA1D");
        let q = curve.mul_generator(&d).unwrap();
        let digest = sha256(b"recover me");
        for k in [3u32, 1000, 987654321] {
            let sig = sign_with_nonce(curve, &d, &digest, &BigUint::from(k)).unwrap();
            let id = sig.recovery_id.unwrap();
            assert_eq!(recover_public_key(curve, &digest, &sig, id).unwrap(), q);
            let all = recover_public_keys(curve, &digest, &sig);
            assert!(all.iter().any(|(i, p)| *i == id && *p == q));
        }
    }

    #[test]
    fn test_recover_rejects_bad_id() {
        let curve = &*SECP256K1;
        let sig = Signature { r: BigUint::one(), s: BigUint::one(), recovery_id: None };
        assert!(matches!(
            recover_public_key(curve, &[0u8; 32], &sig, 4),
            Err(Error::InvalidOperand(_))
        ));
    }

    #[test]
    fn test_der_roundtrip() {
        let curve = &*SECP256K1;
        let sig = sign_with_nonce(curve, &BigUint::from(99u32), &sha256(b"der"), &BigUint::from(42u32))
            .unwrap();
        let der = sig.to_der().unwrap();
        assert_eq!(der[0], 0x30);
        let parsed = Signature::from_der(&der).unwrap();
        assert_eq!((parsed.r, parsed.s), (sig.r, sig.s));
    }

    #[test]
    fn test_nonce_reuse_leaks_key() {
        // Two signatures sharing k reveal d = (s1·k - z1)/r
        let curve = &*SECP256K1;
        let n = &curve.order;
        let d = BigUint::from(0xdeadbeefu32);
        let k = BigUint::from(0x1234567u32);
        let (h1, h2) = (sha256(b"first"), sha256(b"second"));
        let s1 = sign_with_nonce(curve, &d, &h1, &k).unwrap();
        let s2 = sign_with_nonce(curve, &d, &h2, &k).unwrap();
        assert_eq!(s1.r, s2.r);

        // Undo low-S normalization using the recovery parity bit relative to k·G
        let r_point = curve.mul_generator(&k).unwrap();
        let raw_s = |sig: &Signature| {
            let flipped = (sig.recovery_id.unwrap() & 1 == 1) == r_point.has_even_y();
            if flipped { n.neg(&sig.s).unwrap() } else { sig.s.clone() }
        };
        let (z1, z2) = (digest_to_scalar(curve, &h1), digest_to_scalar(curve, &h2));
        let k_found = n
            .mul(&n.sub(&z1, &z2).unwrap(), &n.inverse(&n.sub(&raw_s(&s1), &raw_s(&s2)).unwrap()).unwrap())
            .unwrap();
        assert_eq!(k_found, k);
        let d_found = n
            .mul(&n.sub(&n.mul(&raw_s(&s1), &k_found).unwrap(), &z1).unwrap(), &n.inverse(&s1.r).unwrap())
            .unwrap();
        assert_eq!(d_found, d);
    }

    #[test]
    fn test_sign_with_os_rng() {
        let curve = &*SECP256K1;
        let d = BigUint::from(424242u32);
        let digest = sha256(b"random nonce");
        let a = sign(curve, &d, &digest, &mut OsRng).unwrap();
        let b = sign(curve, &d, &digest, &mut OsRng).unwrap();
        // Fresh nonce per call
        assert_ne!(a.r, b.r);
        let q = curve.mul_generator(&d).unwrap();
        assert!(verify(curve, &q, &digest, &a));
        assert!(verify(curve, &q, &digest, &b));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_sign_then_verify(
            d in 1u64..u64::MAX,
            k in 2u64..u64::MAX,
            msg in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let curve = &*SECP256K1;
            let d = BigUint::from(d);
            let digest = sha256(&msg);
            let sig = sign_with_nonce(curve, &d, &digest, &BigUint::from(k)).unwrap();
            let q = curve.mul_generator(&d).unwrap();
            prop_assert!(verify(curve, &q, &digest, &sig));
            prop_assert!(sig.is_low_s(curve));
        }
    }
}
