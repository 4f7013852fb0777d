//! BIP-340 Schnorr signatures over x-only public keys.

use num_bigint::BigUint;
use num_traits::Zero;
use rand_core::{CryptoRng, RngCore};

use crate::curve::{Curve, Point};
use crate::error::{Error, Result};
use crate::hash::tagged_hash;
use crate::modular::to_32_bytes;

const TAG_AUX: &str = "BIP0340/aux";
const TAG_NONCE: &str = "BIP0340/nonce";
const TAG_CHALLENGE: &str = "BIP0340/challenge";

/// Secret scalar and its x-only public key, with the secret negated when the
/// public point has odd y.
fn even_y_keypair(curve: &Curve, secret: &BigUint) -> Result<(BigUint, [u8; 32])> {
    if secret.is_zero() || !curve.order.contains(secret) {
        return Err(Error::operand("private scalar must be in [1, n-1]"));
    }
    let public = curve.mul_generator(secret)?;
    let px = public.x().ok_or(Error::PointAtInfinity)?;
    let d = if public.has_even_y() { secret.clone() } else { curve.order.neg(secret)? };
    Ok((d, to_32_bytes(px)))
}

/// 32-byte x-only public key for `secret`.
pub fn x_only_public_key(curve: &Curve, secret: &BigUint) -> Result<[u8; 32]> {
    even_y_keypair(curve, secret).map(|(_, px)| px)
}

fn challenge(curve: &Curve, rx: &[u8; 32], px: &[u8; 32], msg: &[u8]) -> BigUint {
    let mut data = Vec::with_capacity(64 + msg.len());
    data.extend_from_slice(rx);
    data.extend_from_slice(px);
    data.extend_from_slice(msg);
    curve.order.reduce(&BigUint::from_bytes_be(&tagged_hash(TAG_CHALLENGE, &data)))
}

/// Sign `msg` with explicit auxiliary randomness.
///
/// # Panics
/// Panics if the produced signature does not verify.
pub fn sign_with_aux(curve: &Curve, secret: &BigUint, msg: &[u8], aux: &[u8; 32]) -> Result<[u8; 64]> {
    let (d, px) = even_y_keypair(curve, secret)?;
    let n = &curve.order;

    let mask = tagged_hash(TAG_AUX, aux);
    let mut t = to_32_bytes(&d);
    for (byte, m) in t.iter_mut().zip(mask.iter()) {
        *byte ^= m;
    }
    let mut nonce_input = Vec::with_capacity(64 + msg.len());
    nonce_input.extend_from_slice(&t);
    nonce_input.extend_from_slice(&px);
    nonce_input.extend_from_slice(msg);
    let k0 = n.reduce(&BigUint::from_bytes_be(&tagged_hash(TAG_NONCE, &nonce_input)));
    if k0.is_zero() {
        return Err(Error::BadNonce);
    }

    let r_point = curve.mul_generator(&k0)?;
    let rx = to_32_bytes(r_point.x().ok_or(Error::BadNonce)?);
    let k = if r_point.has_even_y() { k0 } else { n.neg(&k0)? };

    let e = challenge(curve, &rx, &px, msg);
    let s = n.add(&k, &n.mul(&e, &d)?)?;

    let mut sig = [0u8; 64];
    sig[..32].copy_from_slice(&rx);
    sig[32..].copy_from_slice(&to_32_bytes(&s));
    assert!(verify(curve, &px, msg, &sig), "freshly produced Schnorr signature failed self-verification");
    Ok(sig)
}

/// Sign `msg` with auxiliary randomness drawn from `rng`.
pub fn sign<R: RngCore + CryptoRng>(
    curve: &Curve,
    secret: &BigUint,
    msg: &[u8],
    rng: &mut R,
) -> Result<[u8; 64]> {
    let mut aux = [0u8; 32];
    rng.fill_bytes(&mut aux);
    sign_with_aux(curve, secret, msg, &aux)
}

/// Verify a 64-byte signature against an x-only public key.
pub fn verify(curve: &Curve, public_key: &[u8; 32], msg: &[u8], sig: &[u8; 64]) -> bool {
    verify_inner(curve, public_key, msg, sig).unwrap_or(false)
}

fn verify_inner(curve: &Curve, public_key: &[u8; 32], msg: &[u8], sig: &[u8; 64]) -> Result<bool> {
    let p = curve.lift_x(&BigUint::from_bytes_be(public_key))?;
    let r = BigUint::from_bytes_be(&sig[..32]);
    let s = BigUint::from_bytes_be(&sig[32..]);
    if !curve.field.contains(&r) || !curve.order.contains(&s) {
        return Ok(false);
    }
    let mut rx = [0u8; 32];
    rx.copy_from_slice(&sig[..32]);
    let e = challenge(curve, &rx, public_key, msg);

    // R = s·G - e·P
    let neg_e = curve.order.neg(&e)?;
    let point = curve.point_add(&curve.mul_generator(&s)?, &curve.scalar_mult(&p, &neg_e)?)?;
    Ok(match &point {
        Point::Infinity => false,
        Point::Affine { x, .. } => point.has_even_y() && *x == r,
    })
}
