//! Short Weierstrass curve group law and the secp256k1 parameter set.
//!
//! Points are plain immutable values. The affine group law lives in
//! [`Curve::point_add`] / [`Curve::point_double`]; scalar multiplication runs a
//! Montgomery ladder over Jacobian coordinates and converts back with a single
//! inversion.

use std::sync::LazyLock;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{Error, Result};
use crate::modular::PrimeModulus;

/// A curve point: the identity or an affine pair of field elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Point {
    Infinity,
    Affine { x: BigUint, y: BigUint },
}

impl Point {
    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    pub fn x(&self) -> Option<&BigUint> {
        match self {
            Point::Infinity => None,
            Point::Affine { x, .. } => Some(x),
        }
    }

    pub fn y(&self) -> Option<&BigUint> {
        match self {
            Point::Infinity => None,
            Point::Affine { y, .. } => Some(y),
        }
    }

    /// Whether the y-coordinate is even. The identity has no y and reports false.
    pub fn has_even_y(&self) -> bool {
        self.y().map(|y| !y.bit(0)).unwrap_or(false)
    }
}

/// Curve `y² = x³ + a·x + b` over the field of `field`, with a generator of order `order`.
#[derive(Debug, Clone)]
pub struct Curve {
    pub field: PrimeModulus,
    pub order: PrimeModulus,
    pub a: BigUint,
    pub b: BigUint,
    pub generator: Point,
}

/// secp256k1, built once on first use.
pub static SECP256K1: LazyLock<Curve> = LazyLock::new(secp256k1);

fn secp256k1() -> Curve {
    let hex = |s: &str| {
        BigUint::parse_bytes(s.as_bytes(), 16).unwrap_or_else(|| panic!("bad constant {s}"))
    };
    Curve {
        field: PrimeModulus::from_hex(
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F",
        ),
        order: PrimeModulus::from_hex(
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141",
        ),
        a: BigUint::zero(),
        b: BigUint::from(7u32),
        generator: Point::Affine {
            x: hex("79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798"),
            y: hex("483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8"),
        },
    }
}

/// Jacobian triple `(X, Y, Z)` standing for `(X/Z², Y/Z³)`; `Z = 0` is the identity.
#[derive(Clone)]
struct Jacobian {
    x: BigUint,
    y: BigUint,
    z: BigUint,
}

impl Jacobian {
    fn infinity() -> Self {
        Jacobian { x: BigUint::zero(), y: BigUint::from(1u32), z: BigUint::zero() }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }
}

impl Curve {
    /// Right-hand side `x³ + a·x + b`.
    fn rhs(&self, x: &BigUint) -> Result<BigUint> {
        let f = &self.field;
        let x3 = f.mul(&f.mul(x, x)?, x)?;
        let ax = f.mul(&self.a, x)?;
        f.add(&f.add(&x3, &ax)?, &self.b)
    }

    /// Recompute both sides of the curve equation. The identity is on every curve.
    pub fn is_on_curve(&self, p: &Point) -> bool {
        match p {
            Point::Infinity => true,
            Point::Affine { x, y } => {
                if !self.field.contains(x) || !self.field.contains(y) {
                    return false;
                }
                match (self.field.mul(y, y), self.rhs(x)) {
                    (Ok(lhs), Ok(rhs)) => lhs == rhs,
                    _ => false,
                }
            }
        }
    }

    /// Build a point from untrusted coordinates.
    pub fn point_from_affine(&self, x: BigUint, y: BigUint) -> Result<Point> {
        let p = Point::Affine { x, y };
        if self.is_on_curve(&p) {
            Ok(p)
        } else {
            Err(Error::NotOnCurve)
        }
    }

    /// Recover the point with the given x-coordinate and even y.
    pub fn lift_x(&self, x: &BigUint) -> Result<Point> {
        if !self.field.contains(x) {
            return Err(Error::NotOnCurve);
        }
        let y2 = self.rhs(x)?;
        let y = self.field.sqrt(&y2).map_err(|e| match e {
            Error::InvalidOperand(_) => Error::NotOnCurve,
            other => other,
        })?;
        let y = if y.bit(0) { self.field.neg(&y)? } else { y };
        Ok(Point::Affine { x: x.clone(), y })
    }

    pub fn point_negate(&self, p: &Point) -> Result<Point> {
        match p {
            Point::Infinity => Ok(Point::Infinity),
            Point::Affine { x, y } => Ok(Point::Affine { x: x.clone(), y: self.field.neg(y)? }),
        }
    }

    pub fn point_double(&self, p: &Point) -> Result<Point> {
        let (x, y) = match p {
            Point::Infinity => return Ok(Point::Infinity),
            Point::Affine { x, y } => (x, y),
        };
        if y.is_zero() {
            return Ok(Point::Infinity);
        }
        let f = &self.field;
        let x2 = f.mul(x, x)?;
        let num = f.add(&f.add(&f.add(&x2, &x2)?, &x2)?, &self.a)?;
        let den = f.add(y, y)?;
        let lambda = f.mul(&num, &f.inverse(&den)?)?;
        let x3 = f.sub(&f.sub(&f.mul(&lambda, &lambda)?, x)?, x)?;
        let y3 = f.sub(&f.mul(&lambda, &f.sub(x, &x3)?)?, y)?;
        Ok(Point::Affine { x: x3, y: y3 })
    }

    pub fn point_add(&self, p: &Point, q: &Point) -> Result<Point> {
        let ((x1, y1), (x2, y2)) = match (p, q) {
            (Point::Infinity, _) => return Ok(q.clone()),
            (_, Point::Infinity) => return Ok(p.clone()),
            (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => {
                ((x1, y1), (x2, y2))
            }
        };
        if x1 == x2 {
            // Same x: either the same point or its negation.
            return if y1 == y2 { self.point_double(p) } else { Ok(Point::Infinity) };
        }
        let f = &self.field;
        let lambda = f.mul(&f.sub(y2, y1)?, &f.inverse(&f.sub(x2, x1)?)?)?;
        let x3 = f.sub(&f.sub(&f.mul(&lambda, &lambda)?, x1)?, x2)?;
        let y3 = f.sub(&f.mul(&lambda, &f.sub(x1, &x3)?)?, y1)?;
        Ok(Point::Affine { x: x3, y: y3 })
    }

    /// `k·P` for any non-negative `k`, including values at or above the group order.
    ///
    /// The ladder always walks `max(bits(n), bits(k))` bits doing one addition and
    /// one doubling per bit.
    pub fn scalar_mult(&self, p: &Point, k: &BigUint) -> Result<Point> {
        let base = match p {
            Point::Infinity => return Ok(Point::Infinity),
            Point::Affine { x, y } => {
                if !self.is_on_curve(p) {
                    return Err(Error::NotOnCurve);
                }
                Jacobian { x: x.clone(), y: y.clone(), z: BigUint::from(1u32) }
            }
        };
        let width = self.order.value().bits().max(k.bits());
        let mut r0 = Jacobian::infinity();
        let mut r1 = base;
        for i in (0..width).rev() {
            if k.bit(i) {
                r0 = self.jacobian_add(&r0, &r1)?;
                r1 = self.jacobian_double(&r1)?;
            } else {
                r1 = self.jacobian_add(&r0, &r1)?;
                r0 = self.jacobian_double(&r0)?;
            }
        }
        self.to_affine(&r0)
    }

    /// `k·G`.
    pub fn mul_generator(&self, k: &BigUint) -> Result<Point> {
        self.scalar_mult(&self.generator, k)
    }

    fn twice(&self, a: &BigUint) -> Result<BigUint> {
        self.field.add(a, a)
    }

    fn jacobian_double(&self, p: &Jacobian) -> Result<Jacobian> {
        if p.is_infinity() || p.y.is_zero() {
            return Ok(Jacobian::infinity());
        }
        let f = &self.field;
        let y2 = f.mul(&p.y, &p.y)?;
        // S = 4·X·Y²
        let s = self.twice(&self.twice(&f.mul(&p.x, &y2)?)?)?;
        // M = 3·X² + a·Z⁴
        let x2 = f.mul(&p.x, &p.x)?;
        let z2 = f.mul(&p.z, &p.z)?;
        let a_z4 = f.mul(&self.a, &f.mul(&z2, &z2)?)?;
        let m = f.add(&f.add(&self.twice(&x2)?, &x2)?, &a_z4)?;
        let x3 = f.sub(&f.mul(&m, &m)?, &self.twice(&s)?)?;
        // 8·Y⁴
        let y4_8 = self.twice(&self.twice(&self.twice(&f.mul(&y2, &y2)?)?)?)?;
        let y3 = f.sub(&f.mul(&m, &f.sub(&s, &x3)?)?, &y4_8)?;
        let z3 = self.twice(&f.mul(&p.y, &p.z)?)?;
        Ok(Jacobian { x: x3, y: y3, z: z3 })
    }

    fn jacobian_add(&self, p: &Jacobian, q: &Jacobian) -> Result<Jacobian> {
        if p.is_infinity() {
            return Ok(q.clone());
        }
        if q.is_infinity() {
            return Ok(p.clone());
        }
        let f = &self.field;
        let z1z1 = f.mul(&p.z, &p.z)?;
        let z2z2 = f.mul(&q.z, &q.z)?;
        let u1 = f.mul(&p.x, &z2z2)?;
        let u2 = f.mul(&q.x, &z1z1)?;
        let s1 = f.mul(&p.y, &f.mul(&q.z, &z2z2)?)?;
        let s2 = f.mul(&q.y, &f.mul(&p.z, &z1z1)?)?;
        if u1 == u2 {
            return if s1 == s2 { self.jacobian_double(p) } else { Ok(Jacobian::infinity()) };
        }
        let h = f.sub(&u2, &u1)?;
        let r = f.sub(&s2, &s1)?;
        let h2 = f.mul(&h, &h)?;
        let h3 = f.mul(&h, &h2)?;
        let u1h2 = f.mul(&u1, &h2)?;
        let x3 = f.sub(&f.sub(&f.mul(&r, &r)?, &h3)?, &self.twice(&u1h2)?)?;
        let y3 = f.sub(&f.mul(&r, &f.sub(&u1h2, &x3)?)?, &f.mul(&s1, &h3)?)?;
        let z3 = f.mul(&h, &f.mul(&p.z, &q.z)?)?;
        Ok(Jacobian { x: x3, y: y3, z: z3 })
    }

    fn to_affine(&self, p: &Jacobian) -> Result<Point> {
        if p.is_infinity() {
            return Ok(Point::Infinity);
        }
        let f = &self.field;
        let zinv = f.inverse(&p.z)?;
        let zinv2 = f.mul(&zinv, &zinv)?;
        let x = f.mul(&p.x, &zinv2)?;
        let y = f.mul(&p.y, &f.mul(&zinv2, &zinv)?)?;
        Ok(Point::Affine { x, y })
    }
}
