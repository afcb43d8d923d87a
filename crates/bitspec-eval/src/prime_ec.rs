//! Group law of `y^2 = x^3 - 3x + b` over `Z p` in Jacobian coordinates.
//!
//! A point `(X, Y, Z)` stands for the affine point `(X / Z^2, Y / Z^3)`;
//! `Z = 0` is the point at infinity, produced as `(1, 1, 0)`. Results agree
//! with other implementations up to projective equivalence.

use bitspec_core::{EvalError, EvalResult};
use num_bigint::BigInt;
use num_traits::{One, Signed};
use tracing::debug;

use crate::backend::Backend;
use crate::value::Value;

/// Arithmetic in `Z p` over one engine
struct Field<'a, B: Backend> {
    be: &'a B,
    p: &'a BigInt,
}

impl<'a, B: Backend> Field<'a, B> {
    fn new(be: &'a B, p: &'a BigInt) -> EvalResult<Self> {
        if !p.is_positive() {
            return Err(EvalError::internal(format!("curve over Z {p}")));
        }
        Ok(Self { be, p })
    }

    fn lit(&self, n: i64) -> EvalResult<B::Integer> {
        self.be.zn_reduce(self.p, &self.be.integer_lit(BigInt::from(n)))
    }

    fn add(&self, a: &B::Integer, b: &B::Integer) -> EvalResult<B::Integer> {
        self.be.zn_add(self.p, a, b)
    }

    fn sub(&self, a: &B::Integer, b: &B::Integer) -> EvalResult<B::Integer> {
        self.be.zn_sub(self.p, a, b)
    }

    fn mul(&self, a: &B::Integer, b: &B::Integer) -> EvalResult<B::Integer> {
        self.be.zn_mul(self.p, a, b)
    }

    fn scale(&self, n: i64, a: &B::Integer) -> EvalResult<B::Integer> {
        self.mul(&self.lit(n)?, a)
    }

    fn is_zero(&self, a: &B::Integer) -> EvalResult<B::Bit> {
        self.be.zn_eq(self.p, a, &self.lit(0)?)
    }
}

/// A point in Jacobian projective coordinates
pub struct ProjectivePoint<B: Backend> {
    pub x: B::Integer,
    pub y: B::Integer,
    pub z: B::Integer,
}

impl<B: Backend> Clone for ProjectivePoint<B> {
    fn clone(&self) -> Self {
        Self {
            x: self.x.clone(),
            y: self.y.clone(),
            z: self.z.clone(),
        }
    }
}

impl<B: Backend> std::fmt::Debug for ProjectivePoint<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ProjectivePoint")
            .field(&self.x)
            .field(&self.y)
            .field(&self.z)
            .finish()
    }
}

impl<B: Backend> ProjectivePoint<B> {
    pub fn infinity(be: &B, p: &BigInt) -> EvalResult<Self> {
        let f = Field::new(be, p)?;
        Ok(Self {
            x: f.lit(1)?,
            y: f.lit(1)?,
            z: f.lit(0)?,
        })
    }

    /// Read a triple of `Z p` values
    pub fn from_value(p: &BigInt, v: &Value<B>) -> EvalResult<Self> {
        let coord = |v: &Value<B>| -> EvalResult<B::Integer> {
            let (m, i) = v.as_z()?;
            if m != p {
                return Err(EvalError::internal(format!(
                    "point coordinate in Z {m} on a curve over Z {p}"
                )));
            }
            Ok(i.clone())
        };
        match v.as_items()? {
            [x, y, z] => Ok(Self {
                x: coord(x)?,
                y: coord(y)?,
                z: coord(z)?,
            }),
            items => Err(EvalError::internal(format!(
                "a point has 3 coordinates, got {}",
                items.len()
            ))),
        }
    }

    pub fn into_value(self, p: &BigInt) -> Value<B> {
        Value::Tuple(vec![
            Value::Z(p.clone(), self.x),
            Value::Z(p.clone(), self.y),
            Value::Z(p.clone(), self.z),
        ])
    }

    fn select(be: &B, c: &B::Bit, t: &Self, e: &Self) -> EvalResult<Self> {
        Ok(Self {
            x: be.ite_integer(c, &t.x, &e.x)?,
            y: be.ite_integer(c, &t.y, &e.y)?,
            z: be.ite_integer(c, &t.z, &e.z)?,
        })
    }
}

/// `2 s`, using `a = -3` for `M = 3 (X - Z^2)(X + Z^2)`
pub fn ec_double<B: Backend>(
    be: &B,
    p: &BigInt,
    s: &ProjectivePoint<B>,
) -> EvalResult<ProjectivePoint<B>> {
    let f = Field::new(be, p)?;
    let z2 = f.mul(&s.z, &s.z)?;
    let m = f.scale(3, &f.mul(&f.sub(&s.x, &z2)?, &f.add(&s.x, &z2)?)?)?;
    let y2 = f.mul(&s.y, &s.y)?;
    let st = f.scale(4, &f.mul(&s.x, &y2)?)?;
    let x3 = f.sub(&f.mul(&m, &m)?, &f.scale(2, &st)?)?;
    let y4 = f.mul(&y2, &y2)?;
    let y3 = f.sub(&f.mul(&m, &f.sub(&st, &x3)?)?, &f.scale(8, &y4)?)?;
    let z3 = f.scale(2, &f.mul(&s.y, &s.z)?)?;
    Ok(ProjectivePoint {
        x: x3,
        y: y3,
        z: z3,
    })
}

/// `s + t` for points that are not the point at infinity. Equal inputs
/// double; opposite inputs give the point at infinity.
pub fn ec_add_nonzero<B: Backend>(
    be: &B,
    p: &BigInt,
    s: &ProjectivePoint<B>,
    t: &ProjectivePoint<B>,
) -> EvalResult<ProjectivePoint<B>> {
    let f = Field::new(be, p)?;
    let z1s = f.mul(&s.z, &s.z)?;
    let z2s = f.mul(&t.z, &t.z)?;
    let u1 = f.mul(&s.x, &z2s)?;
    let u2 = f.mul(&t.x, &z1s)?;
    let s1 = f.mul(&s.y, &f.mul(&z2s, &t.z)?)?;
    let s2 = f.mul(&t.y, &f.mul(&z1s, &s.z)?)?;
    let h = f.sub(&u2, &u1)?;
    let r = f.sub(&s2, &s1)?;

    let h2 = f.mul(&h, &h)?;
    let h3 = f.mul(&h2, &h)?;
    let u1h2 = f.mul(&u1, &h2)?;
    let x3 = f.sub(&f.sub(&f.mul(&r, &r)?, &h3)?, &f.scale(2, &u1h2)?)?;
    let y3 = f.sub(&f.mul(&r, &f.sub(&u1h2, &x3)?)?, &f.mul(&s1, &h3)?)?;
    let z3 = f.mul(&h, &f.mul(&s.z, &t.z)?)?;
    let general = ProjectivePoint {
        x: x3,
        y: y3,
        z: z3,
    };

    let same_x = f.is_zero(&h)?;
    if be.bit_as_lit(&same_x) == Some(false) {
        return Ok(general);
    }
    let same_y = f.is_zero(&r)?;
    let special = ProjectivePoint::select(
        be,
        &same_y,
        &ec_double(be, p, s)?,
        &ProjectivePoint::infinity(be, p)?,
    )?;
    ProjectivePoint::select(be, &same_x, &special, &general)
}

/// `s + t` for any two points
pub fn ec_add<B: Backend>(
    be: &B,
    p: &BigInt,
    s: &ProjectivePoint<B>,
    t: &ProjectivePoint<B>,
) -> EvalResult<ProjectivePoint<B>> {
    let f = Field::new(be, p)?;
    let s_inf = f.is_zero(&s.z)?;
    let t_inf = f.is_zero(&t.z)?;
    let sum = match (be.bit_as_lit(&s_inf), be.bit_as_lit(&t_inf)) {
        (Some(true), _) => return Ok(t.clone()),
        (_, Some(true)) => return Ok(s.clone()),
        _ => ec_add_nonzero(be, p, s, t)?,
    };
    let t_or_sum = ProjectivePoint::select(be, &t_inf, s, &sum)?;
    ProjectivePoint::select(be, &s_inf, t, &t_or_sum)
}

/// MSB-first double-and-add over `bits`. A bit that is not a literal
/// selects between the sum and the doubled accumulator.
fn double_and_add<B: Backend>(
    be: &B,
    p: &BigInt,
    bits: &[B::Bit],
    s: &ProjectivePoint<B>,
) -> EvalResult<ProjectivePoint<B>> {
    let mut acc = ProjectivePoint::infinity(be, p)?;
    for bit in bits {
        acc = ec_double(be, p, &acc)?;
        acc = match be.bit_as_lit(bit) {
            Some(false) => acc,
            Some(true) => ec_add(be, p, &acc, s)?,
            None => ProjectivePoint::select(be, bit, &ec_add(be, p, &acc, s)?, &acc)?,
        };
    }
    Ok(acc)
}

/// `k s` for a scalar `k` in `Z p`.
///
/// A literal scalar runs the ladder directly. A symbolic scalar yields the
/// uninterpreted coordinates `ec_mult_x`, `ec_mult_y` and `ec_mult_z` of
/// `(p, k, s)`, each defined in the session as equal to the ladder unfolded
/// over the bits of `k`.
pub fn ec_mult<B: Backend>(
    be: &B,
    p: &BigInt,
    k: &B::Integer,
    s: &ProjectivePoint<B>,
) -> EvalResult<ProjectivePoint<B>> {
    let k = be.zn_reduce(p, k)?;
    if let Some(scalar) = be.integer_as_lit(&k) {
        let bits: Vec<_> = (0..scalar.bits()).rev().map(|i| be.bit_lit(scalar.bit(i))).collect();
        return double_and_add(be, p, &bits, s);
    }

    debug!(engine = be.engine_name(), bits = p.bits(), "ec_mult with a symbolic scalar");
    // bit i of k is set iff k mod 2^(i+1) >= 2^i
    let bits = (0..p.bits())
        .rev()
        .map(|i| -> EvalResult<B::Bit> {
            let low = be.zn_reduce(&(BigInt::one() << (i + 1)), &k)?;
            Ok(be.integer_le(&be.integer_lit(BigInt::one() << i), &low))
        })
        .collect::<EvalResult<Vec<_>>>()?;
    let unfolded = double_and_add(be, p, &bits, s)?;

    let args = [be.integer_lit(p.clone()), k, s.x.clone(), s.y.clone(), s.z.clone()];
    let coord = |name: &str, value: &B::Integer| -> EvalResult<B::Integer> {
        let c = be.zn_reduce(p, &be.integer_uninterpreted(name, &args)?)?;
        be.define(be.integer_eq(&c, value)?)?;
        Ok(c)
    };
    Ok(ProjectivePoint {
        x: coord("ec_mult_x", &unfolded.x)?,
        y: coord("ec_mult_y", &unfolded.y)?,
        z: coord("ec_mult_z", &unfolded.z)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concrete::ConcreteBackend;
    use bitspec_core::arith;

    // y^2 = x^3 - 3x + 13 over F23 holds for (3, 10)
    fn p23() -> BigInt {
        BigInt::from(23)
    }

    fn point(x: i64, y: i64, z: i64) -> ProjectivePoint<ConcreteBackend> {
        ProjectivePoint {
            x: x.into(),
            y: y.into(),
            z: z.into(),
        }
    }

    fn affine(s: &ProjectivePoint<ConcreteBackend>) -> Option<(i64, i64)> {
        let p = p23();
        if s.z == BigInt::from(0) {
            return None;
        }
        let zi = arith::zn_recip(&p, &s.z).unwrap();
        let zi2 = arith::zn_mul(&p, &zi, &zi).unwrap();
        let zi3 = arith::zn_mul(&p, &zi2, &zi).unwrap();
        let x = arith::zn_mul(&p, &s.x, &zi2).unwrap();
        let y = arith::zn_mul(&p, &s.y, &zi3).unwrap();
        Some((i64::try_from(x).unwrap(), i64::try_from(y).unwrap()))
    }

    fn on_curve((x, y): (i64, i64)) -> bool {
        (y * y - (x * x * x - 3 * x + 13)).rem_euclid(23) == 0
    }

    #[test]
    fn test_double() {
        let be = ConcreteBackend::default();
        let two_p = ec_double(&be, &p23(), &point(3, 10, 1)).unwrap();
        assert_eq!(affine(&two_p), Some((12, 16)));
        assert!(on_curve((12, 16)));
    }

    #[test]
    fn test_add_special_cases() {
        let be = ConcreteBackend::default();
        let p = p23();
        let pt = point(3, 10, 1);
        let doubled = ec_add_nonzero(&be, &p, &pt, &pt).unwrap();
        assert_eq!(affine(&doubled), Some((12, 16)));
        let cancelled = ec_add_nonzero(&be, &p, &pt, &point(3, 13, 1)).unwrap();
        assert_eq!(affine(&cancelled), None);
        // the same affine point under a different Z
        let scaled = point(3 * 4 % 23, 10 * 8 % 23, 2);
        assert_eq!(affine(&scaled), Some((3, 10)));
        let doubled = ec_add_nonzero(&be, &p, &scaled, &pt).unwrap();
        assert_eq!(affine(&doubled), Some((12, 16)));
    }

    #[test]
    fn test_mult_matches_repeated_addition() {
        let be = ConcreteBackend::default();
        let p = p23();
        let pt = point(3, 10, 1);
        let mut sum = ProjectivePoint::infinity(&be, &p).unwrap();
        for k in 0..23i64 {
            let product = ec_mult(&be, &p, &BigInt::from(k), &pt).unwrap();
            assert_eq!(affine(&product), affine(&sum), "k = {k}");
            if let Some(a) = affine(&sum) {
                assert!(on_curve(a));
            }
            sum = ec_add(&be, &p, &sum, &pt).unwrap();
        }
    }

    #[test]
    fn test_point_values() {
        let p = p23();
        let v = point(3, 10, 1).into_value(&p);
        let back = ProjectivePoint::<ConcreteBackend>::from_value(&p, &v).unwrap();
        assert_eq!(back.y, BigInt::from(10));
        assert!(ProjectivePoint::<ConcreteBackend>::from_value(&BigInt::from(29), &v).is_err());
    }
}
