//! Exact rationals over any engine's integers

use std::fmt;

use bitspec_core::{EvalError, EvalResult};
use num_bigint::BigInt;

use crate::backend::Backend;
use crate::context::Frame;

/// `num / den` with `den > 0`. Not kept in lowest terms; comparisons
/// cross-multiply.
pub struct SRational<B: Backend> {
    num: B::Integer,
    den: B::Integer,
}

impl<B: Backend> Clone for SRational<B> {
    fn clone(&self) -> Self {
        Self {
            num: self.num.clone(),
            den: self.den.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for SRational<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SRational")
            .field("num", &self.num)
            .field("den", &self.den)
            .finish()
    }
}

impl<B: Backend> SRational<B> {
    pub fn numerator(&self) -> &B::Integer {
        &self.num
    }

    pub fn denominator(&self) -> &B::Integer {
        &self.den
    }

    pub fn from_integer(be: &B, i: B::Integer) -> Self {
        Self {
            num: i,
            den: be.integer_lit(BigInt::from(1)),
        }
    }

    /// `num / den` for any nonzero `den`
    pub fn ratio(
        be: &B,
        frame: &mut Frame<B>,
        num: &B::Integer,
        den: &B::Integer,
    ) -> EvalResult<Self> {
        let zero = be.integer_lit(BigInt::from(0));
        let nonzero = be.bit_not(&be.integer_eq(den, &zero)?);
        be.assert_side_cond(frame, nonzero, EvalError::DivideByZero)?;
        let flip = be.integer_lt(den, &zero);
        Ok(Self {
            num: be.ite_integer(&flip, &be.integer_neg(num), num)?,
            den: be.ite_integer(&flip, &be.integer_neg(den), den)?,
        })
    }

    /// Build from parts the caller knows to satisfy `den > 0`
    pub(crate) fn from_parts(num: B::Integer, den: B::Integer) -> Self {
        Self { num, den }
    }

    pub fn add(&self, be: &B, other: &Self) -> Self {
        let left = be.integer_mul(&self.num, &other.den);
        let right = be.integer_mul(&other.num, &self.den);
        Self {
            num: be.integer_add(&left, &right),
            den: be.integer_mul(&self.den, &other.den),
        }
    }

    pub fn sub(&self, be: &B, other: &Self) -> Self {
        self.add(be, &other.neg(be))
    }

    pub fn mul(&self, be: &B, other: &Self) -> Self {
        Self {
            num: be.integer_mul(&self.num, &other.num),
            den: be.integer_mul(&self.den, &other.den),
        }
    }

    pub fn neg(&self, be: &B) -> Self {
        Self {
            num: be.integer_neg(&self.num),
            den: self.den.clone(),
        }
    }

    /// `DivideByZero` for zero
    pub fn recip(&self, be: &B, frame: &mut Frame<B>) -> EvalResult<Self> {
        Self::ratio(be, frame, &self.den, &self.num)
    }

    pub fn div(&self, be: &B, frame: &mut Frame<B>, other: &Self) -> EvalResult<Self> {
        Ok(self.mul(be, &other.recip(be, frame)?))
    }

    fn cross(&self, be: &B, other: &Self) -> (B::Integer, B::Integer) {
        (
            be.integer_mul(&self.num, &other.den),
            be.integer_mul(&other.num, &self.den),
        )
    }

    pub fn eq(&self, be: &B, other: &Self) -> EvalResult<B::Bit> {
        let (l, r) = self.cross(be, other);
        be.integer_eq(&l, &r)
    }

    pub fn lt(&self, be: &B, other: &Self) -> B::Bit {
        let (l, r) = self.cross(be, other);
        be.integer_lt(&l, &r)
    }

    pub fn le(&self, be: &B, other: &Self) -> B::Bit {
        let (l, r) = self.cross(be, other);
        be.integer_le(&l, &r)
    }

    pub fn is_negative(&self, be: &B) -> B::Bit {
        be.integer_lt(&self.num, &be.integer_lit(BigInt::from(0)))
    }

    pub fn floor(&self, be: &B, frame: &mut Frame<B>) -> EvalResult<B::Integer> {
        be.integer_div(frame, &self.num, &self.den)
    }

    pub fn ceiling(&self, be: &B, frame: &mut Frame<B>) -> EvalResult<B::Integer> {
        let down = be.integer_div(frame, &be.integer_neg(&self.num), &self.den)?;
        Ok(be.integer_neg(&down))
    }

    /// Toward zero
    pub fn trunc(&self, be: &B, frame: &mut Frame<B>) -> EvalResult<B::Integer> {
        let up = self.ceiling(be, frame)?;
        let down = self.floor(be, frame)?;
        be.ite_integer(&self.is_negative(be), &up, &down)
    }

    /// `floor(num / den + 1/2)` as `floor((2 num + den) / (2 den))`
    fn floor_half_up(
        &self,
        be: &B,
        frame: &mut Frame<B>,
        num: &B::Integer,
    ) -> EvalResult<(B::Integer, B::Integer, B::Integer)> {
        let two = be.integer_lit(BigInt::from(2));
        let shifted = be.integer_add(&be.integer_mul(&two, num), &self.den);
        let den2 = be.integer_mul(&two, &self.den);
        let q = be.integer_div(frame, &shifted, &den2)?;
        Ok((q, shifted, den2))
    }

    /// Nearest integer, ties away from zero
    pub fn round_away(&self, be: &B, frame: &mut Frame<B>) -> EvalResult<B::Integer> {
        let (up, _, _) = self.floor_half_up(be, frame, &self.num)?;
        let (mirrored, _, _) = self.floor_half_up(be, frame, &be.integer_neg(&self.num))?;
        be.ite_integer(&self.is_negative(be), &be.integer_neg(&mirrored), &up)
    }

    /// Nearest integer, ties to even
    pub fn round_to_even(&self, be: &B, frame: &mut Frame<B>) -> EvalResult<B::Integer> {
        let zero = be.integer_lit(BigInt::from(0));
        let one = be.integer_lit(BigInt::from(1));
        let two = be.integer_lit(BigInt::from(2));
        let (q, shifted, den2) = self.floor_half_up(be, frame, &self.num)?;
        let tie = be.integer_eq(&be.integer_mod(frame, &shifted, &den2)?, &zero)?;
        let odd = be.integer_eq(&be.integer_mod(frame, &q, &two)?, &one)?;
        let adjust = be.bit_and(&tie, &odd);
        be.ite_integer(&adjust, &be.integer_sub(&q, &one), &q)
    }

    pub fn merge(be: &B, c: &B::Bit, x: &Self, y: &Self) -> EvalResult<Self> {
        Ok(Self {
            num: be.ite_integer(c, &x.num, &y.num)?,
            den: be.ite_integer(c, &x.den, &y.den)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concrete::ConcreteBackend;
    use crate::context::run;

    type Q = SRational<ConcreteBackend>;

    fn q(be: &ConcreteBackend, n: i64, d: i64) -> Q {
        run(be, |f| Q::ratio(be, f, &n.into(), &d.into()))
            .unwrap()
            .into_result()
            .unwrap()
    }

    fn rounded(be: &ConcreteBackend, x: &Q) -> [i64; 5] {
        let r = run(be, |f| {
            Ok([
                x.floor(be, f)?,
                x.ceiling(be, f)?,
                x.trunc(be, f)?,
                x.round_away(be, f)?,
                x.round_to_even(be, f)?,
            ])
        })
        .unwrap()
        .into_result()
        .unwrap();
        r.map(|i| i64::try_from(i).unwrap())
    }

    #[test]
    fn test_ratio_normalizes_sign() {
        let be = ConcreteBackend::default();
        let x = q(&be, 3, -6);
        assert_eq!(x.numerator(), &BigInt::from(-3));
        assert_eq!(x.denominator(), &BigInt::from(6));
        assert!(x.eq(&be, &q(&be, -1, 2)).unwrap());
        let err = run(&be, |f| Q::ratio(&be, f, &1.into(), &0.into())).unwrap();
        assert_eq!(err.error(), Some(&EvalError::DivideByZero));
    }

    #[test]
    fn test_field_operations() {
        let be = ConcreteBackend::default();
        let (a, b) = (q(&be, 1, 3), q(&be, -1, 6));
        assert!(a.add(&be, &b).eq(&be, &q(&be, 1, 6)).unwrap());
        assert!(a.sub(&be, &b).eq(&be, &q(&be, 1, 2)).unwrap());
        assert!(a.mul(&be, &b).eq(&be, &q(&be, -1, 18)).unwrap());
        let quotient = run(&be, |f| a.div(&be, f, &b)).unwrap().into_result().unwrap();
        assert!(quotient.eq(&be, &q(&be, -2, 1)).unwrap());
        assert!(b.lt(&be, &a));
        assert!(a.le(&be, &a));
        let zero = q(&be, 0, 5);
        let err = run(&be, |f| zero.recip(&be, f)).unwrap();
        assert_eq!(err.error(), Some(&EvalError::DivideByZero));
    }

    #[test]
    fn test_rounding() {
        let be = ConcreteBackend::default();
        // floor, ceiling, trunc, roundAway, roundToEven
        assert_eq!(rounded(&be, &q(&be, 5, 2)), [2, 3, 2, 3, 2]);
        assert_eq!(rounded(&be, &q(&be, 7, 2)), [3, 4, 3, 4, 4]);
        assert_eq!(rounded(&be, &q(&be, -5, 2)), [-3, -2, -2, -3, -2]);
        assert_eq!(rounded(&be, &q(&be, -7, 3)), [-3, -2, -2, -2, -2]);
        assert_eq!(rounded(&be, &q(&be, 4, 1)), [4, 4, 4, 4, 4]);
    }
}
