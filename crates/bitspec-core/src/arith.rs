//! Unbounded integer and modular integer arithmetic
//!
//! Integer division is floor division. Values of `Z m` are kept as the
//! canonical residue in `[0, m)`.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::error::{EvalError, EvalResult};

/// Quotient rounded toward negative infinity
pub fn div_floor(x: &BigInt, y: &BigInt) -> EvalResult<BigInt> {
    if y.is_zero() {
        return Err(EvalError::DivideByZero);
    }
    Ok(x.div_floor(y))
}

/// Remainder matching [`div_floor`]; has the sign of the divisor
pub fn mod_floor(x: &BigInt, y: &BigInt) -> EvalResult<BigInt> {
    if y.is_zero() {
        return Err(EvalError::DivideByZero);
    }
    Ok(x.mod_floor(y))
}

/// Fails with a fatal error unless `m` is a valid modulus
pub fn check_modulus(m: &BigInt) -> EvalResult<()> {
    if !m.is_positive() {
        return Err(EvalError::internal(format!("invalid modulus {m} for Z")));
    }
    Ok(())
}

/// Canonical residue of `x` modulo `m`
pub fn zn_reduce(m: &BigInt, x: &BigInt) -> EvalResult<BigInt> {
    check_modulus(m)?;
    Ok(x.mod_floor(m))
}

pub fn zn_add(m: &BigInt, x: &BigInt, y: &BigInt) -> EvalResult<BigInt> {
    zn_reduce(m, &(x + y))
}

pub fn zn_sub(m: &BigInt, x: &BigInt, y: &BigInt) -> EvalResult<BigInt> {
    zn_reduce(m, &(x - y))
}

pub fn zn_mul(m: &BigInt, x: &BigInt, y: &BigInt) -> EvalResult<BigInt> {
    zn_reduce(m, &(x * y))
}

pub fn zn_neg(m: &BigInt, x: &BigInt) -> EvalResult<BigInt> {
    zn_reduce(m, &-x)
}

/// Multiplicative inverse of `x` modulo `m` by the extended Euclidean
/// algorithm. Fails with `DivideByZero` when `x` is not invertible.
pub fn zn_recip(m: &BigInt, x: &BigInt) -> EvalResult<BigInt> {
    let x = zn_reduce(m, x)?;
    if x.is_zero() {
        return Err(EvalError::DivideByZero);
    }
    let (mut old_r, mut r) = (x, m.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    while !r.is_zero() {
        let q = old_r.div_floor(&r);
        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }
    if !old_r.is_one() {
        return Err(EvalError::DivideByZero);
    }
    zn_reduce(m, &old_s)
}

/// `base^exp mod m`
pub fn zn_pow(m: &BigInt, base: &BigInt, exp: &BigInt) -> EvalResult<BigInt> {
    check_modulus(m)?;
    if exp.is_negative() {
        let inv = zn_recip(m, base)?;
        return Ok(inv.modpow(&-exp, m));
    }
    Ok(zn_reduce(m, base)?.modpow(exp, m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> BigInt {
        BigInt::from(n)
    }

    #[test]
    fn test_floor_division_signs() {
        let cases = [(7, 2, 3, 1), (-7, 2, -4, 1), (7, -2, -4, -1), (-7, -2, 3, -1)];
        for (x, y, q, r) in cases {
            assert_eq!(div_floor(&int(x), &int(y)).unwrap(), int(q), "{x} / {y}");
            assert_eq!(mod_floor(&int(x), &int(y)).unwrap(), int(r), "{x} % {y}");
        }
        assert_eq!(div_floor(&int(1), &int(0)), Err(EvalError::DivideByZero));
        assert_eq!(mod_floor(&int(1), &int(0)), Err(EvalError::DivideByZero));
    }

    #[test]
    fn test_recip_small_prime() {
        assert_eq!(zn_recip(&int(7), &int(3)).unwrap(), int(5));
        for x in 1..23 {
            let inv = zn_recip(&int(23), &int(x)).unwrap();
            assert_eq!(zn_mul(&int(23), &int(x), &inv).unwrap(), int(1));
        }
        assert_eq!(zn_recip(&int(7), &int(14)), Err(EvalError::DivideByZero));
        assert_eq!(zn_recip(&int(8), &int(6)), Err(EvalError::DivideByZero));
    }

    #[test]
    fn test_zero_modulus_is_fatal() {
        let err = zn_add(&int(0), &int(1), &int(2)).unwrap_err();
        assert!(err.is_fatal());
        assert!(zn_recip(&int(-3), &int(1)).unwrap_err().is_fatal());
    }

    #[test]
    fn test_reduce_and_pow() {
        assert_eq!(zn_neg(&int(7), &int(3)).unwrap(), int(4));
        assert_eq!(zn_sub(&int(7), &int(2), &int(5)).unwrap(), int(4));
        assert_eq!(zn_pow(&int(7), &int(3), &int(6)).unwrap(), int(1));
        assert_eq!(zn_pow(&int(7), &int(3), &int(-1)).unwrap(), int(5));
    }
}
