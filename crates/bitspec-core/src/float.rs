//! Exact IEEE-754 style floating point of arbitrary format
//!
//! Every arithmetic result is computed as an exact rational and rounded once
//! into the target format, so the results match a correctly rounded
//! hardware implementation for the standard formats and extend to any
//! `Float e p` the surface language can express.
//!
//! A finite value is stored as `significand * 2^(exponent - (p - 1))` with
//! `2^(p-1) <= significand < 2^p` for normal numbers and
//! `exponent == emin`, `significand < 2^(p-1)` for subnormals. This keeps the
//! representation canonical, so structural equality is bit equality.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::rounding::RoundingMode;
use crate::word::Word;

/// Exponent width and precision of a float type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloatFormat {
    /// Exponent field width in bits
    pub exp_bits: u32,
    /// Precision in bits, including the hidden bit
    pub precision: u32,
}

impl FloatFormat {
    /// IEEE binary32
    pub const FLOAT32: FloatFormat = FloatFormat {
        exp_bits: 8,
        precision: 24,
    };

    /// IEEE binary64
    pub const FLOAT64: FloatFormat = FloatFormat {
        exp_bits: 11,
        precision: 53,
    };

    /// Validate a format
    pub fn new(exp_bits: u32, precision: u32) -> EvalResult<Self> {
        if !(2..=32).contains(&exp_bits) || precision < 2 {
            return Err(EvalError::internal(format!(
                "unsupported float format: exponent {exp_bits}, precision {precision}"
            )));
        }
        Ok(Self {
            exp_bits,
            precision,
        })
    }

    /// Width of the bit encoding
    pub fn width(self) -> u32 {
        self.exp_bits + self.precision
    }

    /// Largest unbiased exponent (also the bias)
    pub fn emax(self) -> i64 {
        (1i64 << (self.exp_bits - 1)) - 1
    }

    /// Smallest normal unbiased exponent
    pub fn emin(self) -> i64 {
        1 - self.emax()
    }

    fn hidden_bit(self) -> BigUint {
        BigUint::one() << (self.precision - 1)
    }
}

impl fmt::Display for FloatFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Float {} {}", self.exp_bits, self.precision)
    }
}

/// Classification of a float value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FloatKind {
    NaN,
    Infinity {
        negative: bool,
    },
    Zero {
        negative: bool,
    },
    Finite {
        negative: bool,
        significand: BigUint,
        exponent: i64,
    },
}

/// A floating point value of a given format
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FloatValue {
    format: FloatFormat,
    kind: FloatKind,
}

impl FloatValue {
    pub fn nan(format: FloatFormat) -> Self {
        Self {
            format,
            kind: FloatKind::NaN,
        }
    }

    pub fn infinity(format: FloatFormat, negative: bool) -> Self {
        Self {
            format,
            kind: FloatKind::Infinity { negative },
        }
    }

    pub fn zero(format: FloatFormat, negative: bool) -> Self {
        Self {
            format,
            kind: FloatKind::Zero { negative },
        }
    }

    /// Largest finite magnitude of the format
    pub fn max_finite(format: FloatFormat, negative: bool) -> Self {
        Self {
            format,
            kind: FloatKind::Finite {
                negative,
                significand: (BigUint::one() << format.precision) - 1u32,
                exponent: format.emax(),
            },
        }
    }

    pub fn format(&self) -> FloatFormat {
        self.format
    }

    pub fn kind(&self) -> &FloatKind {
        &self.kind
    }

    /// Round an exact rational into `format`. Zero becomes positive zero.
    pub fn from_rational(format: FloatFormat, mode: RoundingMode, r: &BigRational) -> Self {
        if r.is_zero() {
            return Self::zero(format, false);
        }
        let negative = r.is_negative();
        let num = r.numer().magnitude().clone();
        let den = r.denom().magnitude().clone();
        round_magnitude(format, mode, negative, num, den)
    }

    /// Round an integer into `format`
    pub fn from_integer(format: FloatFormat, mode: RoundingMode, n: &BigInt) -> Self {
        Self::from_rational(format, mode, &BigRational::from_integer(n.clone()))
    }

    /// Decode an IEEE bit pattern of width `exp_bits + precision`
    pub fn from_bits(format: FloatFormat, bits: &Word) -> EvalResult<Self> {
        if bits.width() != format.width() {
            return Err(EvalError::internal(format!(
                "fpFromBits: {}-bit word for {format}",
                bits.width()
            )));
        }
        let frac_bits = format.precision - 1;
        let (sign, rest) = bits.split(1)?;
        let (biased, fraction) = rest.split(format.exp_bits)?;
        let negative = !sign.value().is_zero();
        let biased = biased.value().clone();
        let fraction = fraction.value().clone();
        let all_ones = (BigUint::one() << format.exp_bits) - 1u32;
        let kind = if biased == all_ones {
            if fraction.is_zero() {
                FloatKind::Infinity { negative }
            } else {
                FloatKind::NaN
            }
        } else if biased.is_zero() {
            if fraction.is_zero() {
                FloatKind::Zero { negative }
            } else {
                FloatKind::Finite {
                    negative,
                    significand: fraction,
                    exponent: format.emin(),
                }
            }
        } else {
            let biased = biased
                .to_i64()
                .ok_or_else(|| EvalError::internal("fpFromBits: exponent out of range"))?;
            FloatKind::Finite {
                negative,
                significand: fraction + (BigUint::one() << frac_bits),
                exponent: biased - format.emax(),
            }
        };
        Ok(Self { format, kind })
    }

    /// Encode as an IEEE bit pattern; NaN uses the canonical quiet pattern
    pub fn to_bits(&self) -> Word {
        let format = self.format;
        let frac_bits = format.precision - 1;
        let all_ones = (BigUint::one() << format.exp_bits) - 1u32;
        let (negative, biased, fraction) = match &self.kind {
            FloatKind::NaN => (false, all_ones, BigUint::one() << (frac_bits - 1)),
            FloatKind::Infinity { negative } => (*negative, all_ones, BigUint::zero()),
            FloatKind::Zero { negative } => (*negative, BigUint::zero(), BigUint::zero()),
            FloatKind::Finite {
                negative,
                significand,
                exponent,
            } => {
                if *significand >= format.hidden_bit() {
                    let biased = BigUint::from((exponent + format.emax()) as u64);
                    (*negative, biased, significand - format.hidden_bit())
                } else {
                    (*negative, BigUint::zero(), significand.clone())
                }
            }
        };
        let sign = Word::from_unsigned(1, BigUint::from(u8::from(negative)));
        sign.concat(&Word::from_unsigned(format.exp_bits, biased))
            .concat(&Word::from_unsigned(frac_bits, fraction))
    }

    // Predicates

    pub fn is_nan(&self) -> bool {
        matches!(self.kind, FloatKind::NaN)
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self.kind, FloatKind::Infinity { .. })
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.kind, FloatKind::Zero { .. })
    }

    /// Sign bit set (false for NaN)
    pub fn is_negative(&self) -> bool {
        match &self.kind {
            FloatKind::NaN => false,
            FloatKind::Infinity { negative }
            | FloatKind::Zero { negative }
            | FloatKind::Finite { negative, .. } => *negative,
        }
    }

    pub fn is_normal(&self) -> bool {
        match &self.kind {
            FloatKind::Finite { significand, .. } => *significand >= self.format.hidden_bit(),
            _ => false,
        }
    }

    pub fn is_subnormal(&self) -> bool {
        match &self.kind {
            FloatKind::Finite { significand, .. } => *significand < self.format.hidden_bit(),
            _ => false,
        }
    }

    /// Exact value; NaN and infinities raise `BadValue(op)`
    pub fn to_rational(&self, op: &str) -> EvalResult<BigRational> {
        match &self.kind {
            FloatKind::NaN | FloatKind::Infinity { .. } => Err(EvalError::BadValue(op.to_string())),
            FloatKind::Zero { .. } => Ok(BigRational::zero()),
            FloatKind::Finite {
                negative,
                significand,
                exponent,
            } => {
                let sign = if *negative { Sign::Minus } else { Sign::Plus };
                let mag = BigInt::from_biguint(sign, significand.clone());
                let shift = exponent - (i64::from(self.format.precision) - 1);
                Ok(scale_pow2(BigRational::from_integer(mag), shift))
            }
        }
    }

    /// Round to an integer under `mode`; NaN and infinities raise `BadValue(op)`
    pub fn to_integer(&self, op: &str, mode: RoundingMode) -> EvalResult<BigInt> {
        Ok(mode.round_rational(&self.to_rational(op)?))
    }

    // Arithmetic

    fn check_format(&self, op: &str, other: &FloatValue) -> EvalResult<()> {
        if self.format != other.format {
            return Err(EvalError::internal(format!(
                "{op}: float format mismatch ({} vs {})",
                self.format, other.format
            )));
        }
        Ok(())
    }

    pub fn neg(&self) -> FloatValue {
        let kind = match &self.kind {
            FloatKind::NaN => FloatKind::NaN,
            FloatKind::Infinity { negative } => FloatKind::Infinity {
                negative: !negative,
            },
            FloatKind::Zero { negative } => FloatKind::Zero {
                negative: !negative,
            },
            FloatKind::Finite {
                negative,
                significand,
                exponent,
            } => FloatKind::Finite {
                negative: !negative,
                significand: significand.clone(),
                exponent: *exponent,
            },
        };
        FloatValue {
            format: self.format,
            kind,
        }
    }

    pub fn abs(&self) -> FloatValue {
        if self.is_negative() {
            self.neg()
        } else {
            self.clone()
        }
    }

    pub fn add(&self, other: &FloatValue, mode: RoundingMode) -> EvalResult<FloatValue> {
        self.check_format("fpAdd", other)?;
        let format = self.format;
        let result = match (&self.kind, &other.kind) {
            (FloatKind::NaN, _) | (_, FloatKind::NaN) => FloatValue::nan(format),
            (FloatKind::Infinity { negative: a }, FloatKind::Infinity { negative: b }) => {
                if a == b {
                    FloatValue::infinity(format, *a)
                } else {
                    FloatValue::nan(format)
                }
            }
            (FloatKind::Infinity { negative }, _) | (_, FloatKind::Infinity { negative }) => {
                FloatValue::infinity(format, *negative)
            }
            (FloatKind::Zero { negative: a }, FloatKind::Zero { negative: b }) => {
                let negative = if a == b {
                    *a
                } else {
                    mode == RoundingMode::TowardNegative
                };
                FloatValue::zero(format, negative)
            }
            (FloatKind::Zero { .. }, _) => other.clone(),
            (_, FloatKind::Zero { .. }) => self.clone(),
            _ => {
                let sum = self.to_rational("fpAdd")? + other.to_rational("fpAdd")?;
                if sum.is_zero() {
                    FloatValue::zero(format, mode == RoundingMode::TowardNegative)
                } else {
                    FloatValue::from_rational(format, mode, &sum)
                }
            }
        };
        Ok(result)
    }

    pub fn sub(&self, other: &FloatValue, mode: RoundingMode) -> EvalResult<FloatValue> {
        self.add(&other.neg(), mode)
    }

    pub fn mul(&self, other: &FloatValue, mode: RoundingMode) -> EvalResult<FloatValue> {
        self.check_format("fpMul", other)?;
        let format = self.format;
        let negative = self.is_negative() != other.is_negative();
        let result = match (&self.kind, &other.kind) {
            (FloatKind::NaN, _) | (_, FloatKind::NaN) => FloatValue::nan(format),
            (FloatKind::Infinity { .. }, FloatKind::Zero { .. })
            | (FloatKind::Zero { .. }, FloatKind::Infinity { .. }) => FloatValue::nan(format),
            (FloatKind::Infinity { .. }, _) | (_, FloatKind::Infinity { .. }) => {
                FloatValue::infinity(format, negative)
            }
            (FloatKind::Zero { .. }, _) | (_, FloatKind::Zero { .. }) => {
                FloatValue::zero(format, negative)
            }
            _ => {
                let product = self.to_rational("fpMul")? * other.to_rational("fpMul")?;
                FloatValue::from_rational(format, mode, &product)
            }
        };
        Ok(result)
    }

    pub fn div(&self, other: &FloatValue, mode: RoundingMode) -> EvalResult<FloatValue> {
        self.check_format("fpDiv", other)?;
        let format = self.format;
        let negative = self.is_negative() != other.is_negative();
        let result = match (&self.kind, &other.kind) {
            (FloatKind::NaN, _) | (_, FloatKind::NaN) => FloatValue::nan(format),
            (FloatKind::Infinity { .. }, FloatKind::Infinity { .. })
            | (FloatKind::Zero { .. }, FloatKind::Zero { .. }) => FloatValue::nan(format),
            (FloatKind::Infinity { .. }, _) | (_, FloatKind::Zero { .. }) => {
                FloatValue::infinity(format, negative)
            }
            (_, FloatKind::Infinity { .. }) | (FloatKind::Zero { .. }, _) => {
                FloatValue::zero(format, negative)
            }
            _ => {
                let quotient = self.to_rational("fpDiv")? / other.to_rational("fpDiv")?;
                FloatValue::from_rational(format, mode, &quotient)
            }
        };
        Ok(result)
    }

    // Comparisons

    /// IEEE ordering: `None` when either side is NaN, zeros compare equal
    pub fn ieee_cmp(&self, other: &FloatValue) -> EvalResult<Option<Ordering>> {
        self.check_format("fpCmp", other)?;
        let rank = |v: &FloatValue| -> Option<(i8, BigRational)> {
            match &v.kind {
                FloatKind::NaN => None,
                FloatKind::Infinity { negative: true } => Some((-1, BigRational::zero())),
                FloatKind::Infinity { negative: false } => Some((1, BigRational::zero())),
                _ => v.to_rational("fpCmp").ok().map(|r| (0, r)),
            }
        };
        Ok(match (rank(self), rank(other)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        })
    }

    pub fn ieee_eq(&self, other: &FloatValue) -> EvalResult<bool> {
        Ok(self.ieee_cmp(other)? == Some(Ordering::Equal))
    }

    pub fn ieee_lt(&self, other: &FloatValue) -> EvalResult<bool> {
        Ok(self.ieee_cmp(other)? == Some(Ordering::Less))
    }

    /// Structural equality: NaN equals NaN, `+0` differs from `-0`
    pub fn logical_eq(&self, other: &FloatValue) -> EvalResult<bool> {
        self.check_format("=.=", other)?;
        Ok(self == other)
    }
}

impl fmt::Display for FloatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FloatKind::NaN => write!(f, "fpNaN"),
            FloatKind::Infinity { negative: false } => write!(f, "fpPosInf"),
            FloatKind::Infinity { negative: true } => write!(f, "fpNegInf"),
            FloatKind::Zero { negative: false } => write!(f, "0.0"),
            FloatKind::Zero { negative: true } => write!(f, "-0.0"),
            FloatKind::Finite { .. } => match self.to_rational("show") {
                Ok(r) => write!(f, "{r}"),
                Err(_) => write!(f, "?"),
            },
        }
    }
}

/// `r * 2^shift`
fn scale_pow2(r: BigRational, shift: i64) -> BigRational {
    let factor = BigInt::one() << shift.unsigned_abs();
    if shift >= 0 {
        r * factor
    } else {
        r / factor
    }
}

/// `num >= den * 2^e`
fn ge_pow2(num: &BigUint, den: &BigUint, e: i64) -> bool {
    if e >= 0 {
        *num >= den << e.unsigned_abs()
    } else {
        (num << e.unsigned_abs()) >= *den
    }
}

/// Round the positive magnitude `num / den` into `format`
fn round_magnitude(
    format: FloatFormat,
    mode: RoundingMode,
    negative: bool,
    num: BigUint,
    den: BigUint,
) -> FloatValue {
    let p = i64::from(format.precision);
    let emin = format.emin();
    let emax = format.emax();

    // floor(log2(num / den))
    let mut e = num.bits() as i64 - den.bits() as i64;
    if !ge_pow2(&num, &den, e) {
        e -= 1;
    }
    let mut exponent = e.max(emin);

    let shift = p - 1 - exponent;
    let (scaled_num, scaled_den) = if shift >= 0 {
        (num << shift.unsigned_abs(), den)
    } else {
        (num, den << shift.unsigned_abs())
    };
    let (mut significand, rem) = scaled_num.div_rem(&scaled_den);
    let half_cmp = (&rem << 1u32).cmp(&scaled_den);
    let inexact = !rem.is_zero();
    if mode.rounds_up(negative, half_cmp, significand.is_odd(), inexact) {
        significand += 1u32;
    }
    if significand.bits() as i64 > p {
        significand >>= 1u32;
        exponent += 1;
    }
    if exponent > emax {
        return if mode.overflows_to_infinity(negative) {
            FloatValue::infinity(format, negative)
        } else {
            FloatValue::max_finite(format, negative)
        };
    }
    if significand.is_zero() {
        return FloatValue::zero(format, negative);
    }
    FloatValue {
        format,
        kind: FloatKind::Finite {
            negative,
            significand,
            exponent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const F32: FloatFormat = FloatFormat::FLOAT32;

    fn ratio(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    fn f32_bits(v: &FloatValue) -> u64 {
        v.to_bits().to_u64().unwrap()
    }

    fn from_f32_bits(bits: u32) -> FloatValue {
        FloatValue::from_bits(F32, &Word::new(32, &BigInt::from(bits))).unwrap()
    }

    #[test]
    fn test_bits_match_hardware_encoding() {
        let one = FloatValue::from_rational(F32, RoundingMode::NearestEven, &ratio(1, 1));
        assert_eq!(f32_bits(&one), u64::from(1.0f32.to_bits()));

        let third = FloatValue::from_rational(F32, RoundingMode::NearestEven, &ratio(1, 3));
        assert_eq!(f32_bits(&third), u64::from((1.0f32 / 3.0).to_bits()));

        let neg = FloatValue::from_rational(F32, RoundingMode::NearestEven, &ratio(-5, 2));
        assert_eq!(f32_bits(&neg), u64::from((-2.5f32).to_bits()));

        let tiny = from_f32_bits(1);
        assert!(tiny.is_subnormal());
        assert_eq!(f32_bits(&tiny), 1);
    }

    #[test]
    fn test_bits_round_trip() {
        let samples = [
            0x0000_0000u32,
            0x8000_0000,
            0x3f80_0000,
            0x7f80_0000,
            0xff80_0000,
            0x0000_0001,
            0x007f_ffff,
            0x7f7f_ffff,
        ];
        for bits in samples {
            assert_eq!(f32_bits(&from_f32_bits(bits)), u64::from(bits));
        }
        let nan = from_f32_bits(0x7fc0_0001);
        assert!(nan.is_nan());
        assert_eq!(f32_bits(&nan), 0x7fc0_0000);
    }

    #[test]
    fn test_rounding_modes_on_one_third() {
        let r = ratio(1, 3);
        let down = FloatValue::from_rational(F32, RoundingMode::TowardZero, &r);
        let up = FloatValue::from_rational(F32, RoundingMode::TowardPositive, &r);
        assert_eq!(f32_bits(&up), f32_bits(&down) + 1);
        let neg_down = FloatValue::from_rational(F32, RoundingMode::TowardNegative, &-r.clone());
        assert!(neg_down.is_negative());
        assert_eq!(f32_bits(&neg_down) & 0x7fff_ffff, f32_bits(&up));
    }

    #[test]
    fn test_overflow_per_mode() {
        let huge = scale_pow2(BigRational::one(), 200);
        assert!(FloatValue::from_rational(F32, RoundingMode::NearestEven, &huge).is_infinite());
        assert_eq!(
            FloatValue::from_rational(F32, RoundingMode::TowardZero, &huge),
            FloatValue::max_finite(F32, false)
        );
        assert_eq!(
            FloatValue::from_rational(F32, RoundingMode::TowardPositive, &-huge.clone()),
            FloatValue::max_finite(F32, true)
        );
    }

    #[test]
    fn test_arithmetic_matches_f32() {
        let pairs = [(1.5f32, 2.25f32), (-3.0, 0.1), (1e30, 1e30), (1e-40, 3.0)];
        for (a, b) in pairs {
            let x = from_f32_bits(a.to_bits());
            let y = from_f32_bits(b.to_bits());
            let rne = RoundingMode::NearestEven;
            assert_eq!(f32_bits(&x.add(&y, rne).unwrap()), u64::from((a + b).to_bits()));
            assert_eq!(f32_bits(&x.sub(&y, rne).unwrap()), u64::from((a - b).to_bits()));
            assert_eq!(f32_bits(&x.mul(&y, rne).unwrap()), u64::from((a * b).to_bits()));
            assert_eq!(f32_bits(&x.div(&y, rne).unwrap()), u64::from((a / b).to_bits()));
        }
    }

    #[test]
    fn test_special_values() {
        let rne = RoundingMode::NearestEven;
        let inf = FloatValue::infinity(F32, false);
        let ninf = FloatValue::infinity(F32, true);
        let zero = FloatValue::zero(F32, false);
        let nzero = FloatValue::zero(F32, true);
        assert!(inf.add(&ninf, rne).unwrap().is_nan());
        assert!(inf.mul(&zero, rne).unwrap().is_nan());
        assert!(zero.div(&zero, rne).unwrap().is_nan());
        assert_eq!(zero.add(&nzero, rne).unwrap(), zero);
        assert_eq!(zero.add(&nzero, RoundingMode::TowardNegative).unwrap(), nzero);
        let one = FloatValue::from_rational(F32, rne, &ratio(1, 1));
        assert_eq!(one.div(&nzero, rne).unwrap(), ninf);
        assert_eq!(one.sub(&one, rne).unwrap(), zero);
    }

    #[test]
    fn test_comparisons() {
        let nan = FloatValue::nan(F32);
        let zero = FloatValue::zero(F32, false);
        let nzero = FloatValue::zero(F32, true);
        assert!(!nan.ieee_eq(&nan).unwrap());
        assert!(nan.logical_eq(&nan).unwrap());
        assert!(zero.ieee_eq(&nzero).unwrap());
        assert!(!zero.logical_eq(&nzero).unwrap());
        assert!(FloatValue::infinity(F32, true).ieee_lt(&nzero).unwrap());
        assert!(!nan.ieee_lt(&zero).unwrap());
    }

    #[test]
    fn test_to_integer_rejects_non_finite() {
        for mode in RoundingMode::ALL {
            let err = FloatValue::nan(F32).to_integer("fpToInteger", mode).unwrap_err();
            assert_eq!(err, EvalError::BadValue("fpToInteger".to_string()));
            assert!(FloatValue::infinity(F32, true).to_rational("fpToRational").is_err());
        }
        let x = FloatValue::from_rational(F32, RoundingMode::NearestEven, &ratio(-5, 2));
        assert_eq!(x.to_integer("trunc", RoundingMode::TowardZero).unwrap(), BigInt::from(-2));
        assert_eq!(x.to_integer("floor", RoundingMode::TowardNegative).unwrap(), BigInt::from(-3));
        let even = x.to_integer("roundToEven", RoundingMode::NearestEven).unwrap();
        assert_eq!(even, BigInt::from(-2));
    }

    #[test]
    fn test_format_validation() {
        assert!(FloatFormat::new(1, 24).is_err());
        assert!(FloatFormat::new(8, 1).is_err());
        assert_eq!(FloatFormat::new(8, 24).unwrap(), F32);
        assert_eq!(F32.emax(), 127);
        assert_eq!(F32.emin(), -126);
        assert_eq!(FloatFormat::FLOAT64.width(), 64);
    }
}
