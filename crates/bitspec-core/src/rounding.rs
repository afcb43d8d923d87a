//! IEEE rounding modes and their 3-bit encoding

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// Rounding mode for floating point operations.
///
/// The surface language passes modes as 3-bit words; [`RoundingMode::from_code`]
/// is the only decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Round to nearest, ties to even (code 0)
    NearestEven,
    /// Round to nearest, ties away from zero (code 1)
    NearestAway,
    /// Round toward positive infinity (code 2)
    TowardPositive,
    /// Round toward negative infinity (code 3)
    TowardNegative,
    /// Round toward zero (code 4)
    TowardZero,
}

impl RoundingMode {
    /// All modes, indexed by their code
    pub const ALL: [RoundingMode; 5] = [
        RoundingMode::NearestEven,
        RoundingMode::NearestAway,
        RoundingMode::TowardPositive,
        RoundingMode::TowardNegative,
        RoundingMode::TowardZero,
    ];

    /// Decode a rounding-mode code
    pub fn from_code(code: u64) -> EvalResult<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(EvalError::BadRoundingMode(code))
    }

    /// Decode the value of a rounding-mode word
    pub fn from_word_value(value: &BigUint) -> EvalResult<Self> {
        // Codes that do not fit in 64 bits are reported saturated
        Self::from_code(value.to_u64().unwrap_or(u64::MAX))
    }

    /// The 3-bit code of this mode
    pub fn code(self) -> u64 {
        match self {
            RoundingMode::NearestEven => 0,
            RoundingMode::NearestAway => 1,
            RoundingMode::TowardPositive => 2,
            RoundingMode::TowardNegative => 3,
            RoundingMode::TowardZero => 4,
        }
    }

    /// SMT-LIB name of this mode
    pub fn smtlib_name(self) -> &'static str {
        match self {
            RoundingMode::NearestEven => "RNE",
            RoundingMode::NearestAway => "RNA",
            RoundingMode::TowardPositive => "RTP",
            RoundingMode::TowardNegative => "RTN",
            RoundingMode::TowardZero => "RTZ",
        }
    }

    /// Round an exact rational to an integer under this mode
    pub fn round_rational(self, r: &BigRational) -> BigInt {
        match self {
            RoundingMode::TowardPositive => r.ceil().to_integer(),
            RoundingMode::TowardNegative => r.floor().to_integer(),
            RoundingMode::TowardZero => r.trunc().to_integer(),
            RoundingMode::NearestAway => r.round().to_integer(),
            RoundingMode::NearestEven => {
                let floor = r.floor();
                let twice_frac = (r - &floor) * BigInt::from(2);
                let floor = floor.to_integer();
                if twice_frac < BigRational::one() {
                    floor
                } else if twice_frac > BigRational::one() || floor.is_odd() {
                    floor + 1
                } else {
                    floor
                }
            }
        }
    }

    /// Whether rounding goes toward larger magnitude, given the sign of the
    /// exact value, how the discarded part compares with one half ulp, the
    /// parity of the kept part, and whether anything was discarded.
    pub(crate) fn rounds_up(
        self,
        negative: bool,
        half_cmp: std::cmp::Ordering,
        kept_is_odd: bool,
        inexact: bool,
    ) -> bool {
        use std::cmp::Ordering;
        match self {
            RoundingMode::NearestEven => {
                half_cmp == Ordering::Greater || (half_cmp == Ordering::Equal && kept_is_odd)
            }
            RoundingMode::NearestAway => half_cmp != Ordering::Less,
            RoundingMode::TowardPositive => inexact && !negative,
            RoundingMode::TowardNegative => inexact && negative,
            RoundingMode::TowardZero => false,
        }
    }

    /// Whether an overflowing result of the given sign becomes infinity
    pub(crate) fn overflows_to_infinity(self, negative: bool) -> bool {
        match self {
            RoundingMode::NearestEven | RoundingMode::NearestAway => true,
            RoundingMode::TowardPositive => !negative,
            RoundingMode::TowardNegative => negative,
            RoundingMode::TowardZero => false,
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.smtlib_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn test_decode_bijection() {
        for (code, mode) in RoundingMode::ALL.iter().enumerate() {
            assert_eq!(RoundingMode::from_code(code as u64), Ok(*mode));
            assert_eq!(mode.code(), code as u64);
        }
        assert_eq!(RoundingMode::from_code(5), Err(EvalError::BadRoundingMode(5)));
        assert_eq!(RoundingMode::from_code(7), Err(EvalError::BadRoundingMode(7)));
    }

    #[test]
    fn test_round_half_cases() {
        let cases = [
            // value, RNE, RNA, RTP, RTN, RTZ
            (ratio(5, 2), [2, 3, 3, 2, 2]),
            (ratio(-5, 2), [-2, -3, -2, -3, -2]),
            (ratio(7, 2), [4, 4, 4, 3, 3]),
            (ratio(7, 3), [2, 2, 3, 2, 2]),
            (ratio(-7, 3), [-2, -2, -2, -3, -2]),
            (ratio(4, 1), [4, 4, 4, 4, 4]),
        ];
        for (value, expected) in cases {
            for (mode, want) in RoundingMode::ALL.iter().zip(expected) {
                assert_eq!(
                    mode.round_rational(&value),
                    BigInt::from(want),
                    "{mode} of {value}"
                );
            }
        }
    }
}
