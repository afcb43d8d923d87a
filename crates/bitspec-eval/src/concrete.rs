//! The concrete engine: every value is a literal

use bitspec_core::arith;
use bitspec_core::{EvalConfig, EvalError, EvalResult, FloatFormat, FloatValue, RoundingMode, Word};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;

use crate::backend::Backend;
use crate::context::Frame;

/// Evaluates with plain values. Side conditions are always decided on the
/// spot, so safety predicates stay `true`.
#[derive(Debug, Clone, Default)]
pub struct ConcreteBackend {
    config: EvalConfig,
}

impl ConcreteBackend {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    fn checked(&self, w: Word) -> EvalResult<Word> {
        self.config.check_width(w.width())?;
        Ok(w)
    }

    fn rounding_mode(&self, rm: &Word) -> EvalResult<RoundingMode> {
        if rm.width() != 3 {
            return Err(EvalError::internal(format!(
                "rounding mode must be a 3-bit word, got {} bits",
                rm.width()
            )));
        }
        RoundingMode::from_word_value(rm.value())
    }

    fn require_finite(
        &self,
        frame: &mut Frame<Self>,
        op: &str,
        a: &FloatValue,
    ) -> EvalResult<()> {
        let finite = !(a.is_nan() || a.is_infinite());
        self.assert_side_cond(frame, finite, EvalError::BadValue(op.to_string()))
    }
}

fn pick<T: Clone>(c: bool, t: &T, e: &T) -> T {
    if c {
        t.clone()
    } else {
        e.clone()
    }
}

impl Backend for ConcreteBackend {
    type Bit = bool;
    type Word = Word;
    type Integer = BigInt;
    type Float = FloatValue;

    fn engine_name(&self) -> &'static str {
        "concrete"
    }

    fn config(&self) -> &EvalConfig {
        &self.config
    }

    fn bit_lit(&self, b: bool) -> bool {
        b
    }

    fn word_lit(&self, w: Word) -> EvalResult<Word> {
        self.checked(w)
    }

    fn integer_lit(&self, n: BigInt) -> BigInt {
        n
    }

    fn fp_lit(&self, v: FloatValue) -> FloatValue {
        v
    }

    fn bit_as_lit(&self, b: &bool) -> Option<bool> {
        Some(*b)
    }

    fn word_as_lit(&self, w: &Word) -> Option<Word> {
        Some(w.clone())
    }

    fn integer_as_lit(&self, i: &BigInt) -> Option<BigInt> {
        Some(i.clone())
    }

    fn fp_as_lit(&self, f: &FloatValue) -> Option<FloatValue> {
        Some(f.clone())
    }

    fn word_width(&self, w: &Word) -> EvalResult<u32> {
        Ok(w.width())
    }

    fn fp_format(&self, f: &FloatValue) -> EvalResult<FloatFormat> {
        Ok(f.format())
    }

    fn bit_not(&self, b: &bool) -> bool {
        !b
    }

    fn bit_and(&self, a: &bool, b: &bool) -> bool {
        *a && *b
    }

    fn bit_or(&self, a: &bool, b: &bool) -> bool {
        *a || *b
    }

    fn bit_xor(&self, a: &bool, b: &bool) -> bool {
        a != b
    }

    fn bit_eq(&self, a: &bool, b: &bool) -> bool {
        a == b
    }

    fn ite_bit(&self, c: &bool, t: &bool, e: &bool) -> EvalResult<bool> {
        Ok(pick(*c, t, e))
    }

    fn word_from_bits(&self, bits: &[bool]) -> EvalResult<Word> {
        self.checked(Word::from_bits(bits))
    }

    fn word_bit(&self, w: &Word, idx: u32) -> EvalResult<bool> {
        w.bit(idx)
    }

    fn word_update_bit(&self, w: &Word, idx: u32, b: &bool) -> EvalResult<Word> {
        w.with_bit(idx, *b)
    }

    fn word_concat(&self, hi: &Word, lo: &Word) -> EvalResult<Word> {
        self.checked(hi.concat(lo))
    }

    fn word_split(&self, w: &Word, left: u32) -> EvalResult<(Word, Word)> {
        w.split(left)
    }

    fn word_extract(&self, w: &Word, lo: u32, len: u32) -> EvalResult<Word> {
        w.extract(lo, len)
    }

    fn word_and(&self, a: &Word, b: &Word) -> EvalResult<Word> {
        a.and(b)
    }

    fn word_or(&self, a: &Word, b: &Word) -> EvalResult<Word> {
        a.or(b)
    }

    fn word_xor(&self, a: &Word, b: &Word) -> EvalResult<Word> {
        a.xor(b)
    }

    fn word_complement(&self, a: &Word) -> EvalResult<Word> {
        Ok(a.complement())
    }

    fn word_add(&self, a: &Word, b: &Word) -> EvalResult<Word> {
        a.add(b)
    }

    fn word_sub(&self, a: &Word, b: &Word) -> EvalResult<Word> {
        a.sub(b)
    }

    fn word_mul(&self, a: &Word, b: &Word) -> EvalResult<Word> {
        a.mul(b)
    }

    fn word_neg(&self, a: &Word) -> EvalResult<Word> {
        Ok(a.neg())
    }

    fn word_udiv(&self, frame: &mut Frame<Self>, a: &Word, b: &Word) -> EvalResult<Word> {
        self.assert_side_cond(frame, !b.value().is_zero(), EvalError::DivideByZero)?;
        a.udiv(b)
    }

    fn word_urem(&self, frame: &mut Frame<Self>, a: &Word, b: &Word) -> EvalResult<Word> {
        self.assert_side_cond(frame, !b.value().is_zero(), EvalError::DivideByZero)?;
        a.urem(b)
    }

    fn word_sdiv(&self, frame: &mut Frame<Self>, a: &Word, b: &Word) -> EvalResult<Word> {
        self.assert_side_cond(frame, !b.value().is_zero(), EvalError::DivideByZero)?;
        a.sdiv(b)
    }

    fn word_srem(&self, frame: &mut Frame<Self>, a: &Word, b: &Word) -> EvalResult<Word> {
        self.assert_side_cond(frame, !b.value().is_zero(), EvalError::DivideByZero)?;
        a.srem(b)
    }

    fn word_shl(&self, a: &Word, amount: &Word) -> EvalResult<Word> {
        Ok(a.shl(amount.shift_amount()))
    }

    fn word_lshr(&self, a: &Word, amount: &Word) -> EvalResult<Word> {
        Ok(a.lshr(amount.shift_amount()))
    }

    fn word_ashr(&self, a: &Word, amount: &Word) -> EvalResult<Word> {
        Ok(a.ashr(amount.shift_amount()))
    }

    fn word_rotl(&self, a: &Word, amount: &Word) -> EvalResult<Word> {
        Ok(a.rotl(amount.shift_amount()))
    }

    fn word_rotr(&self, a: &Word, amount: &Word) -> EvalResult<Word> {
        Ok(a.rotr(amount.shift_amount()))
    }

    fn word_lg2(&self, a: &Word) -> EvalResult<Word> {
        Ok(a.lg2())
    }

    fn word_eq(&self, a: &Word, b: &Word) -> EvalResult<bool> {
        a.equals(b)
    }

    fn word_ult(&self, a: &Word, b: &Word) -> EvalResult<bool> {
        a.ult(b)
    }

    fn word_slt(&self, a: &Word, b: &Word) -> EvalResult<bool> {
        a.slt(b)
    }

    fn word_to_integer(&self, a: &Word) -> EvalResult<BigInt> {
        Ok(a.to_unsigned())
    }

    fn word_to_signed_integer(&self, a: &Word) -> EvalResult<BigInt> {
        Ok(a.to_signed())
    }

    fn word_from_integer(&self, width: u32, i: &BigInt) -> EvalResult<Word> {
        self.config.check_width(width)?;
        Ok(Word::new(width, i))
    }

    fn ite_word(&self, c: &bool, t: &Word, e: &Word) -> EvalResult<Word> {
        if t.width() != e.width() {
            return Err(EvalError::internal(format!(
                "ite: {}-bit and {}-bit branches",
                t.width(),
                e.width()
            )));
        }
        Ok(pick(*c, t, e))
    }

    fn integer_add(&self, a: &BigInt, b: &BigInt) -> BigInt {
        a + b
    }

    fn integer_sub(&self, a: &BigInt, b: &BigInt) -> BigInt {
        a - b
    }

    fn integer_mul(&self, a: &BigInt, b: &BigInt) -> BigInt {
        a * b
    }

    fn integer_neg(&self, a: &BigInt) -> BigInt {
        -a
    }

    fn integer_div(&self, frame: &mut Frame<Self>, a: &BigInt, b: &BigInt) -> EvalResult<BigInt> {
        self.assert_side_cond(frame, !b.is_zero(), EvalError::DivideByZero)?;
        arith::div_floor(a, b)
    }

    fn integer_mod(&self, frame: &mut Frame<Self>, a: &BigInt, b: &BigInt) -> EvalResult<BigInt> {
        self.assert_side_cond(frame, !b.is_zero(), EvalError::DivideByZero)?;
        arith::mod_floor(a, b)
    }

    fn integer_eq(&self, a: &BigInt, b: &BigInt) -> EvalResult<bool> {
        Ok(a == b)
    }

    fn integer_lt(&self, a: &BigInt, b: &BigInt) -> bool {
        a < b
    }

    fn integer_le(&self, a: &BigInt, b: &BigInt) -> bool {
        a <= b
    }

    fn ite_integer(&self, c: &bool, t: &BigInt, e: &BigInt) -> EvalResult<BigInt> {
        Ok(pick(*c, t, e))
    }

    fn integer_uninterpreted(&self, name: &str, _args: &[BigInt]) -> EvalResult<BigInt> {
        Err(EvalError::internal(format!(
            "uninterpreted function {name} has no concrete value"
        )))
    }

    fn zn_reduce(&self, m: &BigInt, a: &BigInt) -> EvalResult<BigInt> {
        arith::zn_reduce(m, a)
    }

    fn zn_add(&self, m: &BigInt, a: &BigInt, b: &BigInt) -> EvalResult<BigInt> {
        arith::zn_add(m, a, b)
    }

    fn zn_sub(&self, m: &BigInt, a: &BigInt, b: &BigInt) -> EvalResult<BigInt> {
        arith::zn_sub(m, a, b)
    }

    fn zn_mul(&self, m: &BigInt, a: &BigInt, b: &BigInt) -> EvalResult<BigInt> {
        arith::zn_mul(m, a, b)
    }

    fn zn_neg(&self, m: &BigInt, a: &BigInt) -> EvalResult<BigInt> {
        arith::zn_neg(m, a)
    }

    fn zn_eq(&self, m: &BigInt, a: &BigInt, b: &BigInt) -> EvalResult<bool> {
        Ok(arith::zn_reduce(m, a)? == arith::zn_reduce(m, b)?)
    }

    fn zn_recip(&self, frame: &mut Frame<Self>, m: &BigInt, a: &BigInt) -> EvalResult<BigInt> {
        let nonzero = !arith::zn_reduce(m, a)?.is_zero();
        self.assert_side_cond(frame, nonzero, EvalError::DivideByZero)?;
        arith::zn_recip(m, a)
    }

    fn fp_add(
        &self,
        _frame: &mut Frame<Self>,
        rm: &Word,
        a: &FloatValue,
        b: &FloatValue,
    ) -> EvalResult<FloatValue> {
        a.add(b, self.rounding_mode(rm)?)
    }

    fn fp_sub(
        &self,
        _frame: &mut Frame<Self>,
        rm: &Word,
        a: &FloatValue,
        b: &FloatValue,
    ) -> EvalResult<FloatValue> {
        a.sub(b, self.rounding_mode(rm)?)
    }

    fn fp_mul(
        &self,
        _frame: &mut Frame<Self>,
        rm: &Word,
        a: &FloatValue,
        b: &FloatValue,
    ) -> EvalResult<FloatValue> {
        a.mul(b, self.rounding_mode(rm)?)
    }

    fn fp_div(
        &self,
        _frame: &mut Frame<Self>,
        rm: &Word,
        a: &FloatValue,
        b: &FloatValue,
    ) -> EvalResult<FloatValue> {
        a.div(b, self.rounding_mode(rm)?)
    }

    fn fp_neg(&self, a: &FloatValue) -> EvalResult<FloatValue> {
        Ok(a.neg())
    }

    fn fp_is_nan(&self, a: &FloatValue) -> EvalResult<bool> {
        Ok(a.is_nan())
    }

    fn fp_is_infinite(&self, a: &FloatValue) -> EvalResult<bool> {
        Ok(a.is_infinite())
    }

    fn fp_is_zero(&self, a: &FloatValue) -> EvalResult<bool> {
        Ok(a.is_zero())
    }

    fn fp_is_negative(&self, a: &FloatValue) -> EvalResult<bool> {
        Ok(a.is_negative())
    }

    fn fp_is_normal(&self, a: &FloatValue) -> EvalResult<bool> {
        Ok(a.is_normal())
    }

    fn fp_is_subnormal(&self, a: &FloatValue) -> EvalResult<bool> {
        Ok(a.is_subnormal())
    }

    fn fp_eq(&self, a: &FloatValue, b: &FloatValue) -> EvalResult<bool> {
        a.ieee_eq(b)
    }

    fn fp_lt(&self, a: &FloatValue, b: &FloatValue) -> EvalResult<bool> {
        a.ieee_lt(b)
    }

    fn fp_logical_eq(&self, a: &FloatValue, b: &FloatValue) -> EvalResult<bool> {
        a.logical_eq(b)
    }

    fn fp_from_bits(&self, format: FloatFormat, w: &Word) -> EvalResult<FloatValue> {
        FloatValue::from_bits(format, w)
    }

    fn fp_to_bits(&self, a: &FloatValue) -> EvalResult<Word> {
        Ok(a.to_bits())
    }

    fn fp_to_integer(
        &self,
        frame: &mut Frame<Self>,
        op: &str,
        mode: RoundingMode,
        a: &FloatValue,
    ) -> EvalResult<BigInt> {
        self.require_finite(frame, op, a)?;
        a.to_integer(op, mode)
    }

    fn fp_to_rational(
        &self,
        frame: &mut Frame<Self>,
        a: &FloatValue,
    ) -> EvalResult<(BigInt, BigInt)> {
        self.require_finite(frame, "fpToRational", a)?;
        let r = a.to_rational("fpToRational")?;
        Ok((r.numer().clone(), r.denom().clone()))
    }

    fn fp_from_rational(
        &self,
        frame: &mut Frame<Self>,
        format: FloatFormat,
        rm: &Word,
        num: &BigInt,
        den: &BigInt,
    ) -> EvalResult<FloatValue> {
        let mode = self.rounding_mode(rm)?;
        self.assert_side_cond(frame, !den.is_zero(), EvalError::DivideByZero)?;
        // normalizes the sign onto the numerator
        let r = BigRational::new(num.clone(), den.clone());
        Ok(FloatValue::from_rational(format, mode, &r))
    }

    fn fp_from_integer(
        &self,
        _frame: &mut Frame<Self>,
        format: FloatFormat,
        rm: &Word,
        i: &BigInt,
    ) -> EvalResult<FloatValue> {
        Ok(FloatValue::from_integer(format, self.rounding_mode(rm)?, i))
    }

    fn ite_float(&self, c: &bool, t: &FloatValue, e: &FloatValue) -> EvalResult<FloatValue> {
        if t.format() != e.format() {
            return Err(EvalError::internal(format!(
                "ite: {} and {} branches",
                t.format(),
                e.format()
            )));
        }
        Ok(pick(*c, t, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::run;

    fn w(width: u32, v: i64) -> Word {
        Word::new(width, &BigInt::from(v))
    }

    #[test]
    fn test_division_by_zero_fails_immediately() {
        let be = ConcreteBackend::default();
        let r = run(&be, |f| be.word_udiv(f, &w(8, 3), &w(8, 0))).unwrap();
        assert_eq!(r.error(), Some(&EvalError::DivideByZero));

        let r = run(&be, |f| be.integer_mod(f, &BigInt::from(-7), &BigInt::from(2))).unwrap();
        assert_eq!(r.value(), Some(&BigInt::from(1)));
        assert_eq!(r.safety(), Some(&true));
    }

    #[test]
    fn test_rounding_mode_decode() {
        let be = ConcreteBackend::default();
        let one =
            FloatValue::from_integer(FloatFormat::FLOAT32, RoundingMode::NearestEven, &1.into());
        let r = run(&be, |f| be.fp_add(f, &w(3, 5), &one, &one)).unwrap();
        assert_eq!(r.error(), Some(&EvalError::BadRoundingMode(5)));

        let err = run(&be, |f| be.fp_add(f, &w(4, 0), &one, &one)).unwrap_err();
        assert!(err.is_fatal());

        let rm = be.rounding_mode_lit(RoundingMode::TowardZero).unwrap();
        let two = run(&be, |f| be.fp_add(f, &rm, &one, &one))
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(two.to_rational("test").unwrap(), BigRational::from_integer(2.into()));
    }

    #[test]
    fn test_float_conversions_need_finite_values() {
        let be = ConcreteBackend::default();
        let inf = FloatValue::infinity(FloatFormat::FLOAT64, true);
        let r = run(&be, |f| be.fp_to_integer(f, "floor", RoundingMode::TowardNegative, &inf))
            .unwrap();
        assert_eq!(r.error(), Some(&EvalError::BadValue("floor".to_string())));

        let half = FloatValue::from_rational(
            FloatFormat::FLOAT64,
            RoundingMode::NearestEven,
            &BigRational::new((-5).into(), 2.into()),
        );
        let (n, d) = run(&be, |f| be.fp_to_rational(f, &half))
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!((n, d), (BigInt::from(-5), BigInt::from(2)));
    }

    #[test]
    fn test_word_limits() {
        let be = ConcreteBackend::new(EvalConfig::default().with_max_word_width(16));
        assert!(be.word_lit(w(16, 1)).is_ok());
        assert!(be.word_lit(w(17, 1)).unwrap_err().is_fatal());
        assert!(be.word_concat(&w(8, 1), &w(9, 1)).unwrap_err().is_fatal());
    }

    #[test]
    fn test_negative_denominator_moves_sign_to_numerator() {
        let be = ConcreteBackend::default();
        let rm = be.rounding_mode_lit(RoundingMode::NearestEven).unwrap();
        let (one, minus_two) = (BigInt::from(1), BigInt::from(-2));
        let r = run(&be, |f| be.fp_from_rational(f, FloatFormat::FLOAT64, &rm, &one, &minus_two))
            .unwrap();
        let half = BigRational::new((-1).into(), 2.into());
        assert_eq!(r.into_result().unwrap().to_rational("test").unwrap(), half);
    }

    #[test]
    fn test_definitions_must_hold_outright() {
        let be = ConcreteBackend::default();
        assert!(be.define(true).is_ok());
        assert!(be.define(false).unwrap_err().is_fatal());
    }

    #[test]
    fn test_zero_modulus_is_fatal() {
        let be = ConcreteBackend::default();
        let err = be.zn_add(&BigInt::zero(), &1.into(), &2.into()).unwrap_err();
        assert!(err.is_fatal());
    }
}
