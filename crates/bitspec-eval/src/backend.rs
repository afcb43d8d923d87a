//! The capability contract every evaluation engine implements
//!
//! The surface evaluator, the primitive table and every generic algorithm in
//! this crate (rationals, elliptic-curve formulas, branch merging) are
//! written against [`Backend`] and receive the engine as a parameter.
//!
//! Operations that can fail on user data take the current [`Frame`]: they
//! record their side condition with [`Backend::assert_side_cond`] and carry
//! on as if it holds. The concrete engine always knows whether a condition
//! holds; the symbolic engine records it as a proof obligation.

use std::fmt;

use bitspec_core::{EvalConfig, EvalError, EvalResult, FloatFormat, FloatValue, RoundingMode, Word};
use num_bigint::BigInt;

use crate::context::Frame;

/// Arithmetic and logic over one engine's representation of values
pub trait Backend: Send + Sync + Sized + 'static {
    /// Truth values, also used as safety predicates
    type Bit: Clone + fmt::Debug + Send + Sync + 'static;
    /// Fixed-width bit vectors
    type Word: Clone + fmt::Debug + Send + Sync + 'static;
    /// Unbounded integers; also the residues of `Z m`
    type Integer: Clone + fmt::Debug + Send + Sync + 'static;
    /// Floats of any format
    type Float: Clone + fmt::Debug + Send + Sync + 'static;

    fn engine_name(&self) -> &'static str;

    fn config(&self) -> &EvalConfig;

    // Literals

    fn bit_lit(&self, b: bool) -> Self::Bit;

    /// Fatal when the word is wider than the configured limit
    fn word_lit(&self, w: Word) -> EvalResult<Self::Word>;

    fn integer_lit(&self, n: BigInt) -> Self::Integer;

    fn fp_lit(&self, v: FloatValue) -> Self::Float;

    // Literal extraction. `None` only means "not known to be a literal".

    fn bit_as_lit(&self, b: &Self::Bit) -> Option<bool>;

    fn word_as_lit(&self, w: &Self::Word) -> Option<Word>;

    fn integer_as_lit(&self, i: &Self::Integer) -> Option<BigInt>;

    fn fp_as_lit(&self, f: &Self::Float) -> Option<FloatValue>;

    fn word_width(&self, w: &Self::Word) -> EvalResult<u32>;

    fn fp_format(&self, f: &Self::Float) -> EvalResult<FloatFormat>;

    // Bits

    fn bit_not(&self, b: &Self::Bit) -> Self::Bit;

    fn bit_and(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit;

    fn bit_or(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit;

    fn bit_xor(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit;

    fn bit_eq(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit;

    fn ite_bit(&self, c: &Self::Bit, t: &Self::Bit, e: &Self::Bit) -> EvalResult<Self::Bit>;

    // Word packing. Bit indices count from the most significant bit;
    // `word_extract` counts from the least significant bit.

    /// Pack bits, most significant first
    fn word_from_bits(&self, bits: &[Self::Bit]) -> EvalResult<Self::Word>;

    fn word_bit(&self, w: &Self::Word, idx: u32) -> EvalResult<Self::Bit>;

    fn word_update_bit(&self, w: &Self::Word, idx: u32, b: &Self::Bit) -> EvalResult<Self::Word>;

    /// `hi` in the most significant bits
    fn word_concat(&self, hi: &Self::Word, lo: &Self::Word) -> EvalResult<Self::Word>;

    /// Split off the `left` most significant bits
    fn word_split(&self, w: &Self::Word, left: u32) -> EvalResult<(Self::Word, Self::Word)>;

    fn word_extract(&self, w: &Self::Word, lo: u32, len: u32) -> EvalResult<Self::Word>;

    // Word logic and arithmetic, modulo 2^width. Mismatched widths are fatal.

    fn word_and(&self, a: &Self::Word, b: &Self::Word) -> EvalResult<Self::Word>;

    fn word_or(&self, a: &Self::Word, b: &Self::Word) -> EvalResult<Self::Word>;

    fn word_xor(&self, a: &Self::Word, b: &Self::Word) -> EvalResult<Self::Word>;

    fn word_complement(&self, a: &Self::Word) -> EvalResult<Self::Word>;

    fn word_add(&self, a: &Self::Word, b: &Self::Word) -> EvalResult<Self::Word>;

    fn word_sub(&self, a: &Self::Word, b: &Self::Word) -> EvalResult<Self::Word>;

    fn word_mul(&self, a: &Self::Word, b: &Self::Word) -> EvalResult<Self::Word>;

    fn word_neg(&self, a: &Self::Word) -> EvalResult<Self::Word>;

    fn word_udiv(
        &self,
        frame: &mut Frame<Self>,
        a: &Self::Word,
        b: &Self::Word,
    ) -> EvalResult<Self::Word>;

    fn word_urem(
        &self,
        frame: &mut Frame<Self>,
        a: &Self::Word,
        b: &Self::Word,
    ) -> EvalResult<Self::Word>;

    /// Signed division truncating toward zero
    fn word_sdiv(
        &self,
        frame: &mut Frame<Self>,
        a: &Self::Word,
        b: &Self::Word,
    ) -> EvalResult<Self::Word>;

    /// Signed remainder with the sign of the dividend
    fn word_srem(
        &self,
        frame: &mut Frame<Self>,
        a: &Self::Word,
        b: &Self::Word,
    ) -> EvalResult<Self::Word>;

    // Shifts take an unsigned amount word of any width

    fn word_shl(&self, a: &Self::Word, amount: &Self::Word) -> EvalResult<Self::Word>;

    fn word_lshr(&self, a: &Self::Word, amount: &Self::Word) -> EvalResult<Self::Word>;

    fn word_ashr(&self, a: &Self::Word, amount: &Self::Word) -> EvalResult<Self::Word>;

    fn word_rotl(&self, a: &Self::Word, amount: &Self::Word) -> EvalResult<Self::Word>;

    fn word_rotr(&self, a: &Self::Word, amount: &Self::Word) -> EvalResult<Self::Word>;

    /// Ceiling of the base-2 logarithm
    fn word_lg2(&self, a: &Self::Word) -> EvalResult<Self::Word>;

    fn word_eq(&self, a: &Self::Word, b: &Self::Word) -> EvalResult<Self::Bit>;

    fn word_ult(&self, a: &Self::Word, b: &Self::Word) -> EvalResult<Self::Bit>;

    fn word_slt(&self, a: &Self::Word, b: &Self::Word) -> EvalResult<Self::Bit>;

    fn word_to_integer(&self, a: &Self::Word) -> EvalResult<Self::Integer>;

    fn word_to_signed_integer(&self, a: &Self::Word) -> EvalResult<Self::Integer>;

    /// The integer reduced modulo `2^width`
    fn word_from_integer(&self, width: u32, i: &Self::Integer) -> EvalResult<Self::Word>;

    fn ite_word(&self, c: &Self::Bit, t: &Self::Word, e: &Self::Word) -> EvalResult<Self::Word>;

    // Integers

    fn integer_add(&self, a: &Self::Integer, b: &Self::Integer) -> Self::Integer;

    fn integer_sub(&self, a: &Self::Integer, b: &Self::Integer) -> Self::Integer;

    fn integer_mul(&self, a: &Self::Integer, b: &Self::Integer) -> Self::Integer;

    fn integer_neg(&self, a: &Self::Integer) -> Self::Integer;

    /// Floor division
    fn integer_div(
        &self,
        frame: &mut Frame<Self>,
        a: &Self::Integer,
        b: &Self::Integer,
    ) -> EvalResult<Self::Integer>;

    /// Floor remainder, with the sign of the divisor
    fn integer_mod(
        &self,
        frame: &mut Frame<Self>,
        a: &Self::Integer,
        b: &Self::Integer,
    ) -> EvalResult<Self::Integer>;

    fn integer_eq(&self, a: &Self::Integer, b: &Self::Integer) -> EvalResult<Self::Bit>;

    fn integer_lt(&self, a: &Self::Integer, b: &Self::Integer) -> Self::Bit;

    fn integer_le(&self, a: &Self::Integer, b: &Self::Integer) -> Self::Bit;

    fn ite_integer(
        &self,
        c: &Self::Bit,
        t: &Self::Integer,
        e: &Self::Integer,
    ) -> EvalResult<Self::Integer>;

    /// Application of an uninterpreted integer function. Only engines that
    /// hand terms to a solver support this.
    fn integer_uninterpreted(
        &self,
        name: &str,
        args: &[Self::Integer],
    ) -> EvalResult<Self::Integer>;

    // Modular integers. A modulus that is not positive is fatal.

    /// The residue of an integer in `Z m`
    fn zn_reduce(&self, m: &BigInt, a: &Self::Integer) -> EvalResult<Self::Integer>;

    fn zn_add(&self, m: &BigInt, a: &Self::Integer, b: &Self::Integer) -> EvalResult<Self::Integer>;

    fn zn_sub(&self, m: &BigInt, a: &Self::Integer, b: &Self::Integer) -> EvalResult<Self::Integer>;

    fn zn_mul(&self, m: &BigInt, a: &Self::Integer, b: &Self::Integer) -> EvalResult<Self::Integer>;

    fn zn_neg(&self, m: &BigInt, a: &Self::Integer) -> EvalResult<Self::Integer>;

    fn zn_eq(&self, m: &BigInt, a: &Self::Integer, b: &Self::Integer) -> EvalResult<Self::Bit>;

    /// Multiplicative inverse; `DivideByZero` when `a` is zero modulo `m`
    fn zn_recip(
        &self,
        frame: &mut Frame<Self>,
        m: &BigInt,
        a: &Self::Integer,
    ) -> EvalResult<Self::Integer>;

    // Floats. Rounding modes arrive as 3-bit words.

    fn fp_add(
        &self,
        frame: &mut Frame<Self>,
        rm: &Self::Word,
        a: &Self::Float,
        b: &Self::Float,
    ) -> EvalResult<Self::Float>;

    fn fp_sub(
        &self,
        frame: &mut Frame<Self>,
        rm: &Self::Word,
        a: &Self::Float,
        b: &Self::Float,
    ) -> EvalResult<Self::Float>;

    fn fp_mul(
        &self,
        frame: &mut Frame<Self>,
        rm: &Self::Word,
        a: &Self::Float,
        b: &Self::Float,
    ) -> EvalResult<Self::Float>;

    fn fp_div(
        &self,
        frame: &mut Frame<Self>,
        rm: &Self::Word,
        a: &Self::Float,
        b: &Self::Float,
    ) -> EvalResult<Self::Float>;

    fn fp_neg(&self, a: &Self::Float) -> EvalResult<Self::Float>;

    fn fp_is_nan(&self, a: &Self::Float) -> EvalResult<Self::Bit>;

    fn fp_is_infinite(&self, a: &Self::Float) -> EvalResult<Self::Bit>;

    fn fp_is_zero(&self, a: &Self::Float) -> EvalResult<Self::Bit>;

    fn fp_is_negative(&self, a: &Self::Float) -> EvalResult<Self::Bit>;

    fn fp_is_normal(&self, a: &Self::Float) -> EvalResult<Self::Bit>;

    fn fp_is_subnormal(&self, a: &Self::Float) -> EvalResult<Self::Bit>;

    /// IEEE equality: NaN is unequal to everything, `+0 == -0`
    fn fp_eq(&self, a: &Self::Float, b: &Self::Float) -> EvalResult<Self::Bit>;

    fn fp_lt(&self, a: &Self::Float, b: &Self::Float) -> EvalResult<Self::Bit>;

    /// Structural equality: NaN equals NaN, `+0 != -0`
    fn fp_logical_eq(&self, a: &Self::Float, b: &Self::Float) -> EvalResult<Self::Bit>;

    fn fp_from_bits(&self, format: FloatFormat, w: &Self::Word) -> EvalResult<Self::Float>;

    /// IEEE encoding; NaN maps to the canonical quiet NaN
    fn fp_to_bits(&self, a: &Self::Float) -> EvalResult<Self::Word>;

    /// Round to an integer; `BadValue(op)` for NaN and infinities
    fn fp_to_integer(
        &self,
        frame: &mut Frame<Self>,
        op: &str,
        mode: RoundingMode,
        a: &Self::Float,
    ) -> EvalResult<Self::Integer>;

    /// Exact value as `(numerator, denominator)` with a positive
    /// denominator; `BadValue` for NaN and infinities
    fn fp_to_rational(
        &self,
        frame: &mut Frame<Self>,
        a: &Self::Float,
    ) -> EvalResult<(Self::Integer, Self::Integer)>;

    /// Round `num / den` into `format`; `den` must be positive
    fn fp_from_rational(
        &self,
        frame: &mut Frame<Self>,
        format: FloatFormat,
        rm: &Self::Word,
        num: &Self::Integer,
        den: &Self::Integer,
    ) -> EvalResult<Self::Float>;

    fn fp_from_integer(
        &self,
        frame: &mut Frame<Self>,
        format: FloatFormat,
        rm: &Self::Word,
        i: &Self::Integer,
    ) -> EvalResult<Self::Float>;

    fn ite_float(&self, c: &Self::Bit, t: &Self::Float, e: &Self::Float) -> EvalResult<Self::Float>;

    // Side conditions

    /// Require `pred` for the rest of the computation in `frame`.
    ///
    /// A predicate known to be false fails with `err` right away; one known
    /// to be true is dropped; any other predicate becomes a proof
    /// obligation of the frame.
    fn assert_side_cond(
        &self,
        frame: &mut Frame<Self>,
        pred: Self::Bit,
        err: EvalError,
    ) -> EvalResult<()> {
        match self.bit_as_lit(&pred) {
            Some(true) => Ok(()),
            Some(false) => Err(err),
            None => {
                frame.conjoin(self, &pred);
                Ok(())
            }
        }
    }

    /// Record `pred` as a definition of the session, assumed by every later
    /// query whatever path is being evaluated. Engines without a store only
    /// accept predicates that hold outright.
    fn define(&self, pred: Self::Bit) -> EvalResult<()> {
        match self.bit_as_lit(&pred) {
            Some(true) => Ok(()),
            Some(false) => Err(EvalError::internal("definition does not hold")),
            None => Err(EvalError::UnsupportedSymbolicOp("define".to_string())),
        }
    }

    /// A literal rounding-mode word
    fn rounding_mode_lit(&self, mode: RoundingMode) -> EvalResult<Self::Word> {
        self.word_lit(Word::new(3, &BigInt::from(mode.code())))
    }
}
