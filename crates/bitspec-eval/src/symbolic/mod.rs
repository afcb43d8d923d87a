//! The symbolic engine: values are solver expressions.
//!
//! Operations on literals fold to literals, so a symbolic evaluation over
//! known inputs computes the same values as the concrete engine. Side
//! conditions that depend on unknowns become conjuncts of the frame's
//! safety predicate, and operations the solver cannot express directly are
//! described by witnesses constrained through the session's
//! [`DefinitionalStore`].

mod store;

pub use store::{DefinitionalStore, VarRegistry};

use std::sync::Arc;

use bitspec_core::{
    arith, EvalConfig, EvalError, EvalResult, FloatFormat, FloatValue, RoundingMode, Word,
};
use bitspec_smt::{SolverQuery, Sort, SymExpr, SymOp};
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use tracing::debug;

use crate::backend::Backend;
use crate::context::{Frame, Partial};

/// Builds solver expressions. Clones share the session: its variables and
/// its definitional store.
#[derive(Debug, Clone)]
pub struct SymBackend {
    config: EvalConfig,
    store: Arc<DefinitionalStore>,
    vars: Arc<VarRegistry>,
}

impl Default for SymBackend {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}

impl SymBackend {
    /// Start a new solver session
    pub fn new(config: EvalConfig) -> Self {
        let vars = VarRegistry::new(config.witness_prefix.clone());
        Self {
            config,
            store: Arc::new(DefinitionalStore::new()),
            vars: Arc::new(vars),
        }
    }

    pub fn store(&self) -> &DefinitionalStore {
        &self.store
    }

    /// A free input of the query
    pub fn declare_input(&self, name: &str, sort: Sort) -> EvalResult<SymExpr> {
        if let Sort::BitVec(width) = sort {
            self.config.check_width(width)?;
        }
        Ok(self.vars.declare(name, sort)?)
    }

    /// A fresh variable constrained by `define`, which receives the
    /// variable and returns its defining predicate
    pub fn declare_witness(
        &self,
        sort: Sort,
        define: impl FnOnce(&SymExpr) -> EvalResult<SymExpr>,
    ) -> EvalResult<SymExpr> {
        let z = self.vars.fresh(sort);
        let pred = define(&z)?;
        debug!(witness = %z, sort = %z.sort(), "declared witness");
        self.store.add(pred);
        Ok(z)
    }

    /// Is `goal` valid under the session's definitions?
    pub fn prove_query(&self, goal: &SymExpr) -> EvalResult<SolverQuery> {
        Ok(SolverQuery::prove(goal.clone(), self.store.conjuncts())?)
    }

    /// Is `goal` satisfiable together with the session's definitions?
    pub fn sat_query(&self, goal: &SymExpr) -> EvalResult<SolverQuery> {
        Ok(SolverQuery::satisfy(goal.clone(), self.store.conjuncts())?)
    }

    /// The query that establishes a result's safety predicate. An error
    /// result has no query; its error is returned.
    pub fn safety_query<T>(&self, result: &Partial<Self, T>) -> EvalResult<SolverQuery> {
        match result.safety() {
            Some(safety) => self.prove_query(safety),
            None => Err(result
                .error()
                .cloned()
                .unwrap_or_else(|| EvalError::internal("partial result without safety"))),
        }
    }

    fn bv_lit(&self, width: u32, value: impl Into<BigInt>) -> SymExpr {
        SymExpr::bv_lit(width, &value.into())
    }

    fn width(&self, w: &SymExpr, op: &str) -> EvalResult<u32> {
        Ok(w.bv_width(op)?)
    }

    fn checked(&self, w: SymExpr, op: &str) -> EvalResult<SymExpr> {
        self.config.check_width(self.width(&w, op)?)?;
        Ok(w)
    }

    fn empty_word(&self) -> SymExpr {
        SymExpr::bv(Word::empty())
    }

    fn is_zero_word(&self, w: &SymExpr) -> EvalResult<SymExpr> {
        let width = self.width(w, "division")?;
        Ok(SymExpr::eq(w.clone(), self.bv_lit(width, 0))?)
    }

    fn nonzero_divisor(&self, frame: &mut Frame<Self>, b: &SymExpr) -> EvalResult<()> {
        let zero = self.is_zero_word(b)?;
        self.assert_side_cond(frame, SymExpr::not(zero), EvalError::DivideByZero)
    }

    /// Bit `idx` counted from the most significant bit, as an offset from
    /// the least significant bit
    fn bit_position(&self, w: &SymExpr, idx: u32, op: &str) -> EvalResult<u32> {
        let width = self.width(w, op)?;
        if idx >= width {
            return Err(EvalError::internal(format!(
                "{op}: index {idx} out of range for width {width}"
            )));
        }
        Ok(width - 1 - idx)
    }

    /// Shift where the amount word may be narrower or wider than `a`
    fn shift(
        &self,
        op: fn(SymExpr, SymExpr) -> bitspec_smt::SmtResult<SymExpr>,
        a: &SymExpr,
        amount: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let n = self.width(a, "shift")?;
        let k = self.width(amount, "shift")?;
        if n == 0 {
            return Ok(a.clone());
        }
        if k <= n {
            let amount = SymExpr::zero_extend(amount.clone(), n - k)?;
            return Ok(op(a.clone(), amount)?);
        }
        // Amounts of at least n bits saturate: shifting by n already does
        let in_range = SymExpr::bvult(amount.clone(), self.bv_lit(k, n))?;
        let low = SymExpr::extract(amount.clone(), n - 1, 0)?;
        let shifted = op(a.clone(), low)?;
        let saturated = op(a.clone(), self.bv_lit(n, n))?;
        Ok(SymExpr::ite(in_range, shifted, saturated)?)
    }

    /// Rotate left by `amount` reduced modulo the width
    fn rotate_left(&self, a: &SymExpr, amount: SymExpr) -> EvalResult<SymExpr> {
        let n = self.width(a, "rotate")?;
        if n == 0 {
            return Ok(a.clone());
        }
        let r_int = SymExpr::mod_euclid(amount, SymExpr::int(n));
        let r = SymExpr::int2bv(n, r_int)?;
        let back = SymExpr::bvsub(self.bv_lit(n, n), r.clone())?;
        let high = SymExpr::bvshl(a.clone(), r)?;
        let low = SymExpr::bvlshr(a.clone(), back)?;
        Ok(SymExpr::bvor(high, low)?)
    }

    /// Floor division or remainder through the solver's Euclidean `div` and
    /// `mod`.
    ///
    /// For a negative divisor both operands are negated; the remainder then
    /// also needs its sign flipped, the quotient does not.
    fn floor_div_mod(&self, x: &SymExpr, y: &SymExpr, want_mod: bool) -> EvalResult<SymExpr> {
        let positive = |x: SymExpr, y: SymExpr| {
            if want_mod {
                SymExpr::mod_euclid(x, y)
            } else {
                SymExpr::div_euclid(x, y)
            }
        };
        let negative = |x: &SymExpr, y: &SymExpr| {
            let r = positive(SymExpr::neg(x.clone()), SymExpr::neg(y.clone()));
            if want_mod {
                SymExpr::neg(r)
            } else {
                r
            }
        };
        match y.as_int() {
            Some(n) if !n.is_negative() => Ok(positive(x.clone(), y.clone())),
            Some(_) => Ok(negative(x, y)),
            None => {
                let y_negative = SymExpr::lt(y.clone(), SymExpr::int(0));
                Ok(SymExpr::ite(
                    y_negative,
                    negative(x, y),
                    positive(x.clone(), y.clone()),
                )?)
            }
        }
    }

    fn modulus(&self, m: &BigInt) -> EvalResult<SymExpr> {
        arith::check_modulus(m)?;
        Ok(SymExpr::int(m.clone()))
    }

    /// Decode a 3-bit rounding-mode word
    fn rounding_mode(&self, frame: &mut Frame<Self>, rm: &SymExpr) -> EvalResult<SymExpr> {
        let width = self.width(rm, "rounding mode")?;
        if width != 3 {
            return Err(EvalError::internal(format!(
                "rounding mode must be a 3-bit word, got {width} bits"
            )));
        }
        if let Some(w) = rm.as_bv() {
            return Ok(SymExpr::rm(RoundingMode::from_word_value(w.value())?));
        }
        let last = RoundingMode::ALL.len() - 1;
        let valid = SymExpr::bvule(rm.clone(), self.bv_lit(3, last))?;
        self.assert_side_cond(frame, valid, EvalError::BadSymbolicRoundingMode)?;
        let mut decoded = SymExpr::rm(RoundingMode::ALL[last]);
        for mode in RoundingMode::ALL[..last].iter().rev() {
            let is_mode = SymExpr::eq(rm.clone(), self.bv_lit(3, mode.code()))?;
            decoded = SymExpr::ite(is_mode, SymExpr::rm(*mode), decoded)?;
        }
        Ok(decoded)
    }

    fn is_finite(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        let nan = SymExpr::fp_test(SymOp::FpIsNaN, a.clone())?;
        let inf = SymExpr::fp_test(SymOp::FpIsInfinite, a.clone())?;
        Ok(SymExpr::not(SymExpr::or(nan, inf)))
    }

    fn require_finite(&self, frame: &mut Frame<Self>, op: &str, a: &SymExpr) -> EvalResult<()> {
        let finite = self.is_finite(a)?;
        self.assert_side_cond(frame, finite, EvalError::BadValue(op.to_string()))
    }
}

impl Backend for SymBackend {
    type Bit = SymExpr;
    type Word = SymExpr;
    type Integer = SymExpr;
    type Float = SymExpr;

    fn engine_name(&self) -> &'static str {
        "symbolic"
    }

    fn config(&self) -> &EvalConfig {
        &self.config
    }

    fn bit_lit(&self, b: bool) -> SymExpr {
        SymExpr::bool_const(b)
    }

    fn word_lit(&self, w: Word) -> EvalResult<SymExpr> {
        self.config.check_width(w.width())?;
        Ok(SymExpr::bv(w))
    }

    fn integer_lit(&self, n: BigInt) -> SymExpr {
        SymExpr::int(n)
    }

    fn fp_lit(&self, v: FloatValue) -> SymExpr {
        SymExpr::fp(v)
    }

    fn bit_as_lit(&self, b: &SymExpr) -> Option<bool> {
        b.as_bool()
    }

    fn word_as_lit(&self, w: &SymExpr) -> Option<Word> {
        w.as_bv().cloned()
    }

    fn integer_as_lit(&self, i: &SymExpr) -> Option<BigInt> {
        i.as_int().cloned()
    }

    fn fp_as_lit(&self, f: &SymExpr) -> Option<FloatValue> {
        f.as_fp().cloned()
    }

    fn word_width(&self, w: &SymExpr) -> EvalResult<u32> {
        self.width(w, "width")
    }

    fn fp_format(&self, f: &SymExpr) -> EvalResult<FloatFormat> {
        Ok(f.fp_format("format")?)
    }

    fn bit_not(&self, b: &SymExpr) -> SymExpr {
        SymExpr::not(b.clone())
    }

    fn bit_and(&self, a: &SymExpr, b: &SymExpr) -> SymExpr {
        SymExpr::and(a.clone(), b.clone())
    }

    fn bit_or(&self, a: &SymExpr, b: &SymExpr) -> SymExpr {
        SymExpr::or(a.clone(), b.clone())
    }

    fn bit_xor(&self, a: &SymExpr, b: &SymExpr) -> SymExpr {
        SymExpr::xor(a.clone(), b.clone())
    }

    fn bit_eq(&self, a: &SymExpr, b: &SymExpr) -> SymExpr {
        SymExpr::not(SymExpr::xor(a.clone(), b.clone()))
    }

    fn ite_bit(&self, c: &SymExpr, t: &SymExpr, e: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::ite(c.clone(), t.clone(), e.clone())?)
    }

    fn word_from_bits(&self, bits: &[SymExpr]) -> EvalResult<SymExpr> {
        let width = u32::try_from(bits.len())
            .map_err(|_| EvalError::internal("word_from_bits: too many bits"))?;
        self.config.check_width(width)?;
        let mut word = self.empty_word();
        for b in bits {
            let bit = SymExpr::ite(b.clone(), self.bv_lit(1, 1), self.bv_lit(1, 0))?;
            word = SymExpr::concat(word, bit)?;
        }
        Ok(word)
    }

    fn word_bit(&self, w: &SymExpr, idx: u32) -> EvalResult<SymExpr> {
        let pos = self.bit_position(w, idx, "bit")?;
        let bit = SymExpr::extract(w.clone(), pos, pos)?;
        Ok(SymExpr::eq(bit, self.bv_lit(1, 1))?)
    }

    fn word_update_bit(&self, w: &SymExpr, idx: u32, b: &SymExpr) -> EvalResult<SymExpr> {
        let pos = self.bit_position(w, idx, "update")?;
        let width = self.width(w, "update")?;
        let mask = self.bv_lit(width, BigInt::one() << pos);
        let set = SymExpr::bvor(w.clone(), mask.clone())?;
        let cleared = SymExpr::bvand(w.clone(), SymExpr::bvnot(mask)?)?;
        Ok(SymExpr::ite(b.clone(), set, cleared)?)
    }

    fn word_concat(&self, hi: &SymExpr, lo: &SymExpr) -> EvalResult<SymExpr> {
        self.checked(SymExpr::concat(hi.clone(), lo.clone())?, "concat")
    }

    fn word_split(&self, w: &SymExpr, left: u32) -> EvalResult<(SymExpr, SymExpr)> {
        let width = self.width(w, "split")?;
        if left > width {
            return Err(EvalError::internal(format!(
                "split: {left} bits requested from a {width}-bit word"
            )));
        }
        let right = width - left;
        let high = if left == 0 {
            self.empty_word()
        } else {
            SymExpr::extract(w.clone(), width - 1, right)?
        };
        let low = if right == 0 {
            self.empty_word()
        } else {
            SymExpr::extract(w.clone(), right - 1, 0)?
        };
        Ok((high, low))
    }

    fn word_extract(&self, w: &SymExpr, lo: u32, len: u32) -> EvalResult<SymExpr> {
        let width = self.width(w, "extract")?;
        if u64::from(lo) + u64::from(len) > u64::from(width) {
            return Err(EvalError::internal(format!(
                "extract: bits [{lo}, {lo}+{len}) out of range for width {width}"
            )));
        }
        if len == 0 {
            return Ok(self.empty_word());
        }
        Ok(SymExpr::extract(w.clone(), lo + len - 1, lo)?)
    }

    fn word_and(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvand(a.clone(), b.clone())?)
    }

    fn word_or(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvor(a.clone(), b.clone())?)
    }

    fn word_xor(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvxor(a.clone(), b.clone())?)
    }

    fn word_complement(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvnot(a.clone())?)
    }

    fn word_add(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvadd(a.clone(), b.clone())?)
    }

    fn word_sub(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvsub(a.clone(), b.clone())?)
    }

    fn word_mul(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvmul(a.clone(), b.clone())?)
    }

    fn word_neg(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvneg(a.clone())?)
    }

    fn word_udiv(
        &self,
        frame: &mut Frame<Self>,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        self.nonzero_divisor(frame, b)?;
        Ok(SymExpr::bvudiv(a.clone(), b.clone())?)
    }

    fn word_urem(
        &self,
        frame: &mut Frame<Self>,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        self.nonzero_divisor(frame, b)?;
        Ok(SymExpr::bvurem(a.clone(), b.clone())?)
    }

    fn word_sdiv(
        &self,
        frame: &mut Frame<Self>,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        self.nonzero_divisor(frame, b)?;
        Ok(SymExpr::bvsdiv(a.clone(), b.clone())?)
    }

    fn word_srem(
        &self,
        frame: &mut Frame<Self>,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        self.nonzero_divisor(frame, b)?;
        Ok(SymExpr::bvsrem(a.clone(), b.clone())?)
    }

    fn word_shl(&self, a: &SymExpr, amount: &SymExpr) -> EvalResult<SymExpr> {
        self.shift(SymExpr::bvshl, a, amount)
    }

    fn word_lshr(&self, a: &SymExpr, amount: &SymExpr) -> EvalResult<SymExpr> {
        self.shift(SymExpr::bvlshr, a, amount)
    }

    fn word_ashr(&self, a: &SymExpr, amount: &SymExpr) -> EvalResult<SymExpr> {
        self.shift(SymExpr::bvashr, a, amount)
    }

    fn word_rotl(&self, a: &SymExpr, amount: &SymExpr) -> EvalResult<SymExpr> {
        self.rotate_left(a, SymExpr::bv2nat(amount.clone())?)
    }

    fn word_rotr(&self, a: &SymExpr, amount: &SymExpr) -> EvalResult<SymExpr> {
        self.rotate_left(a, SymExpr::neg(SymExpr::bv2nat(amount.clone())?))
    }

    fn word_lg2(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        let n = self.width(a, "lg2")?;
        if n == 0 {
            return Ok(a.clone());
        }
        // Smallest k with a <= 2^k
        let mut result = self.bv_lit(n, n);
        for k in (0..n).rev() {
            let fits = SymExpr::bvule(a.clone(), self.bv_lit(n, BigInt::one() << k))?;
            result = SymExpr::ite(fits, self.bv_lit(n, k), result)?;
        }
        Ok(result)
    }

    fn word_eq(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        let (wa, wb) = (self.width(a, "==")?, self.width(b, "==")?);
        if wa != wb {
            return Err(EvalError::internal(format!(
                "==: {wa}-bit and {wb}-bit words"
            )));
        }
        Ok(SymExpr::eq(a.clone(), b.clone())?)
    }

    fn word_ult(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvult(a.clone(), b.clone())?)
    }

    fn word_slt(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bvslt(a.clone(), b.clone())?)
    }

    fn word_to_integer(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::bv2nat(a.clone())?)
    }

    fn word_to_signed_integer(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        let n = self.width(a, "toSignedInteger")?;
        if n == 0 {
            return Ok(SymExpr::int(0));
        }
        let unsigned = SymExpr::bv2nat(a.clone())?;
        let negative = SymExpr::bvslt(a.clone(), self.bv_lit(n, 0))?;
        let wrapped = SymExpr::sub(unsigned.clone(), SymExpr::int(BigInt::one() << n));
        Ok(SymExpr::ite(negative, wrapped, unsigned)?)
    }

    fn word_from_integer(&self, width: u32, i: &SymExpr) -> EvalResult<SymExpr> {
        self.config.check_width(width)?;
        Ok(SymExpr::int2bv(width, i.clone())?)
    }

    fn ite_word(&self, c: &SymExpr, t: &SymExpr, e: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::ite(c.clone(), t.clone(), e.clone())?)
    }

    fn integer_add(&self, a: &SymExpr, b: &SymExpr) -> SymExpr {
        SymExpr::add(a.clone(), b.clone())
    }

    fn integer_sub(&self, a: &SymExpr, b: &SymExpr) -> SymExpr {
        SymExpr::sub(a.clone(), b.clone())
    }

    fn integer_mul(&self, a: &SymExpr, b: &SymExpr) -> SymExpr {
        SymExpr::mul(a.clone(), b.clone())
    }

    fn integer_neg(&self, a: &SymExpr) -> SymExpr {
        SymExpr::neg(a.clone())
    }

    fn integer_div(
        &self,
        frame: &mut Frame<Self>,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let nonzero = SymExpr::not(SymExpr::eq(b.clone(), SymExpr::int(0))?);
        self.assert_side_cond(frame, nonzero, EvalError::DivideByZero)?;
        self.floor_div_mod(a, b, false)
    }

    fn integer_mod(
        &self,
        frame: &mut Frame<Self>,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let nonzero = SymExpr::not(SymExpr::eq(b.clone(), SymExpr::int(0))?);
        self.assert_side_cond(frame, nonzero, EvalError::DivideByZero)?;
        self.floor_div_mod(a, b, true)
    }

    fn integer_eq(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::eq(a.clone(), b.clone())?)
    }

    fn integer_lt(&self, a: &SymExpr, b: &SymExpr) -> SymExpr {
        SymExpr::lt(a.clone(), b.clone())
    }

    fn integer_le(&self, a: &SymExpr, b: &SymExpr) -> SymExpr {
        SymExpr::le(a.clone(), b.clone())
    }

    fn ite_integer(&self, c: &SymExpr, t: &SymExpr, e: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::ite(c.clone(), t.clone(), e.clone())?)
    }

    fn integer_uninterpreted(&self, name: &str, args: &[SymExpr]) -> EvalResult<SymExpr> {
        debug!(function = name, arity = args.len(), "uninterpreted function");
        Ok(SymExpr::app(name, args.to_vec(), Sort::Int))
    }

    fn zn_reduce(&self, m: &BigInt, a: &SymExpr) -> EvalResult<SymExpr> {
        let m = self.modulus(m)?;
        Ok(SymExpr::mod_euclid(a.clone(), m))
    }

    fn zn_add(&self, m: &BigInt, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        self.zn_reduce(m, &SymExpr::add(a.clone(), b.clone()))
    }

    fn zn_sub(&self, m: &BigInt, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        self.zn_reduce(m, &SymExpr::sub(a.clone(), b.clone()))
    }

    fn zn_mul(&self, m: &BigInt, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        self.zn_reduce(m, &SymExpr::mul(a.clone(), b.clone()))
    }

    fn zn_neg(&self, m: &BigInt, a: &SymExpr) -> EvalResult<SymExpr> {
        self.zn_reduce(m, &SymExpr::neg(a.clone()))
    }

    fn zn_eq(&self, m: &BigInt, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        let (a, b) = (self.zn_reduce(m, a)?, self.zn_reduce(m, b)?);
        Ok(SymExpr::eq(a, b)?)
    }

    fn zn_recip(
        &self,
        frame: &mut Frame<Self>,
        m: &BigInt,
        a: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let modulus = self.modulus(m)?;
        if let Some(x) = a.as_int() {
            return Ok(SymExpr::int(arith::zn_recip(m, x)?));
        }
        // Nothing is invertible modulo 1
        if m.is_one() {
            return Err(EvalError::DivideByZero);
        }
        let residue = SymExpr::mod_euclid(a.clone(), modulus.clone());
        let is_zero = SymExpr::eq(residue.clone(), SymExpr::int(0))?;
        self.assert_side_cond(frame, SymExpr::not(is_zero.clone()), EvalError::DivideByZero)?;
        self.declare_witness(Sort::Int, |z| {
            let in_range = SymExpr::and(
                SymExpr::le(SymExpr::int(1), z.clone()),
                SymExpr::le(z.clone(), SymExpr::int(m - 1)),
            );
            let product = SymExpr::mod_euclid(SymExpr::mul(a.clone(), z.clone()), modulus);
            let inverse = SymExpr::eq(product, SymExpr::int(1))?;
            Ok(SymExpr::and(in_range, SymExpr::or(inverse, is_zero)))
        })
    }

    fn fp_add(
        &self,
        frame: &mut Frame<Self>,
        rm: &SymExpr,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let rm = self.rounding_mode(frame, rm)?;
        Ok(SymExpr::fp_add(rm, a.clone(), b.clone())?)
    }

    fn fp_sub(
        &self,
        frame: &mut Frame<Self>,
        rm: &SymExpr,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let rm = self.rounding_mode(frame, rm)?;
        Ok(SymExpr::fp_sub(rm, a.clone(), b.clone())?)
    }

    fn fp_mul(
        &self,
        frame: &mut Frame<Self>,
        rm: &SymExpr,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let rm = self.rounding_mode(frame, rm)?;
        Ok(SymExpr::fp_mul(rm, a.clone(), b.clone())?)
    }

    fn fp_div(
        &self,
        frame: &mut Frame<Self>,
        rm: &SymExpr,
        a: &SymExpr,
        b: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let rm = self.rounding_mode(frame, rm)?;
        Ok(SymExpr::fp_div(rm, a.clone(), b.clone())?)
    }

    fn fp_neg(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::fp_neg(a.clone())?)
    }

    fn fp_is_nan(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::fp_test(SymOp::FpIsNaN, a.clone())?)
    }

    fn fp_is_infinite(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::fp_test(SymOp::FpIsInfinite, a.clone())?)
    }

    fn fp_is_zero(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::fp_test(SymOp::FpIsZero, a.clone())?)
    }

    fn fp_is_negative(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::fp_test(SymOp::FpIsNegative, a.clone())?)
    }

    fn fp_is_normal(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::fp_test(SymOp::FpIsNormal, a.clone())?)
    }

    fn fp_is_subnormal(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::fp_test(SymOp::FpIsSubnormal, a.clone())?)
    }

    fn fp_eq(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::fp_compare(SymOp::FpEq, a.clone(), b.clone())?)
    }

    fn fp_lt(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::fp_compare(SymOp::FpLt, a.clone(), b.clone())?)
    }

    fn fp_logical_eq(&self, a: &SymExpr, b: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::eq(a.clone(), b.clone())?)
    }

    fn fp_from_bits(&self, format: FloatFormat, w: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::to_fp_from_bits(format, w.clone())?)
    }

    fn fp_to_bits(&self, a: &SymExpr) -> EvalResult<SymExpr> {
        let format = a.fp_format("fpToBits")?;
        if let Some(v) = a.as_fp() {
            return Ok(SymExpr::bv(v.to_bits()));
        }
        let is_nan = SymExpr::fp_test(SymOp::FpIsNaN, a.clone())?;
        let bits = self.declare_witness(Sort::BitVec(format.width()), |b| {
            let decoded = SymExpr::to_fp_from_bits(format, b.clone())?;
            Ok(SymExpr::or(is_nan.clone(), SymExpr::eq(decoded, a.clone())?))
        })?;
        let canonical = SymExpr::bv(FloatValue::nan(format).to_bits());
        Ok(SymExpr::ite(is_nan, canonical, bits)?)
    }

    fn fp_to_integer(
        &self,
        frame: &mut Frame<Self>,
        op: &str,
        mode: RoundingMode,
        a: &SymExpr,
    ) -> EvalResult<SymExpr> {
        self.require_finite(frame, op, a)?;
        if let Some(v) = a.as_fp() {
            return Ok(SymExpr::int(v.to_integer(op, mode)?));
        }
        let rounded = SymExpr::fp_round_to_integral(SymExpr::rm(mode), a.clone())?;
        Ok(SymExpr::to_int(SymExpr::fp_to_real(rounded)?))
    }

    fn fp_to_rational(
        &self,
        frame: &mut Frame<Self>,
        a: &SymExpr,
    ) -> EvalResult<(SymExpr, SymExpr)> {
        self.require_finite(frame, "fpToRational", a)?;
        if let Some(v) = a.as_fp() {
            let r = v.to_rational("fpToRational")?;
            let (n, d) = (r.numer().clone(), r.denom().clone());
            return Ok((SymExpr::int(n), SymExpr::int(d)));
        }
        let finite = self.is_finite(a)?;
        let den = self.declare_witness(Sort::Int, |d| Ok(SymExpr::lt(SymExpr::int(0), d.clone())))?;
        let num = self.declare_witness(Sort::Int, |n| {
            let scaled =
                SymExpr::real_mul(SymExpr::fp_to_real(a.clone())?, SymExpr::to_real(den.clone()));
            let exact = SymExpr::eq(SymExpr::to_real(n.clone()), scaled)?;
            Ok(SymExpr::or(SymExpr::not(finite), exact))
        })?;
        Ok((num, den))
    }

    fn fp_from_rational(
        &self,
        frame: &mut Frame<Self>,
        format: FloatFormat,
        rm: &SymExpr,
        num: &SymExpr,
        den: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let rm = self.rounding_mode(frame, rm)?;
        let nonzero = SymExpr::not(SymExpr::eq(den.clone(), SymExpr::int(0))?);
        self.assert_side_cond(frame, nonzero, EvalError::DivideByZero)?;
        let value =
            SymExpr::real_div(SymExpr::to_real(num.clone()), SymExpr::to_real(den.clone()));
        Ok(SymExpr::to_fp_from_real(format, rm, value)?)
    }

    fn fp_from_integer(
        &self,
        frame: &mut Frame<Self>,
        format: FloatFormat,
        rm: &SymExpr,
        i: &SymExpr,
    ) -> EvalResult<SymExpr> {
        let rm = self.rounding_mode(frame, rm)?;
        Ok(SymExpr::to_fp_from_real(format, rm, SymExpr::to_real(i.clone()))?)
    }

    fn ite_float(&self, c: &SymExpr, t: &SymExpr, e: &SymExpr) -> EvalResult<SymExpr> {
        Ok(SymExpr::ite(c.clone(), t.clone(), e.clone())?)
    }

    fn define(&self, pred: SymExpr) -> EvalResult<()> {
        if pred.as_bool() == Some(false) {
            return Err(EvalError::internal("definition does not hold"));
        }
        self.store.add(pred);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::run;

    fn bv(width: u32, v: i64) -> SymExpr {
        SymExpr::bv_lit(width, &BigInt::from(v))
    }

    #[test]
    fn test_literals_fold_like_the_concrete_engine() {
        let be = SymBackend::default();
        let r = run(&be, |f| be.word_sdiv(f, &bv(8, 0x80), &bv(8, 0xff))).unwrap();
        assert_eq!(r.value(), Some(&bv(8, 0x80)));
        assert_eq!(r.safety(), Some(&SymExpr::Bool(true)));

        let r = run(&be, |f| be.word_udiv(f, &bv(8, 1), &bv(8, 0))).unwrap();
        assert_eq!(r.error(), Some(&EvalError::DivideByZero));
    }

    #[test]
    fn test_symbolic_divisor_becomes_obligation() {
        let be = SymBackend::default();
        let y = be.declare_input("y", Sort::BitVec(8)).unwrap();
        let r = run(&be, |f| be.word_urem(f, &bv(8, 7), &y)).unwrap();
        assert_eq!(r.safety().unwrap().to_string(), "(not (= y #x00))");
        assert_eq!(r.value().unwrap().to_string(), "(bvurem #x07 y)");
    }

    #[test]
    fn test_wide_shift_amount_saturates() {
        let be = SymBackend::default();
        let a = be.declare_input("a", Sort::BitVec(4)).unwrap();
        let amount = be.declare_input("k", Sort::BitVec(8)).unwrap();
        let shifted = be.word_shl(&a, &amount).unwrap();
        assert_eq!(
            shifted.to_string(),
            "(ite (bvult k #x04) (bvshl a ((_ extract 3 0) k)) (bvshl a #x4))"
        );
        let lit = be.word_ashr(&bv(4, 0b1000), &bv(8, 200)).unwrap();
        assert_eq!(lit, bv(4, 0b1111));
    }

    #[test]
    fn test_rotation_and_lg2_fold() {
        let be = SymBackend::default();
        let r = be.word_rotl(&bv(8, 0x81), &bv(3, 1)).unwrap();
        assert_eq!(r, bv(8, 0x03));
        let r = be.word_rotr(&bv(8, 0x81), &bv(16, 9)).unwrap();
        assert_eq!(r, bv(8, 0xc0));
        for (x, lg) in [(0, 0), (1, 0), (2, 1), (3, 2), (128, 7), (129, 8), (255, 8)] {
            assert_eq!(be.word_lg2(&bv(8, x)).unwrap(), bv(8, lg), "lg2 {x}");
        }
    }

    #[test]
    fn test_signed_integer_of_symbolic_word() {
        let be = SymBackend::default();
        let a = be.declare_input("a", Sort::BitVec(4)).unwrap();
        let i = be.word_to_signed_integer(&a).unwrap();
        assert_eq!(i.to_string(), "(ite (bvslt a #x0) (- (bv2nat a) 16) (bv2nat a))");
        assert_eq!(be.word_to_signed_integer(&bv(4, 0xf)).unwrap(), SymExpr::int(-1));
    }

    #[test]
    fn test_symbolic_rounding_mode_is_decoded_by_cases() {
        let be = SymBackend::default();
        let rm = be.declare_input("rm", Sort::BitVec(3)).unwrap();
        let x = be.declare_input("x", Sort::Float(FloatFormat::FLOAT32)).unwrap();
        let r = run(&be, |f| be.fp_add(f, &rm, &x, &x)).unwrap();
        assert_eq!(r.safety().unwrap().to_string(), "(bvule rm #b100)");
        let sum = r.value().unwrap().to_string();
        assert!(sum.starts_with("(fp.add (ite (= rm #b000) RNE (ite (= rm #b001) RNA"));

        let bad = run(&be, |f| be.fp_add(f, &bv(3, 7), &x, &x)).unwrap();
        assert_eq!(bad.error(), Some(&EvalError::BadRoundingMode(7)));
    }

    #[test]
    fn test_negative_denominator_agrees_with_concrete_engine() {
        let concrete = crate::concrete::ConcreteBackend::default();
        let be = SymBackend::default();
        let rm = RoundingMode::NearestEven;
        let format = FloatFormat::FLOAT32;
        for (num, den) in [(1, -2), (-3, -4), (7, 3), (-7, -3)] {
            let (num, den) = (BigInt::from(num), BigInt::from(den));
            let crm = concrete.rounding_mode_lit(rm).unwrap();
            let want = run(&concrete, |f| concrete.fp_from_rational(f, format, &crm, &num, &den))
                .unwrap()
                .into_result()
                .unwrap();
            let srm = be.rounding_mode_lit(rm).unwrap();
            let (snum, sden) = (SymExpr::int(num.clone()), SymExpr::int(den.clone()));
            let got = run(&be, |f| be.fp_from_rational(f, format, &srm, &snum, &sden))
                .unwrap()
                .into_result()
                .unwrap();
            assert_eq!(got.as_fp(), Some(&want), "{num} / {den}");
        }
    }

    #[test]
    fn test_fp_to_bits_uses_witness() {
        let be = SymBackend::new(EvalConfig::default().with_witness_prefix("bits"));
        let x = be.declare_input("x", Sort::Float(FloatFormat::FLOAT32)).unwrap();
        let w = be.fp_to_bits(&x).unwrap();
        assert_eq!(w.to_string(), "(ite (fp.isNaN x) #x7fc00000 bits_0)");
        assert_eq!(be.store().len(), 1);
        assert_eq!(
            be.store().predicate().to_string(),
            "(or (fp.isNaN x) (= ((_ to_fp 8 24) bits_0) x))"
        );
    }

    #[test]
    fn test_fp_to_rational_witnesses() {
        let be = SymBackend::default();
        let x = be.declare_input("x", Sort::Float(FloatFormat::FLOAT64)).unwrap();
        let r = run(&be, |f| be.fp_to_rational(f, &x)).unwrap();
        let (n, d) = r.value().unwrap();
        assert_eq!(n.to_string(), "witness_1");
        assert_eq!(d.to_string(), "witness_0");
        assert_eq!(be.store().len(), 2);
        assert_eq!(
            r.safety().unwrap().to_string(),
            "(not (or (fp.isNaN x) (fp.isInfinite x)))"
        );
    }

    #[test]
    fn test_zero_modulus_is_fatal() {
        let be = SymBackend::default();
        let x = be.declare_input("x", Sort::Int).unwrap();
        assert!(be.zn_reduce(&BigInt::zero(), &x).unwrap_err().is_fatal());
        let r = run(&be, |f| be.zn_recip(f, &BigInt::one(), &x)).unwrap();
        assert_eq!(r.error(), Some(&EvalError::DivideByZero));
    }
}
