//! Primitive dispatch table
//!
//! Maps the stable, surface-visible primitive names to engine operations.
//! Every entry has a fixed arity and receives the type arguments of the
//! call next to its value arguments; type-directed entries such as
//! `fromInteger` or `fpNaN` read the result type from there.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bitspec_core::arith;
use bitspec_core::{EvalError, EvalResult, FloatFormat, FloatValue, RoundingMode, Word};
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::ToPrimitive;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, trace, warn};

use crate::backend::Backend;
use crate::context::Frame;
use crate::prime_ec::{self, ProjectivePoint};
use crate::rational::SRational;
use crate::value::{value_eq, value_le, value_lt, TValue, Value};

/// Version of the primitive name set
pub const PRIM_TABLE_VERSION: u32 = 1;

/// Implementation of a primitive: engine, frame, type arguments, value
/// arguments
pub type PrimFn<B> = dyn Fn(&B, &mut Frame<B>, &[TValue], Vec<Value<B>>) -> EvalResult<Value<B>>
    + Send
    + Sync;

type WordOp<B> =
    fn(&B, &<B as Backend>::Word, &<B as Backend>::Word) -> EvalResult<<B as Backend>::Word>;

type FloatPred<B> = fn(&B, &<B as Backend>::Float) -> EvalResult<<B as Backend>::Bit>;

type FloatOp<B> = fn(
    &B,
    &mut Frame<B>,
    &<B as Backend>::Word,
    &<B as Backend>::Float,
    &<B as Backend>::Float,
) -> EvalResult<<B as Backend>::Float>;

/// One table entry
pub struct Prim<B: Backend> {
    name: String,
    arity: usize,
    trusted: bool,
    imp: Arc<PrimFn<B>>,
}

impl<B: Backend> Clone for Prim<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            arity: self.arity,
            trusted: self.trusted,
            imp: Arc::clone(&self.imp),
        }
    }
}

impl<B: Backend> fmt::Debug for Prim<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prim")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("trusted", &self.trusted)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Prim<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Trusted entries implement operations whose correctness is assumed,
    /// not derived from the other primitives
    pub fn is_trusted(&self) -> bool {
        self.trusted
    }
}

/// Name to implementation map for one engine
pub struct PrimTable<B: Backend> {
    prims: BTreeMap<String, Prim<B>>,
}

impl<B: Backend> Clone for PrimTable<B> {
    fn clone(&self) -> Self {
        Self {
            prims: self.prims.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for PrimTable<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimTable")
            .field("version", &PRIM_TABLE_VERSION)
            .field("prims", &self.prims.len())
            .finish()
    }
}

impl<B: Backend> Default for PrimTable<B> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<B: Backend> PrimTable<B> {
    /// A table with no entries
    pub fn empty() -> Self {
        Self {
            prims: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    fn insert<F>(&mut self, name: &str, arity: usize, trusted: bool, imp: F)
    where
        F: Fn(&B, &mut Frame<B>, &[TValue], Vec<Value<B>>) -> EvalResult<Value<B>>
            + Send
            + Sync
            + 'static,
    {
        let prim = Prim {
            name: name.to_string(),
            arity,
            trusted,
            imp: Arc::new(imp),
        };
        if let Some(old) = self.prims.insert(name.to_string(), prim) {
            warn!(
                prim = name,
                was_trusted = old.trusted,
                "primitive implementation replaced"
            );
        }
    }

    pub fn register<F>(&mut self, name: &str, arity: usize, imp: F)
    where
        F: Fn(&B, &mut Frame<B>, &[TValue], Vec<Value<B>>) -> EvalResult<Value<B>>
            + Send
            + Sync
            + 'static,
    {
        self.insert(name, arity, false, imp);
    }

    /// Register an external implementation whose results are taken on
    /// trust
    pub fn register_trusted<F>(&mut self, name: &str, arity: usize, imp: F)
    where
        F: Fn(&B, &mut Frame<B>, &[TValue], Vec<Value<B>>) -> EvalResult<Value<B>>
            + Send
            + Sync
            + 'static,
    {
        debug!(prim = name, arity, "trusted primitive registered");
        self.insert(name, arity, true, imp);
    }

    pub fn get(&self, name: &str) -> Option<&Prim<B>> {
        self.prims.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.prims.keys().map(String::as_str)
    }

    /// Apply the primitive `name`. Unknown names and arity mismatches are
    /// fatal.
    pub fn call(
        &self,
        be: &B,
        frame: &mut Frame<B>,
        name: &str,
        tys: &[TValue],
        args: Vec<Value<B>>,
    ) -> EvalResult<Value<B>> {
        let prim = self
            .get(name)
            .ok_or_else(|| EvalError::internal(format!("unknown primitive '{name}'")))?;
        if args.len() != prim.arity {
            return Err(EvalError::internal(format!(
                "primitive '{name}' takes {} arguments, got {}",
                prim.arity,
                args.len()
            )));
        }
        trace!(
            prim = name,
            engine = be.engine_name(),
            trusted = prim.trusted,
            "primitive call"
        );
        (prim.imp)(be, frame, tys, args)
    }

    /// The full version 1 name set
    pub fn standard() -> Self {
        let mut t = Self::empty();

        // Logic
        for op in [Logic::And, Logic::Or, Logic::Xor] {
            t.register(op.name(), 2, move |be, _, _, args| {
                let [x, y] = unpack::<B, 2>(args)?;
                logic(be, op, &x, &y)
            });
        }
        t.register("complement", 1, |be, _, _, args| {
            let [x] = unpack::<B, 1>(args)?;
            complement(be, &x)
        });

        // Ring
        for op in [Ring::Add, Ring::Sub, Ring::Mul] {
            t.register(op.name(), 2, move |be, fr, _, args| {
                let [x, y] = unpack::<B, 2>(args)?;
                ring(be, fr, op, &x, &y)
            });
        }
        t.register("negate", 1, |be, _, _, args| {
            let [x] = unpack::<B, 1>(args)?;
            negate(be, &x)
        });
        t.register("fromInteger", 1, |be, fr, tys, args| {
            let [i] = unpack::<B, 1>(args)?;
            from_integer(be, fr, ty_arg(tys, "fromInteger")?, i.as_integer()?)
        });

        // Integral
        t.register("/", 2, |be, fr, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            match (&x, &y) {
                (Value::Word(a), Value::Word(b)) => Ok(Value::Word(be.word_udiv(fr, a, b)?)),
                (Value::Integer(a), Value::Integer(b)) => {
                    Ok(Value::Integer(be.integer_div(fr, a, b)?))
                }
                _ => mismatch("/", &x, &y),
            }
        });
        t.register("%", 2, |be, fr, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            match (&x, &y) {
                (Value::Word(a), Value::Word(b)) => Ok(Value::Word(be.word_urem(fr, a, b)?)),
                (Value::Integer(a), Value::Integer(b)) => {
                    Ok(Value::Integer(be.integer_mod(fr, a, b)?))
                }
                _ => mismatch("%", &x, &y),
            }
        });
        t.register("toInteger", 1, |be, _, _, args| {
            let [x] = unpack::<B, 1>(args)?;
            match &x {
                Value::Word(w) => Ok(Value::Integer(be.word_to_integer(w)?)),
                Value::Integer(_) => Ok(x),
                _ => unsupported("toInteger", &x),
            }
        });
        t.register("toSignedInteger", 1, |be, _, _, args| {
            let [x] = unpack::<B, 1>(args)?;
            Ok(Value::Integer(be.word_to_signed_integer(x.as_word()?)?))
        });

        // Field
        t.register("recip", 1, |be, fr, _, args| {
            let [x] = unpack::<B, 1>(args)?;
            recip(be, fr, &x)
        });
        t.register("/.", 2, |be, fr, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            field_div(be, fr, &x, &y)
        });

        // Round
        let rounding = [
            ("floor", RoundingMode::TowardNegative),
            ("ceiling", RoundingMode::TowardPositive),
            ("trunc", RoundingMode::TowardZero),
            ("roundAway", RoundingMode::NearestAway),
            ("roundToEven", RoundingMode::NearestEven),
        ];
        for (name, mode) in rounding {
            t.register(name, 1, move |be, fr, _, args| {
                let [x] = unpack::<B, 1>(args)?;
                round(be, fr, name, mode, &x)
            });
        }

        // Eq and Cmp
        t.register("==", 2, |be, _, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Bit(value_eq(be, &x, &y)?))
        });
        t.register("!=", 2, |be, _, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Bit(be.bit_not(&value_eq(be, &x, &y)?)))
        });
        t.register("<", 2, |be, _, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Bit(value_lt(be, &x, &y, false)?))
        });
        t.register(">", 2, |be, _, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Bit(value_lt(be, &y, &x, false)?))
        });
        t.register("<=", 2, |be, _, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Bit(value_le(be, &x, &y, false)?))
        });
        t.register(">=", 2, |be, _, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Bit(value_le(be, &y, &x, false)?))
        });
        t.register("<$", 2, |be, _, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Bit(value_lt(be, &x, &y, true)?))
        });

        // Words
        t.register("/$", 2, |be, fr, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Word(be.word_sdiv(fr, x.as_word()?, y.as_word()?)?))
        });
        t.register("%$", 2, |be, fr, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Word(be.word_srem(fr, x.as_word()?, y.as_word()?)?))
        });
        let shifts: [(&'static str, WordOp<B>); 5] = [
            ("<<", B::word_shl),
            (">>", B::word_lshr),
            (">>$", B::word_ashr),
            ("<<<", B::word_rotl),
            (">>>", B::word_rotr),
        ];
        for (name, op) in shifts {
            t.register(name, 2, move |be, _, _, args| {
                let [x, amount] = unpack::<B, 2>(args)?;
                Ok(Value::Word(op(be, x.as_word()?, amount.as_word()?)?))
            });
        }
        t.register("#", 2, |be, _, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            match (x, y) {
                (Value::Word(a), Value::Word(b)) => Ok(Value::Word(be.word_concat(&a, &b)?)),
                (Value::Seq(mut a), Value::Seq(b)) => {
                    a.extend(b);
                    Ok(Value::Seq(a))
                }
                (x, y) => mismatch("#", &x, &y),
            }
        });
        t.register("lg2", 1, |be, _, _, args| {
            let [x] = unpack::<B, 1>(args)?;
            Ok(Value::Word(be.word_lg2(x.as_word()?)?))
        });

        // Rational
        t.register("ratio", 2, |be, fr, _, args| {
            let [n, d] = unpack::<B, 2>(args)?;
            let r = SRational::ratio(be, fr, n.as_integer()?, d.as_integer()?)?;
            Ok(Value::Rational(r))
        });

        // Floats
        t.register("fpNaN", 0, |be, _, tys, _| {
            let format = float_ty(tys, "fpNaN")?;
            Ok(Value::Float(be.fp_lit(FloatValue::nan(format))))
        });
        t.register("fpPosInf", 0, |be, _, tys, _| {
            let format = float_ty(tys, "fpPosInf")?;
            Ok(Value::Float(be.fp_lit(FloatValue::infinity(format, false))))
        });
        t.register("fpFromBits", 1, |be, _, tys, args| {
            let format = float_ty(tys, "fpFromBits")?;
            let [w] = unpack::<B, 1>(args)?;
            Ok(Value::Float(be.fp_from_bits(format, w.as_word()?)?))
        });
        t.register("fpToBits", 1, |be, _, _, args| {
            let [x] = unpack::<B, 1>(args)?;
            Ok(Value::Word(be.fp_to_bits(x.as_float()?)?))
        });
        t.register("=.=", 2, |be, _, _, args| {
            let [x, y] = unpack::<B, 2>(args)?;
            Ok(Value::Bit(be.fp_logical_eq(x.as_float()?, y.as_float()?)?))
        });
        let predicates: [(&'static str, FloatPred<B>); 6] = [
            ("fpIsNaN", B::fp_is_nan),
            ("fpIsInf", B::fp_is_infinite),
            ("fpIsZero", B::fp_is_zero),
            ("fpIsNeg", B::fp_is_negative),
            ("fpIsNormal", B::fp_is_normal),
            ("fpIsSubnormal", B::fp_is_subnormal),
        ];
        for (name, pred) in predicates {
            t.register(name, 1, move |be, _, _, args| {
                let [x] = unpack::<B, 1>(args)?;
                Ok(Value::Bit(pred(be, x.as_float()?)?))
            });
        }
        let arithmetic: [(&'static str, FloatOp<B>); 4] = [
            ("fpAdd", B::fp_add),
            ("fpSub", B::fp_sub),
            ("fpMul", B::fp_mul),
            ("fpDiv", B::fp_div),
        ];
        for (name, op) in arithmetic {
            t.register(name, 3, move |be, fr, _, args| {
                let [rm, x, y] = unpack::<B, 3>(args)?;
                Ok(Value::Float(op(be, fr, rm.as_word()?, x.as_float()?, y.as_float()?)?))
            });
        }
        t.register("fpToRational", 1, |be, fr, _, args| {
            let [x] = unpack::<B, 1>(args)?;
            let (num, den) = be.fp_to_rational(fr, x.as_float()?)?;
            Ok(Value::Rational(SRational::from_parts(num, den)))
        });
        t.register("fpFromRational", 2, |be, fr, tys, args| {
            let format = float_ty(tys, "fpFromRational")?;
            let [rm, r] = unpack::<B, 2>(args)?;
            let r = r.as_rational()?;
            let x = be.fp_from_rational(fr, format, rm.as_word()?, r.numerator(), r.denominator())?;
            Ok(Value::Float(x))
        });

        // Testing
        t.register("random", 1, |be, _, tys, args| {
            let [seed] = unpack::<B, 1>(args)?;
            let Some(seed) = be.integer_as_lit(seed.as_integer()?) else {
                return Err(EvalError::UnsupportedSymbolicOp("random".to_string()));
            };
            let seed = seed.mod_floor(&(BigInt::from(1) << 64u32)).to_u64().unwrap_or_default();
            let mut rng = StdRng::seed_from_u64(seed);
            random_value(be, &mut rng, ty_arg(tys, "random")?)
        });

        // Trusted elliptic-curve group law
        t.register_trusted("ec_double", 1, |be, _, tys, args| {
            let p = curve_ty(tys, "ec_double")?;
            let [s] = unpack::<B, 1>(args)?;
            let s = ProjectivePoint::from_value(p, &s)?;
            Ok(prime_ec::ec_double(be, p, &s)?.into_value(p))
        });
        t.register_trusted("ec_add_nonzero", 2, |be, _, tys, args| {
            let p = curve_ty(tys, "ec_add_nonzero")?;
            let [s, u] = unpack::<B, 2>(args)?;
            let s = ProjectivePoint::from_value(p, &s)?;
            let u = ProjectivePoint::from_value(p, &u)?;
            Ok(prime_ec::ec_add_nonzero(be, p, &s, &u)?.into_value(p))
        });
        t.register_trusted("ec_mult", 2, |be, _, tys, args| {
            let p = curve_ty(tys, "ec_mult")?;
            let [k, s] = unpack::<B, 2>(args)?;
            let (m, k) = k.as_z()?;
            if m != p {
                return Err(EvalError::internal(format!(
                    "ec_mult scalar in Z {m} on a curve over Z {p}"
                )));
            }
            let s = ProjectivePoint::from_value(p, &s)?;
            Ok(prime_ec::ec_mult(be, p, k, &s)?.into_value(p))
        });

        debug!(prims = t.len(), version = PRIM_TABLE_VERSION, "standard primitive table");
        t
    }
}

fn unpack<B: Backend, const N: usize>(args: Vec<Value<B>>) -> EvalResult<[Value<B>; N]> {
    args.try_into().map_err(|args: Vec<Value<B>>| {
        EvalError::internal(format!("expected {N} arguments, got {}", args.len()))
    })
}

fn ty_arg<'a>(tys: &'a [TValue], prim: &str) -> EvalResult<&'a TValue> {
    tys.first()
        .ok_or_else(|| EvalError::internal(format!("primitive '{prim}' needs a type argument")))
}

fn float_ty(tys: &[TValue], prim: &str) -> EvalResult<FloatFormat> {
    match ty_arg(tys, prim)? {
        TValue::Float(format) => Ok(*format),
        ty => Err(EvalError::internal(format!("primitive '{prim}' at type {ty}"))),
    }
}

fn curve_ty<'a>(tys: &'a [TValue], prim: &str) -> EvalResult<&'a BigInt> {
    match ty_arg(tys, prim)? {
        TValue::Z(p) => Ok(p),
        ty => Err(EvalError::internal(format!("primitive '{prim}' at type {ty}"))),
    }
}

fn mismatch<B: Backend, T>(prim: &str, x: &Value<B>, y: &Value<B>) -> EvalResult<T> {
    Err(EvalError::internal(format!(
        "primitive '{prim}' on a {} and a {}",
        x.kind(),
        y.kind()
    )))
}

fn unsupported<B: Backend, T>(prim: &str, x: &Value<B>) -> EvalResult<T> {
    Err(EvalError::internal(format!("primitive '{prim}' on a {}", x.kind())))
}

fn zip_with<B: Backend>(
    prim: &str,
    x: &Value<B>,
    y: &Value<B>,
    mut f: impl FnMut(&Value<B>, &Value<B>) -> EvalResult<Value<B>>,
) -> EvalResult<Value<B>> {
    let (a, b) = (x.as_items()?, y.as_items()?);
    if a.len() != b.len() {
        return mismatch(prim, x, y);
    }
    let items = a
        .iter()
        .zip(b)
        .map(|(a, b)| f(a, b))
        .collect::<EvalResult<Vec<_>>>()?;
    x.with_items(items)
}

fn map_items<B: Backend>(
    x: &Value<B>,
    f: impl FnMut(&Value<B>) -> EvalResult<Value<B>>,
) -> EvalResult<Value<B>> {
    let items = x.as_items()?.iter().map(f).collect::<EvalResult<Vec<_>>>()?;
    x.with_items(items)
}

fn rne<B: Backend>(be: &B) -> EvalResult<B::Word> {
    be.rounding_mode_lit(RoundingMode::NearestEven)
}

#[derive(Debug, Clone, Copy)]
enum Logic {
    And,
    Or,
    Xor,
}

impl Logic {
    fn name(self) -> &'static str {
        match self {
            Logic::And => "&&",
            Logic::Or => "||",
            Logic::Xor => "^",
        }
    }
}

fn logic<B: Backend>(be: &B, op: Logic, x: &Value<B>, y: &Value<B>) -> EvalResult<Value<B>> {
    match (x, y) {
        (Value::Bit(a), Value::Bit(b)) => Ok(Value::Bit(match op {
            Logic::And => be.bit_and(a, b),
            Logic::Or => be.bit_or(a, b),
            Logic::Xor => be.bit_xor(a, b),
        })),
        (Value::Word(a), Value::Word(b)) => Ok(Value::Word(match op {
            Logic::And => be.word_and(a, b)?,
            Logic::Or => be.word_or(a, b)?,
            Logic::Xor => be.word_xor(a, b)?,
        })),
        (Value::Tuple(_), Value::Tuple(_)) | (Value::Seq(_), Value::Seq(_)) => {
            zip_with(op.name(), x, y, |a, b| logic(be, op, a, b))
        }
        _ => mismatch(op.name(), x, y),
    }
}

fn complement<B: Backend>(be: &B, x: &Value<B>) -> EvalResult<Value<B>> {
    match x {
        Value::Bit(b) => Ok(Value::Bit(be.bit_not(b))),
        Value::Word(w) => Ok(Value::Word(be.word_complement(w)?)),
        Value::Tuple(_) | Value::Seq(_) => map_items(x, |v| complement(be, v)),
        _ => unsupported("complement", x),
    }
}

#[derive(Debug, Clone, Copy)]
enum Ring {
    Add,
    Sub,
    Mul,
}

impl Ring {
    fn name(self) -> &'static str {
        match self {
            Ring::Add => "+",
            Ring::Sub => "-",
            Ring::Mul => "*",
        }
    }
}

fn ring<B: Backend>(
    be: &B,
    frame: &mut Frame<B>,
    op: Ring,
    x: &Value<B>,
    y: &Value<B>,
) -> EvalResult<Value<B>> {
    Ok(match (x, y) {
        (Value::Word(a), Value::Word(b)) => Value::Word(match op {
            Ring::Add => be.word_add(a, b)?,
            Ring::Sub => be.word_sub(a, b)?,
            Ring::Mul => be.word_mul(a, b)?,
        }),
        (Value::Integer(a), Value::Integer(b)) => Value::Integer(match op {
            Ring::Add => be.integer_add(a, b),
            Ring::Sub => be.integer_sub(a, b),
            Ring::Mul => be.integer_mul(a, b),
        }),
        (Value::Z(m, a), Value::Z(n, b)) if m == n => Value::Z(
            m.clone(),
            match op {
                Ring::Add => be.zn_add(m, a, b)?,
                Ring::Sub => be.zn_sub(m, a, b)?,
                Ring::Mul => be.zn_mul(m, a, b)?,
            },
        ),
        (Value::Rational(a), Value::Rational(b)) => Value::Rational(match op {
            Ring::Add => a.add(be, b),
            Ring::Sub => a.sub(be, b),
            Ring::Mul => a.mul(be, b),
        }),
        (Value::Float(a), Value::Float(b)) => {
            let rm = rne(be)?;
            Value::Float(match op {
                Ring::Add => be.fp_add(frame, &rm, a, b)?,
                Ring::Sub => be.fp_sub(frame, &rm, a, b)?,
                Ring::Mul => be.fp_mul(frame, &rm, a, b)?,
            })
        }
        (Value::Tuple(_), Value::Tuple(_)) | (Value::Seq(_), Value::Seq(_)) => {
            return zip_with(op.name(), x, y, |a, b| ring(be, frame, op, a, b));
        }
        _ => return mismatch(op.name(), x, y),
    })
}

fn negate<B: Backend>(be: &B, x: &Value<B>) -> EvalResult<Value<B>> {
    Ok(match x {
        Value::Word(w) => Value::Word(be.word_neg(w)?),
        Value::Integer(i) => Value::Integer(be.integer_neg(i)),
        Value::Z(m, i) => Value::Z(m.clone(), be.zn_neg(m, i)?),
        Value::Rational(r) => Value::Rational(r.neg(be)),
        Value::Float(f) => Value::Float(be.fp_neg(f)?),
        Value::Tuple(_) | Value::Seq(_) => return map_items(x, |v| negate(be, v)),
        Value::Bit(_) => return unsupported("negate", x),
    })
}

/// The value of type `ty` denoted by the integer `i`
pub fn from_integer<B: Backend>(
    be: &B,
    frame: &mut Frame<B>,
    ty: &TValue,
    i: &B::Integer,
) -> EvalResult<Value<B>> {
    Ok(match ty {
        TValue::Word(n) => Value::Word(be.word_from_integer(*n, i)?),
        TValue::Integer => Value::Integer(i.clone()),
        TValue::Z(m) => Value::Z(m.clone(), be.zn_reduce(m, i)?),
        TValue::Rational => Value::Rational(SRational::from_integer(be, i.clone())),
        TValue::Float(format) => {
            Value::Float(be.fp_from_integer(frame, *format, &rne(be)?, i)?)
        }
        TValue::Tuple(tys) => Value::Tuple(
            tys.iter()
                .map(|t| from_integer(be, frame, t, i))
                .collect::<EvalResult<_>>()?,
        ),
        TValue::Seq(n, t) => Value::Seq(
            (0..*n)
                .map(|_| from_integer(be, frame, t, i))
                .collect::<EvalResult<_>>()?,
        ),
        TValue::Bit => {
            return Err(EvalError::internal("primitive 'fromInteger' at type Bit"));
        }
    })
}

fn recip<B: Backend>(be: &B, frame: &mut Frame<B>, x: &Value<B>) -> EvalResult<Value<B>> {
    Ok(match x {
        Value::Rational(r) => Value::Rational(r.recip(be, frame)?),
        Value::Z(m, i) => Value::Z(m.clone(), be.zn_recip(frame, m, i)?),
        Value::Float(f) => {
            let rm = rne(be)?;
            let format = be.fp_format(f)?;
            let one = be.fp_lit(FloatValue::from_integer(
                format,
                RoundingMode::NearestEven,
                &BigInt::from(1),
            ));
            Value::Float(be.fp_div(frame, &rm, &one, f)?)
        }
        _ => return unsupported("recip", x),
    })
}

fn field_div<B: Backend>(
    be: &B,
    frame: &mut Frame<B>,
    x: &Value<B>,
    y: &Value<B>,
) -> EvalResult<Value<B>> {
    Ok(match (x, y) {
        (Value::Rational(a), Value::Rational(b)) => Value::Rational(a.div(be, frame, b)?),
        (Value::Z(m, a), Value::Z(n, b)) if m == n => {
            let inv = be.zn_recip(frame, m, b)?;
            Value::Z(m.clone(), be.zn_mul(m, a, &inv)?)
        }
        (Value::Float(a), Value::Float(b)) => Value::Float(be.fp_div(frame, &rne(be)?, a, b)?),
        _ => return mismatch("/.", x, y),
    })
}

fn round<B: Backend>(
    be: &B,
    frame: &mut Frame<B>,
    op: &str,
    mode: RoundingMode,
    x: &Value<B>,
) -> EvalResult<Value<B>> {
    let i = match x {
        Value::Rational(r) => match mode {
            RoundingMode::TowardNegative => r.floor(be, frame)?,
            RoundingMode::TowardPositive => r.ceiling(be, frame)?,
            RoundingMode::TowardZero => r.trunc(be, frame)?,
            RoundingMode::NearestAway => r.round_away(be, frame)?,
            RoundingMode::NearestEven => r.round_to_even(be, frame)?,
        },
        Value::Float(f) => be.fp_to_integer(frame, op, mode, f)?,
        _ => return unsupported(op, x),
    };
    Ok(Value::Integer(i))
}

fn random_word(rng: &mut StdRng, width: u32) -> Word {
    let mut bytes = vec![0u8; width.div_ceil(8) as usize];
    rng.fill_bytes(&mut bytes);
    Word::from_unsigned(width, BigUint::from_bytes_le(&bytes))
}

/// A pseudo-random value of type `ty`
fn random_value<B: Backend>(be: &B, rng: &mut StdRng, ty: &TValue) -> EvalResult<Value<B>> {
    Ok(match ty {
        TValue::Bit => Value::Bit(be.bit_lit(rng.random())),
        TValue::Word(n) => Value::Word(be.word_lit(random_word(rng, *n))?),
        TValue::Integer => Value::Integer(be.integer_lit(BigInt::from(rng.random::<i64>()))),
        TValue::Z(m) => {
            arith::check_modulus(m)?;
            // extra bytes keep the bias of the reduction small
            let wide = random_word(rng, ((m.bits() + 64) as u32).next_multiple_of(8));
            let residue = BigInt::from(wide.value().clone()).mod_floor(m);
            Value::Z(m.clone(), be.integer_lit(residue))
        }
        TValue::Rational => {
            let num = be.integer_lit(BigInt::from(rng.random::<i32>()));
            let den = be.integer_lit(BigInt::from(rng.random_range(1..=u32::MAX)));
            Value::Rational(SRational::from_parts(num, den))
        }
        TValue::Float(format) => {
            let bits = random_word(rng, format.width());
            Value::Float(be.fp_lit(FloatValue::from_bits(*format, &bits)?))
        }
        TValue::Tuple(tys) => Value::Tuple(
            tys.iter()
                .map(|t| random_value(be, rng, t))
                .collect::<EvalResult<_>>()?,
        ),
        TValue::Seq(n, t) => Value::Seq(
            (0..*n)
                .map(|_| random_value(be, rng, t))
                .collect::<EvalResult<_>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concrete::ConcreteBackend;
    use crate::context::run;
    use crate::symbolic::SymBackend;
    use bitspec_smt::Sort;

    const VERSION_1_NAMES: &[&str] = &[
        "&&", "||", "^", "complement", "+", "-", "*", "negate", "fromInteger", "/", "%",
        "toInteger", "toSignedInteger", "recip", "/.", "floor", "ceiling", "trunc",
        "roundAway", "roundToEven", "==", "!=", "<", ">", "<=", ">=", "<$", "/$", "%$", "<<",
        ">>", ">>$", "<<<", ">>>", "#", "lg2", "ratio", "fpNaN", "fpPosInf", "fpFromBits",
        "fpToBits", "=.=", "fpIsNaN", "fpIsInf", "fpIsZero", "fpIsNeg", "fpIsNormal",
        "fpIsSubnormal", "fpAdd", "fpSub", "fpMul", "fpDiv", "fpToRational", "fpFromRational",
        "random", "ec_double", "ec_add_nonzero", "ec_mult",
    ];

    fn word(width: u32, v: i64) -> Value<ConcreteBackend> {
        Value::Word(Word::new(width, &BigInt::from(v)))
    }

    fn int(v: i64) -> Value<ConcreteBackend> {
        Value::Integer(BigInt::from(v))
    }

    fn call(
        table: &PrimTable<ConcreteBackend>,
        name: &str,
        tys: &[TValue],
        args: Vec<Value<ConcreteBackend>>,
    ) -> EvalResult<Value<ConcreteBackend>> {
        let be = ConcreteBackend::default();
        run(&be, |f| table.call(&be, f, name, tys, args))?.into_result()
    }

    fn as_i64(v: &Value<ConcreteBackend>) -> i64 {
        match v {
            Value::Integer(i) | Value::Z(_, i) => i64::try_from(i).unwrap(),
            Value::Word(w) => i64::try_from(w.to_unsigned()).unwrap(),
            other => panic!("not a number: {other:?}"),
        }
    }

    #[test]
    fn test_standard_name_set() {
        let table = PrimTable::<ConcreteBackend>::standard();
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names.len(), VERSION_1_NAMES.len());
        for name in VERSION_1_NAMES {
            assert!(table.get(name).is_some(), "missing {name}");
        }
        let trusted: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| table.get(n).is_some_and(Prim::is_trusted))
            .collect();
        assert_eq!(trusted, ["ec_add_nonzero", "ec_double", "ec_mult"]);
    }

    #[test]
    fn test_bad_calls_are_fatal() {
        let table = PrimTable::standard();
        let err = call(&table, "nope", &[], vec![]).unwrap_err();
        assert!(err.is_fatal());
        let err = call(&table, "+", &[], vec![int(1)]).unwrap_err();
        assert!(err.is_fatal());
        let err = call(&table, "+", &[], vec![int(1), word(8, 1)]).unwrap_err();
        assert!(err.is_fatal());
        let err = call(&table, "fpNaN", &[TValue::Integer], vec![]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_integral_dispatch() {
        let table = PrimTable::standard();
        assert_eq!(as_i64(&call(&table, "/", &[], vec![word(8, 200), word(8, 7)]).unwrap()), 28);
        assert_eq!(as_i64(&call(&table, "/", &[], vec![int(-7), int(2)]).unwrap()), -4);
        assert_eq!(as_i64(&call(&table, "%", &[], vec![int(7), int(-2)]).unwrap()), -1);
        let err = call(&table, "%", &[], vec![word(8, 1), word(8, 0)]).unwrap_err();
        assert_eq!(err, EvalError::DivideByZero);
        let signed = call(&table, "toSignedInteger", &[], vec![word(8, 0xF0)]).unwrap();
        assert_eq!(as_i64(&signed), -16);
    }

    #[test]
    fn test_elementwise_over_tuples() {
        let table = PrimTable::standard();
        let x = Value::Tuple(vec![Value::Bit(true), word(4, 0b1100)]);
        let y = Value::Tuple(vec![Value::Bit(false), word(4, 0b1010)]);
        let r = call(&table, "^", &[], vec![x.clone(), y]).unwrap();
        let items = r.as_items().unwrap();
        assert_eq!(items[0].as_bit().unwrap(), &true);
        assert_eq!(as_i64(&items[1]), 0b0110);
        let sum = call(&table, "+", &[], vec![Value::Seq(vec![int(2)]), Value::Seq(vec![int(3)])]);
        assert_eq!(as_i64(&sum.unwrap().as_items().unwrap()[0]), 5);
        let c = call(&table, "complement", &[], vec![x]).unwrap();
        assert_eq!(as_i64(&c.as_items().unwrap()[1]), 0b0011);
    }

    #[test]
    fn test_from_integer_is_type_directed() {
        let table = PrimTable::standard();
        let ty = TValue::Tuple(vec![TValue::Word(4), TValue::Z(BigInt::from(7))]);
        let v = call(&table, "fromInteger", &[ty], vec![int(-1)]).unwrap();
        let items = v.as_items().unwrap();
        assert_eq!(as_i64(&items[0]), 15);
        assert_eq!(as_i64(&items[1]), 6);
        let f = call(&table, "fromInteger", &[TValue::Float(FloatFormat::FLOAT32)], vec![int(3)]);
        let bits = call(&table, "fpToBits", &[], vec![f.unwrap()]).unwrap();
        assert_eq!(as_i64(&bits), 0x4040_0000);
    }

    #[test]
    fn test_field_and_round() {
        let table = PrimTable::standard();
        let z7 = |v: i64| Value::Z(BigInt::from(7), BigInt::from(v));
        assert_eq!(as_i64(&call(&table, "recip", &[], vec![z7(3)]).unwrap()), 5);
        assert_eq!(as_i64(&call(&table, "/.", &[], vec![z7(1), z7(3)]).unwrap()), 5);
        let err = call(&table, "recip", &[], vec![z7(0)]).unwrap_err();
        assert_eq!(err, EvalError::DivideByZero);

        let q = call(&table, "ratio", &[], vec![int(-7), int(2)]).unwrap();
        let expect = [("floor", -4), ("ceiling", -3), ("trunc", -3), ("roundAway", -4)];
        for (name, want) in expect {
            assert_eq!(as_i64(&call(&table, name, &[], vec![q.clone()]).unwrap()), want);
        }
        let half = call(&table, "ratio", &[], vec![int(5), int(2)]).unwrap();
        assert_eq!(as_i64(&call(&table, "roundToEven", &[], vec![half]).unwrap()), 2);
    }

    #[test]
    fn test_float_rounding_rejects_nan() {
        let table = PrimTable::standard();
        let ty = [TValue::Float(FloatFormat::FLOAT32)];
        let nan = call(&table, "fpNaN", &ty, vec![]).unwrap();
        for name in ["floor", "ceiling", "trunc", "roundAway", "roundToEven"] {
            let err = call(&table, name, &[], vec![nan.clone()]).unwrap_err();
            assert_eq!(err, EvalError::BadValue(name.to_string()));
        }
        let inf = call(&table, "fpPosInf", &ty, vec![]).unwrap();
        let err = call(&table, "fpToRational", &[], vec![inf]).unwrap_err();
        assert!(matches!(err, EvalError::BadValue(_)));
    }

    #[test]
    fn test_comparisons() {
        let table = PrimTable::standard();
        let lt = call(&table, "<", &[], vec![word(8, 0x01), word(8, 0xFF)]).unwrap();
        assert_eq!(lt.as_bit().unwrap(), &true);
        let slt = call(&table, "<$", &[], vec![word(8, 0x01), word(8, 0xFF)]).unwrap();
        assert_eq!(slt.as_bit().unwrap(), &false);
        let ge = call(&table, ">=", &[], vec![int(3), int(3)]).unwrap();
        assert_eq!(ge.as_bit().unwrap(), &true);
        let z = |v: i64| Value::Z(BigInt::from(5), BigInt::from(v));
        let ne = call(&table, "!=", &[], vec![z(1), z(2)]).unwrap();
        assert_eq!(ne.as_bit().unwrap(), &true);
        assert!(call(&table, "<", &[], vec![z(1), z(2)]).unwrap_err().is_fatal());
    }

    #[test]
    fn test_word_operations() {
        let table = PrimTable::standard();
        let q = call(&table, "/$", &[], vec![word(8, 0x80), word(8, 0xFF)]).unwrap();
        assert_eq!(as_i64(&q), 0x80);
        let r = call(&table, "%$", &[], vec![word(8, 0x80), word(8, 0xFF)]).unwrap();
        assert_eq!(as_i64(&r), 0);
        let ashr = call(&table, ">>$", &[], vec![word(8, 0x80), word(3, 2)]).unwrap();
        assert_eq!(as_i64(&ashr), 0xE0);
        let rot = call(&table, "<<<", &[], vec![word(8, 0x81), word(8, 1)]).unwrap();
        assert_eq!(as_i64(&rot), 0x03);
        let cat = call(&table, "#", &[], vec![word(4, 0xA), word(8, 0xBC)]).unwrap();
        assert_eq!(as_i64(&cat), 0xABC);
        assert_eq!(as_i64(&call(&table, "lg2", &[], vec![word(8, 9)]).unwrap()), 4);
    }

    #[test]
    fn test_random_is_seeded() {
        let table = PrimTable::standard();
        let ty = [TValue::Tuple(vec![
            TValue::Word(13),
            TValue::Z(BigInt::from(11)),
            TValue::Seq(2, Box::new(TValue::Integer)),
            TValue::Float(FloatFormat::FLOAT64),
        ])];
        let a = call(&table, "random", &ty, vec![int(42)]).unwrap();
        let b = call(&table, "random", &ty, vec![int(42)]).unwrap();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
        let items = a.as_items().unwrap();
        assert!(as_i64(&items[0]) < 1 << 13);
        assert!((0..11).contains(&as_i64(&items[1])));

        let be = SymBackend::default();
        let seed = be.declare_input("seed", Sort::Int).unwrap();
        let table = PrimTable::<SymBackend>::standard();
        let result = run(&be, |f| {
            table.call(&be, f, "random", &[TValue::Bit], vec![Value::Integer(seed.clone())])
        })
        .unwrap();
        assert_eq!(
            result.error(),
            Some(&EvalError::UnsupportedSymbolicOp("random".to_string()))
        );
    }

    #[test]
    fn test_trusted_ec_entries() {
        let mut table = PrimTable::standard();
        let p = BigInt::from(23);
        let z = |v: i64| Value::Z(p.clone(), BigInt::from(v));
        let pt = Value::Tuple(vec![z(3), z(10), z(1)]);
        let ty = [TValue::Z(p.clone())];
        let doubled = call(&table, "ec_double", &ty, vec![pt.clone()]).unwrap();
        let twice = call(&table, "ec_mult", &ty, vec![z(2), pt.clone()]).unwrap();
        assert_eq!(format!("{doubled:?}"), format!("{twice:?}"));
        let err = call(&table, "ec_mult", &ty, vec![Value::Z(BigInt::from(7), 2.into()), pt]);
        assert!(err.unwrap_err().is_fatal());

        table.register_trusted("ec_double", 1, |_, _, _, args| {
            Ok(args.into_iter().next().unwrap_or(Value::Bit(false)))
        });
        assert!(table.get("ec_double").unwrap().is_trusted());
        let same = call(&table, "ec_double", &ty, vec![z(4)]).unwrap();
        assert_eq!(as_i64(&same), 4);
    }
}
