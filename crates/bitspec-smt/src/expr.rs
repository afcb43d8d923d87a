//! Solver expressions
//!
//! [`SymExpr`] is an immutable term DAG over the SMT-LIB theories the
//! symbolic engine needs: core booleans, integers and reals, fixed-size bit
//! vectors and IEEE floating point, plus uninterpreted function applications.
//! Children are shared through `Arc`, so cloning a term is cheap and large
//! unfoldings stay linear in memory.
//!
//! The constructors fold literals: an operation whose arguments are all
//! literals evaluates to a literal, using the same value algebra as the
//! concrete engine. Constructors that can receive ill-sorted arguments
//! return [`SmtResult`].

// These constructors build AST nodes, not perform operations.
// Implementing std::ops traits would be semantically incorrect.
#![allow(clippy::should_implement_trait)]

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use bitspec_core::{FloatFormat, FloatKind, FloatValue, RoundingMode, Word};
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use crate::error::{SmtError, SmtResult};
use crate::render;

/// Sort (type) of expressions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    Int,
    Real,
    BitVec(u32),
    Float(FloatFormat),
    RoundingMode,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::Real => write!(f, "Real"),
            Sort::BitVec(w) => write!(f, "(_ BitVec {w})"),
            Sort::Float(fmt) => write!(f, "(_ FloatingPoint {} {})", fmt.exp_bits, fmt.precision),
            Sort::RoundingMode => write!(f, "RoundingMode"),
        }
    }
}

/// A free variable: a symbolic input or a witness
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymVar {
    pub name: String,
    pub sort: Sort,
}

impl SymVar {
    pub fn new(name: impl Into<String>, sort: Sort) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }
}

impl fmt::Display for SymVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Interpreted operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymOp {
    // Core
    Not,
    And,
    Or,
    Xor,
    Implies,
    Eq,
    Ite,

    // Integers and reals
    Neg,
    Add,
    Sub,
    Mul,
    /// Euclidean division
    Div,
    /// Euclidean remainder, never negative
    Mod,
    Lt,
    Le,
    ToReal,
    ToInt,
    RealMul,
    RealDiv,

    // Bit vectors
    BvNot,
    BvNeg,
    BvAnd,
    BvOr,
    BvXor,
    BvAdd,
    BvSub,
    BvMul,
    BvUdiv,
    BvUrem,
    BvSdiv,
    BvSrem,
    BvShl,
    BvLshr,
    BvAshr,
    BvUlt,
    BvUle,
    BvSlt,
    BvSle,
    Concat,
    /// `(_ extract hi lo)`
    Extract(u32, u32),
    ZeroExtend(u32),
    SignExtend(u32),
    Bv2Nat,
    Int2Bv(u32),

    // Floating point
    FpAdd,
    FpSub,
    FpMul,
    FpDiv,
    FpNeg,
    FpIsNaN,
    FpIsInfinite,
    FpIsZero,
    FpIsNegative,
    FpIsNormal,
    FpIsSubnormal,
    FpEq,
    FpLt,
    FpLeq,
    FpToReal,
    FpRoundToIntegral,
    /// Reinterpret a bit vector of width `e + p`
    ToFpFromBits(FloatFormat),
    /// Round a real under a rounding mode
    ToFpFromReal(FloatFormat),
}

impl fmt::Display for SymOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymOp::Not => "not",
            SymOp::And => "and",
            SymOp::Or => "or",
            SymOp::Xor => "xor",
            SymOp::Implies => "=>",
            SymOp::Eq => "=",
            SymOp::Ite => "ite",
            SymOp::Neg | SymOp::Sub => "-",
            SymOp::Add => "+",
            SymOp::Mul | SymOp::RealMul => "*",
            SymOp::Div => "div",
            SymOp::Mod => "mod",
            SymOp::Lt => "<",
            SymOp::Le => "<=",
            SymOp::ToReal => "to_real",
            SymOp::ToInt => "to_int",
            SymOp::RealDiv => "/",
            SymOp::BvNot => "bvnot",
            SymOp::BvNeg => "bvneg",
            SymOp::BvAnd => "bvand",
            SymOp::BvOr => "bvor",
            SymOp::BvXor => "bvxor",
            SymOp::BvAdd => "bvadd",
            SymOp::BvSub => "bvsub",
            SymOp::BvMul => "bvmul",
            SymOp::BvUdiv => "bvudiv",
            SymOp::BvUrem => "bvurem",
            SymOp::BvSdiv => "bvsdiv",
            SymOp::BvSrem => "bvsrem",
            SymOp::BvShl => "bvshl",
            SymOp::BvLshr => "bvlshr",
            SymOp::BvAshr => "bvashr",
            SymOp::BvUlt => "bvult",
            SymOp::BvUle => "bvule",
            SymOp::BvSlt => "bvslt",
            SymOp::BvSle => "bvsle",
            SymOp::Concat => "concat",
            SymOp::Extract(hi, lo) => return write!(f, "(_ extract {hi} {lo})"),
            SymOp::ZeroExtend(n) => return write!(f, "(_ zero_extend {n})"),
            SymOp::SignExtend(n) => return write!(f, "(_ sign_extend {n})"),
            SymOp::Bv2Nat => "bv2nat",
            SymOp::Int2Bv(w) => return write!(f, "(_ int2bv {w})"),
            SymOp::FpAdd => "fp.add",
            SymOp::FpSub => "fp.sub",
            SymOp::FpMul => "fp.mul",
            SymOp::FpDiv => "fp.div",
            SymOp::FpNeg => "fp.neg",
            SymOp::FpIsNaN => "fp.isNaN",
            SymOp::FpIsInfinite => "fp.isInfinite",
            SymOp::FpIsZero => "fp.isZero",
            SymOp::FpIsNegative => "fp.isNegative",
            SymOp::FpIsNormal => "fp.isNormal",
            SymOp::FpIsSubnormal => "fp.isSubnormal",
            SymOp::FpEq => "fp.eq",
            SymOp::FpLt => "fp.lt",
            SymOp::FpLeq => "fp.leq",
            SymOp::FpToReal => "fp.to_real",
            SymOp::FpRoundToIntegral => "fp.roundToIntegral",
            SymOp::ToFpFromBits(fmt) | SymOp::ToFpFromReal(fmt) => {
                return write!(f, "(_ to_fp {} {})", fmt.exp_bits, fmt.precision)
            }
        };
        write!(f, "{name}")
    }
}

/// Solver expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymExpr {
    Bool(bool),
    Int(BigInt),
    Real(BigRational),
    BitVec(Word),
    Fp(FloatValue),
    Rm(RoundingMode),
    Var(SymVar),
    Op(SymOp, Vec<Arc<SymExpr>>),
    /// Uninterpreted function application with its result sort
    App(String, Vec<Arc<SymExpr>>, Sort),
}

fn node(op: SymOp, args: Vec<SymExpr>) -> SymExpr {
    SymExpr::Op(op, args.into_iter().map(Arc::new).collect())
}

fn arg_sort(args: &[Arc<SymExpr>], idx: usize) -> Sort {
    args.get(idx).map_or(Sort::Bool, |a| a.sort())
}

impl SymExpr {
    // Leaves

    pub fn bool_const(b: bool) -> Self {
        SymExpr::Bool(b)
    }

    pub fn int(n: impl Into<BigInt>) -> Self {
        SymExpr::Int(n.into())
    }

    pub fn bv(w: Word) -> Self {
        SymExpr::BitVec(w)
    }

    pub fn bv_lit(width: u32, value: &BigInt) -> Self {
        SymExpr::BitVec(Word::new(width, value))
    }

    pub fn fp(v: FloatValue) -> Self {
        SymExpr::Fp(v)
    }

    pub fn rm(mode: RoundingMode) -> Self {
        SymExpr::Rm(mode)
    }

    pub fn var(name: impl Into<String>, sort: Sort) -> Self {
        SymExpr::Var(SymVar::new(name, sort))
    }

    /// Uninterpreted function application
    pub fn app(name: impl Into<String>, args: Vec<SymExpr>, sort: Sort) -> Self {
        SymExpr::App(name.into(), args.into_iter().map(Arc::new).collect(), sort)
    }

    // Inspection

    pub fn sort(&self) -> Sort {
        match self {
            SymExpr::Bool(_) => Sort::Bool,
            SymExpr::Int(_) => Sort::Int,
            SymExpr::Real(_) => Sort::Real,
            SymExpr::BitVec(w) => Sort::BitVec(w.width()),
            SymExpr::Fp(v) => Sort::Float(v.format()),
            SymExpr::Rm(_) => Sort::RoundingMode,
            SymExpr::Var(v) => v.sort.clone(),
            SymExpr::App(_, _, sort) => sort.clone(),
            SymExpr::Op(op, args) => match op {
                SymOp::Not
                | SymOp::And
                | SymOp::Or
                | SymOp::Xor
                | SymOp::Implies
                | SymOp::Eq
                | SymOp::Lt
                | SymOp::Le
                | SymOp::BvUlt
                | SymOp::BvUle
                | SymOp::BvSlt
                | SymOp::BvSle
                | SymOp::FpIsNaN
                | SymOp::FpIsInfinite
                | SymOp::FpIsZero
                | SymOp::FpIsNegative
                | SymOp::FpIsNormal
                | SymOp::FpIsSubnormal
                | SymOp::FpEq
                | SymOp::FpLt
                | SymOp::FpLeq => Sort::Bool,
                SymOp::Ite => arg_sort(args, 1),
                SymOp::Neg
                | SymOp::Add
                | SymOp::Sub
                | SymOp::Mul
                | SymOp::Div
                | SymOp::Mod
                | SymOp::ToInt
                | SymOp::Bv2Nat => Sort::Int,
                SymOp::ToReal | SymOp::RealMul | SymOp::RealDiv | SymOp::FpToReal => Sort::Real,
                SymOp::BvNot
                | SymOp::BvNeg
                | SymOp::BvAnd
                | SymOp::BvOr
                | SymOp::BvXor
                | SymOp::BvAdd
                | SymOp::BvSub
                | SymOp::BvMul
                | SymOp::BvUdiv
                | SymOp::BvUrem
                | SymOp::BvSdiv
                | SymOp::BvSrem
                | SymOp::BvShl
                | SymOp::BvLshr
                | SymOp::BvAshr
                | SymOp::FpNeg => arg_sort(args, 0),
                SymOp::Concat => {
                    let width = args.iter().map(|a| a.bv_width_or_zero()).sum();
                    Sort::BitVec(width)
                }
                SymOp::Extract(hi, lo) => Sort::BitVec(hi - lo + 1),
                SymOp::ZeroExtend(n) | SymOp::SignExtend(n) => {
                    Sort::BitVec(args.first().map_or(0, |a| a.bv_width_or_zero()) + n)
                }
                SymOp::Int2Bv(w) => Sort::BitVec(*w),
                SymOp::FpAdd
                | SymOp::FpSub
                | SymOp::FpMul
                | SymOp::FpDiv
                | SymOp::FpRoundToIntegral => arg_sort(args, 1),
                SymOp::ToFpFromBits(fmt) | SymOp::ToFpFromReal(fmt) => Sort::Float(*fmt),
            },
        }
    }

    fn bv_width_or_zero(&self) -> u32 {
        match self.sort() {
            Sort::BitVec(w) => w,
            _ => 0,
        }
    }

    /// Width of a bit-vector expression
    pub fn bv_width(&self, op: &str) -> SmtResult<u32> {
        match self.sort() {
            Sort::BitVec(w) => Ok(w),
            actual => Err(SmtError::SortMismatch {
                op: op.to_string(),
                expected: "bit vector".to_string(),
                actual,
            }),
        }
    }

    /// Format of a floating point expression
    pub fn fp_format(&self, op: &str) -> SmtResult<FloatFormat> {
        match self.sort() {
            Sort::Float(fmt) => Ok(fmt),
            actual => Err(SmtError::SortMismatch {
                op: op.to_string(),
                expected: "floating point".to_string(),
                actual,
            }),
        }
    }

    pub(crate) fn expect_sort(&self, op: &str, expected: &Sort) -> SmtResult<()> {
        let actual = self.sort();
        if actual != *expected {
            return Err(SmtError::SortMismatch {
                op: op.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SymExpr::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            SymExpr::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<&BigRational> {
        match self {
            SymExpr::Real(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_bv(&self) -> Option<&Word> {
        match self {
            SymExpr::BitVec(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_fp(&self) -> Option<&FloatValue> {
        match self {
            SymExpr::Fp(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_rm(&self) -> Option<RoundingMode> {
        match self {
            SymExpr::Rm(m) => Some(*m),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            SymExpr::Bool(_)
                | SymExpr::Int(_)
                | SymExpr::Real(_)
                | SymExpr::BitVec(_)
                | SymExpr::Fp(_)
                | SymExpr::Rm(_)
        )
    }

    /// Visit every distinct node once, parents before children
    pub fn for_each_node(&self, f: &mut impl FnMut(&SymExpr)) {
        let mut seen = HashSet::new();
        self.walk(&mut seen, f);
    }

    fn walk(&self, seen: &mut HashSet<*const SymExpr>, f: &mut impl FnMut(&SymExpr)) {
        f(self);
        if let SymExpr::Op(_, args) | SymExpr::App(_, args, _) = self {
            for arg in args {
                if seen.insert(Arc::as_ptr(arg)) {
                    arg.walk(seen, f);
                }
            }
        }
    }

    /// Number of distinct nodes in the DAG
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.for_each_node(&mut |_| count += 1);
        count
    }

    // Core

    pub fn not(e: SymExpr) -> Self {
        // Double negation elimination: NOT(NOT(x)) = x
        if let SymExpr::Op(SymOp::Not, args) = &e {
            if args.len() == 1 {
                return (*args[0]).clone();
            }
        }
        match e {
            SymExpr::Bool(b) => SymExpr::Bool(!b),
            e => node(SymOp::Not, vec![e]),
        }
    }

    pub fn and(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_bool(), b.as_bool()) {
            (Some(false), _) | (_, Some(false)) => SymExpr::Bool(false),
            (Some(true), _) => b,
            (_, Some(true)) => a,
            _ if a == b => a,
            _ => node(SymOp::And, vec![a, b]),
        }
    }

    pub fn or(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_bool(), b.as_bool()) {
            (Some(true), _) | (_, Some(true)) => SymExpr::Bool(true),
            (Some(false), _) => b,
            (_, Some(false)) => a,
            _ if a == b => a,
            _ => node(SymOp::Or, vec![a, b]),
        }
    }

    pub fn xor(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_bool(), b.as_bool()) {
            (Some(x), Some(y)) => SymExpr::Bool(x != y),
            (Some(false), _) => b,
            (_, Some(false)) => a,
            (Some(true), _) => SymExpr::not(b),
            (_, Some(true)) => SymExpr::not(a),
            _ if a == b => SymExpr::Bool(false),
            _ => node(SymOp::Xor, vec![a, b]),
        }
    }

    pub fn implies(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_bool(), b.as_bool()) {
            (Some(false), _) | (_, Some(true)) => SymExpr::Bool(true),
            (Some(true), _) => b,
            (_, Some(false)) => SymExpr::not(a),
            _ => node(SymOp::Implies, vec![a, b]),
        }
    }

    /// Conjunction of many terms
    pub fn and_all(terms: impl IntoIterator<Item = SymExpr>) -> Self {
        terms
            .into_iter()
            .fold(SymExpr::Bool(true), |acc, t| SymExpr::and(acc, t))
    }

    /// Structural equality (SMT-LIB `=`)
    pub fn eq(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        a.expect_sort("=", &b.sort())?;
        if a == b {
            return Ok(SymExpr::Bool(true));
        }
        // Literals are canonical, so distinct literals denote distinct values
        if a.is_literal() && b.is_literal() {
            return Ok(SymExpr::Bool(false));
        }
        Ok(node(SymOp::Eq, vec![a, b]))
    }

    pub fn ite(c: SymExpr, t: SymExpr, e: SymExpr) -> SmtResult<Self> {
        c.expect_sort("ite", &Sort::Bool)?;
        t.expect_sort("ite", &e.sort())?;
        match c.as_bool() {
            Some(true) => return Ok(t),
            Some(false) => return Ok(e),
            None => {}
        }
        if t == e {
            return Ok(t);
        }
        match (t.as_bool(), e.as_bool()) {
            (Some(true), Some(false)) => Ok(c),
            (Some(false), Some(true)) => Ok(SymExpr::not(c)),
            _ => Ok(node(SymOp::Ite, vec![c, t, e])),
        }
    }

    // Integers

    pub fn add(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => SymExpr::Int(x + y),
            (Some(x), _) if x.is_zero() => b,
            (_, Some(y)) if y.is_zero() => a,
            _ => node(SymOp::Add, vec![a, b]),
        }
    }

    pub fn sub(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => SymExpr::Int(x - y),
            (_, Some(y)) if y.is_zero() => a,
            _ => node(SymOp::Sub, vec![a, b]),
        }
    }

    pub fn mul(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => SymExpr::Int(x * y),
            (Some(x), _) | (_, Some(x)) if x.is_zero() => SymExpr::Int(BigInt::zero()),
            (Some(x), _) if x.is_one() => b,
            (_, Some(y)) if y.is_one() => a,
            _ => node(SymOp::Mul, vec![a, b]),
        }
    }

    pub fn neg(a: SymExpr) -> Self {
        if let SymExpr::Op(SymOp::Neg, args) = &a {
            if args.len() == 1 {
                return (*args[0]).clone();
            }
        }
        match a {
            SymExpr::Int(n) => SymExpr::Int(-n),
            a => node(SymOp::Neg, vec![a]),
        }
    }

    /// Euclidean quotient (SMT-LIB `div`)
    pub fn div_euclid(a: SymExpr, b: SymExpr) -> Self {
        if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
            if !y.is_zero() {
                let r = x.mod_floor(&y.abs());
                return SymExpr::Int((x - r) / y);
            }
        }
        node(SymOp::Div, vec![a, b])
    }

    /// Euclidean remainder (SMT-LIB `mod`)
    pub fn mod_euclid(a: SymExpr, b: SymExpr) -> Self {
        if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
            if !y.is_zero() {
                return SymExpr::Int(x.mod_floor(&y.abs()));
            }
        }
        node(SymOp::Mod, vec![a, b])
    }

    pub fn lt(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => SymExpr::Bool(x < y),
            _ if a == b => SymExpr::Bool(false),
            _ => node(SymOp::Lt, vec![a, b]),
        }
    }

    pub fn le(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => SymExpr::Bool(x <= y),
            _ if a == b => SymExpr::Bool(true),
            _ => node(SymOp::Le, vec![a, b]),
        }
    }

    // Reals

    pub fn to_real(a: SymExpr) -> Self {
        match a {
            SymExpr::Int(n) => SymExpr::Real(BigRational::from_integer(n)),
            a => node(SymOp::ToReal, vec![a]),
        }
    }

    /// Floor of a real
    pub fn to_int(a: SymExpr) -> Self {
        match a {
            SymExpr::Real(r) => SymExpr::Int(r.floor().to_integer()),
            a => node(SymOp::ToInt, vec![a]),
        }
    }

    pub fn real_mul(a: SymExpr, b: SymExpr) -> Self {
        match (a.as_real(), b.as_real()) {
            (Some(x), Some(y)) => SymExpr::Real(x * y),
            _ => node(SymOp::RealMul, vec![a, b]),
        }
    }

    pub fn real_div(a: SymExpr, b: SymExpr) -> Self {
        if let (Some(x), Some(y)) = (a.as_real(), b.as_real()) {
            if !y.is_zero() {
                return SymExpr::Real(x / y);
            }
        }
        node(SymOp::RealDiv, vec![a, b])
    }

    // Bit vectors

    fn bv_binary(op: SymOp, a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        let name = op.to_string();
        let left = a.bv_width(&name)?;
        let right = b.bv_width(&name)?;
        if left != right {
            return Err(SmtError::WidthMismatch {
                op: name,
                left,
                right,
            });
        }
        if let (Some(x), Some(y)) = (a.as_bv(), b.as_bv()) {
            if let Some(folded) = fold_bv(op, x, y) {
                return Ok(folded);
            }
        }
        Ok(node(op, vec![a, b]))
    }

    pub fn bvnot(a: SymExpr) -> SmtResult<Self> {
        a.bv_width("bvnot")?;
        Ok(match a {
            SymExpr::BitVec(w) => SymExpr::BitVec(w.complement()),
            a => node(SymOp::BvNot, vec![a]),
        })
    }

    pub fn bvneg(a: SymExpr) -> SmtResult<Self> {
        a.bv_width("bvneg")?;
        Ok(match a {
            SymExpr::BitVec(w) => SymExpr::BitVec(w.neg()),
            a => node(SymOp::BvNeg, vec![a]),
        })
    }

    pub fn bvand(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvAnd, a, b)
    }

    pub fn bvor(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvOr, a, b)
    }

    pub fn bvxor(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvXor, a, b)
    }

    pub fn bvadd(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvAdd, a, b)
    }

    pub fn bvsub(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvSub, a, b)
    }

    pub fn bvmul(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvMul, a, b)
    }

    pub fn bvudiv(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvUdiv, a, b)
    }

    pub fn bvurem(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvUrem, a, b)
    }

    pub fn bvsdiv(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvSdiv, a, b)
    }

    pub fn bvsrem(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvSrem, a, b)
    }

    pub fn bvshl(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvShl, a, b)
    }

    pub fn bvlshr(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvLshr, a, b)
    }

    pub fn bvashr(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvAshr, a, b)
    }

    pub fn bvult(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvUlt, a, b)
    }

    pub fn bvule(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvUle, a, b)
    }

    pub fn bvslt(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvSlt, a, b)
    }

    pub fn bvsle(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::bv_binary(SymOp::BvSle, a, b)
    }

    /// `a` in the high bits, `b` in the low bits
    pub fn concat(a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        let left = a.bv_width("concat")?;
        let right = b.bv_width("concat")?;
        if left == 0 {
            return Ok(b);
        }
        if right == 0 {
            return Ok(a);
        }
        if let (Some(x), Some(y)) = (a.as_bv(), b.as_bv()) {
            return Ok(SymExpr::BitVec(x.concat(y)));
        }
        Ok(node(SymOp::Concat, vec![a, b]))
    }

    /// Bits `hi` down to `lo`, counted from the least significant bit
    pub fn extract(a: SymExpr, hi: u32, lo: u32) -> SmtResult<Self> {
        let width = a.bv_width("extract")?;
        if hi >= width || lo > hi {
            return Err(SmtError::InvalidExtract { hi, lo, width });
        }
        if lo == 0 && hi == width - 1 {
            return Ok(a);
        }
        if let Some(x) = a.as_bv() {
            if let Ok(w) = x.extract(lo, hi - lo + 1) {
                return Ok(SymExpr::BitVec(w));
            }
        }
        Ok(node(SymOp::Extract(hi, lo), vec![a]))
    }

    pub fn zero_extend(a: SymExpr, extra: u32) -> SmtResult<Self> {
        let width = a.bv_width("zero_extend")?;
        if extra == 0 {
            return Ok(a);
        }
        Ok(match a {
            SymExpr::BitVec(w) => SymExpr::BitVec(w.zero_extend(width + extra)),
            a => node(SymOp::ZeroExtend(extra), vec![a]),
        })
    }

    pub fn sign_extend(a: SymExpr, extra: u32) -> SmtResult<Self> {
        let width = a.bv_width("sign_extend")?;
        if extra == 0 {
            return Ok(a);
        }
        Ok(match a {
            SymExpr::BitVec(w) => SymExpr::BitVec(Word::new(width + extra, &w.to_signed())),
            a => node(SymOp::SignExtend(extra), vec![a]),
        })
    }

    /// Unsigned value of a bit vector
    pub fn bv2nat(a: SymExpr) -> SmtResult<Self> {
        let width = a.bv_width("bv2nat")?;
        if width == 0 {
            return Ok(SymExpr::Int(BigInt::zero()));
        }
        Ok(match a {
            SymExpr::BitVec(w) => SymExpr::Int(w.to_unsigned()),
            a => node(SymOp::Bv2Nat, vec![a]),
        })
    }

    /// An integer reduced modulo `2^width`
    pub fn int2bv(width: u32, a: SymExpr) -> SmtResult<Self> {
        a.expect_sort("int2bv", &Sort::Int)?;
        if width == 0 {
            return Ok(SymExpr::BitVec(Word::empty()));
        }
        Ok(match a {
            SymExpr::Int(n) => SymExpr::BitVec(Word::new(width, &n)),
            a => node(SymOp::Int2Bv(width), vec![a]),
        })
    }

    // Floating point

    fn fp_binary(op: SymOp, rm: SymExpr, a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        let name = op.to_string();
        rm.expect_sort(&name, &Sort::RoundingMode)?;
        let fmt = a.fp_format(&name)?;
        b.expect_sort(&name, &Sort::Float(fmt))?;
        if let (Some(mode), Some(x), Some(y)) = (rm.as_rm(), a.as_fp(), b.as_fp()) {
            let folded = match op {
                SymOp::FpAdd => x.add(y, mode),
                SymOp::FpSub => x.sub(y, mode),
                SymOp::FpMul => x.mul(y, mode),
                _ => x.div(y, mode),
            };
            if let Ok(v) = folded {
                return Ok(SymExpr::Fp(v));
            }
        }
        Ok(node(op, vec![rm, a, b]))
    }

    pub fn fp_add(rm: SymExpr, a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::fp_binary(SymOp::FpAdd, rm, a, b)
    }

    pub fn fp_sub(rm: SymExpr, a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::fp_binary(SymOp::FpSub, rm, a, b)
    }

    pub fn fp_mul(rm: SymExpr, a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::fp_binary(SymOp::FpMul, rm, a, b)
    }

    pub fn fp_div(rm: SymExpr, a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        Self::fp_binary(SymOp::FpDiv, rm, a, b)
    }

    pub fn fp_neg(a: SymExpr) -> SmtResult<Self> {
        a.fp_format("fp.neg")?;
        Ok(match a {
            SymExpr::Fp(v) => SymExpr::Fp(v.neg()),
            a => node(SymOp::FpNeg, vec![a]),
        })
    }

    /// Classification predicate (`fp.isNaN` and friends)
    pub fn fp_test(op: SymOp, a: SymExpr) -> SmtResult<Self> {
        a.fp_format(&op.to_string())?;
        if let Some(v) = a.as_fp() {
            let holds = match op {
                SymOp::FpIsNaN => Some(v.is_nan()),
                SymOp::FpIsInfinite => Some(v.is_infinite()),
                SymOp::FpIsZero => Some(v.is_zero()),
                SymOp::FpIsNegative => Some(v.is_negative()),
                SymOp::FpIsNormal => Some(v.is_normal()),
                SymOp::FpIsSubnormal => Some(v.is_subnormal()),
                _ => None,
            };
            if let Some(b) = holds {
                return Ok(SymExpr::Bool(b));
            }
        }
        Ok(node(op, vec![a]))
    }

    /// IEEE comparison (`fp.eq`, `fp.lt`, `fp.leq`)
    pub fn fp_compare(op: SymOp, a: SymExpr, b: SymExpr) -> SmtResult<Self> {
        let name = op.to_string();
        let fmt = a.fp_format(&name)?;
        b.expect_sort(&name, &Sort::Float(fmt))?;
        if let (Some(x), Some(y)) = (a.as_fp(), b.as_fp()) {
            let holds = match op {
                SymOp::FpEq => x.ieee_eq(y).ok(),
                SymOp::FpLt => x.ieee_lt(y).ok(),
                SymOp::FpLeq => x
                    .ieee_cmp(y)
                    .ok()
                    .map(|ord| matches!(ord, Some(o) if o.is_le())),
                _ => None,
            };
            if let Some(b) = holds {
                return Ok(SymExpr::Bool(b));
            }
        }
        Ok(node(op, vec![a, b]))
    }

    /// Exact real value; unspecified for NaN and infinities
    pub fn fp_to_real(a: SymExpr) -> SmtResult<Self> {
        a.fp_format("fp.to_real")?;
        if let Some(r) = a.as_fp().and_then(|v| v.to_rational("fp.to_real").ok()) {
            return Ok(SymExpr::Real(r));
        }
        Ok(node(SymOp::FpToReal, vec![a]))
    }

    pub fn fp_round_to_integral(rm: SymExpr, a: SymExpr) -> SmtResult<Self> {
        rm.expect_sort("fp.roundToIntegral", &Sort::RoundingMode)?;
        let fmt = a.fp_format("fp.roundToIntegral")?;
        if let (Some(mode), Some(v)) = (rm.as_rm(), a.as_fp()) {
            if !matches!(v.kind(), FloatKind::Finite { .. }) {
                return Ok(a);
            }
            if let Ok(n) = v.to_integer("fp.roundToIntegral", mode) {
                let rounded = if n.is_zero() {
                    FloatValue::zero(fmt, v.is_negative())
                } else {
                    FloatValue::from_integer(fmt, mode, &n)
                };
                return Ok(SymExpr::Fp(rounded));
            }
        }
        Ok(node(SymOp::FpRoundToIntegral, vec![rm, a]))
    }

    /// Reinterpret an IEEE bit pattern
    pub fn to_fp_from_bits(fmt: FloatFormat, a: SymExpr) -> SmtResult<Self> {
        a.expect_sort("to_fp", &Sort::BitVec(fmt.width()))?;
        if let Some(v) = a.as_bv().and_then(|w| FloatValue::from_bits(fmt, w).ok()) {
            return Ok(SymExpr::Fp(v));
        }
        Ok(node(SymOp::ToFpFromBits(fmt), vec![a]))
    }

    /// Round a real into a float format
    pub fn to_fp_from_real(fmt: FloatFormat, rm: SymExpr, a: SymExpr) -> SmtResult<Self> {
        rm.expect_sort("to_fp", &Sort::RoundingMode)?;
        a.expect_sort("to_fp", &Sort::Real)?;
        if let (Some(mode), Some(r)) = (rm.as_rm(), a.as_real()) {
            return Ok(SymExpr::Fp(FloatValue::from_rational(fmt, mode, r)));
        }
        Ok(node(SymOp::ToFpFromReal(fmt), vec![rm, a]))
    }
}

fn fold_bv(op: SymOp, x: &Word, y: &Word) -> Option<SymExpr> {
    let word = match op {
        SymOp::BvAnd => x.and(y),
        SymOp::BvOr => x.or(y),
        SymOp::BvXor => x.xor(y),
        SymOp::BvAdd => x.add(y),
        SymOp::BvSub => x.sub(y),
        SymOp::BvMul => x.mul(y),
        // Division by zero has solver-defined results; leave it to the solver
        SymOp::BvUdiv => x.udiv(y),
        SymOp::BvUrem => x.urem(y),
        SymOp::BvSdiv => x.sdiv(y),
        SymOp::BvSrem => x.srem(y),
        SymOp::BvShl => Ok(x.shl(y.shift_amount())),
        SymOp::BvLshr => Ok(x.lshr(y.shift_amount())),
        SymOp::BvAshr => Ok(x.ashr(y.shift_amount())),
        SymOp::BvUlt => return x.ult(y).ok().map(SymExpr::Bool),
        SymOp::BvUle => return y.ult(x).ok().map(|b| SymExpr::Bool(!b)),
        SymOp::BvSlt => return x.slt(y).ok().map(SymExpr::Bool),
        SymOp::BvSle => return y.slt(x).ok().map(|b| SymExpr::Bool(!b)),
        _ => return None,
    };
    word.ok().map(SymExpr::BitVec)
}

fn fmt_int(f: &mut fmt::Formatter<'_>, n: &BigInt) -> fmt::Result {
    if n.is_negative() {
        write!(f, "(- {})", n.abs())
    } else {
        write!(f, "{n}")
    }
}

fn fmt_real(f: &mut fmt::Formatter<'_>, r: &BigRational) -> fmt::Result {
    let num = r.numer().abs();
    let body = if r.denom().is_one() {
        format!("{num}.0")
    } else {
        format!("(/ {num}.0 {}.0)", r.denom())
    };
    if r.is_negative() {
        write!(f, "(- {body})")
    } else {
        write!(f, "{body}")
    }
}

fn fmt_bv(f: &mut fmt::Formatter<'_>, w: &Word) -> fmt::Result {
    let width = w.width() as usize;
    if width == 0 {
        write!(f, "(_ bv0 0)")
    } else if width % 4 == 0 {
        let digits = width / 4;
        write!(f, "#x{:0>digits$}", w.value().to_str_radix(16))
    } else {
        write!(f, "#b{:0>width$}", w.value().to_str_radix(2))
    }
}

fn fmt_fp(f: &mut fmt::Formatter<'_>, v: &FloatValue) -> fmt::Result {
    let fmt = v.format();
    let (e, p) = (fmt.exp_bits, fmt.precision);
    match v.kind() {
        FloatKind::NaN => write!(f, "(_ NaN {e} {p})"),
        FloatKind::Infinity { negative } => {
            write!(f, "(_ {}oo {e} {p})", if *negative { '-' } else { '+' })
        }
        FloatKind::Zero { negative } => {
            write!(f, "(_ {}zero {e} {p})", if *negative { '-' } else { '+' })
        }
        FloatKind::Finite { .. } => {
            let width = fmt.width() as usize;
            let bits = format!("{:0>width$}", v.to_bits().value().to_str_radix(2));
            let exp_end = 1 + e as usize;
            write!(
                f,
                "(fp #b{} #b{} #b{})",
                &bits[..1],
                &bits[1..exp_end],
                &bits[exp_end..]
            )
        }
    }
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymExpr::Bool(b) => write!(f, "{b}"),
            SymExpr::Int(n) => fmt_int(f, n),
            SymExpr::Real(r) => fmt_real(f, r),
            SymExpr::BitVec(w) => fmt_bv(f, w),
            SymExpr::Fp(v) => fmt_fp(f, v),
            SymExpr::Rm(m) => write!(f, "{}", m.smtlib_name()),
            SymExpr::Var(v) => write!(f, "{v}"),
            SymExpr::Op(..) | SymExpr::App(..) => render::write_shared(f, self),
        }
    }
}
