//! Runtime values and the types that direct primitives over them

use std::fmt;

use bitspec_core::{EvalError, EvalResult, FloatFormat};
use num_bigint::BigInt;

use crate::backend::Backend;
use crate::rational::SRational;

/// Type of a value, as far as primitives need to know it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TValue {
    Bit,
    Word(u32),
    Integer,
    /// Integers modulo the given positive modulus
    Z(BigInt),
    Rational,
    Float(FloatFormat),
    Tuple(Vec<TValue>),
    /// Fixed-length sequence of non-bit elements
    Seq(usize, Box<TValue>),
}

impl fmt::Display for TValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TValue::Bit => write!(f, "Bit"),
            TValue::Word(n) => write!(f, "[{n}]"),
            TValue::Integer => write!(f, "Integer"),
            TValue::Z(m) => write!(f, "Z {m}"),
            TValue::Rational => write!(f, "Rational"),
            TValue::Float(fmt) => write!(f, "Float {} {}", fmt.exp_bits, fmt.precision),
            TValue::Tuple(items) => {
                write!(f, "(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            TValue::Seq(n, elem) => write!(f, "[{n}]{elem}"),
        }
    }
}

/// A value over one engine
pub enum Value<B: Backend> {
    Bit(B::Bit),
    Word(B::Word),
    Integer(B::Integer),
    /// Residue in `[0, m)` with its modulus
    Z(BigInt, B::Integer),
    Rational(SRational<B>),
    Float(B::Float),
    Tuple(Vec<Value<B>>),
    Seq(Vec<Value<B>>),
}

impl<B: Backend> Clone for Value<B> {
    fn clone(&self) -> Self {
        match self {
            Value::Bit(b) => Value::Bit(b.clone()),
            Value::Word(w) => Value::Word(w.clone()),
            Value::Integer(i) => Value::Integer(i.clone()),
            Value::Z(m, i) => Value::Z(m.clone(), i.clone()),
            Value::Rational(r) => Value::Rational(r.clone()),
            Value::Float(x) => Value::Float(x.clone()),
            Value::Tuple(items) => Value::Tuple(items.clone()),
            Value::Seq(items) => Value::Seq(items.clone()),
        }
    }
}

impl<B: Backend> fmt::Debug for Value<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bit(b) => f.debug_tuple("Bit").field(b).finish(),
            Value::Word(w) => f.debug_tuple("Word").field(w).finish(),
            Value::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Value::Z(m, i) => f.debug_tuple("Z").field(m).field(i).finish(),
            Value::Rational(r) => f.debug_tuple("Rational").field(r).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Value::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
        }
    }
}

fn expected<T>(what: &str, v: &impl fmt::Debug) -> EvalResult<T> {
    Err(EvalError::internal(format!("expected {what}, got {v:?}")))
}

impl<B: Backend> Value<B> {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bit(_) => "bit",
            Value::Word(_) => "word",
            Value::Integer(_) => "integer",
            Value::Z(..) => "Z",
            Value::Rational(_) => "rational",
            Value::Float(_) => "float",
            Value::Tuple(_) => "tuple",
            Value::Seq(_) => "sequence",
        }
    }

    pub fn as_bit(&self) -> EvalResult<&B::Bit> {
        match self {
            Value::Bit(b) => Ok(b),
            v => expected("a bit", v),
        }
    }

    pub fn as_word(&self) -> EvalResult<&B::Word> {
        match self {
            Value::Word(w) => Ok(w),
            v => expected("a word", v),
        }
    }

    pub fn as_integer(&self) -> EvalResult<&B::Integer> {
        match self {
            Value::Integer(i) => Ok(i),
            v => expected("an integer", v),
        }
    }

    pub fn as_z(&self) -> EvalResult<(&BigInt, &B::Integer)> {
        match self {
            Value::Z(m, i) => Ok((m, i)),
            v => expected("an element of Z", v),
        }
    }

    pub fn as_rational(&self) -> EvalResult<&SRational<B>> {
        match self {
            Value::Rational(r) => Ok(r),
            v => expected("a rational", v),
        }
    }

    pub fn as_float(&self) -> EvalResult<&B::Float> {
        match self {
            Value::Float(x) => Ok(x),
            v => expected("a float", v),
        }
    }

    /// Components of a tuple or elements of a sequence
    pub fn as_items(&self) -> EvalResult<&[Value<B>]> {
        match self {
            Value::Tuple(items) | Value::Seq(items) => Ok(items),
            v => expected("a tuple or sequence", v),
        }
    }

    /// Rebuild a compound value of the same shape with new items
    pub(crate) fn with_items(&self, items: Vec<Value<B>>) -> EvalResult<Value<B>> {
        match self {
            Value::Tuple(_) => Ok(Value::Tuple(items)),
            Value::Seq(_) => Ok(Value::Seq(items)),
            v => expected("a tuple or sequence", v),
        }
    }
}

fn paired<'a, B: Backend>(
    x: &'a [Value<B>],
    y: &'a [Value<B>],
) -> EvalResult<impl Iterator<Item = (&'a Value<B>, &'a Value<B>)>> {
    if x.len() != y.len() {
        return Err(EvalError::internal(format!(
            "compound values of lengths {} and {}",
            x.len(),
            y.len()
        )));
    }
    Ok(x.iter().zip(y))
}

/// Join two values of one type under `c`
pub fn merge_value<B: Backend>(
    be: &B,
    c: &B::Bit,
    x: Value<B>,
    y: Value<B>,
) -> EvalResult<Value<B>> {
    match be.bit_as_lit(c) {
        Some(true) => return Ok(x),
        Some(false) => return Ok(y),
        None => {}
    }
    Ok(match (&x, &y) {
        (Value::Bit(a), Value::Bit(b)) => Value::Bit(be.ite_bit(c, a, b)?),
        (Value::Word(a), Value::Word(b)) => Value::Word(be.ite_word(c, a, b)?),
        (Value::Integer(a), Value::Integer(b)) => Value::Integer(be.ite_integer(c, a, b)?),
        (Value::Z(m, a), Value::Z(n, b)) if m == n => {
            Value::Z(m.clone(), be.ite_integer(c, a, b)?)
        }
        (Value::Rational(a), Value::Rational(b)) => {
            Value::Rational(SRational::merge(be, c, a, b)?)
        }
        (Value::Float(a), Value::Float(b)) => Value::Float(be.ite_float(c, a, b)?),
        (Value::Tuple(a), Value::Tuple(b)) | (Value::Seq(a), Value::Seq(b)) => {
            let items = paired(a, b)?
                .map(|(a, b)| merge_value(be, c, a.clone(), b.clone()))
                .collect::<EvalResult<Vec<_>>>()?;
            x.with_items(items)?
        }
        _ => {
            return Err(EvalError::internal(format!(
                "cannot merge a {} with a {}",
                x.kind(),
                y.kind()
            )))
        }
    })
}

/// Structural equality. Floats compare as IEEE values.
pub fn value_eq<B: Backend>(be: &B, x: &Value<B>, y: &Value<B>) -> EvalResult<B::Bit> {
    match (x, y) {
        (Value::Bit(a), Value::Bit(b)) => Ok(be.bit_eq(a, b)),
        (Value::Word(a), Value::Word(b)) => be.word_eq(a, b),
        (Value::Integer(a), Value::Integer(b)) => be.integer_eq(a, b),
        (Value::Z(m, a), Value::Z(n, b)) if m == n => be.zn_eq(m, a, b),
        (Value::Rational(a), Value::Rational(b)) => a.eq(be, b),
        (Value::Float(a), Value::Float(b)) => be.fp_eq(a, b),
        (Value::Tuple(a), Value::Tuple(b)) | (Value::Seq(a), Value::Seq(b)) => {
            let mut all = be.bit_lit(true);
            for (a, b) in paired(a, b)? {
                all = be.bit_and(&all, &value_eq(be, a, b)?);
            }
            Ok(all)
        }
        _ => Err(EvalError::internal(format!(
            "cannot compare a {} with a {}",
            x.kind(),
            y.kind()
        ))),
    }
}

/// Strict order, lexicographic on compound values. `signed` compares
/// words as two's complement and treats a set bit as -1.
pub fn value_lt<B: Backend>(
    be: &B,
    x: &Value<B>,
    y: &Value<B>,
    signed: bool,
) -> EvalResult<B::Bit> {
    match (x, y) {
        (Value::Bit(a), Value::Bit(b)) => Ok(if signed {
            be.bit_and(a, &be.bit_not(b))
        } else {
            be.bit_and(&be.bit_not(a), b)
        }),
        (Value::Word(a), Value::Word(b)) if signed => be.word_slt(a, b),
        (Value::Word(a), Value::Word(b)) => be.word_ult(a, b),
        (Value::Integer(a), Value::Integer(b)) if !signed => Ok(be.integer_lt(a, b)),
        (Value::Rational(a), Value::Rational(b)) if !signed => Ok(a.lt(be, b)),
        (Value::Float(a), Value::Float(b)) if !signed => be.fp_lt(a, b),
        (Value::Tuple(a), Value::Tuple(b)) | (Value::Seq(a), Value::Seq(b)) => {
            // Scan from the last component so each step is
            // lt(a_i, b_i) || (a_i == b_i && rest)
            let mut rest = be.bit_lit(false);
            let pairs: Vec<_> = paired(a, b)?.collect();
            for (a, b) in pairs.into_iter().rev() {
                let lt = value_lt(be, a, b, signed)?;
                let eq = value_eq(be, a, b)?;
                rest = be.bit_or(&lt, &be.bit_and(&eq, &rest));
            }
            Ok(rest)
        }
        _ => Err(EvalError::internal(format!(
            "no {}order between a {} and a {}",
            if signed { "signed " } else { "" },
            x.kind(),
            y.kind()
        ))),
    }
}

pub fn value_le<B: Backend>(
    be: &B,
    x: &Value<B>,
    y: &Value<B>,
    signed: bool,
) -> EvalResult<B::Bit> {
    let lt = value_lt(be, x, y, signed)?;
    let eq = value_eq(be, x, y)?;
    Ok(be.bit_or(&lt, &eq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concrete::ConcreteBackend;
    use crate::symbolic::SymBackend;
    use bitspec_core::Word;
    use bitspec_smt::{Sort, SymExpr};

    fn word<B: Backend>(be: &B, width: u32, v: i64) -> Value<B> {
        Value::Word(be.word_lit(Word::new(width, &BigInt::from(v))).unwrap())
    }

    #[test]
    fn test_lexicographic_order() {
        let be = ConcreteBackend::default();
        let t = |a, b| Value::Tuple(vec![word(&be, 4, a), word(&be, 4, b)]);
        assert!(value_lt(&be, &t(1, 9), &t(2, 0), false).unwrap());
        assert!(value_lt(&be, &t(2, 0), &t(2, 1), false).unwrap());
        assert!(!value_lt(&be, &t(2, 1), &t(2, 1), false).unwrap());
        assert!(value_le(&be, &t(2, 1), &t(2, 1), false).unwrap());
        // 0xf is -1 when signed
        assert!(value_lt(&be, &t(0xf, 0), &t(0, 0), true).unwrap());
        assert!(!value_lt(&be, &t(0xf, 0), &t(0, 0), false).unwrap());
    }

    #[test]
    fn test_z_has_no_order() {
        let be = ConcreteBackend::default();
        let z = |v: i64| Value::<ConcreteBackend>::Z(BigInt::from(7), BigInt::from(v));
        assert!(value_eq(&be, &z(3), &z(3)).unwrap());
        assert!(value_lt(&be, &z(1), &z(3), false).unwrap_err().is_fatal());
    }

    #[test]
    fn test_merge_is_structural() {
        let be = SymBackend::default();
        let c = be.declare_input("c", Sort::Bool).unwrap();
        let x = be.declare_input("x", Sort::BitVec(4)).unwrap();
        let left = Value::Tuple(vec![Value::Word(x.clone()), Value::Bit(SymExpr::Bool(true))]);
        let right = Value::Tuple(vec![word(&be, 4, 3), Value::Bit(SymExpr::Bool(false))]);
        let merged = merge_value(&be, &c, left, right).unwrap();
        let items = merged.as_items().unwrap();
        assert_eq!(items[0].as_word().unwrap().to_string(), "(ite c x #x3)");
        assert_eq!(items[1].as_bit().unwrap(), &c);

        let mismatch = merge_value(&be, &c, word(&be, 4, 1), word(&be, 8, 1));
        assert!(mismatch.unwrap_err().is_fatal());
    }
}
