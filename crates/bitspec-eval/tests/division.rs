//! Division on both engines
//!
//! Word and integer division identities, agreement between the engines on
//! literals, and the shape of symbolic floor division.

use bitspec_core::{EvalError, Word};
use bitspec_eval::{run, Backend, ConcreteBackend, Frame, SymBackend};
use bitspec_smt::{Sort, SymExpr};
use num_bigint::BigInt;
use proptest::prelude::*;

// ============================================================================
// Helper functions
// ============================================================================

fn word(width: u32, v: i64) -> Word {
    Word::new(width, &BigInt::from(v))
}

/// Run a partial operation to completion, failing on any error
fn concrete<T>(
    f: impl FnOnce(&ConcreteBackend, &mut Frame<ConcreteBackend>) -> Result<T, EvalError>,
) -> Result<T, EvalError> {
    let be = ConcreteBackend::default();
    run(&be, |frame| f(&be, frame))?.into_result()
}

fn symbolic<T>(
    f: impl FnOnce(&SymBackend, &mut Frame<SymBackend>) -> Result<T, EvalError>,
) -> Result<T, EvalError> {
    let be = SymBackend::default();
    run(&be, |frame| f(&be, frame))?.into_result()
}

// ============================================================================
// Word division
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_unsigned_identity(width in 1u32..24, x: i64, y: i64) {
        let (x, y) = (word(width, x), word(width, y));
        prop_assume!(y.to_u64() != Some(0));
        let (q, r) = concrete(|be, f| Ok((be.word_udiv(f, &x, &y)?, be.word_urem(f, &x, &y)?)))
            .unwrap();
        let back = q.mul(&y).unwrap().add(&r).unwrap();
        prop_assert_eq!(back, x.clone());
        prop_assert!(r.ult(&y).unwrap());

        let (sq, sr) = symbolic(|be, f| {
            let (a, b) = (SymExpr::bv(x.clone()), SymExpr::bv(y.clone()));
            Ok((be.word_udiv(f, &a, &b)?, be.word_urem(f, &a, &b)?))
        })
        .unwrap();
        prop_assert_eq!(sq, SymExpr::bv(q));
        prop_assert_eq!(sr, SymExpr::bv(r));
    }

    #[test]
    fn prop_signed_identity(width in 1u32..24, x: i64, y: i64) {
        let (x, y) = (word(width, x), word(width, y));
        prop_assume!(y.to_u64() != Some(0));
        let (q, r) = concrete(|be, f| Ok((be.word_sdiv(f, &x, &y)?, be.word_srem(f, &x, &y)?)))
            .unwrap();
        prop_assert_eq!(q.mul(&y).unwrap().add(&r).unwrap(), x.clone());
        let zero = BigInt::from(0);
        let (sr, sx) = (r.to_signed(), x.to_signed());
        prop_assert!(sr == zero || (sr < zero) == (sx < zero));

        let (sq, srem) = symbolic(|be, f| {
            let (a, b) = (SymExpr::bv(x.clone()), SymExpr::bv(y.clone()));
            Ok((be.word_sdiv(f, &a, &b)?, be.word_srem(f, &a, &b)?))
        })
        .unwrap();
        prop_assert_eq!(sq, SymExpr::bv(q));
        prop_assert_eq!(srem, SymExpr::bv(r));
    }

    #[test]
    fn prop_integer_floor_division_agrees(x in -10_000i64..10_000, y in -100i64..100) {
        prop_assume!(y != 0);
        let (xi, yi) = (BigInt::from(x), BigInt::from(y));
        let (q, r) = concrete(|be, f| {
            Ok((be.integer_div(f, &xi, &yi)?, be.integer_mod(f, &xi, &yi)?))
        })
        .unwrap();
        let floor = x.div_euclid(y) - i64::from(y < 0 && x.rem_euclid(y) != 0);
        prop_assert_eq!(q.clone(), BigInt::from(floor));
        prop_assert_eq!(&q * &yi + &r, xi.clone());
        // the remainder takes the sign of the divisor
        prop_assert!(r == BigInt::from(0) || (r < BigInt::from(0)) == (y < 0));

        let (sq, sr) = symbolic(|be, f| {
            let (a, b) = (SymExpr::int(x), SymExpr::int(y));
            Ok((be.integer_div(f, &a, &b)?, be.integer_mod(f, &a, &b)?))
        })
        .unwrap();
        prop_assert_eq!(sq.as_int(), Some(&q));
        prop_assert_eq!(sr.as_int(), Some(&r));
    }
}

// ============================================================================
// Fixed scenarios
// ============================================================================

#[test]
fn test_signed_min_over_minus_one() {
    let (q, r) = concrete(|be, f| {
        let (x, y) = (word(8, 0x80), word(8, 0xFF));
        Ok((be.word_sdiv(f, &x, &y)?, be.word_srem(f, &x, &y)?))
    })
    .unwrap();
    assert_eq!(q, word(8, 0x80));
    assert_eq!(r, word(8, 0));
}

#[test]
fn test_zero_divisor() {
    let err = concrete(|be, f| be.word_sdiv(f, &word(8, 3), &word(8, 0))).unwrap_err();
    assert_eq!(err, EvalError::DivideByZero);
    let err = concrete(|be, f| be.integer_mod(f, &BigInt::from(3), &BigInt::from(0))).unwrap_err();
    assert_eq!(err, EvalError::DivideByZero);
    let err = symbolic(|be, f| be.integer_div(f, &SymExpr::int(3), &SymExpr::int(0))).unwrap_err();
    assert_eq!(err, EvalError::DivideByZero);
}

#[test]
fn test_negative_divisor_examples() {
    let cases = [(7, 2, 3, 1), (-7, 2, -4, 1), (7, -2, -4, -1), (-7, -2, 3, -1)];
    for (x, y, q, r) in cases {
        let (x, y) = (BigInt::from(x), BigInt::from(y));
        let got = concrete(|be, f| Ok((be.integer_div(f, &x, &y)?, be.integer_mod(f, &x, &y)?)))
            .unwrap();
        assert_eq!(got, (BigInt::from(q), BigInt::from(r)), "{x} / {y}");
    }
}

#[test]
fn test_symbolic_divisor_of_unknown_sign() {
    let be = SymBackend::default();
    let x = be.declare_input("x", Sort::Int).unwrap();
    let y = be.declare_input("y", Sort::Int).unwrap();

    let q = run(&be, |f| be.integer_div(f, &x, &y)).unwrap();
    assert_eq!(q.safety().unwrap().to_string(), "(not (= y 0))");
    assert_eq!(
        q.value().unwrap().to_string(),
        "(ite (< y 0) (div (- x) (- y)) (div x y))"
    );

    let r = run(&be, |f| be.integer_mod(f, &x, &y)).unwrap();
    assert_eq!(
        r.value().unwrap().to_string(),
        "(ite (< y 0) (- (mod (- x) (- y))) (mod x y))"
    );

    // a divisor of known sign needs no case split
    let r = run(&be, |f| be.integer_mod(f, &x, &SymExpr::int(-3))).unwrap();
    assert_eq!(r.value().unwrap().to_string(), "(- (mod (- x) 3))");
    assert_eq!(r.safety(), Some(&SymExpr::Bool(true)));
}

#[test]
fn test_symbolic_word_division_obligation() {
    let be = SymBackend::default();
    let y = be.declare_input("y", Sort::BitVec(8)).unwrap();
    let q = run(&be, |f| be.word_sdiv(f, &SymExpr::bv(word(8, 0x80)), &y)).unwrap();
    let query = be.safety_query(&q).unwrap();
    let script = query.to_smtlib();
    assert!(script.contains("(declare-const y (_ BitVec 8))"));
    assert!(script.contains("(assert (not (not (= y #x00))))"));
    assert!(script.ends_with("(check-sat)\n"));
}
