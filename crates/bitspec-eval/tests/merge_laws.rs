//! Joining branch outcomes
//!
//! The error/result merge table, literal conditions, fatal errors, and
//! `branch` running both arms under a symbolic condition.

use bitspec_core::{EvalError, PartialResult, Word};
use bitspec_eval::{branch, merge, merge_value, run, Backend, ConcreteBackend, SymBackend, Value};
use bitspec_smt::{Sort, SymExpr};
use num_bigint::BigInt;

fn keep_left<B: Backend, T>(_: &B, _: &B::Bit, x: T, _: T) -> Result<T, EvalError> {
    Ok(x)
}

fn ite_int(be: &SymBackend, c: &SymExpr, x: SymExpr, y: SymExpr) -> Result<SymExpr, EvalError> {
    be.ite_integer(c, &x, &y)
}

#[test]
fn test_literal_condition_selects_an_arm() {
    let be = ConcreteBackend::default();
    for c in [true, false] {
        let x = PartialResult::ok(true, 1);
        let y = PartialResult::Error(EvalError::DivideByZero);
        let merged = merge(&be, &c, x, y, keep_left).unwrap();
        if c {
            assert_eq!(merged.value(), Some(&1));
        } else {
            assert_eq!(merged.error(), Some(&EvalError::DivideByZero));
        }
    }
}

#[test]
fn test_error_on_one_side_guards_the_other() {
    let be = SymBackend::default();
    let c = be.declare_input("c", Sort::Bool).unwrap();
    let p = be.declare_input("p", Sort::Bool).unwrap();
    let v = SymExpr::int(7);

    let merged = merge(
        &be,
        &c,
        PartialResult::Error(EvalError::DivideByZero),
        PartialResult::ok(p.clone(), v.clone()),
        ite_int,
    )
    .unwrap();
    assert_eq!(merged.safety().unwrap().to_string(), "(and p (not c))");
    assert_eq!(merged.value(), Some(&v));

    let merged = merge(
        &be,
        &c,
        PartialResult::ok(p.clone(), v.clone()),
        PartialResult::Error(EvalError::BadValue("trunc".to_string())),
        ite_int,
    )
    .unwrap();
    assert_eq!(merged.safety().unwrap().to_string(), "(and p c)");
}

#[test]
fn test_two_errors_keep_the_first() {
    let be = SymBackend::default();
    let c = be.declare_input("c", Sort::Bool).unwrap();
    let merged = merge(
        &be,
        &c,
        PartialResult::<SymExpr, SymExpr>::Error(EvalError::DivideByZero),
        PartialResult::Error(EvalError::BadRoundingMode(6)),
        ite_int,
    )
    .unwrap();
    assert_eq!(merged.error(), Some(&EvalError::DivideByZero));
}

#[test]
fn test_two_results_merge_values_and_safety() {
    let be = SymBackend::default();
    let c = be.declare_input("c", Sort::Bool).unwrap();
    let p = be.declare_input("p", Sort::Bool).unwrap();
    let q = be.declare_input("q", Sort::Bool).unwrap();
    let merged = merge(
        &be,
        &c,
        PartialResult::ok(p, SymExpr::int(1)),
        PartialResult::ok(q, SymExpr::int(2)),
        ite_int,
    )
    .unwrap();
    assert_eq!(merged.safety().unwrap().to_string(), "(ite c p q)");
    assert_eq!(merged.value().unwrap().to_string(), "(ite c 1 2)");
}

#[test]
fn test_fatal_errors_are_not_merged() {
    let be = SymBackend::default();
    let c = be.declare_input("c", Sort::Bool).unwrap();
    let err = merge(
        &be,
        &c,
        PartialResult::ok(SymExpr::Bool(true), SymExpr::int(1)),
        PartialResult::Error(EvalError::internal("width mismatch")),
        ite_int,
    )
    .unwrap_err();
    assert!(err.is_fatal());

    let concrete = ConcreteBackend::default();
    let err = merge(
        &concrete,
        &true,
        PartialResult::ok(true, 1),
        PartialResult::Error(EvalError::internal("zero modulus")),
        keep_left,
    )
    .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_value_merge_errors_follow_the_error_table() {
    let be = SymBackend::default();
    let c = be.declare_input("c", Sort::Bool).unwrap();
    let arms = || {
        (
            PartialResult::ok(SymExpr::Bool(true), SymExpr::int(1)),
            PartialResult::ok(SymExpr::Bool(true), SymExpr::int(2)),
        )
    };

    let (x, y) = arms();
    let merged = merge(&be, &c, x, y, |_, _, _, _| {
        Err(EvalError::UnsupportedSymbolicOp("merge".to_string()))
    })
    .unwrap();
    assert_eq!(
        merged.error(),
        Some(&EvalError::UnsupportedSymbolicOp("merge".to_string()))
    );

    let (x, y) = arms();
    let err = merge(&be, &c, x, y, |_, _, _, _| {
        Err(EvalError::internal("shape mismatch"))
    })
    .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_branch_on_symbolic_condition() {
    let be = SymBackend::default();
    let x = be.declare_input("x", Sort::BitVec(8)).unwrap();
    let zero = SymExpr::bv(Word::zero(8));
    let is_zero = be.word_eq(&x, &zero).unwrap();

    // if x == 0 then 0 else 100 / x
    let hundred = SymExpr::bv(Word::new(8, &BigInt::from(100)));
    let result = run(&be, |f| {
        branch(
            &be,
            f,
            &is_zero,
            |_| Ok(zero.clone()),
            |f| be.word_udiv(f, &hundred, &x),
            |be, c, a, b| be.ite_word(c, &a, &b),
        )
    })
    .unwrap();
    assert_eq!(
        result.safety().unwrap().to_string(),
        "(ite (= x #x00) true (not (= x #x00)))"
    );
    assert_eq!(
        result.value().unwrap().to_string(),
        "(ite (= x #x00) #x00 (bvudiv #x64 x))"
    );

    // an arm that always fails leaves the other arm's guard
    let result = run(&be, |f| {
        branch(
            &be,
            f,
            &is_zero,
            |f| be.word_udiv(f, &hundred, &zero),
            |_| Ok(x.clone()),
            |be, c, a, b| be.ite_word(c, &a, &b),
        )
    })
    .unwrap();
    assert_eq!(result.safety().unwrap().to_string(), "(not (= x #x00))");
    assert_eq!(result.value(), Some(&x));
}

#[test]
fn test_value_merge_is_structural() {
    let be = SymBackend::default();
    let c = be.declare_input("c", Sort::Bool).unwrap();
    let pair = |b: bool| {
        Value::<SymBackend>::Tuple(vec![
            Value::Bit(SymExpr::Bool(b)),
            Value::Integer(SymExpr::int(1)),
        ])
    };
    let (x, y) = (pair(true), pair(false));
    let merged = merge_value(&be, &c, x, y).unwrap();
    let items = merged.as_items().unwrap();
    assert_eq!(items[0].as_bit().unwrap(), &c);
    assert_eq!(items[1].as_integer().unwrap(), &SymExpr::int(1));
}
