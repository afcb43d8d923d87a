//! Literal folding in the expression builder agrees with the value algebra

use bitspec_core::Word;
use bitspec_smt::{Sort, SymExpr};
use num_bigint::BigInt;
use proptest::prelude::*;

fn lit(width: u32, v: u64) -> SymExpr {
    SymExpr::bv_lit(width, &BigInt::from(v))
}

fn word(width: u32, v: u64) -> Word {
    Word::new(width, &BigInt::from(v))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_bv_arithmetic_folds(width in 1u32..32, a: u64, b: u64) {
        let (x, y) = (word(width, a), word(width, b));
        prop_assert_eq!(
            SymExpr::bvadd(lit(width, a), lit(width, b)).unwrap(),
            SymExpr::bv(x.add(&y).unwrap())
        );
        prop_assert_eq!(
            SymExpr::bvmul(lit(width, a), lit(width, b)).unwrap(),
            SymExpr::bv(x.mul(&y).unwrap())
        );
        prop_assert_eq!(
            SymExpr::bvslt(lit(width, a), lit(width, b)).unwrap(),
            SymExpr::Bool(x.slt(&y).unwrap())
        );
    }

    #[test]
    fn prop_euclidean_division_folds(a in -1000i64..1000, b in -50i64..50) {
        prop_assume!(b != 0);
        let q = SymExpr::div_euclid(SymExpr::int(a), SymExpr::int(b));
        let r = SymExpr::mod_euclid(SymExpr::int(a), SymExpr::int(b));
        let (q, r) = (q.as_int().unwrap().clone(), r.as_int().unwrap().clone());
        prop_assert!(r >= BigInt::from(0) && r < BigInt::from(b.abs()));
        prop_assert_eq!(q * BigInt::from(b) + r, BigInt::from(a));
    }

    #[test]
    fn prop_int2bv_inverts_bv2nat(width in 1u32..40, v: u64) {
        let w = lit(width, v);
        let n = SymExpr::bv2nat(w.clone()).unwrap();
        prop_assert_eq!(SymExpr::int2bv(width, n).unwrap(), w);
    }
}

#[test]
fn symbolic_operands_stay_symbolic() {
    let a = SymExpr::var("a", Sort::BitVec(16));
    let sum = SymExpr::bvadd(a.clone(), lit(16, 1)).unwrap();
    assert!(!sum.is_literal());
    assert_eq!(sum.to_string(), "(bvadd a #x0001)");
    let n = SymExpr::bv2nat(a).unwrap();
    assert_eq!(n.sort(), Sort::Int);
}
