//! Rebuilding terms through the folding constructors

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{SmtError, SmtResult};
use crate::expr::{SymExpr, SymOp};

fn take<const N: usize>(op: SymOp, args: Vec<SymExpr>) -> SmtResult<[SymExpr; N]> {
    let actual = args.len();
    args.try_into().map_err(|_| SmtError::Arity {
        op: op.to_string(),
        expected: N,
        actual,
    })
}

impl SymExpr {
    /// Apply `op` to `args` with the same folding and sort checks as the
    /// named constructors
    pub fn rebuild(op: SymOp, args: Vec<SymExpr>) -> SmtResult<Self> {
        use SymOp::*;
        Ok(match op {
            Not => {
                let [a] = take(op, args)?;
                SymExpr::not(a)
            }
            And | Or | Xor | Implies | Add | Sub | Mul | Div | Mod | Lt | Le | RealMul
            | RealDiv => {
                let [a, b] = take(op, args)?;
                match op {
                    And => SymExpr::and(a, b),
                    Or => SymExpr::or(a, b),
                    Xor => SymExpr::xor(a, b),
                    Implies => SymExpr::implies(a, b),
                    Add => SymExpr::add(a, b),
                    Sub => SymExpr::sub(a, b),
                    Mul => SymExpr::mul(a, b),
                    Div => SymExpr::div_euclid(a, b),
                    Mod => SymExpr::mod_euclid(a, b),
                    Lt => SymExpr::lt(a, b),
                    Le => SymExpr::le(a, b),
                    RealMul => SymExpr::real_mul(a, b),
                    _ => SymExpr::real_div(a, b),
                }
            }
            Eq => {
                let [a, b] = take(op, args)?;
                SymExpr::eq(a, b)?
            }
            Ite => {
                let [c, t, e] = take(op, args)?;
                SymExpr::ite(c, t, e)?
            }
            Neg | ToReal | ToInt => {
                let [a] = take(op, args)?;
                match op {
                    Neg => SymExpr::neg(a),
                    ToReal => SymExpr::to_real(a),
                    _ => SymExpr::to_int(a),
                }
            }
            BvNot | BvNeg => {
                let [a] = take(op, args)?;
                match op {
                    BvNot => SymExpr::bvnot(a)?,
                    _ => SymExpr::bvneg(a)?,
                }
            }
            BvAnd | BvOr | BvXor | BvAdd | BvSub | BvMul | BvUdiv | BvUrem | BvSdiv | BvSrem
            | BvShl | BvLshr | BvAshr | BvUlt | BvUle | BvSlt | BvSle | Concat => {
                let [a, b] = take(op, args)?;
                match op {
                    BvAnd => SymExpr::bvand(a, b)?,
                    BvOr => SymExpr::bvor(a, b)?,
                    BvXor => SymExpr::bvxor(a, b)?,
                    BvAdd => SymExpr::bvadd(a, b)?,
                    BvSub => SymExpr::bvsub(a, b)?,
                    BvMul => SymExpr::bvmul(a, b)?,
                    BvUdiv => SymExpr::bvudiv(a, b)?,
                    BvUrem => SymExpr::bvurem(a, b)?,
                    BvSdiv => SymExpr::bvsdiv(a, b)?,
                    BvSrem => SymExpr::bvsrem(a, b)?,
                    BvShl => SymExpr::bvshl(a, b)?,
                    BvLshr => SymExpr::bvlshr(a, b)?,
                    BvAshr => SymExpr::bvashr(a, b)?,
                    BvUlt => SymExpr::bvult(a, b)?,
                    BvUle => SymExpr::bvule(a, b)?,
                    BvSlt => SymExpr::bvslt(a, b)?,
                    BvSle => SymExpr::bvsle(a, b)?,
                    _ => SymExpr::concat(a, b)?,
                }
            }
            Extract(hi, lo) => {
                let [a] = take(op, args)?;
                SymExpr::extract(a, hi, lo)?
            }
            ZeroExtend(n) => {
                let [a] = take(op, args)?;
                SymExpr::zero_extend(a, n)?
            }
            SignExtend(n) => {
                let [a] = take(op, args)?;
                SymExpr::sign_extend(a, n)?
            }
            Bv2Nat => {
                let [a] = take(op, args)?;
                SymExpr::bv2nat(a)?
            }
            Int2Bv(width) => {
                let [a] = take(op, args)?;
                SymExpr::int2bv(width, a)?
            }
            FpAdd | FpSub | FpMul | FpDiv => {
                let [rm, a, b] = take(op, args)?;
                match op {
                    FpAdd => SymExpr::fp_add(rm, a, b)?,
                    FpSub => SymExpr::fp_sub(rm, a, b)?,
                    FpMul => SymExpr::fp_mul(rm, a, b)?,
                    _ => SymExpr::fp_div(rm, a, b)?,
                }
            }
            FpNeg => {
                let [a] = take(op, args)?;
                SymExpr::fp_neg(a)?
            }
            FpIsNaN | FpIsInfinite | FpIsZero | FpIsNegative | FpIsNormal | FpIsSubnormal => {
                let [a] = take(op, args)?;
                SymExpr::fp_test(op, a)?
            }
            FpEq | FpLt | FpLeq => {
                let [a, b] = take(op, args)?;
                SymExpr::fp_compare(op, a, b)?
            }
            FpToReal => {
                let [a] = take(op, args)?;
                SymExpr::fp_to_real(a)?
            }
            FpRoundToIntegral => {
                let [rm, a] = take(op, args)?;
                SymExpr::fp_round_to_integral(rm, a)?
            }
            ToFpFromBits(fmt) => {
                let [a] = take(op, args)?;
                SymExpr::to_fp_from_bits(fmt, a)?
            }
            ToFpFromReal(fmt) => {
                let [rm, a] = take(op, args)?;
                SymExpr::to_fp_from_real(fmt, rm, a)?
            }
        })
    }

    /// Replace the variable `name` by `value` and fold what becomes literal
    pub fn substitute(&self, name: &str, value: &SymExpr) -> SmtResult<Self> {
        let mut done = HashMap::new();
        self.substitute_in(name, value, &mut done)
    }

    fn substitute_in(
        &self,
        name: &str,
        value: &SymExpr,
        done: &mut HashMap<*const SymExpr, SymExpr>,
    ) -> SmtResult<Self> {
        let mut args_of = |args: &[Arc<SymExpr>]| -> SmtResult<Vec<SymExpr>> {
            args.iter()
                .map(|arg| {
                    let key = Arc::as_ptr(arg);
                    if let Some(e) = done.get(&key) {
                        return Ok(e.clone());
                    }
                    let e = arg.substitute_in(name, value, done)?;
                    done.insert(key, e.clone());
                    Ok(e)
                })
                .collect()
        };
        match self {
            SymExpr::Var(v) if v.name == name => {
                value.expect_sort("substitute", &v.sort)?;
                Ok(value.clone())
            }
            SymExpr::Op(op, args) => SymExpr::rebuild(*op, args_of(args)?),
            SymExpr::App(f, args, sort) => {
                Ok(SymExpr::app(f.clone(), args_of(args)?, sort.clone()))
            }
            leaf => Ok(leaf.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Sort;
    use num_bigint::BigInt;

    fn x() -> SymExpr {
        SymExpr::var("x", Sort::Int)
    }

    #[test]
    fn test_substitution_folds() {
        let e = SymExpr::ite(
            SymExpr::lt(x(), SymExpr::int(0)),
            SymExpr::neg(x()),
            SymExpr::mod_euclid(x(), SymExpr::int(7)),
        )
        .unwrap();
        assert_eq!(e.substitute("x", &SymExpr::int(-3)).unwrap(), SymExpr::int(3));
        assert_eq!(e.substitute("x", &SymExpr::int(23)).unwrap(), SymExpr::int(2));
        // other variables are left alone
        assert_eq!(e.substitute("y", &SymExpr::int(1)).unwrap(), e);
    }

    #[test]
    fn test_substitution_reaches_function_arguments() {
        let f = SymExpr::app("f", vec![SymExpr::add(x(), SymExpr::int(1))], Sort::Int);
        let g = f.substitute("x", &SymExpr::int(4)).unwrap();
        assert_eq!(g.to_string(), "(f 5)");
    }

    #[test]
    fn test_substitution_checks_sorts() {
        let err = x().substitute("x", &SymExpr::Bool(true)).unwrap_err();
        assert!(matches!(err, SmtError::SortMismatch { .. }));
    }

    #[test]
    fn test_rebuild_checks_arity() {
        let err = SymExpr::rebuild(SymOp::Add, vec![x()]).unwrap_err();
        assert_eq!(
            err,
            SmtError::Arity {
                op: "+".to_string(),
                expected: 2,
                actual: 1
            }
        );
        let word = SymExpr::bv_lit(8, &BigInt::from(3));
        let sum = SymExpr::rebuild(SymOp::BvAdd, vec![word.clone(), word]).unwrap();
        assert_eq!(sum, SymExpr::bv_lit(8, &BigInt::from(6)));
    }
}
