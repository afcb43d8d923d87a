//! Evaluation core for a bit-precise specification language
//!
//! Surface evaluators are written once against the [`Backend`] trait and
//! run on either engine:
//!
//! - [`ConcreteBackend`] computes with literals and decides every side
//!   condition on the spot
//! - [`SymBackend`] builds solver expressions, turns side conditions into
//!   safety predicates, and records witness definitions in a
//!   [`DefinitionalStore`]
//!
//! Partial operations run inside a [`Frame`]; [`run`] packages the outcome
//! as a [`PartialResult`](bitspec_core::PartialResult) and [`merge`] joins
//! the outcomes of two branches. [`EvalContext`] creates the lazy
//! [`Thunk`]s the evaluator shares between expressions, and
//! [`PrimTable`] maps primitive names to engine operations.

pub mod backend;
pub mod concrete;
pub mod context;
pub mod prime_ec;
pub mod prims;
pub mod rational;
mod spark;
pub mod symbolic;
pub mod thunk;
pub mod value;

pub use backend::Backend;
pub use concrete::ConcreteBackend;
pub use context::{absorb, branch, force_in, merge, run, EvalContext, Frame, Partial};
pub use prims::{Prim, PrimTable, PRIM_TABLE_VERSION};
pub use rational::SRational;
pub use spark::SparkPool;
pub use symbolic::{DefinitionalStore, SymBackend, VarRegistry};
pub use thunk::{ChainId, HoleFiller, Thunk, WaitGraph};
pub use value::{merge_value, value_eq, value_le, value_lt, TValue, Value};
