//! Solver expressions for the symbolic engine
//!
//! - [`SymExpr`]: literal-folding term DAG over booleans, integers, reals,
//!   bit vectors and IEEE floats, with SMT-LIB 2 rendering
//! - [`SolverQuery`]: a complete script with declarations, definitional
//!   equations and a goal
//!
//! Only the script text is produced here; talking to a solver process is
//! left to the caller.

mod error;
mod expr;
mod query;
mod render;
mod rewrite;

pub use error::{SmtError, SmtResult};
pub use expr::{Sort, SymExpr, SymOp, SymVar};
pub use query::{Declarations, QueryKind, SolverQuery};
