//! Complete SMT-LIB scripts
//!
//! A [`SolverQuery`] collects the free symbols of its assertions, so the
//! rendered script declares every variable, witness and uninterpreted
//! function it mentions. Running the script is up to the caller.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::error::{SmtError, SmtResult};
use crate::expr::{Sort, SymExpr};

/// What the script asks of the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// `unsat` means the goal is valid
    Prove,
    /// `sat` means the goal has a model
    Satisfy,
}

/// Free symbols of a set of expressions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    constants: BTreeMap<String, Sort>,
    functions: BTreeMap<String, (Vec<Sort>, Sort)>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the symbols of `expr`
    pub fn collect(&mut self, expr: &SymExpr) -> SmtResult<()> {
        let mut result = Ok(());
        expr.for_each_node(&mut |node| {
            if result.is_err() {
                return;
            }
            result = match node {
                SymExpr::Var(v) => self.declare_constant(&v.name, &v.sort),
                SymExpr::App(name, args, sort) => {
                    let arg_sorts = args.iter().map(|a| a.sort()).collect();
                    self.declare_function(name, arg_sorts, sort)
                }
                _ => Ok(()),
            };
        });
        result
    }

    fn declare_constant(&mut self, name: &str, sort: &Sort) -> SmtResult<()> {
        match self.constants.get(name) {
            Some(existing) if existing != sort => Err(SmtError::DeclarationConflict {
                name: name.to_string(),
                first: existing.to_string(),
                second: sort.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.constants.insert(name.to_string(), sort.clone());
                Ok(())
            }
        }
    }

    fn declare_function(&mut self, name: &str, args: Vec<Sort>, sort: &Sort) -> SmtResult<()> {
        let render = |args: &[Sort], sort: &Sort| {
            let args: Vec<String> = args.iter().map(Sort::to_string).collect();
            format!("({}) {}", args.join(" "), sort)
        };
        match self.functions.get(name) {
            Some((a, s)) if *a != args || s != sort => Err(SmtError::DeclarationConflict {
                name: name.to_string(),
                first: render(a, s),
                second: render(&args, sort),
            }),
            Some(_) => Ok(()),
            None => {
                self.functions.insert(name.to_string(), (args, sort.clone()));
                Ok(())
            }
        }
    }

    pub fn constants(&self) -> impl Iterator<Item = (&str, &Sort)> {
        self.constants.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &[Sort], &Sort)> {
        self.functions
            .iter()
            .map(|(n, (args, s))| (n.as_str(), args.as_slice(), s))
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty() && self.functions.is_empty()
    }
}

/// A self-contained solver script
#[derive(Debug, Clone)]
pub struct SolverQuery {
    kind: QueryKind,
    declarations: Declarations,
    definitions: Vec<SymExpr>,
    goal: SymExpr,
}

impl SolverQuery {
    /// Ask whether `goal` holds in every model of `definitions`
    pub fn prove(goal: SymExpr, definitions: Vec<SymExpr>) -> SmtResult<Self> {
        Self::build(QueryKind::Prove, goal, definitions)
    }

    /// Ask whether `goal` holds in some model of `definitions`
    pub fn satisfy(goal: SymExpr, definitions: Vec<SymExpr>) -> SmtResult<Self> {
        Self::build(QueryKind::Satisfy, goal, definitions)
    }

    fn build(kind: QueryKind, goal: SymExpr, definitions: Vec<SymExpr>) -> SmtResult<Self> {
        let mut declarations = Declarations::new();
        for term in definitions.iter().chain(std::iter::once(&goal)) {
            let sort = term.sort();
            if sort != Sort::Bool {
                return Err(SmtError::SortMismatch {
                    op: "assert".to_string(),
                    expected: Sort::Bool.to_string(),
                    actual: sort,
                });
            }
            declarations.collect(term)?;
        }
        debug!(
            ?kind,
            definitions = definitions.len(),
            goal_nodes = goal.node_count(),
            "built solver query"
        );
        Ok(Self {
            kind,
            declarations,
            definitions,
            goal,
        })
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn goal(&self) -> &SymExpr {
        &self.goal
    }

    pub fn definitions(&self) -> &[SymExpr] {
        &self.definitions
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    /// The answer when the goal folded to a literal and no solver is needed.
    /// Definitions are assumed satisfiable.
    pub fn trivial_answer(&self) -> Option<bool> {
        self.goal.as_bool()
    }

    /// Render as an SMT-LIB 2 script
    pub fn to_smtlib(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SolverQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "(set-logic ALL)")?;
        for (name, sort) in self.declarations.constants() {
            writeln!(f, "(declare-const {name} {sort})")?;
        }
        for (name, args, sort) in self.declarations.functions() {
            let args: Vec<String> = args.iter().map(Sort::to_string).collect();
            writeln!(f, "(declare-fun {name} ({}) {sort})", args.join(" "))?;
        }
        for def in &self.definitions {
            writeln!(f, "(assert {def})")?;
        }
        match self.kind {
            QueryKind::Prove => writeln!(f, "(assert (not {}))", self.goal)?,
            QueryKind::Satisfy => writeln!(f, "(assert {})", self.goal)?,
        }
        writeln!(f, "(check-sat)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prove_script() {
        let x = SymExpr::var("x", Sort::Int);
        let z = SymExpr::var("witness_0", Sort::Int);
        let def = SymExpr::eq(SymExpr::mul(x.clone(), z.clone()), SymExpr::int(1)).unwrap();
        let goal = SymExpr::lt(z, SymExpr::app("f", vec![x], Sort::Int));
        let query = SolverQuery::prove(goal, vec![def]).unwrap();
        let script = query.to_smtlib();
        assert_eq!(
            script,
            "(set-logic ALL)\n\
             (declare-const witness_0 Int)\n\
             (declare-const x Int)\n\
             (declare-fun f (Int) Int)\n\
             (assert (= (* x witness_0) 1))\n\
             (assert (not (< witness_0 (f x))))\n\
             (check-sat)\n"
        );
        assert_eq!(query.trivial_answer(), None);
    }

    #[test]
    fn test_satisfy_script_and_trivial_goal() {
        let query = SolverQuery::satisfy(SymExpr::Bool(true), Vec::new()).unwrap();
        assert_eq!(query.trivial_answer(), Some(true));
        assert!(query.declarations().is_empty());
        assert!(query.to_smtlib().contains("(assert true)"));
    }

    #[test]
    fn test_rejects_ill_sorted_goal() {
        let err = SolverQuery::prove(SymExpr::int(3), Vec::new()).unwrap_err();
        assert!(matches!(err, SmtError::SortMismatch { .. }));
    }

    #[test]
    fn test_conflicting_declarations() {
        let a = SymExpr::var("a", Sort::Int);
        let b = SymExpr::var("a", Sort::Bool);
        let goal = SymExpr::and(SymExpr::lt(a, SymExpr::int(0)), b);
        let err = SolverQuery::prove(goal, Vec::new()).unwrap_err();
        assert!(matches!(err, SmtError::DeclarationConflict { .. }));
    }
}
