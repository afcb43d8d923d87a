//! Session state of the symbolic engine

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bitspec_smt::{SmtError, SmtResult, Sort, SymExpr};
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Constraints every solver query of a session assumes.
///
/// Equations enter unconditionally, whatever path created them, and are
/// never retracted.
#[derive(Debug, Default)]
pub struct DefinitionalStore {
    conjuncts: Mutex<Vec<SymExpr>>,
}

impl DefinitionalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, pred: SymExpr) {
        if pred.as_bool() == Some(true) {
            return;
        }
        debug!(nodes = pred.node_count(), "definitional equation");
        trace!(%pred, "definitional equation");
        self.conjuncts.lock().push(pred);
    }

    pub fn conjuncts(&self) -> Vec<SymExpr> {
        self.conjuncts.lock().clone()
    }

    /// Conjunction of everything added so far
    pub fn predicate(&self) -> SymExpr {
        SymExpr::and_all(self.conjuncts())
    }

    pub fn len(&self) -> usize {
        self.conjuncts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conjuncts.lock().is_empty()
    }
}

/// Names of the free variables of a session
#[derive(Debug)]
pub struct VarRegistry {
    prefix: String,
    next: AtomicU64,
    sorts: Mutex<BTreeMap<String, Sort>>,
}

impl VarRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
            sorts: Mutex::new(BTreeMap::new()),
        }
    }

    /// A named input. Declaring a name twice with one sort returns the
    /// same variable.
    pub fn declare(&self, name: &str, sort: Sort) -> SmtResult<SymExpr> {
        let mut sorts = self.sorts.lock();
        match sorts.get(name) {
            Some(existing) if *existing != sort => Err(SmtError::DeclarationConflict {
                name: name.to_string(),
                first: existing.to_string(),
                second: sort.to_string(),
            }),
            Some(_) => Ok(SymExpr::var(name, sort)),
            None => {
                sorts.insert(name.to_string(), sort.clone());
                Ok(SymExpr::var(name, sort))
            }
        }
    }

    /// A variable whose name nobody has used yet
    pub fn fresh(&self, sort: Sort) -> SymExpr {
        let mut sorts = self.sorts.lock();
        loop {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            let name = format!("{}_{n}", self.prefix);
            if !sorts.contains_key(&name) {
                sorts.insert(name.clone(), sort.clone());
                return SymExpr::var(name, sort);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sorts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorts.lock().is_empty()
    }
}
