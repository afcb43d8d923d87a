//! Memoized deferred cells.
//!
//! A thunk moves one way through Pending (or Unfilled) to InProgress and
//! then Done. The chain that claims a pending thunk computes it; any other
//! chain forcing it waits on the cell's condition variable. Waits are
//! recorded in a [`WaitGraph`] so that two chains waiting on each other
//! report a cyclic dependency instead of blocking forever.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bitspec_core::{EvalError, EvalResult};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

static NEXT_CHAIN: AtomicU64 = AtomicU64::new(1);
static NEXT_THUNK: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_CHAIN: Cell<Option<ChainId>> = const { Cell::new(None) };
}

/// Identity of one logical call chain.
///
/// Every thread starts with its own chain; a speculative computation runs
/// under a fresh chain for its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(u64);

impl ChainId {
    fn fresh() -> Self {
        ChainId(NEXT_CHAIN.fetch_add(1, Ordering::Relaxed))
    }

    /// The chain of the calling thread
    pub fn current() -> Self {
        CURRENT_CHAIN.with(|current| match current.get() {
            Some(id) => id,
            None => {
                let id = ChainId::fresh();
                current.set(Some(id));
                id
            }
        })
    }
}

/// Runs the calling thread under a fresh chain until dropped
pub(crate) struct ChainScope {
    previous: Option<ChainId>,
}

impl ChainScope {
    pub(crate) fn enter() -> Self {
        let previous = CURRENT_CHAIN.with(|current| current.replace(Some(ChainId::fresh())));
        Self { previous }
    }
}

impl Drop for ChainScope {
    fn drop(&mut self) {
        CURRENT_CHAIN.with(|current| current.set(self.previous));
    }
}

/// Which chain is blocked on which, and through which thunk
#[derive(Debug, Default)]
pub struct WaitGraph {
    edges: Mutex<HashMap<ChainId, (ChainId, u64)>>,
}

impl WaitGraph {
    /// Record that `waiter` blocks on thunk `thunk` owned by `owner`.
    /// Returns false, recording nothing, when `owner` already waits
    /// (transitively) on `waiter`.
    pub(crate) fn begin_wait(&self, waiter: ChainId, owner: ChainId, thunk: u64) -> bool {
        let mut edges = self.edges.lock();
        let mut cursor = owner;
        for _ in 0..=edges.len() {
            if cursor == waiter {
                return false;
            }
            match edges.get(&cursor) {
                Some((next, _)) => cursor = *next,
                None => break,
            }
        }
        edges.insert(waiter, (owner, thunk));
        true
    }

    pub(crate) fn end_wait(&self, waiter: ChainId) {
        self.edges.lock().remove(&waiter);
    }

    /// Drop every wait on a thunk that has completed
    pub(crate) fn release(&self, thunk: u64) {
        self.edges.lock().retain(|_, (_, t)| *t != thunk);
    }

    pub fn waiting(&self) -> usize {
        self.edges.lock().len()
    }
}

type Compute<T> = Box<dyn FnOnce() -> EvalResult<T> + Send>;
type Fallback<T> = Arc<dyn Fn() -> EvalResult<T> + Send + Sync>;

enum State<T> {
    Pending(Compute<T>),
    Unfilled,
    InProgress(ChainId),
    Done(EvalResult<T>),
}

impl<T> State<T> {
    fn label(&self) -> &'static str {
        match self {
            State::Pending(_) => "pending",
            State::Unfilled => "unfilled",
            State::InProgress(_) => "in progress",
            State::Done(_) => "done",
        }
    }
}

struct ThunkCell<T> {
    id: u64,
    name: String,
    state: Mutex<State<T>>,
    ready: Condvar,
    fallback: Option<Fallback<T>>,
    waits: Arc<WaitGraph>,
}

/// What a force must do once the state lock is released
enum Step<T> {
    Return(EvalResult<T>),
    Compute(Compute<T>),
    Fallback(Fallback<T>),
}

/// A shared handle to a deferred, memoized computation
pub struct Thunk<T> {
    cell: Arc<ThunkCell<T>>,
}

impl<T> Clone for Thunk<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Thunk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thunk")
            .field("name", &self.cell.name)
            .field("state", &self.cell.state.lock().label())
            .finish()
    }
}

impl<T> Thunk<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn with_state(
        name: String,
        waits: Arc<WaitGraph>,
        state: State<T>,
        fallback: Option<Fallback<T>>,
    ) -> Self {
        Self {
            cell: Arc::new(ThunkCell {
                id: NEXT_THUNK.fetch_add(1, Ordering::Relaxed),
                name,
                state: Mutex::new(state),
                ready: Condvar::new(),
                fallback,
                waits,
            }),
        }
    }

    pub(crate) fn done(name: String, waits: Arc<WaitGraph>, value: T) -> Self {
        Self::with_state(name, waits, State::Done(Ok(value)), None)
    }

    pub(crate) fn pending(
        name: String,
        waits: Arc<WaitGraph>,
        compute: Compute<T>,
        fallback: Option<Fallback<T>>,
    ) -> Self {
        Self::with_state(name, waits, State::Pending(compute), fallback)
    }

    pub(crate) fn unfilled(name: String, waits: Arc<WaitGraph>) -> Self {
        Self::with_state(name, waits, State::Unfilled, None)
    }

    pub fn name(&self) -> &str {
        &self.cell.name
    }

    pub fn is_done(&self) -> bool {
        matches!(*self.cell.state.lock(), State::Done(_))
    }

    /// The value of the thunk, computing it if nobody has yet.
    ///
    /// Errors are memoized like values. Forcing a thunk from inside its own
    /// computation runs the fallback if there is one and fails with
    /// `LoopError` otherwise; so does forcing an unfilled hole.
    pub fn force(&self) -> EvalResult<T> {
        let me = ChainId::current();
        let step = self.next_step(me)?;
        match step {
            Step::Return(result) => result,
            Step::Fallback(fallback) => {
                trace!(thunk = %self.cell.name, "re-entrant force, using fallback");
                fallback()
            }
            Step::Compute(compute) => {
                trace!(thunk = %self.cell.name, "computing");
                let result = compute();
                self.complete(result.clone());
                result
            }
        }
    }

    fn next_step(&self, me: ChainId) -> EvalResult<Step<T>> {
        let cell = &self.cell;
        let mut state = cell.state.lock();
        loop {
            if let Some(compute) = take_pending(&mut state, me) {
                return Ok(Step::Compute(compute));
            }
            match &*state {
                State::Done(result) => return Ok(Step::Return(result.clone())),
                State::Unfilled => {
                    debug!(thunk = %cell.name, "forced an unfilled hole");
                    return Ok(Step::Return(Err(EvalError::LoopError(cell.name.clone()))));
                }
                State::InProgress(owner) if *owner == me => {
                    return Ok(match &cell.fallback {
                        Some(fallback) => Step::Fallback(Arc::clone(fallback)),
                        None => {
                            debug!(thunk = %cell.name, "thunk depends on itself");
                            Step::Return(Err(EvalError::LoopError(cell.name.clone())))
                        }
                    });
                }
                State::InProgress(owner) => {
                    let owner = *owner;
                    if !cell.waits.begin_wait(me, owner, cell.id) {
                        warn!(thunk = %cell.name, "cyclic wait between evaluation chains");
                        return Ok(Step::Return(Err(EvalError::LoopError(cell.name.clone()))));
                    }
                    cell.ready.wait(&mut state);
                    cell.waits.end_wait(me);
                }
                State::Pending(_) => {
                    return Err(EvalError::internal(format!(
                        "thunk {} could not be claimed",
                        cell.name
                    )))
                }
            }
        }
    }

    fn complete(&self, result: EvalResult<T>) {
        let cell = &self.cell;
        {
            let mut state = cell.state.lock();
            *state = State::Done(result);
            cell.ready.notify_all();
        }
        cell.waits.release(cell.id);
    }

    /// Compute the thunk under a fresh chain if nobody has claimed it
    pub(crate) fn run_speculatively(&self) {
        let _scope = ChainScope::enter();
        let me = ChainId::current();
        let compute = take_pending(&mut self.cell.state.lock(), me);
        if let Some(compute) = compute {
            trace!(thunk = %self.cell.name, "computing speculatively");
            self.complete(compute());
        }
    }
}

fn take_pending<T>(state: &mut State<T>, owner: ChainId) -> Option<Compute<T>> {
    if !matches!(state, State::Pending(_)) {
        return None;
    }
    match std::mem::replace(state, State::InProgress(owner)) {
        State::Pending(compute) => Some(compute),
        other => {
            *state = other;
            None
        }
    }
}

/// Supplies the computation of a declared hole
pub struct HoleFiller<T> {
    thunk: Thunk<T>,
}

impl<T> HoleFiller<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(thunk: Thunk<T>) -> Self {
        Self { thunk }
    }

    pub fn fill<F>(self, compute: F) -> EvalResult<()>
    where
        F: FnOnce() -> EvalResult<T> + Send + 'static,
    {
        let mut state = self.thunk.cell.state.lock();
        match &*state {
            State::Unfilled => {
                *state = State::Pending(Box::new(compute));
                Ok(())
            }
            other => Err(EvalError::internal(format!(
                "hole {} filled while {}",
                self.thunk.cell.name,
                other.label()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_scope_restores_previous_chain() {
        let outer = ChainId::current();
        {
            let _scope = ChainScope::enter();
            assert_ne!(ChainId::current(), outer);
        }
        assert_eq!(ChainId::current(), outer);
    }

    #[test]
    fn test_wait_graph_detects_cycle() {
        let graph = WaitGraph::default();
        let (a, b, c) = (ChainId(901), ChainId(902), ChainId(903));
        assert!(graph.begin_wait(a, b, 1));
        assert!(graph.begin_wait(b, c, 2));
        assert!(!graph.begin_wait(c, a, 3));
        assert_eq!(graph.waiting(), 2);

        graph.release(2);
        assert!(graph.begin_wait(c, a, 3));
        graph.end_wait(c);
        graph.end_wait(a);
        assert_eq!(graph.waiting(), 0);
    }

    #[test]
    fn test_hole_cannot_be_filled_twice() {
        let waits = Arc::new(WaitGraph::default());
        let thunk: Thunk<u32> = Thunk::unfilled("h".to_string(), waits);
        HoleFiller::new(thunk.clone()).fill(|| Ok(3)).unwrap();
        let err = HoleFiller::new(thunk.clone()).fill(|| Ok(4)).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(thunk.force().unwrap(), 3);
    }

    #[test]
    fn test_errors_are_memoized() {
        let waits = Arc::new(WaitGraph::default());
        let thunk: Thunk<u32> = Thunk::pending(
            "e".to_string(),
            waits,
            Box::new(|| Err(EvalError::DivideByZero)),
            None,
        );
        assert_eq!(thunk.force(), Err(EvalError::DivideByZero));
        assert!(thunk.is_done());
        assert_eq!(thunk.force(), Err(EvalError::DivideByZero));
    }
}
