//! Evaluation context: safety frames, partial results and branch merging,
//! plus the factory for thunks, holes and sparks.
//!
//! A computation runs inside a [`Frame`] that accumulates the conjunction of
//! its side conditions. [`run`] turns a computation into a
//! [`PartialResult`]; [`absorb`] feeds one back into an enclosing frame.
//! Recoverable errors travel as `PartialResult::Error`; fatal errors stay in
//! the `Err` channel and are never merged away.

use std::sync::Arc;

use bitspec_core::{EvalConfig, EvalResult, PartialResult};
use tracing::{debug, trace};

use crate::backend::Backend;
use crate::spark::SparkPool;
use crate::thunk::{HoleFiller, Thunk, WaitGraph};

/// The safety predicate of the computation in progress
pub struct Frame<B: Backend> {
    safety: B::Bit,
}

impl<B: Backend> Frame<B> {
    /// A frame with no obligations
    pub fn new(backend: &B) -> Self {
        Self {
            safety: backend.bit_lit(true),
        }
    }

    pub fn safety(&self) -> &B::Bit {
        &self.safety
    }

    /// Add an obligation
    pub fn conjoin(&mut self, backend: &B, pred: &B::Bit) {
        self.safety = backend.bit_and(&self.safety, pred);
    }

    pub fn into_safety(self) -> B::Bit {
        self.safety
    }
}

impl<B: Backend> std::fmt::Debug for Frame<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("safety", &self.safety).finish()
    }
}

/// Partial result over an engine's predicates
pub type Partial<B, T> = PartialResult<<B as Backend>::Bit, T>;

/// Evaluate `compute` in a fresh frame
pub fn run<B, T>(
    backend: &B,
    compute: impl FnOnce(&mut Frame<B>) -> EvalResult<T>,
) -> EvalResult<Partial<B, T>>
where
    B: Backend,
{
    let mut frame = Frame::new(backend);
    match compute(&mut frame) {
        Ok(value) => Ok(PartialResult::ok(frame.into_safety(), value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => Ok(PartialResult::Error(e)),
    }
}

/// Continue in `frame` with the value of `result`, taking on its
/// obligations. An error result short-circuits.
pub fn absorb<B, T>(backend: &B, frame: &mut Frame<B>, result: Partial<B, T>) -> EvalResult<T>
where
    B: Backend,
{
    match result {
        PartialResult::Error(e) => Err(e),
        PartialResult::Result { safety, value } => {
            frame.conjoin(backend, &safety);
            Ok(value)
        }
    }
}

/// Combine the outcomes of the two arms of a conditional on `c`.
///
/// `merge_values` joins two successful values under `c`; a recoverable
/// error from it becomes the merged error. A fatal error in either arm or
/// in `merge_values` is returned as `Err`.
pub fn merge<B, T>(
    backend: &B,
    c: &B::Bit,
    x: Partial<B, T>,
    y: Partial<B, T>,
    merge_values: impl FnOnce(&B, &B::Bit, T, T) -> EvalResult<T>,
) -> EvalResult<Partial<B, T>>
where
    B: Backend,
{
    for arm in [&x, &y] {
        if let Some(e) = arm.error().filter(|e| e.is_fatal()) {
            return Err(e.clone());
        }
    }
    match backend.bit_as_lit(c) {
        Some(true) => return Ok(x),
        Some(false) => return Ok(y),
        None => {}
    }
    let merged = match (x, y) {
        (PartialResult::Error(e), PartialResult::Error(_)) => PartialResult::Error(e),
        (PartialResult::Error(_), PartialResult::Result { safety, value }) => {
            let guard = backend.bit_not(c);
            PartialResult::ok(backend.bit_and(&safety, &guard), value)
        }
        (PartialResult::Result { safety, value }, PartialResult::Error(_)) => {
            PartialResult::ok(backend.bit_and(&safety, c), value)
        }
        (
            PartialResult::Result {
                safety: px,
                value: vx,
            },
            PartialResult::Result {
                safety: py,
                value: vy,
            },
        ) => {
            match merge_values(backend, c, vx, vy) {
                Ok(value) => PartialResult::ok(backend.ite_bit(c, &px, &py)?, value),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => PartialResult::Error(e),
            }
        }
    };
    Ok(merged)
}

/// Evaluate a conditional inside `frame`.
///
/// A condition with a known value runs only the selected arm. Otherwise
/// both arms run in their own frames and are merged.
pub fn branch<B, T>(
    backend: &B,
    frame: &mut Frame<B>,
    c: &B::Bit,
    then_arm: impl FnOnce(&mut Frame<B>) -> EvalResult<T>,
    else_arm: impl FnOnce(&mut Frame<B>) -> EvalResult<T>,
    merge_values: impl FnOnce(&B, &B::Bit, T, T) -> EvalResult<T>,
) -> EvalResult<T>
where
    B: Backend,
{
    match backend.bit_as_lit(c) {
        Some(true) => then_arm(frame),
        Some(false) => else_arm(frame),
        None => {
            trace!(engine = backend.engine_name(), "evaluating both arms of a branch");
            let x = run(backend, then_arm)?;
            let y = run(backend, else_arm)?;
            let merged = merge(backend, c, x, y, merge_values)?;
            absorb(backend, frame, merged)
        }
    }
}

/// Creates the deferred cells of one evaluation session.
///
/// All thunks of a session must come from the same context: cyclic waits
/// between threads are detected on the context's wait graph.
pub struct EvalContext {
    config: EvalConfig,
    waits: Arc<WaitGraph>,
    sparks: SparkPool,
}

impl EvalContext {
    pub fn new(config: EvalConfig) -> EvalResult<Self> {
        let sparks = SparkPool::new(&config)?;
        debug!(
            sparks = sparks.is_enabled(),
            threads = ?config.spark_threads,
            "created evaluation context"
        );
        Ok(Self {
            config,
            waits: Arc::new(WaitGraph::default()),
            sparks,
        })
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// An already evaluated cell
    pub fn ready<T>(&self, name: impl Into<String>, value: T) -> Thunk<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Thunk::done(name.into(), Arc::clone(&self.waits), value)
    }

    /// A cell computed on first force. Forcing it again from inside its own
    /// computation raises `LoopError`.
    pub fn delay<T, F>(&self, name: impl Into<String>, compute: F) -> Thunk<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> EvalResult<T> + Send + 'static,
    {
        Thunk::pending(name.into(), Arc::clone(&self.waits), Box::new(compute), None)
    }

    /// Like [`EvalContext::delay`], but a re-entrant force runs `fallback`
    /// instead of failing. The fallback's result is not memoized.
    pub fn delay_fill<T, F, G>(&self, name: impl Into<String>, compute: F, fallback: G) -> Thunk<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> EvalResult<T> + Send + 'static,
        G: Fn() -> EvalResult<T> + Send + Sync + 'static,
    {
        Thunk::pending(
            name.into(),
            Arc::clone(&self.waits),
            Box::new(compute),
            Some(Arc::new(fallback)),
        )
    }

    /// A cell whose computation is supplied later through the filler.
    /// Forcing it before then raises `LoopError`.
    pub fn declare_hole<T>(&self, name: impl Into<String>) -> (Thunk<T>, HoleFiller<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let thunk = Thunk::unfilled(name.into(), Arc::clone(&self.waits));
        let filler = HoleFiller::new(thunk.clone());
        (thunk, filler)
    }

    /// A cell that a worker may start computing right away. Forcing it
    /// gives the same result as forcing an equivalent [`EvalContext::delay`].
    pub fn spark<T, F>(&self, name: impl Into<String>, compute: F) -> Thunk<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> EvalResult<T> + Send + 'static,
    {
        let thunk = self.delay(name, compute);
        self.sparks.submit(&thunk);
        thunk
    }
}

/// Force a thunk holding a partial result and continue in `frame`
pub fn force_in<B, T>(
    backend: &B,
    frame: &mut Frame<B>,
    thunk: &Thunk<Partial<B, T>>,
) -> EvalResult<T>
where
    B: Backend,
    T: Clone + Send + Sync + 'static,
{
    let result = thunk.force()?;
    absorb(backend, frame, result)
}
