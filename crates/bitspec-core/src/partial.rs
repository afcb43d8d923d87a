//! Partial results: a value paired with the predicate under which it is valid

use crate::error::{EvalError, EvalResult};

/// Outcome of one computation.
///
/// `Result { safety, value }` means `value` is meaningful exactly when
/// `safety` holds. The concrete engine only ever produces `true` predicates;
/// the symbolic engine produces solver expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialResult<P, T> {
    /// The computation fails on every path
    Error(EvalError),
    /// The computation yields `value` whenever `safety` holds
    Result { safety: P, value: T },
}

impl<P, T> PartialResult<P, T> {
    /// Build a successful result
    pub fn ok(safety: P, value: T) -> Self {
        PartialResult::Result { safety, value }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, PartialResult::Error(_))
    }

    /// Get the error, if any
    pub fn error(&self) -> Option<&EvalError> {
        match self {
            PartialResult::Error(e) => Some(e),
            PartialResult::Result { .. } => None,
        }
    }

    /// Get the value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            PartialResult::Error(_) => None,
            PartialResult::Result { value, .. } => Some(value),
        }
    }

    /// Get the safety predicate, if any
    pub fn safety(&self) -> Option<&P> {
        match self {
            PartialResult::Error(_) => None,
            PartialResult::Result { safety, .. } => Some(safety),
        }
    }

    /// Transform the value, keeping the predicate
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PartialResult<P, U> {
        match self {
            PartialResult::Error(e) => PartialResult::Error(e),
            PartialResult::Result { safety, value } => PartialResult::Result {
                safety,
                value: f(value),
            },
        }
    }

    /// Drop the predicate
    pub fn into_result(self) -> EvalResult<T> {
        match self {
            PartialResult::Error(e) => Err(e),
            PartialResult::Result { value, .. } => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let r: PartialResult<bool, u32> = PartialResult::ok(true, 7);
        assert!(!r.is_error());
        assert_eq!(r.value(), Some(&7));
        assert_eq!(r.safety(), Some(&true));
        assert_eq!(r.map(|v| v * 2).into_result(), Ok(14));

        let e: PartialResult<bool, u32> = PartialResult::Error(EvalError::DivideByZero);
        assert!(e.is_error());
        assert_eq!(e.error(), Some(&EvalError::DivideByZero));
        assert_eq!(e.into_result(), Err(EvalError::DivideByZero));
    }
}
