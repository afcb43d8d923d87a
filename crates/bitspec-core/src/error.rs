//! Error types for evaluation

use thiserror::Error;

/// Result type alias for evaluation steps
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Errors raised while evaluating an expression.
///
/// Every variant except [`EvalError::Internal`] is caused by user data and is
/// recoverable: the symbolic engine turns it into a `PartialResult::Error`
/// and merges it across branches. `Internal` marks a broken invariant (a
/// width mismatch, a zero modulus, an ill-typed primitive call) and aborts
/// the evaluation wherever it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Zero divisor, zero modulus operand, or a non-invertible element
    #[error("division by zero")]
    DivideByZero,

    /// Rounding-mode code outside 0..=4
    #[error("invalid rounding mode: {0}")]
    BadRoundingMode(u64),

    /// A rounding-mode word that is not a literal may hold a code outside
    /// 0..=4
    #[error("symbolic rounding mode may be outside 0..=4")]
    BadSymbolicRoundingMode,

    /// NaN or infinity fed to an operation that needs a finite value
    #[error("invalid value for {0}: expected a finite floating point value")]
    BadValue(String),

    /// The active engine cannot realize this operation on symbolic inputs
    #[error("operation '{0}' is not supported on symbolic values")]
    UnsupportedSymbolicOp(String),

    /// A value depends on itself
    #[error("<<loop>> cyclic dependency while evaluating '{0}'")]
    LoopError(String),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

impl EvalError {
    /// Build an internal (fatal) error
    pub fn internal(msg: impl Into<String>) -> Self {
        EvalError::Internal(msg.into())
    }

    /// Whether this error must abort evaluation regardless of branch context
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvalError::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EvalError::internal("width mismatch").is_fatal());
        assert!(!EvalError::DivideByZero.is_fatal());
        assert!(!EvalError::BadRoundingMode(5).is_fatal());
        assert!(!EvalError::BadSymbolicRoundingMode.is_fatal());
        assert!(!EvalError::LoopError("x".to_string()).is_fatal());
    }

    #[test]
    fn test_display() {
        assert_eq!(EvalError::BadRoundingMode(5).to_string(), "invalid rounding mode: 5");
        assert_eq!(
            EvalError::BadSymbolicRoundingMode.to_string(),
            "symbolic rounding mode may be outside 0..=4"
        );
        assert_eq!(
            EvalError::UnsupportedSymbolicOp("random".to_string()).to_string(),
            "operation 'random' is not supported on symbolic values"
        );
    }
}
