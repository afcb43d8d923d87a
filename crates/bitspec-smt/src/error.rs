//! Error types for building solver expressions

use bitspec_core::EvalError;
use thiserror::Error;

use crate::expr::Sort;

/// Errors raised while building or rendering solver expressions.
///
/// All of them indicate an ill-formed term, so they surface to the
/// evaluator as fatal internal errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmtError {
    #[error("sort mismatch in {op}: expected {expected}, got {actual}")]
    SortMismatch {
        op: String,
        expected: String,
        actual: Sort,
    },

    #[error("bit-vector width mismatch in {op}: {left} vs {right}")]
    WidthMismatch { op: String, left: u32, right: u32 },

    #[error("extract [{hi}:{lo}] out of range for width {width}")]
    InvalidExtract { hi: u32, lo: u32, width: u32 },

    #[error("{op} takes {expected} arguments, got {actual}")]
    Arity {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("symbol {name} declared with sorts {first} and {second}")]
    DeclarationConflict {
        name: String,
        first: String,
        second: String,
    },
}

/// Result type for expression construction
pub type SmtResult<T> = Result<T, SmtError>;

impl From<SmtError> for EvalError {
    fn from(err: SmtError) -> Self {
        EvalError::internal(err.to_string())
    }
}
