//! Value algebra for a bit-precise specification language
//!
//! This crate holds the engine-independent pieces of the evaluation core:
//!
//! - [`Word`]: fixed-width bit vectors, including the empty word
//! - [`FloatValue`]: exactly rounded floats of any `Float e p` format
//! - [`RoundingMode`]: the five IEEE modes and their 3-bit encoding
//! - [`arith`]: floor division and modular integer arithmetic
//! - [`PartialResult`]: a value paired with its safety predicate
//! - [`EvalError`] and [`EvalConfig`]
//!
//! The engines that build on these live in `bitspec-eval`.

pub mod arith;
mod config;
mod error;
mod float;
mod partial;
mod rounding;
mod word;

pub use config::EvalConfig;
pub use error::{EvalError, EvalResult};
pub use float::{FloatFormat, FloatKind, FloatValue};
pub use partial::PartialResult;
pub use rounding::RoundingMode;
pub use word::Word;
