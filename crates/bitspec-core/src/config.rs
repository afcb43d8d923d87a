//! Configuration for an evaluation session

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// Configuration shared by the engines and the evaluation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Schedule sparked computations on a worker pool (default: true).
    /// When disabled, sparked thunks are computed on first force.
    pub sparks_enabled: bool,

    /// Worker threads for sparks (rayon's default when None)
    pub spark_threads: Option<usize>,

    /// Widest word literal an engine accepts
    pub max_word_width: u32,

    /// Name prefix for solver witnesses
    pub witness_prefix: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            sparks_enabled: true,
            spark_threads: None,
            max_word_width: 1 << 20,
            witness_prefix: "witness".to_string(),
        }
    }
}

impl EvalConfig {
    pub fn with_sparks(mut self, enabled: bool) -> Self {
        self.sparks_enabled = enabled;
        self
    }

    pub fn with_spark_threads(mut self, threads: usize) -> Self {
        self.spark_threads = Some(threads);
        self
    }

    pub fn with_max_word_width(mut self, width: u32) -> Self {
        self.max_word_width = width;
        self
    }

    pub fn with_witness_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.witness_prefix = prefix.into();
        self
    }

    /// Fatal error unless a word of `width` bits may be built
    pub fn check_width(&self, width: u32) -> EvalResult<()> {
        if width > self.max_word_width {
            return Err(EvalError::internal(format!(
                "word width {width} exceeds the limit of {}",
                self.max_word_width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_config_default() {
        let config = EvalConfig::default();
        assert!(config.sparks_enabled);
        assert!(config.spark_threads.is_none());
        assert_eq!(config.max_word_width, 1 << 20);
        assert_eq!(config.witness_prefix, "witness");
    }

    #[test]
    fn test_eval_config_builders() {
        let config = EvalConfig::default()
            .with_sparks(false)
            .with_spark_threads(2)
            .with_max_word_width(64)
            .with_witness_prefix("w");
        assert!(!config.sparks_enabled);
        assert_eq!(config.spark_threads, Some(2));
        assert!(config.check_width(64).is_ok());
        assert!(config.check_width(65).unwrap_err().is_fatal());
        assert_eq!(config.witness_prefix, "w");
    }

    #[test]
    fn test_eval_config_serialization() {
        let config = EvalConfig::default().with_spark_threads(4);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EvalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
