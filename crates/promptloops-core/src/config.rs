use promptloops_eval::{Evaluator, MatchPolicy};
use serde::{Deserialize, Serialize};

use crate::LoopError;

/// Settings for one optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Iteration budget
    pub loop_count: usize,
    /// Past iterations shown to the mentor
    pub window_size: usize,
    /// In-flight extraction calls per iteration
    pub concurrency: usize,
    /// Field errors listed per history entry
    pub top_errors: usize,
    /// Concrete mismatches kept per iteration
    pub max_error_examples: usize,
    /// Source excerpt length in mismatch examples
    pub excerpt_chars: usize,
    pub match_policy: MatchPolicy,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            loop_count: 3,
            window_size: 2,
            concurrency: 4,
            top_errors: 5,
            max_error_examples: 10,
            excerpt_chars: 200,
            match_policy: MatchPolicy::default(),
        }
    }
}

impl OptimizerConfig {
    /// Build from untrusted signed values (CLI, environment)
    pub fn from_signed(loop_count: i64, window_size: i64) -> Result<Self, LoopError> {
        if loop_count < 1 {
            return Err(LoopError::InvalidConfiguration(format!(
                "loop_count must be at least 1, got {}",
                loop_count
            )));
        }
        if window_size < 0 {
            return Err(LoopError::InvalidConfiguration(format!(
                "window_size must not be negative, got {}",
                window_size
            )));
        }
        let config = Self {
            loop_count: usize::try_from(loop_count)
                .map_err(|e| LoopError::InvalidConfiguration(e.to_string()))?,
            window_size: usize::try_from(window_size)
                .map_err(|e| LoopError::InvalidConfiguration(e.to_string()))?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if self.loop_count < 1 {
            return Err(LoopError::InvalidConfiguration(
                "loop_count must be at least 1".into(),
            ));
        }
        if self.concurrency < 1 {
            return Err(LoopError::InvalidConfiguration(
                "concurrency must be at least 1".into(),
            ));
        }
        let tolerance = self.match_policy.numeric_tolerance;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(LoopError::InvalidConfiguration(
                "numeric_tolerance must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    pub fn with_loop_count(mut self, loop_count: usize) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    /// Evaluator carrying this run's match policy and example bounds
    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.match_policy)
            .with_max_examples(self.max_error_examples)
            .with_excerpt_chars(self.excerpt_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OptimizerConfig::default();
        assert_eq!(config.loop_count, 3);
        assert_eq!(config.window_size, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_signed_rejects_bad_values() {
        assert!(matches!(
            OptimizerConfig::from_signed(0, 2),
            Err(LoopError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            OptimizerConfig::from_signed(-3, 2),
            Err(LoopError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            OptimizerConfig::from_signed(3, -1),
            Err(LoopError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_from_signed_accepts_zero_window() {
        let config = OptimizerConfig::from_signed(1, 0).unwrap();
        assert_eq!(config.loop_count, 1);
        assert_eq!(config.window_size, 0);
    }

    #[test]
    fn test_validate_concurrency_and_tolerance() {
        assert!(OptimizerConfig::default().with_concurrency(0).validate().is_err());

        let mut policy = MatchPolicy::default();
        policy.numeric_tolerance = f64::NAN;
        assert!(OptimizerConfig::default()
            .with_match_policy(policy)
            .validate()
            .is_err());
    }
}
