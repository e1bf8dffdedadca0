use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::summary::{ErrorSummary, FieldError, FieldErrorKind};
use crate::{ExtractionError, ExtractionResult, MatchPolicy, Sample};

/// Scored iteration: field-level accuracy plus the aggregated errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// correct_fields / total_fields, in [0, 1]
    pub accuracy: f64,
    pub correct_fields: usize,
    pub total_fields: usize,
    /// Per-sample accuracy, in sample order
    pub sample_scores: Vec<f64>,
    pub summary: ErrorSummary,
}

/// Compares extraction results with ground truth. Pure: the same inputs always
/// give the same evaluation.
#[derive(Debug, Clone)]
pub struct Evaluator {
    policy: MatchPolicy,
    max_examples: usize,
    excerpt_chars: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(MatchPolicy::default())
    }
}

impl Evaluator {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            max_examples: 10,
            excerpt_chars: 200,
        }
    }

    pub fn with_max_examples(mut self, max: usize) -> Self {
        self.max_examples = max;
        self
    }

    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    /// Score a batch of (result, sample) pairs.
    ///
    /// Fields absent from the ground truth are ignored. A failed or non-object
    /// result scores every ground-truth field of its sample as wrong. With no
    /// ground-truth fields at all the accuracy is 1.0.
    pub fn score<'a, I>(&self, pairs: I) -> Evaluation
    where
        I: IntoIterator<Item = (&'a ExtractionResult, &'a Sample)>,
    {
        let mut summary = ErrorSummary::new(self.max_examples);
        let mut correct_fields = 0;
        let mut total_fields = 0;
        let mut sample_scores = Vec::new();

        for (result, sample) in pairs {
            let failure = match result {
                Ok(Value::Object(_)) => None,
                Ok(other) => Some(ExtractionError::schema_mismatch(other)),
                Err(e) => Some(e.clone()),
            };
            let fields = match result {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            };
            if failure.is_some() {
                summary.record_failed_sample();
            }

            let mut sample_correct = 0;
            let mut sample_total = 0;

            for (name, expected) in sample.expected_fields() {
                sample_total += 1;
                let actual = fields
                    .and_then(|map| map.get(name))
                    .filter(|v| !v.is_null());

                let kind = match (&failure, actual) {
                    (Some(err), _) => FieldErrorKind::ExtractionFailed {
                        reason: err.to_string(),
                    },
                    (None, Some(value)) if self.policy.matches(expected, value) => {
                        sample_correct += 1;
                        continue;
                    }
                    (None, Some(_)) => FieldErrorKind::Mismatch,
                    (None, None) => FieldErrorKind::Missing,
                };

                summary.record(FieldError {
                    sample_index: sample.index,
                    field: name.to_string(),
                    expected: expected.clone(),
                    actual: actual.cloned(),
                    kind,
                    source_excerpt: sample.excerpt(self.excerpt_chars),
                });
            }

            correct_fields += sample_correct;
            total_fields += sample_total;
            sample_scores.push(ratio(sample_correct, sample_total));
        }

        let summary = summary.finish();
        let accuracy = ratio(correct_fields, total_fields);

        debug!(
            accuracy,
            correct_fields,
            total_fields,
            failed_samples = summary.failed_samples,
            "Scored iteration"
        );

        Evaluation {
            accuracy,
            correct_fields,
            total_fields,
            sample_scores,
            summary,
        }
    }
}

fn ratio(correct: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        correct as f64 / total as f64
    }
}
