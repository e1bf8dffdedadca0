use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Why a ground-truth field did not earn credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// Field absent (or null) in the result
    Missing,
    /// Field present with a different value
    Mismatch,
    /// The whole sample failed; every field counts as wrong
    ExtractionFailed { reason: String },
}

/// One mismatching field in one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub sample_index: usize,
    pub field: String,
    pub expected: Value,
    pub actual: Option<Value>,
    #[serde(flatten)]
    pub kind: FieldErrorKind,
    /// Start of the sample input, for mentor context
    pub source_excerpt: String,
}

impl FieldError {
    /// What the agent answered, as shown to the mentor
    pub fn actual_display(&self) -> String {
        match (&self.kind, &self.actual) {
            (FieldErrorKind::ExtractionFailed { reason }, _) => format!("<no result: {}>", reason),
            (_, Some(value)) => display_value(value),
            (_, None) => "<missing>".to_string(),
        }
    }

    pub fn expected_display(&self) -> String {
        display_value(&self.expected)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Per-iteration error aggregate: counts per field plus a bounded sample of
/// concrete mismatches (at most one example per field).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub field_counts: BTreeMap<String, usize>,
    pub examples: Vec<FieldError>,
    pub total_errors: usize,
    /// Samples whose extraction failed outright
    pub failed_samples: usize,
}

impl ErrorSummary {
    pub fn new(max_examples: usize) -> SummaryBuilder {
        SummaryBuilder {
            summary: ErrorSummary::default(),
            max_examples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_errors == 0
    }

    pub fn count(&self, field: &str) -> usize {
        self.field_counts.get(field).copied().unwrap_or(0)
    }

    /// Worst fields first; ties broken by name so the order is stable
    pub fn top_fields(&self, n: usize) -> Vec<(&str, usize)> {
        let mut fields: Vec<(&str, usize)> = self
            .field_counts
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        fields.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        fields.truncate(n);
        fields
    }
}

/// Accumulates field errors into an [`ErrorSummary`]
pub struct SummaryBuilder {
    summary: ErrorSummary,
    max_examples: usize,
}

impl SummaryBuilder {
    pub fn record(&mut self, error: FieldError) {
        *self
            .summary
            .field_counts
            .entry(error.field.clone())
            .or_insert(0) += 1;
        self.summary.total_errors += 1;

        let already_shown = self.summary.examples.iter().any(|e| e.field == error.field);
        if !already_shown && self.summary.examples.len() < self.max_examples {
            self.summary.examples.push(error);
        }
    }

    pub fn record_failed_sample(&mut self) {
        self.summary.failed_samples += 1;
    }

    pub fn finish(self) -> ErrorSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn missing(sample: usize, field: &str) -> FieldError {
        FieldError {
            sample_index: sample,
            field: field.to_string(),
            expected: json!("x"),
            actual: None,
            kind: FieldErrorKind::Missing,
            source_excerpt: String::new(),
        }
    }

    #[test]
    fn test_examples_are_bounded_and_unique_per_field() {
        let mut builder = ErrorSummary::new(2);
        builder.record(missing(0, "email"));
        builder.record(missing(1, "email"));
        builder.record(missing(1, "phone"));
        builder.record(missing(2, "city"));
        let summary = builder.finish();

        assert_eq!(summary.total_errors, 4);
        assert_eq!(summary.count("email"), 2);
        assert_eq!(summary.examples.len(), 2);
        assert_eq!(summary.examples[0].field, "email");
        assert_eq!(summary.examples[1].field, "phone");
    }

    #[test]
    fn test_top_fields_sorted_by_count_then_name() {
        let mut builder = ErrorSummary::new(10);
        for field in ["b", "a", "c", "c", "a"] {
            builder.record(missing(0, field));
        }
        let summary = builder.finish();
        assert_eq!(summary.top_fields(2), vec![("a", 2), ("c", 2)]);
        assert_eq!(summary.top_fields(10).len(), 3);
    }

    #[test]
    fn test_actual_display() {
        let mut err = missing(0, "age");
        assert_eq!(err.actual_display(), "<missing>");
        err.actual = Some(json!(41));
        err.kind = FieldErrorKind::Mismatch;
        assert_eq!(err.actual_display(), "41");
        err.kind = FieldErrorKind::ExtractionFailed {
            reason: "timeout".into(),
        };
        assert_eq!(err.actual_display(), "<no result: timeout>");
    }
}
