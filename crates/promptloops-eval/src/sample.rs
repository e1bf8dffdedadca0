use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field name to scalar value. `null` means the field is absent.
pub type FieldMap = BTreeMap<String, Value>;

/// One labeled input. Built by the dataset loader and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Position in the dataset (0-indexed)
    pub index: usize,
    /// Raw input handed to the extraction agent
    pub input: String,
    /// Expected field values
    pub ground_truth: FieldMap,
}

impl Sample {
    pub fn new(index: usize, input: impl Into<String>, ground_truth: FieldMap) -> Self {
        Self {
            index,
            input: input.into(),
            ground_truth,
        }
    }

    /// Ground-truth fields that count toward accuracy
    pub fn expected_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.ground_truth
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.as_str(), v))
    }

    /// First `max_chars` characters of the input, with an ellipsis when cut
    pub fn excerpt(&self, max_chars: usize) -> String {
        if self.input.chars().count() <= max_chars {
            self.input.clone()
        } else {
            let cut: String = self.input.chars().take(max_chars).collect();
            format!("{}...", cut)
        }
    }
}
