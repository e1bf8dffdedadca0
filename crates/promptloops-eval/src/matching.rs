use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an extracted value is compared with the ground truth.
///
/// Defaults: case-insensitive, whitespace-collapsed string compare and an
/// absolute tolerance of 1e-6 for numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    pub case_insensitive: bool,
    pub collapse_whitespace: bool,
    pub numeric_tolerance: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            collapse_whitespace: true,
            numeric_tolerance: 1e-6,
        }
    }
}

impl MatchPolicy {
    pub fn normalize(&self, text: &str) -> String {
        let text = if self.collapse_whitespace {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            text.trim().to_string()
        };
        if self.case_insensitive {
            text.to_lowercase()
        } else {
            text
        }
    }

    /// Numbers compare numerically when either side is a JSON number;
    /// two strings always compare as text.
    pub fn matches(&self, expected: &Value, actual: &Value) -> bool {
        match (expected, actual) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Number(_), _) | (_, Value::Number(_)) => {
                match (as_number(expected), as_number(actual)) {
                    (Some(a), Some(b)) => (a - b).abs() <= self.numeric_tolerance,
                    _ => false,
                }
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
                self.normalize(s).eq_ignore_ascii_case(if *b { "true" } else { "false" })
            }
            (Value::String(a), Value::String(b)) => self.normalize(a) == self.normalize(b),
            _ => expected == actual,
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
