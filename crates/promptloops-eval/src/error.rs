use serde_json::Value;
use thiserror::Error;

/// Per-sample failure. The sample scores zero; the iteration carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// Reply could not be parsed or failed schema validation
    #[error("Extraction invalid: {0}")]
    Invalid(String),

    /// Result is not a field mapping
    #[error("Result shape mismatch: expected an object, got {found}")]
    SchemaMismatch { found: String },

    /// The provider call failed (network, rate limit, timeout, ...)
    #[error("Provider failure: {0}")]
    Provider(String),
}

impl ExtractionError {
    pub fn schema_mismatch(value: &Value) -> Self {
        let found = match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        };
        ExtractionError::SchemaMismatch {
            found: found.to_string(),
        }
    }

    pub fn is_provider_failure(&self) -> bool {
        matches!(self, ExtractionError::Provider(_))
    }
}

/// What the extraction agent produced for one sample
pub type ExtractionResult = Result<Value, ExtractionError>;
