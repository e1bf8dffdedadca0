use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::{FieldMap, Sample};

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema has no fields")]
    Empty,

    #[error("Field name must not be empty (position {0})")]
    EmptyName(usize),

    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    #[error("Failed to compile JSON schema: {0}")]
    Compile(String),
}

/// Scalar type of a target field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    /// Any scalar; no type constraint in the reply schema
    Any,
}

impl FieldKind {
    /// Kind of a ground-truth value; None for null
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(FieldKind::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(FieldKind::Integer),
            Value::Number(_) => Some(FieldKind::Number),
            _ => Some(FieldKind::String),
        }
    }

    /// Narrowest kind accepting values of both kinds
    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (FieldKind::Integer, FieldKind::Number) | (FieldKind::Number, FieldKind::Integer) => {
                FieldKind::Number
            }
            _ => FieldKind::Any,
        }
    }

    fn json_type(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Any => "any",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.json_type())
    }
}

/// One field the agent should extract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Ordered list of target fields. Core logic never hardcodes field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub fields: Vec<FieldSpec>,
}

impl SchemaDescriptor {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let schema = Self { fields };
        schema.check()?;
        Ok(schema)
    }

    /// Names must be present and unique
    pub fn check(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut seen = HashSet::new();
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyName(i));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// JSON Schema for the agent's reply. Optional fields also accept null;
    /// extra properties are allowed and ignored by scoring.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut property = Map::new();
            if field.kind != FieldKind::Any {
                let type_spec = if field.required {
                    json!(field.kind.json_type())
                } else {
                    json!([field.kind.json_type(), "null"])
                };
                property.insert("type".into(), type_spec);
            }
            if !field.description.is_empty() {
                property.insert("description".into(), json!(field.description));
            }
            properties.insert(field.name.clone(), Value::Object(property));

            if field.required {
                required.push(json!(field.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Field list for system messages, with optional per-field notes layered on top
    pub fn describe(&self, notes: &BTreeMap<String, String>) -> String {
        self.fields
            .iter()
            .map(|field| {
                let requirement = if field.required { ", required" } else { "" };
                let mut line = format!("- {} ({}{})", field.name, field.kind, requirement);
                if !field.description.is_empty() {
                    line.push_str(": ");
                    line.push_str(&field.description);
                }
                if let Some(note) = notes.get(&field.name) {
                    line.push_str("\n  Note: ");
                    line.push_str(note);
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Deterministic starting prompt built from the field list
    pub fn synthesize_prompt(&self) -> String {
        format!(
            "Extract the following information from the data:\n\n{}\n\n\
             Return the extracted information as a JSON object keyed by field name. \
             Only include fields that are found in the text. Omit fields that are not present.",
            self.describe(&BTreeMap::new())
        )
    }
}

impl SchemaDescriptor {
    /// Derive optional fields from the ground-truth keys of a dataset, in
    /// name order. Kinds are widened across every non-null value, so mixed
    /// integers and decimals become `number` and other mixes become `any`.
    /// Fields that are null everywhere are `any` too.
    pub fn infer(samples: &[Sample]) -> Result<Self, SchemaError> {
        let mut kinds: BTreeMap<&str, Option<FieldKind>> = BTreeMap::new();
        for sample in samples {
            for (name, value) in &sample.ground_truth {
                let kind = kinds.entry(name.as_str()).or_insert(None);
                if let Some(seen) = FieldKind::of(value) {
                    *kind = Some(kind.map_or(seen, |k| k.widen(seen)));
                }
            }
        }

        Self::new(
            kinds
                .into_iter()
                .map(|(name, kind)| FieldSpec::new(name, kind.unwrap_or(FieldKind::Any)))
                .collect(),
        )
    }
}

/// Compiled validator for agent replies
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    pub fn new(schema: &SchemaDescriptor) -> Result<Self, SchemaError> {
        schema.check()?;
        let validator = jsonschema::Validator::new(&schema.to_json_schema())
            .map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Validate a reply and return its non-null fields. Every violation is reported.
    pub fn validate(&self, instance: &Value) -> Result<FieldMap, Vec<String>> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|error| format!("At path '{}': {}", error.instance_path, error))
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }

        match instance {
            Value::Object(map) => Ok(map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            _ => Err(vec!["reply is not a JSON object".to_string()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(vec![
            FieldSpec::new("name", FieldKind::String)
                .required()
                .with_description("Full name of the person."),
            FieldSpec::new("age", FieldKind::Integer),
            FieldSpec::new("email", FieldKind::String).with_description("Email address."),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_duplicate_and_empty_names() {
        let dup = SchemaDescriptor::new(vec![
            FieldSpec::new("a", FieldKind::String),
            FieldSpec::new("a", FieldKind::Number),
        ]);
        assert!(matches!(dup, Err(SchemaError::DuplicateField(name)) if name == "a"));

        let empty = SchemaDescriptor::new(vec![FieldSpec::new("  ", FieldKind::String)]);
        assert!(matches!(empty, Err(SchemaError::EmptyName(0))));

        assert!(matches!(SchemaDescriptor::new(vec![]), Err(SchemaError::Empty)));
    }

    #[test]
    fn test_json_schema_shape() {
        let schema = contact_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["properties"]["name"]["type"], "string");
        assert_eq!(schema["properties"]["age"]["type"], json!(["integer", "null"]));
    }

    #[test]
    fn test_validator_accepts_and_drops_nulls() {
        let validator = SchemaValidator::new(&contact_schema()).unwrap();
        let fields = validator
            .validate(&json!({"name": "Ada", "age": null, "nickname": "countess"}))
            .unwrap();
        assert_eq!(fields.get("name"), Some(&json!("Ada")));
        assert!(!fields.contains_key("age"));
        // extra fields pass through; scoring ignores them
        assert!(fields.contains_key("nickname"));
    }

    #[test]
    fn test_validator_reports_every_violation() {
        let validator = SchemaValidator::new(&contact_schema()).unwrap();
        let errors = validator.validate(&json!({"age": "forty"})).unwrap_err();
        assert!(errors.len() >= 2);
        assert!(errors.iter().any(|e| e.contains("name")));
        assert!(errors.iter().any(|e| e.contains("/age")));
    }

    #[test]
    fn test_validator_rejects_non_object() {
        let validator = SchemaValidator::new(&contact_schema()).unwrap();
        assert!(validator.validate(&json!(["Ada"])).is_err());
    }

    #[test]
    fn test_synthesized_prompt_lists_fields_in_order() {
        let prompt = contact_schema().synthesize_prompt();
        assert!(prompt.starts_with("Extract the following information"));
        let name_at = prompt.find("- name (string, required): Full name").unwrap();
        let age_at = prompt.find("- age (integer)").unwrap();
        let email_at = prompt.find("- email (string): Email address.").unwrap();
        assert!(name_at < age_at && age_at < email_at);
        // deterministic
        assert_eq!(prompt, contact_schema().synthesize_prompt());
    }

    #[test]
    fn test_describe_includes_notes() {
        let mut notes = BTreeMap::new();
        notes.insert("email".to_string(), "lowercase the domain".to_string());
        let text = contact_schema().describe(&notes);
        assert!(text.contains("- email (string): Email address.\n  Note: lowercase the domain"));
    }

    #[test]
    fn test_field_spec_deserializes_from_toml_shape() {
        let spec: FieldSpec =
            serde_json::from_value(json!({"name": "total", "type": "number", "required": true}))
                .unwrap();
        assert_eq!(spec.kind, FieldKind::Number);
        assert!(spec.required);
        assert!(spec.description.is_empty());
    }

    #[test]
    fn test_infer_from_samples() {
        let mut first = FieldMap::new();
        first.insert("name".into(), json!("Ada"));
        first.insert("age".into(), Value::Null);
        let mut second = FieldMap::new();
        second.insert("age".into(), json!(36));
        second.insert("score".into(), json!(0.5));
        second.insert("active".into(), json!(true));

        let schema = SchemaDescriptor::infer(&[
            Sample::new(0, "a", first),
            Sample::new(1, "b", second),
        ])
        .unwrap();

        let fields: Vec<(&str, FieldKind)> = schema
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.kind))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("active", FieldKind::Boolean),
                ("age", FieldKind::Integer),
                ("name", FieldKind::String),
                ("score", FieldKind::Number),
            ]
        );
        assert!(schema.fields.iter().all(|f| !f.required));

        assert!(matches!(SchemaDescriptor::infer(&[]), Err(SchemaError::Empty)));
    }

    #[test]
    fn test_infer_widens_mixed_kinds() {
        let rows = [
            json!({"price": 10, "code": "A1", "flag": true}),
            json!({"price": 10.5, "code": 7, "flag": null, "memo": null}),
        ];
        let samples: Vec<Sample> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let fields: FieldMap = serde_json::from_value(row.clone()).unwrap();
                Sample::new(i, "text", fields)
            })
            .collect();
        let schema = SchemaDescriptor::infer(&samples).unwrap();

        assert_eq!(schema.field("price").unwrap().kind, FieldKind::Number);
        assert_eq!(schema.field("code").unwrap().kind, FieldKind::Any);
        assert_eq!(schema.field("flag").unwrap().kind, FieldKind::Boolean);
        assert_eq!(schema.field("memo").unwrap().kind, FieldKind::Any);

        let json_schema = schema.to_json_schema();
        assert!(json_schema["properties"]["code"].get("type").is_none());

        let validator = SchemaValidator::new(&schema).unwrap();
        for row in &rows {
            assert!(validator.validate(row).is_ok(), "{row} should validate");
        }
    }
}
