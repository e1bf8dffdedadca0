use promptloops_eval::{
    extract_json_object, ExtractionError, ExtractionResult, SchemaDescriptor, SchemaError,
    SchemaValidator,
};
use promptloops_provider::{PromptContext, Provider, ProviderConfig};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Extraction invoker: one provider call per sample, reply validated
/// against the schema. No retries at this layer.
pub struct ExtractionAgent<'a> {
    provider: &'a dyn Provider,
    schema: &'a SchemaDescriptor,
    validator: SchemaValidator,
}

impl<'a> ExtractionAgent<'a> {
    pub fn new(provider: &'a dyn Provider, schema: &'a SchemaDescriptor) -> Result<Self, SchemaError> {
        Ok(Self {
            provider,
            schema,
            validator: SchemaValidator::new(schema)?,
        })
    }

    /// System message: the prompt under test, then the field list with notes
    pub fn system_message(&self, prompt: &str, notes: &BTreeMap<String, String>) -> String {
        format!(
            "{}\n\n## Fields\n{}\n\nRespond with a single JSON object keyed by field name. \
             Omit fields that are not present in the input.",
            prompt.trim_end(),
            self.schema.describe(notes)
        )
    }

    pub async fn extract(
        &self,
        prompt: &str,
        notes: &BTreeMap<String, String>,
        input: &str,
        config: &ProviderConfig,
    ) -> ExtractionResult {
        let context = PromptContext::new(self.system_message(prompt, notes), input);

        let output = self
            .provider
            .call(&context, config)
            .await
            .map_err(|e| ExtractionError::Provider(e.to_string()))?;

        self.parse_reply(&output.text)
    }

    fn parse_reply(&self, reply: &str) -> ExtractionResult {
        let json_str = extract_json_object(reply)
            .ok_or_else(|| ExtractionError::Invalid("no JSON object in reply".into()))?;

        let value: Value = serde_json::from_str(json_str)
            .map_err(|e| ExtractionError::Invalid(format!("malformed JSON: {}", e)))?;

        match self.validator.validate(&value) {
            Ok(fields) => Ok(Value::Object(fields.into_iter().collect())),
            Err(violations) => {
                debug!(violations = violations.len(), "Reply failed schema validation");
                Err(ExtractionError::Invalid(violations.join("; ")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use promptloops_eval::{FieldKind, FieldSpec};
    use promptloops_provider::{ProviderError, ProviderOutput, ProviderType};
    use serde_json::json;
    use std::path::Path;

    struct FixedReply(Result<&'static str, &'static str>);

    #[async_trait]
    impl Provider for FixedReply {
        fn name(&self) -> &str {
            "fixed"
        }

        fn provider_type(&self) -> ProviderType {
            ProviderType::ClaudeCode
        }

        async fn call(
            &self,
            _context: &PromptContext,
            _config: &ProviderConfig,
        ) -> Result<ProviderOutput, ProviderError> {
            match self.0 {
                Ok(text) => Ok(ProviderOutput::from_text(text)),
                Err(msg) => Err(ProviderError::RateLimited(msg.to_string())),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn binary_path(&self) -> &Path {
            Path::new("fixed")
        }
    }

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new(vec![
            FieldSpec::new("name", FieldKind::String).required(),
            FieldSpec::new("age", FieldKind::Integer),
        ])
        .unwrap()
    }

    async fn run(reply: Result<&'static str, &'static str>) -> ExtractionResult {
        let provider = FixedReply(reply);
        let schema = schema();
        let agent = ExtractionAgent::new(&provider, &schema).unwrap();
        agent
            .extract("Extract people", &BTreeMap::new(), "Ada, 36", &ProviderConfig::default())
            .await
    }

    #[tokio::test]
    async fn test_valid_reply_drops_nulls() {
        let result = run(Ok("```json\n{\"name\": \"Ada\", \"age\": null}\n```")).await;
        assert_eq!(result, Ok(json!({"name": "Ada"})));
    }

    #[tokio::test]
    async fn test_schema_violation_is_invalid() {
        let result = run(Ok(r#"{"name": "Ada", "age": "thirty-six"}"#)).await;
        assert!(matches!(result, Err(ExtractionError::Invalid(_))));

        let missing_required = run(Ok(r#"{"age": 36}"#)).await;
        assert!(matches!(missing_required, Err(ExtractionError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_invalid() {
        assert!(matches!(
            run(Ok("I could not find anything.")).await,
            Err(ExtractionError::Invalid(_))
        ));
        assert!(matches!(
            run(Ok("{\"name\": Ada}")).await,
            Err(ExtractionError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_failure() {
        let result = run(Err("429 Too Many Requests")).await;
        assert!(result.unwrap_err().is_provider_failure());
    }

    #[test]
    fn test_system_message_includes_notes() {
        let provider = FixedReply(Ok("{}"));
        let schema = schema();
        let agent = ExtractionAgent::new(&provider, &schema).unwrap();
        let mut notes = BTreeMap::new();
        notes.insert("age".to_string(), "Years only".to_string());

        let message = agent.system_message("Extract people\n", &notes);
        assert!(message.starts_with("Extract people\n\n## Fields\n"));
        assert!(message.contains("- name (string, required)"));
        assert!(message.contains("- age (integer)\n  Note: Years only"));
    }
}
