use promptloops_eval::{ErrorSummary, HistoryWindow, SchemaDescriptor};
use std::collections::BTreeMap;
use std::fmt::Write;

const PROMPT_PREVIEW_CHARS: usize = 600;

/// Prompt templates for the mentor
pub struct MentorPrompts;

impl MentorPrompts {
    /// Standing instructions for the refinement model
    pub fn build_system_message(schema: &SchemaDescriptor) -> String {
        format!(
            r#"You are an expert prompt engineer improving a structured extraction prompt.

An extraction agent runs the prompt over labeled samples and returns a JSON object with these fields:

{fields}

You will see how recent prompts scored and which fields the agent keeps getting wrong. Write a revised prompt that fixes the highest-count errors without losing what already works.

## Required Response Format

Briefly analyze the error patterns, then end your response with a proposal block:

<proposal>
{{"prompt": "The complete revised prompt", "reasoning": "What you changed and why", "field_descriptions": {{"field_name": "Extra guidance for this field"}}}}
</proposal>

`field_descriptions` is optional; only use field names from the list above."#,
            fields = schema.describe(&BTreeMap::new()),
        )
    }

    /// Build the refinement request for one iteration
    pub fn build_refinement_prompt(
        current_prompt: &str,
        history: &HistoryWindow,
        summary: &ErrorSummary,
        top_errors: usize,
        iteration: usize,
    ) -> String {
        format!(
            r#"## Current Prompt
```
{prompt}
```

## Recent Iterations
{history}

## Errors From The Latest Iteration
{errors}

## Context
This prompt will be used for iteration {next}. Return the complete revised prompt, not a diff."#,
            prompt = current_prompt,
            history = format_history(history, top_errors),
            errors = format_summary(summary),
            next = iteration + 1,
        )
    }
}

fn format_history(history: &HistoryWindow, top_errors: usize) -> String {
    if history.is_empty() {
        return "No previous iterations.".to_string();
    }

    let mut out = String::new();
    for record in history.iter() {
        let fields = record
            .errors
            .top_fields(top_errors)
            .into_iter()
            .map(|(field, count)| format!("{}: {}", field, count))
            .collect::<Vec<_>>();
        let _ = write!(
            out,
            "\n### Iteration {} ({:.1}% accurate, {}/{} fields)\n- Prompt: {}\n- Top errors: {}\n",
            record.iteration,
            record.accuracy * 100.0,
            record.correct_fields,
            record.total_fields,
            truncate_output(&record.prompt, PROMPT_PREVIEW_CHARS),
            if fields.is_empty() {
                "none".to_string()
            } else {
                fields.join(", ")
            },
        );
    }
    out
}

fn format_summary(summary: &ErrorSummary) -> String {
    if summary.is_empty() {
        return "No errors in the latest iteration.".to_string();
    }

    let mut out = String::from("Mismatches per field:\n");
    for (field, count) in summary.top_fields(summary.field_counts.len()) {
        let _ = writeln!(out, "- {}: {}", field, count);
    }
    if summary.failed_samples > 0 {
        let _ = writeln!(
            out,
            "\n{} sample(s) produced no usable result.",
            summary.failed_samples
        );
    }

    for (i, example) in summary.examples.iter().enumerate() {
        let _ = write!(
            out,
            "\nExample {} (field: {}):\n- Source text: {}\n- Agent's answer: {}\n- Expected: {}\n",
            i + 1,
            example.field,
            example.source_excerpt,
            example.actual_display(),
            example.expected_display(),
        );
    }
    out
}

/// Cut at a line boundary when one is available, never inside a character
fn truncate_output(output: &str, max_chars: usize) -> String {
    if output.chars().count() <= max_chars {
        return output.to_string();
    }
    let cut: String = output.chars().take(max_chars).collect();
    let kept = match cut.rfind('\n') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloops_eval::{
        FieldError, FieldErrorKind, FieldKind, FieldSpec, IterationRecord,
    };
    use serde_json::json;

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new(vec![
            FieldSpec::new("email", FieldKind::String).with_description("Primary email"),
            FieldSpec::new("age", FieldKind::Integer),
        ])
        .unwrap()
    }

    fn summary() -> ErrorSummary {
        let mut builder = ErrorSummary::new(5);
        builder.record(FieldError {
            sample_index: 0,
            field: "email".into(),
            expected: json!("ada@example.com"),
            actual: None,
            kind: FieldErrorKind::Missing,
            source_excerpt: "Write to ada@example.com".into(),
        });
        builder.record(FieldError {
            sample_index: 1,
            field: "age".into(),
            expected: json!(36),
            actual: Some(json!(63)),
            kind: FieldErrorKind::Mismatch,
            source_excerpt: "Ada is 36".into(),
        });
        builder.record(FieldError {
            sample_index: 2,
            field: "email".into(),
            expected: json!("x@y.z"),
            actual: None,
            kind: FieldErrorKind::Missing,
            source_excerpt: "x@y.z".into(),
        });
        builder.finish()
    }

    fn record(iteration: usize, accuracy: f64) -> IterationRecord {
        IterationRecord {
            iteration,
            prompt: format!("Prompt number {}", iteration),
            accuracy,
            correct_fields: 3,
            total_fields: 6,
            prompt_tokens: 4,
            errors: summary(),
            field_notes: BTreeMap::new(),
            duration_secs: 1.0,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_system_message_lists_fields() {
        let message = MentorPrompts::build_system_message(&schema());
        assert!(message.contains("- email (string): Primary email"));
        assert!(message.contains("- age (integer)"));
        assert!(message.contains("<proposal>"));
    }

    #[test]
    fn test_refinement_prompt_contents() {
        let mut window = HistoryWindow::new(2);
        window.push(record(1, 0.25));
        window.push(record(2, 0.5));

        let prompt = MentorPrompts::build_refinement_prompt("Extract things", &window, &summary(), 1, 2);

        assert!(prompt.contains("Extract things"));
        assert!(prompt.contains("### Iteration 1 (25.0% accurate, 3/6 fields)"));
        assert!(prompt.contains("### Iteration 2 (50.0% accurate"));
        // top_errors = 1 keeps only the worst field
        assert!(prompt.contains("- Top errors: email: 2\n"));
        assert!(prompt.contains("- email: 2\n- age: 1"));
        assert!(prompt.contains("- Agent's answer: <missing>"));
        assert!(prompt.contains("- Agent's answer: 63"));
        assert!(prompt.contains("iteration 3"));
    }

    #[test]
    fn test_refinement_prompt_without_history_or_errors() {
        let prompt = MentorPrompts::build_refinement_prompt(
            "p",
            &HistoryWindow::new(2),
            &ErrorSummary::default(),
            5,
            1,
        );
        assert!(prompt.contains("No previous iterations."));
        assert!(prompt.contains("No errors in the latest iteration."));
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("short", 10), "short");
        assert_eq!(truncate_output("line one\nline two", 12), "line one...");
        assert_eq!(truncate_output("ééééé", 3), "ééé...");
    }
}
