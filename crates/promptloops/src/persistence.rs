//! Writes a finished run to an output directory and reads it back.

use anyhow::{Context, Result};
use chrono::Utc;
use promptloops_core::{OptimizationOutcome, RunMetrics, Termination};
use promptloops_eval::IterationRecord;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE: &str = "results.json";
pub const BEST_PROMPT_FILE: &str = "best_prompt.md";
pub const ITERATIONS_FILE: &str = "iterations.md";

#[derive(Serialize)]
struct ResultsFile<'a> {
    timestamp: String,
    termination: &'a Termination,
    total_iterations: usize,
    total_duration_secs: f64,
    metrics: RunMetrics,
    best: Option<&'a IterationRecord>,
    records: &'a [IterationRecord],
}

/// Summary of a `results.json` read back from disk
#[derive(Debug, Deserialize)]
pub struct LoadedResults {
    pub timestamp: String,
    pub termination: Termination,
    pub total_iterations: usize,
    pub total_duration_secs: f64,
    pub metrics: RunMetrics,
    pub best: Option<IterationRecord>,
}

/// Paths written by [`save_results`]
#[derive(Debug)]
pub struct SavedResults {
    pub results: PathBuf,
    pub best_prompt: PathBuf,
    pub iterations: PathBuf,
}

pub fn save_results(outcome: &OptimizationOutcome, dir: &Path) -> Result<SavedResults> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let saved = SavedResults {
        results: dir.join(RESULTS_FILE),
        best_prompt: dir.join(BEST_PROMPT_FILE),
        iterations: dir.join(ITERATIONS_FILE),
    };

    let results = ResultsFile {
        timestamp: Utc::now().to_rfc3339(),
        termination: &outcome.termination,
        total_iterations: outcome.iterations(),
        total_duration_secs: outcome.total_duration_secs,
        metrics: outcome.metrics(),
        best: outcome.best(),
        records: &outcome.records,
    };
    let json = serde_json::to_string_pretty(&results)?;
    write(&saved.results, &json)?;
    write(&saved.best_prompt, &render_best_prompt(outcome))?;
    write(&saved.iterations, &render_iterations(outcome))?;

    tracing::info!(dir = %dir.display(), "Saved results");
    Ok(saved)
}

pub fn load_results(dir: &Path) -> Result<LoadedResults> {
    let path = dir.join(RESULTS_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn render_best_prompt(outcome: &OptimizationOutcome) -> String {
    let Some(best) = outcome.best() else {
        return "# Best Prompt\n\nNo iterations completed.\n".to_string();
    };

    let mut out = String::from("# Best Prompt\n\n");
    let _ = writeln!(out, "- Iteration: {}", best.iteration);
    let _ = writeln!(
        out,
        "- Accuracy: {:.2}% ({}/{} fields)",
        best.accuracy * 100.0,
        best.correct_fields,
        best.total_fields
    );
    let _ = writeln!(out, "- Estimated tokens: {}", best.prompt_tokens);
    let _ = writeln!(out, "\n```\n{}\n```", best.prompt.trim_end());

    if !best.field_notes.is_empty() {
        out.push_str("\n## Field Notes\n\n");
        for (field, note) in &best.field_notes {
            let _ = writeln!(out, "- {}: {}", field, note);
        }
    }
    out
}

fn render_iterations(outcome: &OptimizationOutcome) -> String {
    let mut out = String::from("# Iterations\n");
    let best_iteration = outcome.best().map(|r| r.iteration);

    for record in &outcome.records {
        let marker = if Some(record.iteration) == best_iteration {
            " (best)"
        } else {
            ""
        };
        let _ = writeln!(out, "\n## Iteration {}{}\n", record.iteration, marker);
        let _ = writeln!(
            out,
            "- Accuracy: {:.2}% ({}/{} fields)",
            record.accuracy * 100.0,
            record.correct_fields,
            record.total_fields
        );
        let _ = writeln!(out, "- Estimated tokens: {}", record.prompt_tokens);
        let _ = writeln!(out, "- Duration: {:.1}s", record.duration_secs);
        let _ = writeln!(out, "\n```\n{}\n```", record.prompt.trim_end());

        let errors = &record.errors;
        if errors.is_empty() {
            out.push_str("\nNo errors.\n");
            continue;
        }

        let _ = writeln!(out, "\n### Errors ({})\n", errors.total_errors);
        for (field, count) in errors.top_fields(errors.field_counts.len()) {
            let _ = writeln!(out, "- {}: {}", field, count);
        }
        if errors.failed_samples > 0 {
            let _ = writeln!(out, "- failed samples: {}", errors.failed_samples);
        }
        if !errors.examples.is_empty() {
            out.push_str("\n### Examples\n\n");
            for example in &errors.examples {
                let _ = writeln!(
                    out,
                    "- sample {} `{}`: expected `{}`, got `{}`",
                    example.sample_index,
                    example.field,
                    example.expected_display(),
                    example.actual_display()
                );
            }
        }
    }

    let _ = writeln!(out, "\nTermination: {}", outcome.termination.label());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloops_eval::{ErrorSummary, FieldError, FieldErrorKind};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn record(iteration: usize, accuracy: f64, prompt: &str) -> IterationRecord {
        let mut errors = ErrorSummary::new(5);
        if accuracy < 1.0 {
            errors.record(FieldError {
                sample_index: 0,
                field: "email".into(),
                expected: json!("ada@example.com"),
                actual: Some(json!("ada@example")),
                kind: FieldErrorKind::Mismatch,
                source_excerpt: "Mail ada@example.com".into(),
            });
        }
        IterationRecord {
            iteration,
            prompt: prompt.to_string(),
            accuracy,
            correct_fields: (accuracy * 4.0) as usize,
            total_fields: 4,
            prompt_tokens: 12,
            errors: errors.finish(),
            field_notes: BTreeMap::new(),
            duration_secs: 1.5,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_save_results_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let mut best = record(2, 1.0, "Extract the email exactly");
        best.field_notes.insert("email".into(), "Keep the full domain".into());
        let outcome = OptimizationOutcome::new(
            vec![record(1, 0.75, "Extract the email"), best],
            Termination::PerfectScore,
            Duration::from_secs(4),
        );

        let saved = save_results(&outcome, &out).unwrap();

        let results: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&saved.results).unwrap()).unwrap();
        assert_eq!(results["total_iterations"], 2);
        assert_eq!(results["termination"]["status"], "perfect_score");
        assert_eq!(results["best"]["iteration"], 2);
        assert_eq!(results["metrics"]["improvement"], 0.25);
        assert_eq!(results["records"][0]["errors"]["field_counts"]["email"], 1);

        let best_prompt = std::fs::read_to_string(&saved.best_prompt).unwrap();
        assert!(best_prompt.contains("- Iteration: 2"));
        assert!(best_prompt.contains("- Accuracy: 100.00% (4/4 fields)"));
        assert!(best_prompt.contains("Extract the email exactly"));
        assert!(best_prompt.contains("- email: Keep the full domain"));

        let iterations = std::fs::read_to_string(&saved.iterations).unwrap();
        assert!(iterations.contains("## Iteration 1\n"));
        assert!(iterations.contains("## Iteration 2 (best)"));
        assert!(iterations.contains("expected `ada@example.com`, got `ada@example`"));
        assert!(iterations.contains("No errors."));
        assert!(iterations.contains("Termination: perfect_score"));
    }

    #[test]
    fn test_load_results_reads_saved_run() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = OptimizationOutcome::new(
            vec![
                record(1, 0.5, "Extract the email"),
                record(2, 0.75, "Extract the full email"),
            ],
            Termination::RefinementUnavailable {
                iteration: 2,
                error: "mentor timed out".into(),
            },
            Duration::from_secs(9),
        );
        save_results(&outcome, dir.path()).unwrap();

        let loaded = load_results(dir.path()).unwrap();
        assert_eq!(loaded.total_iterations, 2);
        assert_eq!(loaded.total_duration_secs, 9.0);
        assert_eq!(loaded.termination, outcome.termination);
        assert_eq!(loaded.metrics, outcome.metrics());
        assert_eq!(loaded.best.as_ref(), outcome.best());

        let empty = tempfile::tempdir().unwrap();
        assert!(load_results(empty.path()).is_err());
    }
}
