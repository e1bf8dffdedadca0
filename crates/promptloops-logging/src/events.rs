use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for the optimization loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        samples: usize,
        loop_count: usize,
        window_size: usize,
        prompt_preview: String,
    },
    IterationStarted {
        iteration: usize,
        loop_count: usize,
        prompt_tokens: usize,
    },
    SampleFailed {
        iteration: usize,
        sample_index: usize,
        error: String,
    },
    ExtractionCompleted {
        iteration: usize,
        succeeded: usize,
        failed: usize,
        duration_secs: f64,
    },
    IterationScored {
        iteration: usize,
        accuracy: f64,
        correct_fields: usize,
        total_fields: usize,
        /// Worst fields as (name, mismatch count)
        top_errors: Vec<(String, usize)>,
    },
    MentorStarted {
        iteration: usize,
    },
    MentorCompleted {
        iteration: usize,
        summary: String,
        duration_secs: f64,
    },
    RefinementFailed {
        iteration: usize,
        error: String,
    },
    ProviderUnavailable {
        iteration: usize,
        failed_samples: usize,
    },
    RunCompleted {
        iterations: usize,
        best_iteration: usize,
        best_accuracy: f64,
        termination: String,
        duration_secs: f64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for promptloops events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    console: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            console: true,
            file_writer: None,
        }
    }

    /// Logger that drops every event
    pub fn silent() -> Self {
        Self {
            format: LogFormat::Compact,
            console: false,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            console: true,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if !self.console {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::RunStarted {
                samples,
                loop_count,
                window_size,
                prompt_preview,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "promptloops".bold().bright_white(),
                    " ".repeat(56) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Prompt:".dimmed(),
                    Self::truncate_with_padding(prompt_preview, 60, 68).dimmed()
                );
                let plan = format!(
                    "{} samples, {} loops, window {}",
                    samples, loop_count, window_size
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Plan:".dimmed(),
                    Self::truncate_with_padding(&plan, 62, 68).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::IterationStarted {
                iteration,
                loop_count,
                prompt_tokens,
            } => {
                let iter_text = format!("─ Iteration {}/{} ", iteration, loop_count);
                let padding = "─".repeat(67usize.saturating_sub(iter_text.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    iter_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_cyan(),
                    "AGENT".bright_cyan().bold(),
                    format!("(~{} prompt tokens)", prompt_tokens).dimmed()
                );
            }
            LogEvent::SampleFailed {
                sample_index,
                error,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} {}",
                    "│".dimmed(),
                    format!("sample {}: {}", sample_index, error).dimmed()
                );
            }
            LogEvent::ExtractionCompleted {
                succeeded,
                failed,
                duration_secs,
                ..
            } => {
                if *failed == 0 {
                    let _ = writeln!(
                        stderr,
                        "    {} {} samples extracted ({:.1}s)",
                        "✓".bright_green(),
                        succeeded,
                        duration_secs
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "    {} {} extracted, {} failed ({:.1}s)",
                        "⚠".bright_yellow(),
                        succeeded,
                        failed,
                        duration_secs
                    );
                }
            }
            LogEvent::IterationScored {
                accuracy,
                correct_fields,
                total_fields,
                top_errors,
                ..
            } => {
                let score = format!(
                    "Accuracy: {:.1}% ({}/{} fields)",
                    accuracy * 100.0,
                    correct_fields,
                    total_fields
                );
                let styled = if *accuracy >= 1.0 {
                    score.bright_green().bold()
                } else {
                    score.bright_white().bold()
                };
                let _ = writeln!(stderr, "    {} {}", "◆".bright_white(), styled);
                if !top_errors.is_empty() {
                    let worst = top_errors
                        .iter()
                        .map(|(field, count)| format!("{} ({})", field, count))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let _ = writeln!(
                        stderr,
                        "    {} {}",
                        "Worst fields:".dimmed(),
                        worst.yellow()
                    );
                }
                let _ = writeln!(stderr);
            }
            LogEvent::MentorStarted { .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "MENTOR".bright_magenta().bold()
                );
            }
            LogEvent::MentorCompleted {
                summary,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} New prompt: {} ({:.1}s)",
                    "→".bright_yellow(),
                    summary,
                    duration_secs
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::RefinementFailed { iteration, error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Mentor failed after iteration {}: {}",
                    "✗".bright_red(),
                    iteration,
                    error.bright_red()
                );
            }
            LogEvent::ProviderUnavailable {
                iteration,
                failed_samples,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} All {} samples failed in iteration {}; provider unavailable",
                    "✗".bright_red(),
                    failed_samples,
                    iteration
                );
            }
            LogEvent::RunCompleted { .. } => {
                // The final summary is printed by the binary
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted {
                samples,
                loop_count,
                ..
            } => format!("[{}] run:start samples={} loops={}", timestamp, samples, loop_count),
            LogEvent::IterationStarted { iteration, .. } => {
                format!("[{}] agent:start:{}", timestamp, iteration)
            }
            LogEvent::SampleFailed {
                iteration,
                sample_index,
                error,
            } => format!(
                "[{}] sample:fail:{} #{} {}",
                timestamp, iteration, sample_index, error
            ),
            LogEvent::ExtractionCompleted {
                iteration,
                succeeded,
                failed,
                duration_secs,
            } => format!(
                "[{}] agent:done:{} ok={} failed={} {:.1}s",
                timestamp, iteration, succeeded, failed, duration_secs
            ),
            LogEvent::IterationScored {
                iteration,
                accuracy,
                ..
            } => format!("[{}] score:{} {:.4}", timestamp, iteration, accuracy),
            LogEvent::MentorStarted { iteration } => {
                format!("[{}] mentor:start:{}", timestamp, iteration)
            }
            LogEvent::MentorCompleted {
                iteration,
                summary,
                duration_secs,
            } => format!(
                "[{}] mentor:done:{} {} {:.1}s",
                timestamp, iteration, summary, duration_secs
            ),
            LogEvent::RefinementFailed { iteration, error } => {
                format!("[{}] mentor:error:{}:{}", timestamp, iteration, error)
            }
            LogEvent::ProviderUnavailable { iteration, .. } => {
                format!("[{}] provider:unavailable:{}", timestamp, iteration)
            }
            LogEvent::RunCompleted {
                iterations,
                best_iteration,
                best_accuracy,
                termination,
                duration_secs,
            } => format!(
                "[{}] run:{} iterations={} best={}@{:.4} {:.1}s",
                timestamp, termination, iterations, best_iteration, best_accuracy, duration_secs
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let first_line = s.lines().next().unwrap_or_default();
        let truncated = if first_line.chars().count() > max_len || first_line.len() < s.len() {
            let kept: String = first_line.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        } else {
            first_line.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1); // +1 for trailing │
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}
