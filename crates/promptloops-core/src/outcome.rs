use promptloops_eval::{select_best, IterationRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why the loop stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Termination {
    /// Iteration budget used up
    Completed,
    /// An iteration scored 1.0
    PerfectScore,
    /// The mentor could not produce a prompt for the next iteration
    RefinementUnavailable { iteration: usize, error: String },
    /// Every sample of an iteration failed at the provider
    ProviderUnavailable { iteration: usize },
}

impl Termination {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed | Self::PerfectScore => 0,
            Self::RefinementUnavailable { .. } | Self::ProviderUnavailable { .. } => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::PerfectScore => "perfect_score",
            Self::RefinementUnavailable { .. } => "refinement_unavailable",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
        }
    }
}

/// Summary numbers across a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub iterations: usize,
    pub best_accuracy: f64,
    pub final_accuracy: f64,
    pub average_accuracy: f64,
    /// Last accuracy minus first
    pub improvement: f64,
    pub total_errors: usize,
}

/// The ordered history of a run plus its designated best record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub records: Vec<IterationRecord>,
    pub best_index: Option<usize>,
    pub termination: Termination,
    pub total_duration_secs: f64,
}

impl OptimizationOutcome {
    pub fn new(records: Vec<IterationRecord>, termination: Termination, duration: Duration) -> Self {
        Self {
            best_index: select_best(&records),
            records,
            termination,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn best(&self) -> Option<&IterationRecord> {
        self.best_index.and_then(|i| self.records.get(i))
    }

    pub fn iterations(&self) -> usize {
        self.records.len()
    }

    pub fn exit_code(&self) -> i32 {
        self.termination.exit_code()
    }

    pub fn metrics(&self) -> RunMetrics {
        let accuracies: Vec<f64> = self.records.iter().map(|r| r.accuracy).collect();
        let first = accuracies.first().copied().unwrap_or(0.0);
        let last = accuracies.last().copied().unwrap_or(0.0);
        let average = if accuracies.is_empty() {
            0.0
        } else {
            accuracies.iter().sum::<f64>() / accuracies.len() as f64
        };

        RunMetrics {
            iterations: self.records.len(),
            best_accuracy: self.best().map(|r| r.accuracy).unwrap_or(0.0),
            final_accuracy: last,
            average_accuracy: average,
            improvement: last - first,
            total_errors: self.records.iter().map(|r| r.errors.total_errors).sum(),
        }
    }
}
