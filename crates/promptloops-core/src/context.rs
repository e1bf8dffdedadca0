use promptloops_eval::{HistoryWindow, IterationRecord};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// State threaded between iterations of one run
#[derive(Debug, Clone)]
pub struct LoopContext {
    /// Prompt the next iteration runs with
    pub current_prompt: String,
    /// Iteration about to run (1-indexed)
    pub iteration: usize,
    /// Every record so far, in order
    pub history: Vec<IterationRecord>,
    /// Most recent records for the mentor
    pub window: HistoryWindow,
    /// Mentor field notes accumulated so far
    pub field_notes: BTreeMap<String, String>,
    started_at: Instant,
}

impl LoopContext {
    pub fn new(initial_prompt: String, window_size: usize) -> Self {
        Self {
            current_prompt: initial_prompt,
            iteration: 1,
            history: Vec::new(),
            window: HistoryWindow::new(window_size),
            field_notes: BTreeMap::new(),
            started_at: Instant::now(),
        }
    }

    pub fn push_record(&mut self, record: IterationRecord) {
        self.window.push(record.clone());
        self.history.push(record);
    }

    /// Later notes replace earlier ones for the same field
    pub fn merge_notes(&mut self, notes: BTreeMap<String, String>) {
        self.field_notes.extend(notes);
    }

    /// Move on to the next iteration with a new prompt
    pub fn advance(&mut self, prompt: String) {
        self.current_prompt = prompt;
        self.iteration += 1;
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}
