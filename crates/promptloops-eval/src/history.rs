use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

use crate::ErrorSummary;

/// Immutable snapshot of one loop pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-indexed iteration number
    pub iteration: usize,
    pub prompt: String,
    /// Fraction of ground-truth fields reproduced across all samples
    pub accuracy: f64,
    pub correct_fields: usize,
    pub total_fields: usize,
    /// Estimated token cost of the prompt
    pub prompt_tokens: usize,
    pub errors: ErrorSummary,
    /// Mentor field notes the agent ran with
    #[serde(default)]
    pub field_notes: BTreeMap<String, String>,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

/// Index of the best record: highest accuracy, then lowest token cost, then
/// earliest iteration.
pub fn select_best(records: &[IterationRecord]) -> Option<usize> {
    records
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            b.accuracy
                .partial_cmp(&a.accuracy)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.prompt_tokens.cmp(&b.prompt_tokens))
                .then_with(|| a.iteration.cmp(&b.iteration))
        })
        .map(|(index, _)| index)
}

/// FIFO buffer of the most recent records, never longer than its capacity
#[derive(Debug, Clone, Default)]
pub struct HistoryWindow {
    capacity: usize,
    records: VecDeque<IterationRecord>,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a record, returning whatever was evicted to make room
    pub fn push(&mut self, record: IterationRecord) -> Option<IterationRecord> {
        if self.capacity == 0 {
            return Some(record);
        }
        let evicted = if self.records.len() == self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &IterationRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(iteration: usize, accuracy: f64, prompt_tokens: usize) -> IterationRecord {
        IterationRecord {
            iteration,
            prompt: format!("prompt {}", iteration),
            accuracy,
            correct_fields: 0,
            total_fields: 0,
            prompt_tokens,
            errors: ErrorSummary::default(),
            field_notes: BTreeMap::new(),
            duration_secs: 0.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_best_prefers_fewer_tokens_on_tie() {
        let records = vec![record(1, 0.9, 100), record(2, 0.9, 80)];
        assert_eq!(select_best(&records), Some(1));
    }

    #[test]
    fn test_best_prefers_accuracy_over_tokens() {
        let records = vec![record(1, 0.9, 100), record(2, 0.9, 80), record(3, 0.95, 200)];
        assert_eq!(select_best(&records), Some(2));
    }

    #[test]
    fn test_best_full_tie_keeps_earliest() {
        let records = vec![record(1, 0.5, 10), record(2, 0.5, 10)];
        assert_eq!(select_best(&records), Some(0));
    }

    #[test]
    fn test_best_of_nothing() {
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn test_window_evicts_oldest_first() {
        let mut window = HistoryWindow::new(2);
        assert!(window.push(record(1, 0.1, 1)).is_none());
        assert!(window.push(record(2, 0.2, 1)).is_none());
        let evicted = window.push(record(3, 0.3, 1)).unwrap();

        assert_eq!(evicted.iteration, 1);
        assert_eq!(window.len(), 2);
        let kept: Vec<usize> = window.iter().map(|r| r.iteration).collect();
        assert_eq!(kept, vec![2, 3]);
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut window = HistoryWindow::new(3);
        for i in 1..=10 {
            window.push(record(i, 0.0, 1));
            assert!(window.len() <= 3);
        }
        assert_eq!(window.iter().next().map(|r| r.iteration), Some(8));
    }

    #[test]
    fn test_zero_capacity_window_stays_empty() {
        let mut window = HistoryWindow::new(0);
        let bounced = window.push(record(1, 0.0, 1));
        assert_eq!(bounced.map(|r| r.iteration), Some(1));
        assert!(window.is_empty());
    }
}
