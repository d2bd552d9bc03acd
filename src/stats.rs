//! Run statistics for the agent.
//!
//! Counters are updated lock-free from the sampling thread, the inference
//! loop and the inference tasks, and summarized when the agent stops.

use crate::core::classifier::Label;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one agent run.
#[derive(Debug)]
pub struct RunStats {
    /// Samples read from the source
    samples_read: AtomicU64,
    /// Windows published to the buffer
    windows_published: AtomicU64,
    /// Inference tasks started
    inferences_dispatched: AtomicU64,
    /// Poll cycles skipped because every inference slot was busy
    inferences_skipped: AtomicU64,
    /// Inference tasks that panicked
    inferences_failed: AtomicU64,
    /// Predictions per label id, in [`Label::ALL`] order
    label_counts: [AtomicU64; 4],
    /// Predictions with an id outside the label map
    unknown_predictions: AtomicU64,
    /// Run start time
    started_at: DateTime<Utc>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            samples_read: AtomicU64::new(0),
            windows_published: AtomicU64::new(0),
            inferences_dispatched: AtomicU64::new(0),
            inferences_skipped: AtomicU64::new(0),
            inferences_failed: AtomicU64::new(0),
            label_counts: Default::default(),
            unknown_predictions: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_sample(&self) {
        self.samples_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_published(&self) {
        self.windows_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_dispatched(&self) {
        self.inferences_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_skipped(&self) {
        self.inferences_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_failed(&self) {
        self.inferences_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed prediction.
    pub fn record_prediction(&self, label: Option<Label>) {
        match label {
            Some(label) => {
                let slot = Label::ALL.iter().position(|l| *l == label).unwrap_or(0);
                self.label_counts[slot].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.unknown_predictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        let label_counts = Label::ALL
            .iter()
            .zip(&self.label_counts)
            .map(|(label, count)| LabelCount {
                label: *label,
                count: count.load(Ordering::Relaxed),
            })
            .collect();

        StatsSnapshot {
            samples_read: self.samples_read.load(Ordering::Relaxed),
            windows_published: self.windows_published.load(Ordering::Relaxed),
            inferences_dispatched: self.inferences_dispatched.load(Ordering::Relaxed),
            inferences_skipped: self.inferences_skipped.load(Ordering::Relaxed),
            inferences_failed: self.inferences_failed.load(Ordering::Relaxed),
            label_counts,
            unknown_predictions: self.unknown_predictions.load(Ordering::Relaxed),
            started_at: self.started_at,
            run_duration_secs: (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        self.snapshot().summary()
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Predictions recorded for one label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: Label,
    pub count: u64,
}

/// Point-in-time copy of [`RunStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub samples_read: u64,
    pub windows_published: u64,
    pub inferences_dispatched: u64,
    pub inferences_skipped: u64,
    pub inferences_failed: u64,
    pub label_counts: Vec<LabelCount>,
    pub unknown_predictions: u64,
    pub started_at: DateTime<Utc>,
    pub run_duration_secs: f64,
}

impl StatsSnapshot {
    /// Total predictions reported, including unknown ids.
    pub fn predictions(&self) -> u64 {
        self.label_counts.iter().map(|c| c.count).sum::<u64>() + self.unknown_predictions
    }

    /// Predictions recorded for `label`.
    pub fn count_for(&self, label: Label) -> u64 {
        self.label_counts
            .iter()
            .find(|c| c.label == label)
            .map_or(0, |c| c.count)
    }

    pub fn summary(&self) -> String {
        let labels: Vec<String> = self
            .label_counts
            .iter()
            .map(|c| format!("   - {}: {}", c.label, c.count))
            .collect();

        format!(
            "Run Statistics:\n\
             - Samples read: {}\n\
             - Windows published: {}\n\
             - Inferences dispatched: {}\n\
             - Inferences skipped (all slots busy): {}\n\
             - Inferences failed: {}\n\
             - Predictions: {}\n\
             {}\n\
             \x20  - unknown: {}\n\
             - Run duration: {:.1} seconds",
            self.samples_read,
            self.windows_published,
            self.inferences_dispatched,
            self.inferences_skipped,
            self.inferences_failed,
            self.predictions(),
            labels.join("\n"),
            self.unknown_predictions,
            self.run_duration_secs
        )
    }
}

/// Thread-safe shared run statistics.
pub type SharedRunStats = Arc<RunStats>;
