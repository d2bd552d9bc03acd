//! The inference loop: poll the window buffer and classify in the background.
//!
//! Every poll interval the loop takes a snapshot of the latest window and
//! hands it to a blocking task that extracts features, classifies and
//! reports. At most `max_in_flight` tasks run at once; when all slots are
//! busy the cycle is skipped instead of queueing more work. The same window
//! may be classified more than once, which is harmless since reports have no
//! side effects beyond output.

use crate::core::classifier::Classifier;
use crate::core::features;
use crate::core::windowing::{SharedWindowBuffer, WindowSnapshot};
use crate::pipeline::report::{Prediction, Reporter};
use crate::pipeline::shutdown::Shutdown;
use crate::stats::SharedRunStats;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;

/// What a single poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No window has been published yet.
    Empty,
    /// An inference task was started for this window sequence.
    Dispatched(u64),
    /// Every inference slot was busy.
    Saturated,
}

/// Extract features from a snapshot and classify them.
pub fn infer(snapshot: &WindowSnapshot, classifier: &Classifier) -> Prediction {
    let started = Instant::now();
    let features = features::extract(&snapshot.window);
    let classification = classifier.classify(&features);

    Prediction {
        label: classification.label,
        label_id: classification.label_id,
        window_sequence: snapshot.sequence,
        predicted_at: Utc::now(),
        latency: started.elapsed(),
    }
}

/// Periodically classifies the latest published window.
pub struct InferenceLoop {
    buffer: SharedWindowBuffer,
    classifier: Classifier,
    reporter: Arc<dyn Reporter>,
    stats: SharedRunStats,
    poll_interval: Duration,
    slots: Arc<Semaphore>,
    tasks: JoinSet<Prediction>,
}

/// Shortest poll period; a zero period is raised to this.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl InferenceLoop {
    pub fn new(
        buffer: SharedWindowBuffer,
        classifier: Classifier,
        reporter: Arc<dyn Reporter>,
        stats: SharedRunStats,
        poll_interval: Duration,
        max_in_flight: usize,
    ) -> Self {
        Self {
            buffer,
            classifier,
            reporter,
            stats,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            slots: Arc::new(Semaphore::new(max_in_flight.max(1))),
            tasks: JoinSet::new(),
        }
    }

    /// Number of inference tasks not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Take one snapshot and dispatch it if possible.
    ///
    /// Must be called from within a tokio runtime.
    pub fn poll_once(&mut self) -> PollOutcome {
        let Some(snapshot) = self.buffer.snapshot() else {
            tracing::trace!("No window published yet, skipping cycle");
            return PollOutcome::Empty;
        };

        let Ok(permit) = self.slots.clone().try_acquire_owned() else {
            self.stats.record_inference_skipped();
            tracing::debug!(
                sequence = snapshot.sequence,
                "All inference slots busy, skipping cycle"
            );
            return PollOutcome::Saturated;
        };

        let sequence = snapshot.sequence;
        let classifier = self.classifier.clone();
        let reporter = self.reporter.clone();
        let stats = self.stats.clone();

        self.stats.record_inference_dispatched();
        self.tasks.spawn_blocking(move || {
            let prediction = infer(&snapshot, &classifier);
            reporter.report(&prediction);
            stats.record_prediction(prediction.label);
            drop(permit);
            prediction
        });
        tracing::debug!(sequence, "Dispatched inference");

        PollOutcome::Dispatched(sequence)
    }

    /// Poll until shutdown, then wait for in-flight tasks to finish.
    pub async fn run(mut self, shutdown: Shutdown) {
        tracing::info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            max_in_flight = self.slots.available_permits(),
            "Inference loop started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; wait a full interval instead.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.triggered() => break,
                Some(result) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.reap(result);
                }
                _ = ticker.tick() => {
                    self.poll_once();
                }
            }
        }

        let pending = self.tasks.len();
        if pending > 0 {
            tracing::debug!(pending, "Waiting for in-flight inference");
        }
        while let Some(result) = self.tasks.join_next().await {
            self.reap(result);
        }
        tracing::info!("Inference loop stopped");
    }

    fn reap(&self, result: Result<Prediction, JoinError>) {
        match result {
            Ok(prediction) => {
                tracing::debug!(
                    sequence = prediction.window_sequence,
                    label = prediction.label_name(),
                    latency_us = prediction.latency.as_micros() as u64,
                    "Inference complete"
                );
            }
            Err(e) => {
                self.stats.record_inference_failed();
                tracing::error!("Inference task failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::{ConstantModel, IdentityScaler, Label, Model};
    use crate::core::windowing::{Window, WindowBuffer};
    use crate::pipeline::report::ChannelReporter;
    use crate::stats::RunStats;
    use std::sync::{Condvar, Mutex};

    fn stub_classifier(label_id: i64) -> Classifier {
        Classifier::new(Arc::new(IdentityScaler), Arc::new(ConstantModel(label_id)))
    }

    fn sample_window() -> Window {
        Window::from_series(
            vec![0.1, 0.5, -0.2, 0.3],
            vec![1.0, 0.8, 1.2, 0.9],
            vec![9.7, 9.9, 9.6, 9.8],
        )
        .unwrap()
    }

    /// Blocks every prediction until released.
    struct GatedModel {
        open: Mutex<bool>,
        cv: Condvar,
    }

    impl GatedModel {
        fn new() -> Self {
            Self {
                open: Mutex::new(false),
                cv: Condvar::new(),
            }
        }

        fn release(&self) {
            *self.open.lock().unwrap() = true;
            self.cv.notify_all();
        }
    }

    impl Model for GatedModel {
        fn predict(&self, _features: &[f64]) -> i64 {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cv.wait(open).unwrap();
            }
            1
        }
    }

    fn inference_loop(
        buffer: SharedWindowBuffer,
        classifier: Classifier,
        max_in_flight: usize,
    ) -> (
        InferenceLoop,
        crossbeam_channel::Receiver<Prediction>,
        SharedRunStats,
    ) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let stats = Arc::new(RunStats::new());
        let inference = InferenceLoop::new(
            buffer,
            classifier,
            Arc::new(ChannelReporter::new(tx)),
            stats.clone(),
            Duration::from_millis(5),
            max_in_flight,
        );
        (inference, rx, stats)
    }

    #[test]
    fn test_infer_stub_classifier_reports_running() {
        let buffer = WindowBuffer::new();
        buffer.publish(sample_window());
        let snapshot = buffer.snapshot().unwrap();

        let prediction = infer(&snapshot, &stub_classifier(2));
        assert_eq!(prediction.label, Some(Label::Running));
        assert_eq!(prediction.label_name(), "running");
        assert_eq!(prediction.window_sequence, 1);
    }

    #[tokio::test]
    async fn test_empty_buffer_skips_cycle() {
        let buffer = Arc::new(WindowBuffer::new());
        let (mut inference, rx, stats) = inference_loop(buffer, stub_classifier(2), 2);

        assert_eq!(inference.poll_once(), PollOutcome::Empty);
        assert_eq!(inference.in_flight(), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(stats.snapshot().inferences_dispatched, 0);
    }

    #[tokio::test]
    async fn test_dispatched_task_reports_label() {
        let buffer = Arc::new(WindowBuffer::new());
        buffer.publish(sample_window());
        let (mut inference, rx, stats) = inference_loop(buffer, stub_classifier(2), 2);

        assert_eq!(inference.poll_once(), PollOutcome::Dispatched(1));

        let prediction = tokio::task::spawn_blocking(move || {
            rx.recv_timeout(Duration::from_secs(5)).expect("no prediction")
        })
        .await
        .unwrap();
        assert_eq!(prediction.label, Some(Label::Running));
        assert_eq!(stats.snapshot().inferences_dispatched, 1);
    }

    #[tokio::test]
    async fn test_saturated_slots_skip_dispatch() {
        let buffer = Arc::new(WindowBuffer::new());
        buffer.publish(sample_window());
        let model = Arc::new(GatedModel::new());
        let classifier = Classifier::new(Arc::new(IdentityScaler), model.clone());
        let (mut inference, rx, stats) = inference_loop(buffer, classifier, 1);

        assert_eq!(inference.poll_once(), PollOutcome::Dispatched(1));
        assert_eq!(inference.poll_once(), PollOutcome::Saturated);
        assert_eq!(inference.poll_once(), PollOutcome::Saturated);
        assert_eq!(stats.snapshot().inferences_skipped, 2);

        model.release();
        let prediction = tokio::task::spawn_blocking(move || {
            rx.recv_timeout(Duration::from_secs(5)).expect("no prediction")
        })
        .await
        .unwrap();
        assert_eq!(prediction.label, Some(Label::Rest));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let buffer = Arc::new(WindowBuffer::new());
        let (inference, rx, stats) = inference_loop(buffer.clone(), stub_classifier(3), 4);
        let shutdown = Shutdown::new();

        let handle = tokio::spawn(inference.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        buffer.publish(sample_window());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("inference loop did not stop")
            .unwrap();

        // Shutdown waits for in-flight work, so every dispatch has reported.
        let snapshot = stats.snapshot();
        assert!(snapshot.inferences_dispatched >= 1);
        assert_eq!(snapshot.count_for(Label::Walking), snapshot.inferences_dispatched);
        assert_eq!(rx.try_iter().count() as u64, snapshot.inferences_dispatched);
    }

    #[tokio::test]
    async fn test_zero_poll_interval_is_raised() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let inference = InferenceLoop::new(
            Arc::new(WindowBuffer::new()),
            stub_classifier(1),
            Arc::new(ChannelReporter::new(tx)),
            Arc::new(RunStats::new()),
            Duration::ZERO,
            0,
        );
        assert_eq!(inference.poll_interval, MIN_POLL_INTERVAL);

        let shutdown = Shutdown::new();
        let handle = tokio::spawn(inference.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("inference loop did not stop")
            .unwrap();
    }
}
