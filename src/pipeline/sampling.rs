//! The sampling loop: sensor reads at a fixed rate, published as windows.

use crate::collector::types::{SampleSource, SensorFault};
use crate::core::windowing::{WindowAssembler, WindowBuffer};
use crate::pipeline::shutdown::Shutdown;
use crate::stats::RunStats;
use std::time::{Duration, Instant};

/// Drives a [`SampleSource`] and publishes completed windows.
pub struct SamplingLoop<S> {
    source: S,
    interval: Duration,
    assembler: WindowAssembler,
}

impl<S: SampleSource> SamplingLoop<S> {
    /// Read from `source` every `interval`, publishing windows of
    /// `window_length` samples.
    pub fn new(source: S, interval: Duration, window_length: usize) -> Self {
        Self {
            source,
            interval,
            assembler: WindowAssembler::new(window_length),
        }
    }

    /// Run until shutdown is requested or the source faults.
    ///
    /// Blocks the calling thread. A fault is returned as-is; the partially
    /// filled window is discarded and nothing is published in its place.
    pub fn run(
        mut self,
        buffer: &WindowBuffer,
        stats: &RunStats,
        shutdown: &Shutdown,
    ) -> Result<(), SensorFault> {
        tracing::info!(
            source = self.source.name(),
            interval_ms = self.interval.as_secs_f64() * 1000.0,
            window_length = self.assembler.window_length(),
            "Sampling loop started"
        );

        let mut deadline = Instant::now();

        while !shutdown.is_triggered() {
            let sample = match self.source.read() {
                Ok(sample) => sample,
                Err(fault) => {
                    tracing::error!(
                        discarded = self.assembler.pending(),
                        "Sensor read failed: {fault}"
                    );
                    self.assembler.reset();
                    return Err(fault);
                }
            };
            stats.record_sample();

            if let Some(window) = self.assembler.push(sample) {
                let sequence = buffer.publish(window);
                stats.record_window_published();
                tracing::debug!(sequence, "Published window");
            }

            deadline += self.interval;
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            } else if now - deadline > self.interval {
                // Fell more than a full interval behind; re-anchor rather
                // than bursting reads to catch up.
                tracing::warn!(
                    behind_ms = (now - deadline).as_secs_f64() * 1000.0,
                    "Sampling fell behind schedule"
                );
                deadline = now;
            }
        }

        tracing::info!(
            discarded = self.assembler.pending(),
            "Sampling loop stopped"
        );
        self.assembler.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::Sample;
    use crate::collector::ReplaySource;

    /// Yields increasing x values, then faults.
    struct FaultAfter {
        remaining: usize,
        next: f64,
    }

    impl SampleSource for FaultAfter {
        fn read(&mut self) -> Result<Sample, SensorFault> {
            if self.remaining == 0 {
                return Err(SensorFault::Io(std::io::Error::other("bus error")));
            }
            self.remaining -= 1;
            self.next += 1.0;
            Ok(Sample::new(self.next, 0.0, 0.0))
        }
    }

    #[test]
    fn test_publishes_complete_windows_then_propagates_fault() {
        let buffer = WindowBuffer::new();
        let stats = RunStats::new();
        let shutdown = Shutdown::new();

        let source = FaultAfter {
            remaining: 7,
            next: 0.0,
        };
        let result = SamplingLoop::new(source, Duration::ZERO, 3).run(&buffer, &stats, &shutdown);

        assert!(matches!(result, Err(SensorFault::Io(_))));
        // Seven samples make two full windows; the seventh is dropped.
        assert_eq!(buffer.published_count(), 2);
        assert_eq!(buffer.snapshot().unwrap().window.x(), &[4.0, 5.0, 6.0]);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.samples_read, 7);
        assert_eq!(snapshot.windows_published, 2);
    }

    #[test]
    fn test_exits_cleanly_on_shutdown() {
        let buffer = WindowBuffer::new();
        let stats = RunStats::new();
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let source = ReplaySource::from_samples(vec![Sample::new(1.0, 1.0, 1.0)], true);
        let result =
            SamplingLoop::new(source, Duration::from_millis(1), 2).run(&buffer, &stats, &shutdown);

        assert!(result.is_ok());
        assert_eq!(stats.snapshot().samples_read, 0);
    }

    #[test]
    fn test_paces_reads() {
        let buffer = WindowBuffer::new();
        let stats = RunStats::new();
        let shutdown = Shutdown::new();

        // Ten samples at 5 ms, then the replay runs dry.
        let samples = vec![Sample::new(0.0, 0.0, 0.0); 10];
        let source = ReplaySource::from_samples(samples, false);

        let started = Instant::now();
        let result =
            SamplingLoop::new(source, Duration::from_millis(5), 5).run(&buffer, &stats, &shutdown);

        assert!(matches!(result, Err(SensorFault::Exhausted)));
        assert!(started.elapsed() >= Duration::from_millis(45));
        assert_eq!(buffer.published_count(), 2);
    }
}
