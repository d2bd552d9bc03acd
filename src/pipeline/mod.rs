//! The producer/consumer pipeline.
//!
//! ```text
//! SampleSource ──▶ SamplingLoop ──▶ WindowBuffer ──▶ InferenceLoop ──▶ Reporter
//!   (thread)         publish()        snapshot()       (bounded tasks)
//! ```
//!
//! [`Pipeline`] owns both loops. The sampling loop runs on a blocking
//! thread so sensor reads never wait on the async runtime; the inference
//! loop runs on the runtime and fans out to blocking tasks. The only state
//! the two loops share is the [`WindowBuffer`].

pub mod inference;
pub mod report;
pub mod sampling;
pub mod shutdown;

pub use inference::{infer, InferenceLoop, PollOutcome};
pub use report::{ChannelReporter, Prediction, Reporter, StdoutReporter};
pub use sampling::SamplingLoop;
pub use shutdown::Shutdown;

use crate::collector::types::{SampleSource, SensorFault};
use crate::config::{Config, ConfigError};
use crate::core::classifier::Classifier;
use crate::core::windowing::{SharedWindowBuffer, WindowBuffer};
use crate::stats::{RunStats, SharedRunStats, StatsSnapshot};
use std::sync::Arc;

/// Errors that end a pipeline run.
#[derive(Debug)]
pub enum PipelineError {
    /// The configuration was rejected before either loop started.
    Config(ConfigError),
    /// The sample source failed; the run was stopped.
    Sensor(SensorFault),
    /// The sampling thread panicked or could not be joined.
    SamplingThread(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Config(e) => write!(f, "Pipeline not started: {e}"),
            PipelineError::Sensor(e) => write!(f, "Sampling stopped: {e}"),
            PipelineError::SamplingThread(e) => write!(f, "Sampling thread failed: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Config(e) => Some(e),
            PipelineError::Sensor(e) => Some(e),
            PipelineError::SamplingThread(_) => None,
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        PipelineError::Config(e)
    }
}

impl From<SensorFault> for PipelineError {
    fn from(e: SensorFault) -> Self {
        PipelineError::Sensor(e)
    }
}

/// Supervisor for one run of the sampling and inference loops.
pub struct Pipeline<S> {
    config: Config,
    source: S,
    classifier: Classifier,
    reporter: Arc<dyn Reporter>,
    buffer: SharedWindowBuffer,
    stats: SharedRunStats,
}

impl<S: SampleSource + 'static> Pipeline<S> {
    pub fn new(
        config: Config,
        source: S,
        classifier: Classifier,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            config,
            source,
            classifier,
            reporter,
            buffer: Arc::new(WindowBuffer::new()),
            stats: Arc::new(RunStats::new()),
        }
    }

    /// The shared window buffer.
    pub fn buffer(&self) -> SharedWindowBuffer {
        self.buffer.clone()
    }

    /// Live run statistics.
    pub fn stats(&self) -> SharedRunStats {
        self.stats.clone()
    }

    /// Run until `shutdown` is triggered or the sample source fails.
    ///
    /// On return both loops have stopped and every dispatched inference has
    /// reported. A sensor fault triggers `shutdown` so that other holders of
    /// the token stop as well. An invalid configuration is returned as
    /// [`PipelineError::Config`] without starting anything.
    pub async fn run(self, shutdown: Shutdown) -> Result<StatsSnapshot, PipelineError> {
        self.config.validate()?;

        let Pipeline {
            config,
            source,
            classifier,
            reporter,
            buffer,
            stats,
        } = self;

        tracing::info!(
            sample_rate_hz = config.sample_rate_hz,
            window_length = config.window_length,
            model = classifier.kind().map_or("custom", |k| k.as_str()),
            "Starting pipeline"
        );

        let sampling = {
            let buffer = buffer.clone();
            let stats = stats.clone();
            let shutdown = shutdown.clone();
            let sampler = SamplingLoop::new(source, config.sample_interval(), config.window_length);
            tokio::task::spawn_blocking(move || {
                let result = sampler.run(&buffer, &stats, &shutdown);
                // Whatever ended sampling ends the run.
                shutdown.trigger();
                result
            })
        };

        let inference = InferenceLoop::new(
            buffer,
            classifier,
            reporter,
            stats.clone(),
            config.poll_interval,
            config.max_in_flight,
        );
        inference.run(shutdown).await;

        let sampling_result = sampling
            .await
            .map_err(|e| PipelineError::SamplingThread(e.to_string()))?;
        sampling_result?;

        tracing::info!("Pipeline stopped");
        Ok(stats.snapshot())
    }
}
