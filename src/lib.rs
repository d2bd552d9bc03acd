//! Activity Sensor Agent - continuous activity recognition from an accelerometer.
//!
//! The agent samples a 3-axis accelerometer at a fixed rate, cuts the stream
//! into fixed-length windows, computes a 21-value statistical feature vector
//! per window and classifies it with a pre-trained model into one of
//! `situps`, `rest`, `running` or `walking`.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Activity Sensor Agent                      │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐          │
//! │  │  Collector  │──▶│  Sampling   │──▶│   Window    │          │
//! │  │ (40 Hz xyz) │   │    Loop     │   │   Buffer    │          │
//! │  └─────────────┘   └─────────────┘   └──────┬──────┘          │
//! │                                             │ snapshot        │
//! │                                             ▼                 │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐          │
//! │  │  Reporter   │◀──│ Classifier  │◀──│  Features   │          │
//! │  │  (stdout)   │   │ scale+model │   │ (21 stats)  │          │
//! │  └─────────────┘   └─────────────┘   └─────────────┘          │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use activity_sensor_agent::{
//!     collector::SimulatedSource,
//!     config::Config,
//!     core::{load_classifier, Label},
//!     pipeline::{Pipeline, Shutdown, StdoutReporter},
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let classifier = load_classifier(&config.models_dir, config.model_kind)?;
//! let source = SimulatedSource::new(Label::Walking, config.sample_rate_hz);
//! let reporter = Arc::new(StdoutReporter::new(config.output));
//!
//! let pipeline = Pipeline::new(config, source, classifier, reporter);
//! let stats = pipeline.run(Shutdown::new()).await?;
//! println!("{}", stats.summary());
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod stats;

// Re-export key types at crate root for convenience
pub use collector::{ReplaySource, Sample, SampleSource, SensorFault, SimulatedSource};
pub use config::{Config, ConfigError, OutputFormat};
pub use core::{
    extract, load_classifier, ArtifactError, Classifier, FeatureVector, Label, ModelKind, Window,
    WindowBuffer, WindowSnapshot,
};
pub use pipeline::{Pipeline, PipelineError, Prediction, Reporter, Shutdown, StdoutReporter};
pub use stats::{RunStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
