//! Sample collection for the Activity Sensor Agent.
//!
//! This module defines the [`SampleSource`] seam the sampling loop reads
//! from, plus the sources shipped with the crate: a synthetic generator and a
//! CSV replayer. Hardware drivers implement the same trait.

pub mod replay;
pub mod simulated;
pub mod types;

// Re-export commonly used types
pub use replay::ReplaySource;
pub use simulated::SimulatedSource;
pub use types::{Sample, SampleSource, SensorFault};
