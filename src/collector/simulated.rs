//! Synthetic accelerometer for running the agent without hardware.
//!
//! Each activity is modelled as gravity plus a few sinusoids whose frequency
//! and amplitude roughly match the body motion. Output is deterministic.

use crate::collector::types::{Sample, SampleSource, SensorFault};
use crate::core::classifier::Label;
use std::f64::consts::TAU;

/// Standard gravity in m/s².
pub const GRAVITY: f64 = 9.80665;

/// A deterministic signal generator imitating one activity.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    activity: Label,
    sample_rate_hz: f64,
    index: u64,
}

impl SimulatedSource {
    /// Create a generator for `activity` sampled at `sample_rate_hz`.
    pub fn new(activity: Label, sample_rate_hz: f64) -> Self {
        Self {
            activity,
            sample_rate_hz: if sample_rate_hz > 0.0 { sample_rate_hz } else { 1.0 },
            index: 0,
        }
    }

    /// The activity being imitated.
    pub fn activity(&self) -> Label {
        self.activity
    }

    fn sample_at(&self, t: f64) -> Sample {
        // Low-amplitude tremor so that even "rest" is not perfectly constant.
        let tremor = 0.02 * (TAU * 7.3 * t).sin();

        match self.activity {
            Label::Rest => Sample::new(tremor, 0.5 * tremor, GRAVITY + tremor),
            Label::Walking => {
                let step = TAU * 1.8 * t;
                Sample::new(
                    1.2 * step.sin() + tremor,
                    0.6 * (step / 2.0).sin(),
                    GRAVITY + 2.0 * (2.0 * step).sin(),
                )
            }
            Label::Running => {
                let stride = TAU * 2.8 * t;
                Sample::new(
                    4.0 * stride.sin() + tremor,
                    1.5 * (stride / 2.0).cos(),
                    GRAVITY + 7.0 * (2.0 * stride).sin(),
                )
            }
            Label::Situps => {
                // Torso pitching through ~80 degrees every two seconds.
                let pitch = 0.7 + 0.7 * (TAU * 0.5 * t).sin();
                Sample::new(GRAVITY * pitch.sin(), tremor, GRAVITY * pitch.cos())
            }
        }
    }
}

impl SampleSource for SimulatedSource {
    fn read(&mut self) -> Result<Sample, SensorFault> {
        let t = self.index as f64 / self.sample_rate_hz;
        self.index += 1;
        Ok(self.sample_at(t))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
