//! Sample types and the sensor source seam.
//!
//! The accelerometer bus driver lives outside this crate. Anything that can
//! produce one `(x, y, z)` reading per call implements [`SampleSource`].

use serde::{Deserialize, Serialize};

/// One accelerometer reading, in the sensor's native units (m/s² for the
/// reference ADXL343).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm of the acceleration vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl From<(f64, f64, f64)> for Sample {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self { x, y, z }
    }
}

/// A source of accelerometer samples.
///
/// `read` is called from the sampling thread at up to the configured rate and
/// may block for the duration of a bus transaction.
pub trait SampleSource: Send {
    /// Read the current acceleration.
    fn read(&mut self) -> Result<Sample, SensorFault>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "sensor"
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read(&mut self) -> Result<Sample, SensorFault> {
        (**self).read()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A failed sensor read. Always fatal to the sampling loop.
#[derive(Debug)]
pub enum SensorFault {
    /// The underlying bus transaction failed.
    Io(std::io::Error),
    /// The device answered with something that is not a sample.
    InvalidReading(String),
    /// A finite source (e.g. a replay file) has no more samples.
    Exhausted,
}

impl std::fmt::Display for SensorFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorFault::Io(e) => write!(f, "Sensor I/O error: {e}"),
            SensorFault::InvalidReading(e) => write!(f, "Invalid sensor reading: {e}"),
            SensorFault::Exhausted => write!(f, "Sample source exhausted"),
        }
    }
}

impl std::error::Error for SensorFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SensorFault::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SensorFault {
    fn from(e: std::io::Error) -> Self {
        SensorFault::Io(e)
    }
}
