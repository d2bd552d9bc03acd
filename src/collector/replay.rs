//! Replay of recorded accelerometer data.
//!
//! Recordings are plain text with one `x,y,z` row per sample. A first row
//! that does not parse as numbers is treated as a header. Blank lines and
//! lines starting with `#` are ignored.

use crate::collector::types::{Sample, SampleSource, SensorFault};
use std::path::Path;

/// Replays a fixed list of samples, optionally looping forever.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    samples: Vec<Sample>,
    position: usize,
    looped: bool,
}

impl ReplaySource {
    /// Build a source from samples already in memory.
    pub fn from_samples(samples: Vec<Sample>, looped: bool) -> Self {
        Self {
            samples,
            position: 0,
            looped,
        }
    }

    /// Load a CSV recording from disk.
    pub fn open(path: &Path, looped: bool) -> Result<Self, SensorFault> {
        let content = std::fs::read_to_string(path)?;
        let samples = parse_csv(&content)?;
        Ok(Self::from_samples(samples, looped))
    }

    /// Number of samples in the recording.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the recording holds no samples at all.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSource for ReplaySource {
    fn read(&mut self) -> Result<Sample, SensorFault> {
        if self.position >= self.samples.len() {
            if !self.looped || self.samples.is_empty() {
                return Err(SensorFault::Exhausted);
            }
            self.position = 0;
        }

        let sample = self.samples[self.position];
        self.position += 1;
        Ok(sample)
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// Parse `x,y,z` rows into samples.
pub fn parse_csv(content: &str) -> Result<Vec<Sample>, SensorFault> {
    let mut samples = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_row(line) {
            Some(sample) => samples.push(sample),
            // Header row
            None if samples.is_empty() && line_no == 0 => continue,
            None => {
                return Err(SensorFault::InvalidReading(format!(
                    "line {}: expected three numbers, got {line:?}",
                    line_no + 1
                )))
            }
        }
    }

    Ok(samples)
}

fn parse_row(line: &str) -> Option<Sample> {
    let mut fields = line.split(',').map(|f| f.trim().parse::<f64>());
    let x = fields.next()?.ok()?;
    let y = fields.next()?.ok()?;
    let z = fields.next()?.ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Sample::new(x, y, z))
}
