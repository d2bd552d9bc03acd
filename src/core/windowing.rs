//! Sample windows and the shared window buffer.
//!
//! The sampling loop assembles fixed-length windows with a
//! [`WindowAssembler`] and publishes them to a [`WindowBuffer`]. Readers take
//! snapshots; a published window is never mutated.

use crate::collector::types::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Three equal-length axis series covering one contiguous block of samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct Window {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

#[derive(Deserialize)]
struct RawWindow {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

impl TryFrom<RawWindow> for Window {
    type Error = WindowError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        Window::from_series(raw.x, raw.y, raw.z)
    }
}

impl Window {
    /// Build a window from three axis series of identical length.
    pub fn from_series(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self, WindowError> {
        if x.len() != y.len() || y.len() != z.len() {
            return Err(WindowError::UnequalSeries {
                x: x.len(),
                y: y.len(),
                z: z.len(),
            });
        }
        Ok(Self { x, y, z })
    }

    /// Build a window from a slice of samples.
    pub fn from_samples(samples: &[Sample]) -> Self {
        Self {
            x: samples.iter().map(|s| s.x).collect(),
            y: samples.iter().map(|s| s.y).collect(),
            z: samples.iter().map(|s| s.z).collect(),
        }
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    /// Number of samples per axis.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Iterate the window as samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((&x, &y), &z)| Sample::new(x, y, z))
    }
}

/// Errors building a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    UnequalSeries { x: usize, y: usize, z: usize },
}

impl std::fmt::Display for WindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowError::UnequalSeries { x, y, z } => {
                write!(f, "Axis series have unequal lengths (x={x}, y={y}, z={z})")
            }
        }
    }
}

impl std::error::Error for WindowError {}

/// Collects samples into tumbling windows of a fixed length.
#[derive(Debug)]
pub struct WindowAssembler {
    length: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

impl WindowAssembler {
    /// Create an assembler producing windows of `length` samples (at least 1).
    pub fn new(length: usize) -> Self {
        let length = length.max(1);
        Self {
            length,
            x: Vec::with_capacity(length),
            y: Vec::with_capacity(length),
            z: Vec::with_capacity(length),
        }
    }

    /// Add a sample. Returns the completed window once `length` samples have
    /// accumulated; the assembler then starts over empty.
    pub fn push(&mut self, sample: Sample) -> Option<Window> {
        self.x.push(sample.x);
        self.y.push(sample.y);
        self.z.push(sample.z);

        if self.x.len() < self.length {
            return None;
        }

        let window = Window {
            x: std::mem::replace(&mut self.x, Vec::with_capacity(self.length)),
            y: std::mem::replace(&mut self.y, Vec::with_capacity(self.length)),
            z: std::mem::replace(&mut self.z, Vec::with_capacity(self.length)),
        };
        Some(window)
    }

    /// Drop any partially filled window.
    pub fn reset(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
    }

    /// Samples collected toward the current window.
    pub fn pending(&self) -> usize {
        self.x.len()
    }

    pub fn window_length(&self) -> usize {
        self.length
    }
}

/// A published window as seen by readers.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    /// Publish counter, starting at 1.
    pub sequence: u64,
    /// When the window was published.
    pub captured_at: DateTime<Utc>,
    pub window: Arc<Window>,
}

#[derive(Debug, Default)]
struct BufferState {
    latest: Option<WindowSnapshot>,
    published: u64,
}

/// The latest published window, shared between the sampling loop and the
/// inference loop.
///
/// The lock is held only to swap or clone an `Arc`, never across sensor I/O
/// or feature computation.
#[derive(Debug, Default)]
pub struct WindowBuffer {
    state: Mutex<BufferState>,
}

impl WindowBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored window. Returns the sequence number assigned to it.
    pub fn publish(&self, window: Window) -> u64 {
        let window = Arc::new(window);
        let captured_at = Utc::now();

        let mut state = self.lock();
        state.published += 1;
        let sequence = state.published;
        state.latest = Some(WindowSnapshot {
            sequence,
            captured_at,
            window,
        });
        sequence
    }

    /// The most recently published window, or `None` if nothing has been
    /// published yet.
    pub fn snapshot(&self) -> Option<WindowSnapshot> {
        self.lock().latest.clone()
    }

    /// Total number of windows published.
    pub fn published_count(&self) -> u64 {
        self.lock().published
    }

    // A poisoned lock still holds a complete snapshot, since the guarded
    // value is only ever replaced wholesale.
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Thread-safe shared window buffer.
pub type SharedWindowBuffer = Arc<WindowBuffer>;
