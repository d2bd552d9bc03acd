//! Core functionality for the Activity Sensor Agent.
//!
//! This module contains:
//! - Windowing: assembling samples into windows and sharing the latest one
//! - Feature extraction from a window
//! - The classifier seam and artifact loading

pub mod artifacts;
pub mod classifier;
pub mod features;
pub mod windowing;

// Re-export commonly used types
pub use artifacts::{load_classifier, ArtifactError, ModelArtifact, StandardScaler};
pub use classifier::{
    Classification, Classifier, ConstantModel, IdentityScaler, Label, Model, ModelKind, Scaler,
};
pub use features::{extract, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use windowing::{
    SharedWindowBuffer, Window, WindowAssembler, WindowBuffer, WindowError, WindowSnapshot,
};
