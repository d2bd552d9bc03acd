//! Activity labels and the classifier seam.
//!
//! A [`Classifier`] pairs a [`Scaler`] (standardization fit alongside the
//! model) with a [`Model`] that maps a scaled feature vector to a label id.
//! Both are opaque pre-fitted artifacts; see [`crate::core::artifacts`] for
//! loading them from disk.

use crate::core::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The activities the model distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Situps,
    Rest,
    Running,
    Walking,
}

impl Label {
    /// All labels, in id order.
    pub const ALL: [Label; 4] = [Label::Situps, Label::Rest, Label::Running, Label::Walking];

    /// Map a model output id to a label. Must match the mapping used in training.
    pub fn from_id(id: i64) -> Option<Label> {
        match id {
            0 => Some(Label::Situps),
            1 => Some(Label::Rest),
            2 => Some(Label::Running),
            3 => Some(Label::Walking),
            _ => None,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Label::Situps => 0,
            Label::Rest => 1,
            Label::Running => 2,
            Label::Walking => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Situps => "situps",
            Label::Rest => "rest",
            Label::Running => "running",
            Label::Walking => "walking",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Label::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown activity {s:?} (expected situps, rest, running or walking)"))
    }
}

/// Which trained model family to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Mlp,
    Svm,
    Knn,
    Rf,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [ModelKind::Mlp, ModelKind::Svm, ModelKind::Knn, ModelKind::Rf];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Mlp => "mlp",
            ModelKind::Svm => "svm",
            ModelKind::Knn => "knn",
            ModelKind::Rf => "rf",
        }
    }

    /// Artifact file name inside the models directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown model type {s:?} (expected mlp, svm, knn or rf)"))
    }
}

/// Pre-fitted feature standardization.
pub trait Scaler: Send + Sync {
    fn transform(&self, features: &[f64]) -> Vec<f64>;
}

/// Pre-fitted classifier returning a label id.
pub trait Model: Send + Sync {
    fn predict(&self, features: &[f64]) -> i64;
}

/// Passes features through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityScaler;

impl Scaler for IdentityScaler {
    fn transform(&self, features: &[f64]) -> Vec<f64> {
        features.to_vec()
    }
}

/// Always predicts the same id.
#[derive(Debug, Clone, Copy)]
pub struct ConstantModel(pub i64);

impl Model for ConstantModel {
    fn predict(&self, _features: &[f64]) -> i64 {
        self.0
    }
}

/// Outcome of classifying one feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub label_id: i64,
    /// `None` when the model returned an id outside the label map.
    pub label: Option<Label>,
}

/// Scaler and model, shared by all inference tasks.
#[derive(Clone)]
pub struct Classifier {
    scaler: Arc<dyn Scaler>,
    model: Arc<dyn Model>,
    kind: Option<ModelKind>,
}

impl Classifier {
    pub fn new(scaler: Arc<dyn Scaler>, model: Arc<dyn Model>) -> Self {
        Self {
            scaler,
            model,
            kind: None,
        }
    }

    /// Tag the classifier with the model family it was loaded from.
    pub fn with_kind(mut self, kind: ModelKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn kind(&self) -> Option<ModelKind> {
        self.kind
    }

    /// Scale then predict.
    pub fn classify(&self, features: &FeatureVector) -> Classification {
        let scaled = self.scaler.transform(&features.to_array());
        let label_id = self.model.predict(&scaled);
        Classification {
            label_id,
            label: Label::from_id(label_id),
        }
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier").field("kind", &self.kind).finish()
    }
}
