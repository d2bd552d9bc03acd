//! Loading pre-fitted scaler and model artifacts.
//!
//! Artifacts are JSON exports of models trained elsewhere. The models
//! directory holds `scaler.json` plus one file per model family
//! (`mlp.json`, `svm.json`, `knn.json`, `rf.json`). Every artifact is checked
//! against the 21-feature input at load time, so a mismatch fails before the
//! pipeline starts rather than on the first prediction.

use crate::core::classifier::{Classifier, Model, ModelKind, Scaler};
use crate::core::features::FEATURE_COUNT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the scaler artifact.
pub const SCALER_FILE: &str = "scaler.json";

/// Element-wise standardization: `(x - mean) / scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn validate(&self) -> Result<(), String> {
        check_len("scaler mean", self.mean.len(), FEATURE_COUNT)?;
        check_len("scaler scale", self.scale.len(), FEATURE_COUNT)?;
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err("scaler contains non-finite parameters".to_string());
        }
        Ok(())
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // Zero-variance features were fit with unit scale.
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect()
    }
}

/// One fully connected layer. `weights` has one row per output unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| dot(row, input) + bias)
            .collect()
    }
}

/// Multi-layer perceptron with ReLU hidden layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpModel {
    pub layers: Vec<DenseLayer>,
    /// Label id for each output unit.
    pub classes: Vec<i64>,
}

impl MlpModel {
    fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("mlp has no layers".to_string());
        }

        let mut width = FEATURE_COUNT;
        for (i, layer) in self.layers.iter().enumerate() {
            check_len(&format!("layer {i} biases"), layer.biases.len(), layer.weights.len())?;
            for row in &layer.weights {
                check_len(&format!("layer {i} weight row"), row.len(), width)?;
            }
            width = layer.weights.len();
        }
        check_len("mlp classes", self.classes.len(), width)
    }
}

impl Model for MlpModel {
    fn predict(&self, features: &[f64]) -> i64 {
        let last = self.layers.len().saturating_sub(1);
        let mut activations = features.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if i < last {
                activations.iter_mut().for_each(|a| *a = a.max(0.0));
            }
        }
        self.classes
            .get(argmax(&activations))
            .copied()
            .unwrap_or(-1)
    }
}

/// Linear one-vs-rest classifier (linear SVM or logistic regression).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    pub classes: Vec<i64>,
}

impl LinearModel {
    fn validate(&self) -> Result<(), String> {
        check_len("intercepts", self.intercepts.len(), self.coefficients.len())?;
        for row in &self.coefficients {
            check_len("coefficient row", row.len(), FEATURE_COUNT)?;
        }
        // A binary model stores a single decision function.
        let expected = if self.coefficients.len() == 1 { 2 } else { self.coefficients.len() };
        if self.coefficients.is_empty() {
            return Err("linear model has no coefficients".to_string());
        }
        check_len("linear classes", self.classes.len(), expected)
    }
}

impl Model for LinearModel {
    fn predict(&self, features: &[f64]) -> i64 {
        let scores: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, intercept)| dot(row, features) + intercept)
            .collect();

        let index = match scores.as_slice() {
            [single] => usize::from(*single > 0.0),
            _ => argmax(&scores),
        };
        self.classes.get(index).copied().unwrap_or(-1)
    }
}

/// k-nearest-neighbours over stored training points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnModel {
    pub k: usize,
    pub points: Vec<Vec<f64>>,
    pub targets: Vec<i64>,
}

impl KnnModel {
    fn validate(&self) -> Result<(), String> {
        if self.k == 0 {
            return Err("knn k must be at least 1".to_string());
        }
        if self.points.is_empty() {
            return Err("knn has no training points".to_string());
        }
        check_len("knn targets", self.targets.len(), self.points.len())?;
        for point in &self.points {
            check_len("knn point", point.len(), FEATURE_COUNT)?;
        }
        Ok(())
    }
}

impl Model for KnnModel {
    fn predict(&self, features: &[f64]) -> i64 {
        let mut neighbours: Vec<(f64, i64)> = self
            .points
            .iter()
            .zip(&self.targets)
            .map(|(point, &target)| (squared_distance(point, features), target))
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
        neighbours.truncate(self.k);

        let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
        for (_, target) in &neighbours {
            *votes.entry(*target).or_default() += 1;
        }
        let best = votes.values().copied().max().unwrap_or(0);

        // Ties go to whichever tied id has the closest neighbour.
        neighbours
            .iter()
            .map(|(_, target)| *target)
            .find(|target| votes.get(target) == Some(&best))
            .unwrap_or(-1)
    }
}

/// A decision tree node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: i64,
    },
}

/// A decision tree; node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, index: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err(format!("tree {index} has no nodes"));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= FEATURE_COUNT {
                    return Err(format!("tree {index} node {i} uses feature {feature}"));
                }
                // Children always follow their parent, which rules out cycles.
                for child in [*left, *right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(format!("tree {index} node {i} has invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> i64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                None => return -1,
                Some(TreeNode::Leaf { leaf }) => return *leaf,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).copied().unwrap_or(0.0);
                    index = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Random forest: majority vote over trees, ties to the smallest id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<DecisionTree>,
}

impl ForestModel {
    fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        self.trees
            .iter()
            .enumerate()
            .try_for_each(|(i, tree)| tree.validate(i))
    }
}

impl Model for ForestModel {
    fn predict(&self, features: &[f64]) -> i64 {
        let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
        for tree in &self.trees {
            *votes.entry(tree.predict(features)).or_default() += 1;
        }

        let best = votes.values().copied().max().unwrap_or(0);
        votes
            .into_iter()
            .find(|(_, count)| *count == best)
            .map(|(id, _)| id)
            .unwrap_or(-1)
    }
}

/// A model artifact as stored on disk, tagged by family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelArtifact {
    Mlp(MlpModel),
    Svm(LinearModel),
    Knn(KnnModel),
    Rf(ForestModel),
}

impl ModelArtifact {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelArtifact::Mlp(_) => ModelKind::Mlp,
            ModelArtifact::Svm(_) => ModelKind::Svm,
            ModelArtifact::Knn(_) => ModelKind::Knn,
            ModelArtifact::Rf(_) => ModelKind::Rf,
        }
    }

    /// Check dimensions and structure against the feature vector.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ModelArtifact::Mlp(m) => m.validate(),
            ModelArtifact::Svm(m) => m.validate(),
            ModelArtifact::Knn(m) => m.validate(),
            ModelArtifact::Rf(m) => m.validate(),
        }
    }

    fn into_model(self) -> Arc<dyn Model> {
        match self {
            ModelArtifact::Mlp(m) => Arc::new(m),
            ModelArtifact::Svm(m) => Arc::new(m),
            ModelArtifact::Knn(m) => Arc::new(m),
            ModelArtifact::Rf(m) => Arc::new(m),
        }
    }
}

/// Errors loading artifacts. All are fatal at startup.
#[derive(Debug)]
pub enum ArtifactError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, message: String },
    Incompatible { path: PathBuf, message: String },
}

impl std::fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactError::Io { path, source } => {
                write!(f, "Could not read artifact {}: {source}", path.display())
            }
            ArtifactError::Parse { path, message } => {
                write!(f, "Could not parse artifact {}: {message}", path.display())
            }
            ArtifactError::Incompatible { path, message } => {
                write!(f, "Incompatible artifact {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let content = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| ArtifactError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load `scaler.json` from the models directory.
pub fn load_scaler(models_dir: &Path) -> Result<StandardScaler, ArtifactError> {
    let path = models_dir.join(SCALER_FILE);
    let scaler: StandardScaler = read_json(&path)?;
    scaler
        .validate()
        .map_err(|message| ArtifactError::Incompatible { path, message })?;
    Ok(scaler)
}

/// Load the model artifact for `kind` from the models directory.
pub fn load_model(models_dir: &Path, kind: ModelKind) -> Result<ModelArtifact, ArtifactError> {
    let path = models_dir.join(kind.file_name());
    let artifact: ModelArtifact = read_json(&path)?;

    if artifact.kind() != kind {
        return Err(ArtifactError::Incompatible {
            path,
            message: format!("expected a {kind} model, found {}", artifact.kind()),
        });
    }
    artifact
        .validate()
        .map_err(|message| ArtifactError::Incompatible { path, message })?;
    Ok(artifact)
}

/// Load scaler and model and combine them into a [`Classifier`].
pub fn load_classifier(models_dir: &Path, kind: ModelKind) -> Result<Classifier, ArtifactError> {
    let scaler = load_scaler(models_dir)?;
    let model = load_model(models_dir, kind)?;
    Ok(Classifier::new(Arc::new(scaler), model.into_model()).with_kind(kind))
}

fn check_len(what: &str, actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{what} has length {actual}, expected {expected}"))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the first maximum.
fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best_i, best_v)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::Label;
    use crate::core::features::FeatureVector;

    fn unit(index: usize) -> Vec<f64> {
        let mut v = vec![0.0; FEATURE_COUNT];
        v[index] = 1.0;
        v
    }

    fn temp_models_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "activity-sensor-artifacts-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn identity_scaler_json() -> String {
        serde_json::to_string(&StandardScaler {
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        })
        .unwrap()
    }

    #[test]
    fn test_standard_scaler() {
        let scaler = StandardScaler {
            mean: vec![1.0, 2.0],
            scale: vec![2.0, 0.0],
        };
        assert_eq!(scaler.transform(&[3.0, 5.0]), vec![1.0, 3.0]);
    }

    #[test]
    fn test_linear_model_argmax() {
        let model = LinearModel {
            coefficients: vec![unit(0), unit(1), unit(2)],
            intercepts: vec![0.0, 0.0, 0.0],
            classes: vec![0, 1, 3],
        };
        assert!(model.validate().is_ok());
        assert_eq!(model.predict(&unit(2)), 3);
        assert_eq!(model.predict(&unit(1)), 1);
    }

    #[test]
    fn test_linear_model_binary() {
        let model = LinearModel {
            coefficients: vec![unit(0)],
            intercepts: vec![-0.5],
            classes: vec![1, 2],
        };
        assert!(model.validate().is_ok());
        assert_eq!(model.predict(&unit(0)), 2);
        assert_eq!(model.predict(&unit(1)), 1);
    }

    #[test]
    fn test_mlp_relu_hidden_layer() {
        // Hidden unit fires only for positive feature 0.
        let model = MlpModel {
            layers: vec![
                DenseLayer {
                    weights: vec![unit(0)],
                    biases: vec![0.0],
                },
                DenseLayer {
                    weights: vec![vec![-1.0], vec![1.0]],
                    biases: vec![0.5, 0.0],
                },
            ],
            classes: vec![1, 2],
        };
        assert!(model.validate().is_ok());
        assert_eq!(model.predict(&unit(0)), 2);

        let mut negative = unit(0);
        negative[0] = -3.0;
        assert_eq!(model.predict(&negative), 1);
    }

    #[test]
    fn test_mlp_rejects_wrong_input_width() {
        let model = MlpModel {
            layers: vec![DenseLayer {
                weights: vec![vec![1.0; 5]],
                biases: vec![0.0],
            }],
            classes: vec![0],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_knn_majority_and_ties() {
        let model = KnnModel {
            k: 3,
            points: vec![unit(0), unit(1), unit(2), unit(3)],
            targets: vec![3, 1, 1, 0],
        };
        assert!(model.validate().is_ok());
        let mut query = unit(0);
        query[1] = 0.9;
        query[2] = 0.8;
        assert_eq!(model.predict(&query), 1);

        let tie = KnnModel {
            k: 2,
            points: vec![unit(0), unit(1)],
            targets: vec![3, 2],
        };
        let mut near_second = unit(1);
        near_second[0] = 0.2;
        assert_eq!(tie.predict(&near_second), 2);
    }

    #[test]
    fn test_forest_vote() {
        let stump = |threshold: f64, low: i64, high: i64| DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { leaf: low },
                TreeNode::Leaf { leaf: high },
            ],
        };
        let forest = ForestModel {
            trees: vec![stump(0.5, 1, 2), stump(0.5, 1, 2), stump(10.0, 3, 0)],
        };
        assert!(forest.validate().is_ok());
        assert_eq!(forest.predict(&unit(0)), 2);
        assert_eq!(forest.predict(&vec![0.0; FEATURE_COUNT]), 1);
    }

    #[test]
    fn test_forest_rejects_cycles() {
        let tree = DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 1,
                },
                TreeNode::Leaf { leaf: 0 },
            ],
        };
        assert!(tree.validate(0).is_err());
    }

    #[test]
    fn test_tree_node_json_shape() {
        let json = r#"{"type":"rf","trees":[{"nodes":[
            {"feature":3,"threshold":0.5,"left":1,"right":2},
            {"leaf":1},{"leaf":2}]}]}"#;
        let artifact: ModelArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.kind(), ModelKind::Rf);
        assert!(artifact.validate().is_ok());
    }

    #[test]
    fn test_load_classifier_from_directory() {
        let dir = temp_models_dir("load");
        std::fs::write(dir.join(SCALER_FILE), identity_scaler_json()).unwrap();
        let model = ModelArtifact::Svm(LinearModel {
            coefficients: vec![unit(0), unit(9)],
            intercepts: vec![0.0, 0.0],
            classes: vec![1, 2],
        });
        std::fs::write(dir.join("svm.json"), serde_json::to_string(&model).unwrap()).unwrap();

        let classifier = load_classifier(&dir, ModelKind::Svm).unwrap();
        let features = FeatureVector {
            mean_acceleration: 12.0,
            ..FeatureVector::default()
        };
        assert_eq!(classifier.classify(&features).label, Some(Label::Running));
        assert_eq!(classifier.kind(), Some(ModelKind::Svm));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_reports_missing_and_mismatched_artifacts() {
        let dir = temp_models_dir("errors");
        assert!(matches!(
            load_classifier(&dir, ModelKind::Mlp),
            Err(ArtifactError::Io { .. })
        ));

        std::fs::write(dir.join(SCALER_FILE), r#"{"mean":[0.0],"scale":[1.0]}"#).unwrap();
        assert!(matches!(
            load_scaler(&dir),
            Err(ArtifactError::Incompatible { .. })
        ));

        let knn = ModelArtifact::Knn(KnnModel {
            k: 1,
            points: vec![unit(0)],
            targets: vec![1],
        });
        std::fs::write(dir.join("rf.json"), serde_json::to_string(&knn).unwrap()).unwrap();
        let err = load_model(&dir, ModelKind::Rf).unwrap_err();
        assert!(err.to_string().contains("expected a rf model"));

        std::fs::write(dir.join("mlp.json"), "not json").unwrap();
        assert!(matches!(
            load_model(&dir, ModelKind::Mlp),
            Err(ArtifactError::Parse { .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
