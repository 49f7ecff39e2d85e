//! Budget predictor: pre-trained regression model loaded once at startup.
//!
//! The artifact is a JSON-serialised random forest: the ordered feature column
//! list the model was trained on plus one flat node array per regression tree.
//! A prediction is the mean of the tree outputs, clamped at zero.
//!
//! `AppState` holds an `Arc<dyn BudgetPredictor>`; when the artifact is missing
//! or invalid the server still starts with `UnavailablePredictor`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::script::analyzer::ScriptAnalysis;

const GENRE_PREFIX: &str = "genre_";

const NUMERIC_COLUMNS: &[&str] = &[
    "num_characters",
    "num_locations",
    "num_props",
    "estimated_scenes",
    "total_dialogue_lines",
];

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("budget model is not available: {0}")]
    Unavailable(String),

    #[error("project has no script analysis to predict from")]
    MissingAnalysis,

    #[error("stored analysis could not be read: {0}")]
    InvalidAnalysis(String),

    #[error("invalid budget model: {0}")]
    InvalidModel(String),

    #[error("model produced a non-finite prediction")]
    NonFinite,

    #[error("could not read budget model: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse budget model: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Feature vector source for one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectFeatures {
    pub num_characters: f64,
    pub num_locations: f64,
    pub num_props: f64,
    pub estimated_scenes: f64,
    pub total_dialogue_lines: f64,
    pub genre: Option<String>,
}

impl ProjectFeatures {
    pub fn from_analysis(analysis: &ScriptAnalysis) -> Self {
        Self {
            num_characters: analysis.characters.len() as f64,
            num_locations: analysis.locations.len() as f64,
            num_props: analysis.props.len() as f64,
            estimated_scenes: f64::from(analysis.estimated_scenes),
            total_dialogue_lines: f64::from(analysis.total_dialogue_lines()),
            genre: analysis.genre.clone(),
        }
    }

    /// Value of a named model column. Genre columns are one-hot; a genre the
    /// model has no column for simply sets nothing.
    pub fn column(&self, name: &str) -> Option<f64> {
        if let Some(genre) = name.strip_prefix(GENRE_PREFIX) {
            let hot = self.genre.as_deref() == Some(genre);
            return Some(if hot { 1.0 } else { 0.0 });
        }
        match name {
            "num_characters" => Some(self.num_characters),
            "num_locations" => Some(self.num_locations),
            "num_props" => Some(self.num_props),
            "estimated_scenes" => Some(self.estimated_scenes),
            "total_dialogue_lines" => Some(self.total_dialogue_lines),
            _ => None,
        }
    }
}

fn is_known_column(name: &str) -> bool {
    name.starts_with(GENRE_PREFIX) || NUMERIC_COLUMNS.contains(&name)
}

/// Anything that can turn project features into a predicted total budget.
pub trait BudgetPredictor: Send + Sync {
    fn predict(&self, features: &ProjectFeatures) -> Result<f64, PredictError>;
}

// ────────────────────────────────────────────────────────────────────────────
// ForestModel
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TreeNode {
    /// `x[feature] <= threshold` goes left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ForestArtifact {
    columns: Vec<String>,
    trees: Vec<RegressionTree>,
}

/// Random-forest regressor evaluated in-process.
#[derive(Debug, Clone)]
pub struct ForestModel {
    columns: Vec<String>,
    trees: Vec<RegressionTree>,
}

impl ForestModel {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PredictError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    /// Parses and validates an artifact. Evaluation cannot index out of bounds or
    /// loop once this succeeds: every child index points forward inside its tree.
    pub fn from_json(raw: &str) -> Result<Self, PredictError> {
        let artifact: ForestArtifact = serde_json::from_str(raw)?;

        if artifact.columns.is_empty() {
            return Err(PredictError::InvalidModel("no feature columns".to_string()));
        }
        if let Some(unknown) = artifact.columns.iter().find(|c| !is_known_column(c)) {
            return Err(PredictError::InvalidModel(format!(
                "unknown feature column '{unknown}'"
            )));
        }
        if artifact.trees.is_empty() {
            return Err(PredictError::InvalidModel("forest has no trees".to_string()));
        }

        for (t, tree) in artifact.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(PredictError::InvalidModel(format!("tree {t} has no nodes")));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if *feature >= artifact.columns.len() {
                            return Err(PredictError::InvalidModel(format!(
                                "tree {t} node {i} uses feature {feature} of {}",
                                artifact.columns.len()
                            )));
                        }
                        if !threshold.is_finite() {
                            return Err(PredictError::InvalidModel(format!(
                                "tree {t} node {i} has a non-finite threshold"
                            )));
                        }
                        for child in [*left, *right] {
                            if child <= i || child >= tree.nodes.len() {
                                return Err(PredictError::InvalidModel(format!(
                                    "tree {t} node {i} points to invalid child {child}"
                                )));
                            }
                        }
                    }
                    TreeNode::Leaf { value } => {
                        if !value.is_finite() {
                            return Err(PredictError::InvalidModel(format!(
                                "tree {t} leaf {i} is not finite"
                            )));
                        }
                    }
                }
            }
        }

        Ok(Self {
            columns: artifact.columns,
            trees: artifact.trees,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn feature_vector(&self, features: &ProjectFeatures) -> Vec<f64> {
        self.columns
            .iter()
            .map(|c| features.column(c).unwrap_or(0.0))
            .collect()
    }
}

impl BudgetPredictor for ForestModel {
    fn predict(&self, features: &ProjectFeatures) -> Result<f64, PredictError> {
        let x = self.feature_vector(features);
        let total: f64 = self.trees.iter().map(|t| t.evaluate(&x)).sum();
        let mean = total / self.trees.len() as f64;
        if !mean.is_finite() {
            return Err(PredictError::NonFinite);
        }
        Ok(mean.max(0.0))
    }
}

/// Stand-in used when no model could be loaded; every prediction soft-fails.
pub struct UnavailablePredictor {
    reason: String,
}

impl UnavailablePredictor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl BudgetPredictor for UnavailablePredictor {
    fn predict(&self, _features: &ProjectFeatures) -> Result<f64, PredictError> {
        Err(PredictError::Unavailable(self.reason.clone()))
    }
}

/// Loads the model at `path`, falling back to `UnavailablePredictor` on failure.
pub fn load_predictor(path: &str) -> std::sync::Arc<dyn BudgetPredictor> {
    match ForestModel::from_path(path) {
        Ok(model) => {
            info!(
                "Budget model loaded from {path}: {} trees, {} columns",
                model.tree_count(),
                model.columns().len()
            );
            std::sync::Arc::new(model)
        }
        Err(e) => {
            warn!("Budget model unavailable ({path}): {e}. Predictions will fall back to 0.");
            std::sync::Arc::new(UnavailablePredictor::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::script::analyzer::{CharacterBreakdown, LocationBreakdown};

    const SMALL_FOREST: &str = r#"{
        "columns": ["estimated_scenes", "genre_Action"],
        "trees": [
            {"nodes": [
                {"feature": 0, "threshold": 10.0, "left": 1, "right": 2},
                {"value": 100000.0},
                {"value": 500000.0}
            ]},
            {"nodes": [
                {"feature": 1, "threshold": 0.5, "left": 1, "right": 2},
                {"value": 200000.0},
                {"value": 900000.0}
            ]}
        ]
    }"#;

    fn features(scenes: f64, genre: Option<&str>) -> ProjectFeatures {
        ProjectFeatures {
            num_characters: 0.0,
            num_locations: 0.0,
            num_props: 0.0,
            estimated_scenes: scenes,
            total_dialogue_lines: 0.0,
            genre: genre.map(String::from),
        }
    }

    #[test]
    fn test_forest_mean_of_trees() {
        let model = ForestModel::from_json(SMALL_FOREST).unwrap();
        // tree 1: 5 <= 10 → 100k; tree 2: drama → 200k
        let p = model.predict(&features(5.0, Some("Drama"))).unwrap();
        assert!((p - 150_000.0).abs() < 1e-6);
        // tree 1: 40 > 10 → 500k; tree 2: action → 900k
        let p = model.predict(&features(40.0, Some("Action"))).unwrap();
        assert!((p - 700_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_is_inclusive_left() {
        let model = ForestModel::from_json(SMALL_FOREST).unwrap();
        let p = model.predict(&features(10.0, None)).unwrap();
        assert!((p - 150_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_leaves_clamp_to_zero() {
        let model = ForestModel::from_json(
            r#"{"columns": ["num_props"], "trees": [{"nodes": [{"value": -50.0}]}]}"#,
        )
        .unwrap();
        assert_eq!(model.predict(&features(1.0, None)).unwrap(), 0.0);
    }

    #[test]
    fn test_rejects_backward_child_pointer() {
        let raw = r#"{"columns": ["num_props"], "trees": [{"nodes": [
            {"feature": 0, "threshold": 1.0, "left": 0, "right": 1},
            {"value": 1.0}
        ]}]}"#;
        assert!(matches!(
            ForestModel::from_json(raw),
            Err(PredictError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_feature_and_unknown_column() {
        let bad_feature = r#"{"columns": ["num_props"], "trees": [{"nodes": [
            {"feature": 3, "threshold": 1.0, "left": 1, "right": 2},
            {"value": 1.0}, {"value": 2.0}
        ]}]}"#;
        assert!(ForestModel::from_json(bad_feature).is_err());

        let unknown = r#"{"columns": ["budget_of_moon"], "trees": [{"nodes": [{"value": 1.0}]}]}"#;
        assert!(ForestModel::from_json(unknown).is_err());

        let empty = r#"{"columns": ["num_props"], "trees": []}"#;
        assert!(ForestModel::from_json(empty).is_err());
    }

    #[test]
    fn test_genre_one_hot_ignores_unknown_genre() {
        let f = features(1.0, Some("Western"));
        assert_eq!(f.column("genre_Action"), Some(0.0));
        assert_eq!(f.column("genre_Western"), Some(1.0));
        assert_eq!(f.column("nonsense"), None);
    }

    #[test]
    fn test_features_from_analysis() {
        let analysis = ScriptAnalysis {
            genre: Some("Comedy".into()),
            logline: None,
            characters: vec![
                CharacterBreakdown {
                    name: "JOHN".into(),
                    dialogue_lines: 3,
                },
                CharacterBreakdown {
                    name: "MARY".into(),
                    dialogue_lines: 4,
                },
            ],
            locations: vec![LocationBreakdown {
                name: "OFFICE".into(),
                scenes: 2,
            }],
            props: vec!["mug".into()],
            estimated_scenes: 2,
        };
        let f = ProjectFeatures::from_analysis(&analysis);
        assert_eq!(f.num_characters, 2.0);
        assert_eq!(f.num_locations, 1.0);
        assert_eq!(f.num_props, 1.0);
        assert_eq!(f.total_dialogue_lines, 7.0);
        assert_eq!(f.column("genre_Comedy"), Some(1.0));
    }

    #[test]
    fn test_unavailable_predictor_always_errors() {
        let p = UnavailablePredictor::new("missing file");
        assert!(matches!(
            p.predict(&features(1.0, None)),
            Err(PredictError::Unavailable(_))
        ));
    }

    #[test]
    fn test_load_from_file_and_missing_file_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SMALL_FOREST.as_bytes()).unwrap();
        let predictor = load_predictor(file.path().to_str().unwrap());
        assert!(predictor.predict(&features(5.0, None)).is_ok());

        let missing = load_predictor("/definitely/not/here/model.json");
        assert!(missing.predict(&features(5.0, None)).is_err());
    }

    #[test]
    fn test_shipped_model_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/budget_model.json");
        let model = ForestModel::from_path(path).unwrap();
        let p = model.predict(&features(30.0, Some("Drama"))).unwrap();
        assert!(p > 0.0);
    }
}
