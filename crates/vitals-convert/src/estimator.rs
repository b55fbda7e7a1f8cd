//! Persisted estimator model
//!
//! The trained model is stored as a JSON document describing the same
//! object graph the training run produced:
//!
//! ```text
//! randomized_search_cv | grid_search_cv
//!   best_estimator: pipeline
//!     feature_names_in: [..]
//!     encoder: ordinal encoder over the categorical columns
//!     classifier: decision_tree | random_forest
//! ```
//!
//! Trees use the parallel-array layout of the training library: node `i`
//! splits on `feature[i]` with `x <= threshold[i]` going to
//! `children_left[i]`, and `-1` children mark a leaf whose class weights are
//! `value[i]`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use vitals_core::{ColumnData, Error, Result, SampleBatch};

/// Marker the training library uses for "no child"
pub const TREE_LEAF: i64 = -1;

/// Top-level object found in the persisted model file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PersistedModel {
    /// Randomized hyperparameter search wrapper
    RandomizedSearchCv(SearchResult),
    /// Exhaustive grid search wrapper
    GridSearchCv(SearchResult),
    /// A bare fitted pipeline
    Pipeline(Pipeline),
}

/// Outcome of a hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Refit best candidate; absent when the search ran without refit
    #[serde(default)]
    pub best_estimator: Option<Pipeline>,

    #[serde(default)]
    pub best_score: Option<f64>,

    #[serde(default)]
    pub best_params: BTreeMap<String, serde_json::Value>,

    /// Number of candidates evaluated
    #[serde(default)]
    pub n_candidates: usize,
}

impl PersistedModel {
    /// Short name of the persisted object type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RandomizedSearchCv(_) => "randomized_search_cv",
            Self::GridSearchCv(_) => "grid_search_cv",
            Self::Pipeline(_) => "pipeline",
        }
    }

    /// Extract the estimator to convert.
    ///
    /// Search wrappers must carry a refit best estimator; a bare pipeline is
    /// returned unchanged.
    pub fn into_best_estimator(self) -> Result<Pipeline> {
        let kind = self.kind();
        match self {
            Self::RandomizedSearchCv(search) | Self::GridSearchCv(search) => {
                let SearchResult {
                    best_estimator,
                    best_score,
                    best_params,
                    n_candidates,
                } = search;

                let pipeline = best_estimator.ok_or_else(|| {
                    Error::model(format!(
                        "{} has no best_estimator; the search must be run with refit enabled",
                        kind
                    ))
                })?;

                info!(
                    wrapper = kind,
                    best_score = ?best_score,
                    candidates = n_candidates,
                    params = best_params.len(),
                    "Extracted best estimator from search wrapper"
                );
                Ok(pipeline)
            }
            Self::Pipeline(pipeline) => {
                warn!("Persisted model is not a search wrapper, converting the pipeline as-is");
                Ok(pipeline)
            }
        }
    }
}

/// Fitted preprocessing + classifier pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Column names seen during fit, in training order
    pub feature_names_in: Vec<String>,

    /// Ordinal encoding of the categorical columns
    pub encoder: OrdinalEncoder,

    /// Final classifier applied to the transformed columns
    pub classifier: ClassifierModel,
}

/// Maps each categorical column's labels to their index in `categories`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    pub columns: Vec<String>,

    /// Known labels per column, parallel to `columns`
    pub categories: Vec<Vec<String>>,

    /// Code used for labels not seen during fit
    #[serde(default = "default_unknown_value")]
    pub unknown_value: i64,
}

fn default_unknown_value() -> i64 {
    -1
}

impl OrdinalEncoder {
    /// Known labels of a column
    pub fn categories_of(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.categories.get(i))
            .map(|c| c.as_slice())
    }

    pub fn encodes(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Ordinal code of `value` in `column`
    pub fn encode(&self, column: &str, value: &str) -> i64 {
        self.categories_of(column)
            .and_then(|cats| cats.iter().position(|c| c == value))
            .map(|i| i as i64)
            .unwrap_or(self.unknown_value)
    }
}

/// Final estimator of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierModel {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    /// Any estimator family the converter has no mapping for
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub classes: Vec<i64>,
    pub n_features: usize,
    pub tree: Tree,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub classes: Vec<i64>,
    pub n_features: usize,
    pub trees: Vec<Tree>,
}

impl ClassifierModel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DecisionTree(_) => "decision_tree",
            Self::RandomForest(_) => "random_forest",
            Self::Unsupported => "unsupported",
        }
    }

    fn parts(&self) -> Result<(&[i64], usize, Vec<&Tree>)> {
        match self {
            Self::DecisionTree(m) => Ok((m.classes.as_slice(), m.n_features, vec![&m.tree])),
            Self::RandomForest(m) => Ok((m.classes.as_slice(), m.n_features, m.trees.iter().collect())),
            Self::Unsupported => Err(Error::conversion(
                "estimator type is not supported; expected decision_tree or random_forest",
            )),
        }
    }

    /// Class labels, in probability column order
    pub fn classes(&self) -> Result<&[i64]> {
        self.parts().map(|(classes, _, _)| classes)
    }

    /// Number of input columns the classifier was fitted on
    pub fn n_features(&self) -> Result<usize> {
        self.parts().map(|(_, n, _)| n)
    }

    /// Trees of the ensemble (one for a single decision tree)
    pub fn trees(&self) -> Result<Vec<&Tree>> {
        self.parts().map(|(_, _, trees)| trees)
    }

    /// Averaged per-class probabilities for one transformed row.
    ///
    /// Trees must have passed [`Tree::validate`].
    pub(crate) fn predict_proba_row(&self, row: &[f32]) -> Result<Vec<f64>> {
        let (classes, _, trees) = self.parts()?;
        let mut proba = vec![0.0; classes.len()];
        for tree in &trees {
            for (acc, p) in proba.iter_mut().zip(tree.leaf_proba(tree.apply(row))) {
                *acc += p;
            }
        }
        let n = trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        Ok(proba)
    }
}

/// A single fitted tree in parallel-array layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights (counts or fractions)
    pub value: Vec<Vec<f64>>,
}

impl Tree {
    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    pub(crate) fn is_leaf(&self, node: usize) -> bool {
        self.children_left[node] == TREE_LEAF
    }

    /// Normalized class distribution of a node
    pub(crate) fn leaf_proba(&self, node: usize) -> Vec<f64> {
        let weights = &self.value[node];
        let total: f64 = weights.iter().sum();
        weights.iter().map(|w| w / total).collect()
    }

    /// Index of the leaf reached by `row`.
    ///
    /// Comparisons happen in f32, the precision the converted graph uses.
    pub(crate) fn apply(&self, row: &[f32]) -> usize {
        let mut node = 0;
        while !self.is_leaf(node) {
            let x = row[self.feature[node] as usize];
            node = if x <= self.threshold[node] as f32 {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    /// Check structural consistency against the classifier's dimensions
    pub fn validate(&self, n_features: usize, n_classes: usize) -> Result<()> {
        let n = self.node_count();
        if n == 0 {
            return Err(Error::model("tree has no nodes"));
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err(Error::model(format!(
                "tree arrays disagree on node count (children_left has {})",
                n
            )));
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == TREE_LEAF {
                if right != TREE_LEAF {
                    return Err(Error::model(format!("node {} has only one child", node)));
                }
                let weights = &self.value[node];
                if weights.len() != n_classes {
                    return Err(Error::model(format!(
                        "leaf {} has {} class weights, expected {}",
                        node,
                        weights.len(),
                        n_classes
                    )));
                }
                if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
                    return Err(Error::model(format!("leaf {} has no positive weight", node)));
                }
                continue;
            }

            // Children are stored after their parent, which also rules out cycles.
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(Error::model(format!(
                        "node {} points to invalid child {}",
                        node, child
                    )));
                }
            }

            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(Error::model(format!(
                    "node {} splits on feature {} but the classifier has {} features",
                    node, feature, n_features
                )));
            }
        }

        Ok(())
    }
}

impl Pipeline {
    /// Column order after the encoder: encoded columns first, then the
    /// remaining inputs in training order
    pub fn transformed_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self.encoder.columns.iter().map(|c| c.as_str()).collect();
        columns.extend(
            self.feature_names_in
                .iter()
                .filter(|name| !self.encoder.encodes(name))
                .map(|name| name.as_str()),
        );
        columns
    }

    /// Check the encoder and classifier against the fitted feature names
    pub fn validate(&self) -> Result<()> {
        let (classes, n_features, trees) = self.classifier.parts()?;

        if self.encoder.columns.len() != self.encoder.categories.len() {
            return Err(Error::model(format!(
                "encoder has {} columns but {} category lists",
                self.encoder.columns.len(),
                self.encoder.categories.len()
            )));
        }
        if let Some(column) = self
            .encoder
            .columns
            .iter()
            .find(|c| !self.feature_names_in.contains(c))
        {
            return Err(Error::model(format!(
                "encoder column '{}' is not one of the fitted features",
                column
            )));
        }
        if n_features != self.feature_names_in.len() {
            return Err(Error::model(format!(
                "classifier expects {} features but the pipeline was fitted on {}",
                n_features,
                self.feature_names_in.len()
            )));
        }
        if classes.is_empty() {
            return Err(Error::model("classifier has no classes"));
        }
        if trees.is_empty() {
            return Err(Error::model("classifier has no trees"));
        }
        for tree in trees {
            tree.validate(n_features, classes.len())?;
        }
        Ok(())
    }

    /// Apply the encoder to a batch, yielding rows in transformed column order
    pub fn transform(&self, batch: &SampleBatch) -> Result<Vec<Vec<f32>>> {
        let mut rows = vec![Vec::with_capacity(self.feature_names_in.len()); batch.rows()];

        for name in self.transformed_columns() {
            let column = batch
                .column(name)
                .ok_or_else(|| Error::sample(format!("sample has no column '{}'", name)))?;

            match (&column.data, self.encoder.encodes(name)) {
                (ColumnData::Text(values), true) => {
                    for (row, value) in rows.iter_mut().zip(values) {
                        row.push(self.encoder.encode(name, value) as f32);
                    }
                }
                (ColumnData::Float(values), false) => {
                    for (row, value) in rows.iter_mut().zip(values) {
                        row.push(*value);
                    }
                }
                (data, _) => {
                    return Err(Error::sample(format!(
                        "column '{}' holds {} data which the pipeline cannot use",
                        name,
                        data.kind().element_type()
                    )))
                }
            }
        }

        Ok(rows)
    }

    /// Class probabilities for each row of the batch
    pub fn predict_proba(&self, batch: &SampleBatch) -> Result<Vec<Vec<f64>>> {
        self.validate()?;
        self.transform(batch)?
            .iter()
            .map(|row| self.classifier.predict_proba_row(row))
            .collect()
    }

    /// Predicted class label for each row (first maximum wins)
    pub fn predict(&self, batch: &SampleBatch) -> Result<Vec<i64>> {
        self.predict_with_proba(batch).map(|(labels, _)| labels)
    }

    /// Labels and probabilities from a single pass over the batch
    pub fn predict_with_proba(&self, batch: &SampleBatch) -> Result<(Vec<i64>, Vec<Vec<f64>>)> {
        let proba = self.predict_proba(batch)?;
        let classes = self.classifier.classes()?;
        let labels = proba.iter().map(|p| classes[argmax(p)]).collect();
        Ok((labels, proba))
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
