//! Feature schema and typed input signature
//!
//! Maps the ordered feature-name list of the trained classifier to the
//! typed, per-feature inputs the converted graph declares. Each feature
//! becomes its own `[batch, 1]` input: string tensors for categorical
//! features, 32-bit float tensors for everything else.
//!
//! The mapper does not check the names against any estimator. A mismatch
//! surfaces later, when the converter compares the signature with what the
//! estimator was fitted on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Feature names of the health classifier, in training column order
pub const FEATURE_NAMES: [&str; 9] = [
    "gender",
    "gestational_age_weeks",
    "birth_weight_kg",
    "birth_length_cm",
    "age_days",
    "weight_kg",
    "length_cm",
    "temperature_c",
    "heart_rate_bpm",
];

/// The single feature holding text category labels
pub const CATEGORICAL_FEATURE: &str = "gender";

/// Semantic type of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Discrete text labels, fed as a string tensor
    Categorical,
    /// Continuous values, fed as an f32 tensor
    Numeric,
}

impl FeatureKind {
    /// Name of the element type the graph input carries
    pub fn element_type(&self) -> &'static str {
        match self {
            Self::Categorical => "string",
            Self::Numeric => "float32",
        }
    }
}

/// One dimension of a declared tensor shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    /// Any size (the batch dimension)
    Unbounded,
    /// Exactly this size
    Fixed(usize),
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "None"),
            Self::Fixed(n) => write!(f, "{}", n),
        }
    }
}

/// Declared tensor shape of a graph input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorShape {
    pub dims: Vec<Dim>,
}

impl TensorShape {
    /// `[None, 1]`: any number of rows, one scalar per row
    pub fn column() -> Self {
        Self {
            dims: vec![Dim::Unbounded, Dim::Fixed(1)],
        }
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

/// Typed declaration of a single graph input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub name: String,
    pub kind: FeatureKind,
    pub shape: TensorShape,
}

/// Ordered, typed input signature consumed by the converter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSignature {
    inputs: Vec<InputSpec>,
}

impl InputSignature {
    /// Map ordered feature names to typed inputs.
    ///
    /// Names listed in `categorical` become string inputs, all others
    /// numeric. Order is preserved and nothing is validated.
    pub fn map_features<S: AsRef<str>>(names: &[S], categorical: &[S]) -> Self {
        let inputs = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let kind = if categorical.iter().any(|c| c.as_ref() == name) {
                    FeatureKind::Categorical
                } else {
                    FeatureKind::Numeric
                };
                InputSpec {
                    name: name.to_string(),
                    kind,
                    shape: TensorShape::column(),
                }
            })
            .collect();

        Self { inputs }
    }

    /// Signature of the health classifier: nine columns, `gender` as text
    pub fn health_classifier() -> Self {
        Self::map_features(&FEATURE_NAMES, &[CATEGORICAL_FEATURE])
    }

    /// Inputs in declaration order
    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    /// Look up an input by name
    pub fn get(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Feature names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|i| i.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}
