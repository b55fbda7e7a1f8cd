//! Sample rows and the per-feature input columns built from them

use crate::error::{Error, Result};
use crate::schema::{FeatureKind, InputSignature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single literal feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Text(String),
    Number(f64),
}

impl FeatureValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "'{}'", s),
            Self::Number(n) => write!(f, "{:?}", n),
        }
    }
}

/// One example row: feature name to value, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleRow {
    values: Vec<(String, FeatureValue)>,
}

impl SampleRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a feature value, replacing any previous value for that name
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a feature value in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<FeatureValue>> FromIterator<(K, V)> for SampleRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

impl fmt::Display for SampleRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .values
            .iter()
            .map(|(n, v)| format!("'{}': {}", n, v))
            .collect();
        write!(f, "{{{}}}", fields.join(", "))
    }
}

/// The sanity-check row used after conversion
pub fn reference_sample() -> SampleRow {
    SampleRow::new()
        .with("gender", "Female")
        .with("gestational_age_weeks", 38.5)
        .with("birth_weight_kg", 3.1)
        .with("birth_length_cm", 50.0)
        .with("age_days", 100.0)
        .with("weight_kg", 5.5)
        .with("length_cm", 60.0)
        .with("temperature_c", 37.0)
        .with("heart_rate_bpm", 140.0)
}

/// Typed column data for one graph input
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<String>),
    Float(Vec<f32>),
}

impl ColumnData {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Text(_) => FeatureKind::Categorical,
            Self::Float(_) => FeatureKind::Numeric,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named `[rows, 1]` column
#[derive(Debug, Clone, PartialEq)]
pub struct InputColumn {
    pub name: String,
    pub data: ColumnData,
}

impl InputColumn {
    /// Shape of the column tensor
    pub fn shape(&self) -> [usize; 2] {
        [self.data.len(), 1]
    }
}

/// Named input columns ready for the runtime, in signature order
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    columns: Vec<InputColumn>,
    rows: usize,
}

impl SampleBatch {
    pub fn columns(&self) -> &[InputColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&InputColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Build one column per declared input from the given rows.
    ///
    /// Categorical features must hold text and numeric features numbers;
    /// there is no coercion between the two. Numbers are narrowed to f32.
    /// Every declared feature must be present in every row, and a row may
    /// not carry features the signature does not declare.
    pub fn build(signature: &InputSignature, rows: &[SampleRow]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::sample("at least one sample row is required"));
        }

        for (index, row) in rows.iter().enumerate() {
            if let Some((name, _)) = row.iter().find(|(name, _)| signature.get(name).is_none()) {
                return Err(Error::sample(format!(
                    "row {} has feature '{}' which is not part of the input signature",
                    index, name
                )));
            }
        }

        let mut columns = Vec::with_capacity(signature.len());
        for input in signature.inputs() {
            let data = match input.kind {
                FeatureKind::Categorical => {
                    let mut values = Vec::with_capacity(rows.len());
                    for (index, row) in rows.iter().enumerate() {
                        match lookup(row, index, &input.name)? {
                            FeatureValue::Text(s) => values.push(s.clone()),
                            other => return Err(type_error(index, &input.name, input.kind, other)),
                        }
                    }
                    ColumnData::Text(values)
                }
                FeatureKind::Numeric => {
                    let mut values = Vec::with_capacity(rows.len());
                    for (index, row) in rows.iter().enumerate() {
                        match lookup(row, index, &input.name)? {
                            FeatureValue::Number(n) => values.push(*n as f32),
                            other => return Err(type_error(index, &input.name, input.kind, other)),
                        }
                    }
                    ColumnData::Float(values)
                }
            };

            columns.push(InputColumn {
                name: input.name.clone(),
                data,
            });
        }

        tracing::debug!(rows = rows.len(), columns = columns.len(), "Built sample batch");

        Ok(Self {
            columns,
            rows: rows.len(),
        })
    }

    /// Shorthand for a single-row batch
    pub fn from_row(signature: &InputSignature, row: &SampleRow) -> Result<Self> {
        Self::build(signature, std::slice::from_ref(row))
    }
}

fn lookup<'a>(row: &'a SampleRow, index: usize, name: &str) -> Result<&'a FeatureValue> {
    row.get(name)
        .ok_or_else(|| Error::sample(format!("row {} is missing feature '{}'", index, name)))
}

fn type_error(index: usize, name: &str, kind: FeatureKind, value: &FeatureValue) -> Error {
    Error::sample(format!(
        "row {}: feature '{}' expects {} input but got a {} ({})",
        index,
        name,
        kind.element_type(),
        value.type_name(),
        value
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FEATURE_NAMES;
    use proptest::prelude::*;

    #[test]
    fn test_reference_sample_batch() {
        let signature = InputSignature::health_classifier();
        let batch = SampleBatch::from_row(&signature, &reference_sample()).unwrap();

        assert_eq!(batch.rows(), 1);
        assert_eq!(batch.columns().len(), 9);

        let names: Vec<&str> = batch.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, FEATURE_NAMES.to_vec());

        let gender = batch.column("gender").unwrap();
        assert_eq!(gender.data, ColumnData::Text(vec!["Female".to_string()]));
        assert_eq!(gender.shape(), [1, 1]);

        let temperature = batch.column("temperature_c").unwrap();
        assert_eq!(temperature.data, ColumnData::Float(vec![37.0]));

        let weight = batch.column("birth_weight_kg").unwrap();
        assert_eq!(weight.data, ColumnData::Float(vec![3.1f32]));
    }

    #[test]
    fn test_numeric_categorical_value_is_rejected() {
        let signature = InputSignature::health_classifier();
        let row = reference_sample().with("gender", 1.0);

        let err = SampleBatch::from_row(&signature, &row).unwrap_err();
        assert!(matches!(err, Error::Sample(_)));
        assert!(err.to_string().contains("gender"));
    }

    #[test]
    fn test_text_numeric_value_is_rejected() {
        let signature = InputSignature::health_classifier();
        let row = reference_sample().with("age_days", "100");

        let err = SampleBatch::from_row(&signature, &row).unwrap_err();
        assert!(matches!(err, Error::Sample(_)));
    }

    #[test]
    fn test_missing_and_unknown_features() {
        let signature = InputSignature::map_features(&["gender", "age_days"], &["gender"]);

        let missing = SampleRow::new().with("gender", "Male");
        let err = SampleBatch::from_row(&signature, &missing).unwrap_err();
        assert!(err.to_string().contains("missing feature 'age_days'"));

        let extra = missing.clone().with("age_days", 3.0).with("shoe_size", 2.0);
        let err = SampleBatch::from_row(&signature, &extra).unwrap_err();
        assert!(err.to_string().contains("shoe_size"));

        assert!(SampleBatch::build(&signature, &[]).is_err());
    }

    #[test]
    fn test_multi_row_batch() {
        let signature = InputSignature::health_classifier();
        let rows = vec![
            reference_sample(),
            reference_sample().with("gender", "Male").with("age_days", 12.0),
        ];
        let batch = SampleBatch::build(&signature, &rows).unwrap();

        assert_eq!(batch.rows(), 2);
        assert_eq!(batch.column("gender").unwrap().shape(), [2, 1]);
        assert_eq!(
            batch.column("age_days").unwrap().data,
            ColumnData::Float(vec![100.0, 12.0])
        );
    }

    #[test]
    fn test_insert_replaces_existing_value() {
        let row = SampleRow::new().with("age_days", 1.0).with("age_days", 2.0);
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("age_days"), Some(&FeatureValue::Number(2.0)));
    }

    #[test]
    fn test_sample_row_display() {
        let row = SampleRow::new().with("gender", "Female").with("age_days", 100.0);
        assert_eq!(row.to_string(), "{'gender': 'Female', 'age_days': 100.0}");
    }

    proptest! {
        #[test]
        fn prop_categorical_never_coerced_from_number(value in any::<f64>()) {
            let signature = InputSignature::health_classifier();
            let row = reference_sample().with("gender", value);
            prop_assert!(SampleBatch::from_row(&signature, &row).is_err());
        }

        #[test]
        fn prop_numeric_values_narrow_to_f32(value in -1.0e6f64..1.0e6) {
            let signature = InputSignature::health_classifier();
            let row = reference_sample().with("heart_rate_bpm", value);
            let batch = SampleBatch::from_row(&signature, &row).unwrap();
            prop_assert_eq!(
                &batch.column("heart_rate_bpm").unwrap().data,
                &ColumnData::Float(vec![value as f32])
            );
        }
    }
}
