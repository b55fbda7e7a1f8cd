//! Cross-checking the converted graph against the source estimator

use crate::predictor::{Prediction, Predictor};
use std::time::Instant;
use tracing::{info, warn};
use vitals_convert::Pipeline;
use vitals_core::{Result, SampleBatch};

/// Default probability tolerance between native and ONNX results
pub const DEFAULT_TOLERANCE: f32 = 1e-5;

/// Runs the fitted pipeline directly, without any conversion
pub struct NativePredictor {
    pipeline: Pipeline,
}

impl NativePredictor {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl Predictor for NativePredictor {
    fn predict(&self, batch: &SampleBatch) -> Result<Prediction> {
        let started = Instant::now();
        let (labels, proba) = self.pipeline.predict_with_proba(batch)?;
        let probabilities = proba
            .into_iter()
            .map(|row| row.into_iter().map(|p| p as f32).collect())
            .collect();

        Ok(Prediction::new(labels, Some(probabilities))
            .with_latency(started.elapsed().as_micros() as u64))
    }

    fn name(&self) -> &str {
        "native"
    }
}

/// Outcome of comparing two predictions of the same batch
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub labels_match: bool,
    /// Both sides have the same rows and classes; `true` when either side
    /// has no probabilities
    pub shapes_match: bool,
    /// Largest absolute probability difference; `None` if the two sides
    /// cannot be compared
    pub max_probability_delta: Option<f32>,
    pub tolerance: f32,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.labels_match
            && self.shapes_match
            && self
                .max_probability_delta
                .map(|d| d <= self.tolerance)
                .unwrap_or(true)
    }
}

/// Compare a candidate prediction with a reference one
pub fn compare(reference: &Prediction, candidate: &Prediction, tolerance: f32) -> VerificationReport {
    let labels_match = reference.labels == candidate.labels;

    let (shapes_match, max_probability_delta) =
        match (&reference.probabilities, &candidate.probabilities) {
            (Some(a), Some(b)) => {
                let same_shape =
                    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.len() == y.len());
                let delta = same_shape.then(|| {
                    a.iter()
                        .zip(b)
                        .flat_map(|(x, y)| x.iter().zip(y).map(|(p, q)| (p - q).abs()))
                        .fold(0.0, f32::max)
                });
                (same_shape, delta)
            }
            _ => (true, None),
        };

    VerificationReport {
        labels_match,
        shapes_match,
        max_probability_delta,
        tolerance,
    }
}

/// Run both predictors on `batch` and compare the results
pub fn verify(
    reference: &dyn Predictor,
    candidate: &dyn Predictor,
    batch: &SampleBatch,
    tolerance: f32,
) -> Result<VerificationReport> {
    let expected = reference.predict(batch)?;
    let actual = candidate.predict(batch)?;
    let report = compare(&expected, &actual, tolerance);

    if report.passed() {
        info!(
            reference = reference.name(),
            candidate = candidate.name(),
            delta = ?report.max_probability_delta,
            "Predictions agree"
        );
    } else {
        warn!(
            reference = reference.name(),
            candidate = candidate.name(),
            labels_match = report.labels_match,
            shapes_match = report.shapes_match,
            delta = ?report.max_probability_delta,
            "Predictions disagree"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_within_tolerance() {
        let a = Prediction::new(vec![0, 1], Some(vec![vec![0.7, 0.3], vec![0.2, 0.8]]));
        let b = Prediction::new(vec![0, 1], Some(vec![vec![0.700001, 0.299999], vec![0.2, 0.8]]));

        let report = compare(&a, &b, DEFAULT_TOLERANCE);
        assert!(report.labels_match);
        assert!(report.passed());
    }

    #[test]
    fn test_compare_detects_label_and_probability_drift() {
        let a = Prediction::new(vec![0], Some(vec![vec![0.7, 0.3]]));
        let b = Prediction::new(vec![1], Some(vec![vec![0.4, 0.6]]));

        let report = compare(&a, &b, DEFAULT_TOLERANCE);
        assert!(!report.labels_match);
        assert!((report.max_probability_delta.unwrap() - 0.3).abs() < 1e-6);
        assert!(!report.passed());
    }

    #[test]
    fn test_compare_without_probabilities() {
        let a = Prediction::new(vec![2], None);
        let b = Prediction::new(vec![2], Some(vec![vec![0.0, 0.0, 1.0]]));

        let report = compare(&a, &b, DEFAULT_TOLERANCE);
        assert_eq!(report.max_probability_delta, None);
        assert!(report.shapes_match);
        assert!(report.passed());
    }

    #[test]
    fn test_compare_fails_on_class_count_mismatch() {
        let a = Prediction::new(vec![0], Some(vec![vec![0.7, 0.3, 0.0]]));
        let b = Prediction::new(vec![0], Some(vec![vec![0.1, 0.9]]));

        let report = compare(&a, &b, DEFAULT_TOLERANCE);
        assert!(report.labels_match);
        assert!(!report.shapes_match);
        assert_eq!(report.max_probability_delta, None);
        assert!(!report.passed());
    }

    #[test]
    fn test_compare_fails_on_row_count_mismatch() {
        let a = Prediction::new(vec![0], Some(vec![vec![0.7, 0.3]]));
        let b = Prediction::new(vec![0], Some(vec![vec![0.7, 0.3], vec![0.5, 0.5]]));

        assert!(!compare(&a, &b, DEFAULT_TOLERANCE).passed());
    }
}
