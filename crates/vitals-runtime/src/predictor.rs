//! Predictor trait and prediction results

use vitals_core::{Result, SampleBatch};

/// Anything that turns a sample batch into class predictions
pub trait Predictor {
    /// Predict labels (and probabilities when available) for every row
    fn predict(&self, batch: &SampleBatch) -> Result<Prediction>;

    /// Get the predictor name
    fn name(&self) -> &str;
}

/// Result of a prediction over a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted class label per row
    pub labels: Vec<i64>,

    /// Per-row class probabilities, when the model exposes them
    pub probabilities: Option<Vec<Vec<f32>>>,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl Prediction {
    pub fn new(labels: Vec<i64>, probabilities: Option<Vec<Vec<f32>>>) -> Self {
        Self {
            labels,
            probabilities,
            latency_us: 0,
        }
    }

    pub fn with_latency(mut self, latency_us: u64) -> Self {
        self.latency_us = latency_us;
        self
    }

    pub fn rows(&self) -> usize {
        self.labels.len()
    }

    /// Label of the first row
    pub fn first_label(&self) -> Option<i64> {
        self.labels.first().copied()
    }

    /// Probabilities of the first row
    pub fn first_probabilities(&self) -> Option<&[f32]> {
        self.probabilities
            .as_ref()
            .and_then(|p| p.first())
            .map(|row| row.as_slice())
    }

    /// Largest distance of any row's probability sum from 1.0
    pub fn max_normalization_error(&self) -> Option<f32> {
        self.probabilities.as_ref().map(|rows| {
            rows.iter()
                .map(|row| (row.iter().sum::<f32>() - 1.0).abs())
                .fold(0.0, f32::max)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_row_accessors() {
        let prediction = Prediction::new(vec![2, 0], Some(vec![vec![0.1, 0.2, 0.7], vec![1.0, 0.0, 0.0]]));
        assert_eq!(prediction.rows(), 2);
        assert_eq!(prediction.first_label(), Some(2));
        assert_eq!(prediction.first_probabilities(), Some(&[0.1, 0.2, 0.7][..]));
    }

    #[test]
    fn test_normalization_error() {
        let prediction = Prediction::new(vec![0], Some(vec![vec![0.5, 0.4]]));
        let err = prediction.max_normalization_error().unwrap();
        assert!((err - 0.1).abs() < 1e-6);

        assert_eq!(Prediction::new(vec![1], None).max_normalization_error(), None);
    }
}
