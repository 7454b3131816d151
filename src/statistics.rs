//! Summary statistics over an error sequence.

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::types::ErrorSample;

/// Error statistics for one metric
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    /// Root mean square error
    pub rmse: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl StatSummary {
    /// Compute statistics from raw values
    pub fn from_values(values: &[f64]) -> EvalResult<Self> {
        if values.is_empty() {
            return Err(EvalError::EmptySequence);
        }
        let n = values.len() as f64;

        let mean = values.iter().sum::<f64>() / n;
        let rmse = (values.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
        let variance = values.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Ok(Self {
            rmse,
            mean,
            median: percentile_sorted(&sorted, 50.0),
            std: variance.sqrt(),
            min,
            max,
        })
    }

    pub fn from_samples(samples: &[ErrorSample]) -> EvalResult<Self> {
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        Self::from_values(&values)
    }

    /// Single-line summary
    pub fn summary(&self) -> String {
        format!(
            "rmse: {:.6}, mean: {:.6}, median: {:.6}, std: {:.6}, min: {:.6}, max: {:.6}",
            self.rmse, self.mean, self.median, self.std, self.min, self.max
        )
    }
}

/// Linearly interpolated percentile (`p` in 0..=100)
pub fn percentile(values: &[f64], p: f64) -> EvalResult<f64> {
    if values.is_empty() {
        return Err(EvalError::EmptySequence);
    }
    if !(0.0..=100.0).contains(&p) {
        return Err(EvalError::InvalidParameter(format!(
            "percentile must be within 0..=100, got {}",
            p
        )));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(percentile_sorted(&sorted, p))
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
