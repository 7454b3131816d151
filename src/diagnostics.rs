//! Worst-moment listing and a coarse verdict on tracking quality.
//!
//! Pure consumers of an ATE error series; nothing here feeds back into
//! the metrics.

use serde::{Deserialize, Serialize};

use crate::types::ErrorSample;

/// Max ATE below which tracking counts as stable [m]
const STABLE_MAX_ERROR_M: f64 = 0.15;

/// Max ATE below which the drift is considered minor [m]
const MINOR_DRIFT_MAX_ERROR_M: f64 = 0.50;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorstError {
    pub timestamp: f64,
    /// Seconds since the first sample of the series
    pub relative_time: f64,
    pub error: f64,
}

/// The `n` largest errors, largest first.
///
/// Equal errors keep their chronological order.
pub fn worst_errors(samples: &[ErrorSample], n: usize) -> Vec<WorstError> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by(|&a, &b| samples[b].value.total_cmp(&samples[a].value));
    order
        .into_iter()
        .take(n)
        .map(|i| WorstError {
            timestamp: samples[i].timestamp,
            relative_time: samples[i].timestamp - first.timestamp,
            error: samples[i].value,
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnosis {
    Stable,
    MinorDrift,
    CriticalFailure,
}

impl Diagnosis {
    pub fn classify(max_error: f64) -> Self {
        if max_error < STABLE_MAX_ERROR_M {
            Diagnosis::Stable
        } else if max_error < MINOR_DRIFT_MAX_ERROR_M {
            Diagnosis::MinorDrift
        } else {
            Diagnosis::CriticalFailure
        }
    }

    pub fn conclusion(&self) -> &'static str {
        match self {
            Diagnosis::Stable => "STABLE.",
            Diagnosis::MinorDrift => "MINOR DRIFT.",
            Diagnosis::CriticalFailure => "CRITICAL FAILURE DETECTED.",
        }
    }

    /// Explanation lines printed under the conclusion
    pub fn details(&self) -> &'static [&'static str] {
        match self {
            Diagnosis::Stable => &[
                "The system demonstrates robust tracking. Deviations are within acceptable limits.",
            ],
            Diagnosis::MinorDrift => &[
                "Tracking is generally good but has moments of drift.",
                "Suggested Action: Check timestamps above for fast motion or dynamic objects.",
            ],
            Diagnosis::CriticalFailure => &[
                "High trajectory divergence observed.",
                "Potential Causes:",
                "1. Motion Blur (Aggressive rotation)",
                "2. Low Texture environment (white walls/floor)",
                "3. IMU saturation or calibration mismatch",
            ],
        }
    }
}
