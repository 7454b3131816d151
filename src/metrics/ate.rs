//! Absolute Trajectory Error
//!
//! One global alignment of the whole synchronized estimate, then the
//! position distance to the reference at every matched timestamp.

use log::info;

use crate::alignment::{align_trajectory, Alignment};
use crate::association::AssociationResult;
use crate::error::{EvalError, EvalResult};
use crate::statistics::StatSummary;
use crate::types::{ErrorSample, PoseTrajectory};

#[derive(Clone, Debug)]
pub struct AbsoluteTrajectoryError {
    /// Alignment applied to the estimate
    pub alignment: Alignment,

    /// Synchronized estimate after alignment (positions only)
    pub aligned_estimate: PoseTrajectory,

    /// Per-pose translation error, stamped with the reference time
    pub errors: Vec<ErrorSample>,

    /// RMSE of the signed per-axis position difference (x, y, z)
    pub axis_rmse: [f64; 3],
}

impl AbsoluteTrajectoryError {
    /// Compute ATE on a synchronized pair.
    ///
    /// `correct_scale` should stay false for metric-scale estimators: a
    /// scale fit would hide real scale drift.
    pub fn compute(sync: &AssociationResult, correct_scale: bool) -> EvalResult<Self> {
        let (alignment, aligned_estimate) =
            align_trajectory(&sync.reference, &sync.estimate, correct_scale)?;

        let mut errors = Vec::with_capacity(sync.len());
        let mut sq_axis = [0.0f64; 3];
        for (est, gt) in aligned_estimate.poses().iter().zip(sync.reference.poses()) {
            let diff = est.position - gt.position;
            for (acc, d) in sq_axis.iter_mut().zip(diff.iter()) {
                *acc += d * d;
            }
            errors.push(ErrorSample {
                timestamp: gt.timestamp,
                value: diff.norm(),
            });
        }
        if errors.is_empty() {
            return Err(EvalError::EmptyMetricResult {
                metric: "ATE".to_string(),
            });
        }

        let n = errors.len() as f64;
        let axis_rmse = sq_axis.map(|s| (s / n).sqrt());

        Ok(Self {
            alignment,
            aligned_estimate,
            errors,
            axis_rmse,
        })
    }

    pub fn statistics(&self) -> EvalResult<StatSummary> {
        StatSummary::from_samples(&self.errors)
    }

    /// Log the headline numbers
    pub fn log_summary(&self, stats: &StatSummary) {
        info!(
            "ATE over {} poses (rank {} alignment, scale {:.4}): {}",
            self.errors.len(),
            self.alignment.rank,
            self.alignment.transform.scale,
            stats.summary()
        );
    }
}
