//! Relative Pose Error
//!
//! Compares the motion between two reference poses `i, j` a fixed delta
//! apart with the estimate's motion over the same pair:
//! `E = (refᵢ⁻¹·refⱼ)⁻¹ · (estᵢ⁻¹·estⱼ)`, scored by the norm of the
//! translation part of `E`. Local drift shows up here independently of
//! the accumulated global error.

use log::{debug, info};

use crate::alignment::{umeyama, Alignment};
use crate::association::AssociationResult;
use crate::config::{DeltaUnit, RpeConfig};
use crate::error::{EvalError, EvalResult};
use crate::statistics::StatSummary;
use crate::types::{ErrorSample, PoseTrajectory};

/// Relative tolerance when testing whether a window has reached `delta`
const DELTA_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug)]
pub struct RelativePoseError {
    /// This metric's own alignment of the synchronized pair
    pub alignment: Alignment,

    /// Index pairs `(i, j)` into the synchronized trajectories
    pub pairs: Vec<(usize, usize)>,

    /// Translation error per pair, stamped with the reference time at `i`
    pub errors: Vec<ErrorSample>,

    pub delta: f64,
    pub delta_unit: DeltaUnit,
}

impl RelativePoseError {
    /// Compute RPE on a synchronized pair.
    ///
    /// The pair is aligned again here, on its own copy, exactly as for ATE;
    /// the alignment moves whole poses so relative motions stay consistent.
    pub fn compute(
        sync: &AssociationResult,
        config: &RpeConfig,
        correct_scale: bool,
    ) -> EvalResult<Self> {
        let alignment = umeyama(
            &sync.estimate.positions(),
            &sync.reference.positions(),
            correct_scale,
        )?;
        let estimate = alignment.transform.apply_to_poses(&sync.estimate);
        let reference = &sync.reference;

        let pairs = select_pairs(reference, config)?;
        debug!(
            "RPE: {} pairs for delta {} {} (all_pairs={})",
            pairs.len(),
            config.delta,
            config.delta_unit,
            config.all_pairs
        );
        if pairs.is_empty() {
            return Err(EvalError::EmptyMetricResult {
                metric: "RPE".to_string(),
            });
        }

        let errors = pairs
            .iter()
            .map(|&(i, j)| {
                let (ref_i, ref_j) = (&reference.poses()[i], &reference.poses()[j]);
                let (est_i, est_j) = (&estimate.poses()[i], &estimate.poses()[j]);
                let (t_ref, q_ref) = ref_i.relative_to(ref_j);
                let (t_est, _) = est_i.relative_to(est_j);
                // translation of (Tref_rel)⁻¹ · Test_rel
                let err = q_ref.inverse() * (t_est - t_ref);
                ErrorSample {
                    timestamp: ref_i.timestamp,
                    value: err.norm(),
                }
            })
            .collect();

        Ok(Self {
            alignment,
            pairs,
            errors,
            delta: config.delta,
            delta_unit: config.delta_unit,
        })
    }

    pub fn statistics(&self) -> EvalResult<StatSummary> {
        StatSummary::from_samples(&self.errors)
    }

    pub fn log_summary(&self, stats: &StatSummary) {
        info!(
            "RPE over {} pairs (delta {} {}): {}",
            self.pairs.len(),
            self.delta,
            self.delta_unit,
            stats.summary()
        );
    }
}

/// Choose the `(i, j)` windows over the reference trajectory.
///
/// Windows are measured in travelled distance, elapsed time or pose count.
/// A window is kept only when its measured length is within
/// `rel_delta_tol · delta` of `delta`, so a gap in the data never turns a
/// short window into a long one.
///
/// With `all_pairs` every pose starts a window that ends at the pose whose
/// measure is nearest to `delta`. Otherwise windows are chained: each one
/// starts where the previous one ended (or was rejected), so every pose is
/// visited once.
pub fn select_pairs(reference: &PoseTrajectory, config: &RpeConfig) -> EvalResult<Vec<(usize, usize)>> {
    let delta = config.delta;
    if !delta.is_finite() || delta <= 0.0 {
        return Err(EvalError::InvalidParameter(format!(
            "RPE delta must be positive, got {}",
            delta
        )));
    }
    let tol = config.rel_delta_tol;
    if !tol.is_finite() || tol < 0.0 {
        return Err(EvalError::InvalidParameter(format!(
            "RPE rel_delta_tol must be non-negative, got {}",
            tol
        )));
    }
    let poses = reference.poses();
    if poses.len() < 2 {
        return Ok(Vec::new());
    }

    // cumulative window measure at each pose
    let mut cumulative = Vec::with_capacity(poses.len());
    cumulative.push(0.0);
    for w in poses.windows(2) {
        let step = match config.delta_unit {
            DeltaUnit::Meters => (w[1].position - w[0].position).norm(),
            DeltaUnit::Seconds => w[1].timestamp - w[0].timestamp,
            DeltaUnit::Frames => 1.0,
        };
        let last = cumulative.last().copied().unwrap_or(0.0);
        cumulative.push(last + step);
    }
    let reach = delta * (1.0 - DELTA_TOLERANCE);
    let max_mismatch = delta * (tol + DELTA_TOLERANCE);

    let mut pairs = Vec::new();
    if config.all_pairs {
        for i in 0..poses.len() - 1 {
            let target = cumulative[i] + delta;
            let k = i + 1 + cumulative[i + 1..].partition_point(|&c| c < target);
            // nearest of the poses straddling the target; earlier wins a tie
            let j = if k > i + 1 && (k == poses.len() || target - cumulative[k - 1] <= cumulative[k] - target) {
                k - 1
            } else if k < poses.len() {
                k
            } else {
                continue;
            };
            if (cumulative[j] - cumulative[i] - delta).abs() <= max_mismatch {
                pairs.push((i, j));
            }
        }
    } else {
        let mut start = 0;
        for j in 1..poses.len() {
            let length = cumulative[j] - cumulative[start];
            if length >= reach {
                if length - delta <= max_mismatch {
                    pairs.push((start, j));
                }
                start = j;
            }
        }
    }
    Ok(pairs)
}
