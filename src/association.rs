//! Timestamp association between a reference and an estimated trajectory.
//!
//! Each reference pose is paired with the estimate pose nearest in time.
//! An estimate pose can back at most one reference pose: when several
//! reference poses pick the same estimate, the one closest in time keeps
//! it (earlier reference index on an exact tie) and the others are dropped.

use log::{debug, warn};

use crate::error::{EvalError, EvalResult};
use crate::types::PoseTrajectory;

/// Fewer matches than this cannot be aligned or scored
pub const MIN_MATCHES: usize = 2;

/// Index-aligned pair of synchronized trajectories
#[derive(Clone, Debug)]
pub struct AssociationResult {
    /// Matched reference poses, chronological
    pub reference: PoseTrajectory,

    /// Matched estimate poses, `estimate[i]` pairs with `reference[i]`
    pub estimate: PoseTrajectory,

    /// Source indices of the matched poses in the input trajectories
    pub matched_ref: Vec<usize>,
    pub matched_est: Vec<usize>,

    /// Input indices that found no acceptable partner
    pub unmatched_ref: Vec<usize>,
    pub unmatched_est: Vec<usize>,

    /// Time tolerance that was applied [s]
    pub max_diff: f64,
}

impl AssociationResult {
    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }
}

/// Half of the finer median sampling interval of the two trajectories.
///
/// `None` when either trajectory has fewer than two poses.
pub fn default_max_diff(reference: &PoseTrajectory, estimate: &PoseTrajectory) -> Option<f64> {
    let ref_dt = reference.median_interval()?;
    let est_dt = estimate.median_interval()?;
    Some(ref_dt.min(est_dt) / 2.0)
}

/// Pair poses of `reference` and `estimate` by nearest timestamp.
///
/// `max_diff` defaults to [`default_max_diff`]. Fails with
/// `InsufficientOverlap` when fewer than [`MIN_MATCHES`] pairs survive.
pub fn associate(
    reference: &PoseTrajectory,
    estimate: &PoseTrajectory,
    max_diff: Option<f64>,
) -> EvalResult<AssociationResult> {
    let max_diff = match max_diff {
        Some(d) if !d.is_finite() || d < 0.0 => {
            return Err(EvalError::InvalidParameter(format!(
                "max_diff must be a non-negative number, got {}",
                d
            )))
        }
        Some(d) => d,
        None => match default_max_diff(reference, estimate) {
            Some(d) => d,
            None => {
                return Err(EvalError::InsufficientOverlap {
                    matched: 0,
                    required: MIN_MATCHES,
                })
            }
        },
    };
    debug!(
        "Associating {} reference / {} estimate poses, max_diff={:.6}s",
        reference.len(),
        estimate.len(),
        max_diff
    );

    let est_stamps = estimate.timestamps();

    // claims[e] = (reference index, |dt|) currently holding estimate pose e
    let mut claims: Vec<Option<(usize, f64)>> = vec![None; est_stamps.len()];
    for (ri, pose) in reference.poses().iter().enumerate() {
        let Some((ei, dt)) = nearest(&est_stamps, pose.timestamp) else {
            continue;
        };
        if dt > max_diff {
            continue;
        }
        match claims[ei] {
            // strictly closer challengers win; ties keep the earlier reference
            Some((_, held)) if held <= dt => {}
            _ => claims[ei] = Some((ri, dt)),
        }
    }

    let mut pairs: Vec<(usize, usize)> = claims
        .iter()
        .enumerate()
        .filter_map(|(ei, claim)| claim.map(|(ri, _)| (ri, ei)))
        .collect();
    pairs.sort_unstable_by_key(|&(ri, _)| ri);

    if pairs.len() < MIN_MATCHES {
        return Err(EvalError::InsufficientOverlap {
            matched: pairs.len(),
            required: MIN_MATCHES,
        });
    }

    let matched_ref: Vec<usize> = pairs.iter().map(|&(ri, _)| ri).collect();
    let matched_est: Vec<usize> = pairs.iter().map(|&(_, ei)| ei).collect();

    let mut ref_used = vec![false; reference.len()];
    for &ri in &matched_ref {
        ref_used[ri] = true;
    }
    let unmatched_ref: Vec<usize> = (0..reference.len()).filter(|&i| !ref_used[i]).collect();
    let unmatched_est: Vec<usize> = (0..estimate.len()).filter(|&i| claims[i].is_none()).collect();

    if !unmatched_est.is_empty() {
        warn!(
            "{} of {} estimate poses have no reference partner within {:.6}s",
            unmatched_est.len(),
            estimate.len(),
            max_diff
        );
    }

    Ok(AssociationResult {
        reference: reference.select(&matched_ref),
        estimate: estimate.select(&matched_est),
        matched_ref,
        matched_est,
        unmatched_ref,
        unmatched_est,
        max_diff,
    })
}

/// Index and absolute distance of the stamp closest to `target`.
///
/// `stamps` must be sorted ascending. Equidistant neighbours resolve to
/// the earlier one.
fn nearest(stamps: &[f64], target: f64) -> Option<(usize, f64)> {
    if stamps.is_empty() {
        return None;
    }
    let idx = stamps.partition_point(|&t| t < target);
    let after = stamps.get(idx).map(|&t| (idx, (t - target).abs()));
    let before = idx
        .checked_sub(1)
        .map(|i| (i, (stamps[i] - target).abs()));
    match (before, after) {
        (Some(b), Some(a)) => Some(if a.1 < b.1 { a } else { b }),
        (Some(b), None) => Some(b),
        (None, a) => a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traj(stamps: &[f64]) -> PoseTrajectory {
        let positions: Vec<[f64; 3]> = stamps.iter().map(|&t| [t, 0.0, 0.0]).collect();
        let quats = vec![[1.0, 0.0, 0.0, 0.0]; stamps.len()];
        PoseTrajectory::from_raw(stamps, &positions, &quats).unwrap()
    }

    #[test]
    fn test_nearest() {
        let stamps = [0.0, 1.0, 2.0];
        assert_eq!(nearest(&stamps, -5.0).unwrap().0, 0);
        assert_eq!(nearest(&stamps, 0.4).unwrap().0, 0);
        assert_eq!(nearest(&stamps, 0.6).unwrap().0, 1);
        assert_eq!(nearest(&stamps, 0.5).unwrap().0, 0); // tie -> earlier
        assert_eq!(nearest(&stamps, 9.0).unwrap().0, 2);
        assert!(nearest(&[], 1.0).is_none());
    }

    #[test]
    fn test_identical_timestamps_all_match() {
        let stamps: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let result = associate(&traj(&stamps), &traj(&stamps), None).unwrap();
        assert_eq!(result.len(), 11);
        assert!(result.unmatched_ref.is_empty());
        assert!(result.unmatched_est.is_empty());
        assert!((result.max_diff - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_offset_beyond_max_diff_fails() {
        let ref_stamps: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let est_stamps: Vec<f64> = ref_stamps.iter().map(|t| t + 0.3).collect();
        let err = associate(&traj(&ref_stamps), &traj(&est_stamps), Some(0.1)).unwrap_err();
        assert_eq!(
            err,
            EvalError::InsufficientOverlap {
                matched: 0,
                required: MIN_MATCHES
            }
        );
    }

    #[test]
    fn test_dense_reference_sparse_estimate() {
        // 200 Hz reference, 20 Hz estimate with a small clock offset
        let ref_stamps: Vec<f64> = (0..200).map(|i| i as f64 * 0.005).collect();
        let est_stamps: Vec<f64> = (0..20).map(|i| i as f64 * 0.05 + 0.001).collect();
        let result = associate(&traj(&ref_stamps), &traj(&est_stamps), None).unwrap();

        assert_eq!(result.len(), 20);
        assert!(result.unmatched_est.is_empty());
        assert_eq!(result.unmatched_ref.len(), 180);
        for (r, e) in result.reference.poses().iter().zip(result.estimate.poses()) {
            assert!((r.timestamp - e.timestamp).abs() <= result.max_diff);
        }
    }

    #[test]
    fn test_estimate_never_matched_twice() {
        // both reference poses are nearest to the single estimate at 0.03
        let reference = traj(&[0.0, 0.04, 1.0]);
        let estimate = traj(&[0.03, 1.0]);
        let result = associate(&reference, &estimate, Some(0.05)).unwrap();

        assert_eq!(result.matched_ref, vec![1, 2]);
        assert_eq!(result.matched_est, vec![0, 1]);
        assert_eq!(result.unmatched_ref, vec![0]);
    }

    #[test]
    fn test_equal_distance_prefers_earlier_reference() {
        let reference = traj(&[0.0, 0.2, 1.0]);
        let estimate = traj(&[0.1, 1.0]);
        let result = associate(&reference, &estimate, Some(0.15)).unwrap();
        assert_eq!(result.matched_ref, vec![0, 2]);
    }

    #[test]
    fn test_association_is_monotonic() {
        let ref_stamps: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        // jittered estimate stamps, still sorted
        let est_stamps: Vec<f64> = (0..80)
            .map(|i| i as f64 * 0.125 + 0.01 * ((i * 7 % 5) as f64 - 2.0) / 2.0)
            .collect();
        let result = associate(&traj(&ref_stamps), &traj(&est_stamps), Some(0.05)).unwrap();

        assert!(result.matched_ref.windows(2).all(|w| w[0] < w[1]));
        assert!(result.matched_est.windows(2).all(|w| w[0] < w[1]));
        let stamps = result.reference.timestamps();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_invalid_max_diff() {
        let stamps = [0.0, 1.0];
        let err = associate(&traj(&stamps), &traj(&stamps), Some(-1.0)).unwrap_err();
        assert!(matches!(err, EvalError::InvalidParameter(_)));
    }

    #[test]
    fn test_single_pose_trajectory_has_no_default() {
        assert!(default_max_diff(&traj(&[0.0]), &traj(&[0.0, 1.0])).is_none());
        let err = associate(&traj(&[0.0]), &traj(&[0.0, 1.0]), None).unwrap_err();
        assert!(matches!(err, EvalError::InsufficientOverlap { .. }));
    }
}
