//! Closed-form trajectory alignment (Umeyama, 1991).
//!
//! Finds the similarity transform `q ≈ s·R·p + t` that best maps the
//! estimate positions `p` onto the reference positions `q` in the least
//! squares sense. Only positions take part in the fit.
//!
//! Algorithm:
//! 1. Centre both point sets on their centroids
//! 2. Cross-covariance `H = Σ p̃ q̃ᵀ / N`
//! 3. SVD `H = U S Vᵀ`
//! 4. `R = V D Uᵀ`, `D = diag(1, 1, sign(det(V Uᵀ)))` on the smallest singular value
//! 5. `s = trace(D S) / var(p̃)` when scale is estimated, else 1
//! 6. `t = q̄ − s R p̄`
//!
//! Known limitation: with fewer than three non-collinear points `H` is rank
//! deficient and the rotation about the degenerate axis is arbitrary. The
//! fit still minimises the residual; the alignment is flagged and logged.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::types::{Mat3, PoseTrajectory, Quat, Rot3, Vec3, RANK_TOLERANCE};

/// Similarity transform `x ↦ scale · rotation · x + translation`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    /// Proper rotation, det = +1
    pub rotation: Rot3,
    pub translation: Vec3,
    /// Strictly positive; 1.0 for a rigid fit
    pub scale: f64,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            rotation: Rot3::identity(),
            translation: Vec3::zeros(),
            scale: 1.0,
        }
    }

    /// Rigid transform (scale 1)
    pub fn new(rotation: Rot3, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
            scale: 1.0,
        }
    }

    /// Similarity transform; rejects non-positive or non-finite scale
    pub fn with_scale(rotation: Rot3, translation: Vec3, scale: f64) -> EvalResult<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(EvalError::InvalidParameter(format!(
                "scale must be strictly positive, got {}",
                scale
            )));
        }
        Ok(Self {
            rotation,
            translation,
            scale,
        })
    }

    pub fn apply(&self, point: &Vec3) -> Vec3 {
        self.scale * (self.rotation * point) + self.translation
    }

    /// Inverse transform: `x ↦ (1/s) Rᵀ (x − t)`
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        let scale = 1.0 / self.scale;
        Self {
            rotation,
            translation: -(scale * (rotation * self.translation)),
            scale,
        }
    }

    /// Positions transformed, orientations left as they are.
    ///
    /// This is the output used for absolute error: only position
    /// alignment is scored.
    pub fn apply_to_positions(&self, trajectory: &PoseTrajectory) -> PoseTrajectory {
        trajectory.map_poses(|p| (self.apply(&p.position), p.orientation))
    }

    /// Positions and orientations transformed, keeping each pose's body
    /// frame consistent with its position for relative-motion metrics.
    pub fn apply_to_poses(&self, trajectory: &PoseTrajectory) -> PoseTrajectory {
        let q = Quat::from_rotation_matrix(&self.rotation);
        trajectory.map_poses(|p| (self.apply(&p.position), q * p.orientation))
    }
}

/// Outcome of one alignment solve
#[derive(Clone, Debug)]
pub struct Alignment {
    pub transform: RigidTransform,

    /// Singular values of the cross-covariance, descending
    pub singular_values: [f64; 3],

    /// Numerical rank of the cross-covariance (3 for a well-posed fit)
    pub rank: usize,
}

impl Alignment {
    /// Rotation is underdetermined about at least one axis
    pub fn is_degenerate(&self) -> bool {
        self.rank < 3
    }

    pub fn summary(&self) -> AlignmentSummary {
        let m = self.transform.rotation.matrix();
        AlignmentSummary {
            rotation: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
            translation: [
                self.transform.translation.x,
                self.transform.translation.y,
                self.transform.translation.z,
            ],
            scale: self.transform.scale,
            rank: self.rank,
        }
    }
}

/// Plain-array view of an alignment for result files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSummary {
    /// Row-major rotation matrix
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
    pub scale: f64,
    pub rank: usize,
}

/// Least-squares similarity transform mapping `source` onto `target`.
///
/// The point sets must have equal length. A rank-deficient covariance
/// logs a warning and still returns a best-effort fit. At rank 0 (one side
/// collapses to a single point) that fit is the identity rotation plus the
/// centroid offset; with `allow_scale` no valid scale exists and the solve
/// fails with `DegenerateAlignment`.
pub fn umeyama(source: &[Vec3], target: &[Vec3], allow_scale: bool) -> EvalResult<Alignment> {
    if source.len() != target.len() {
        return Err(EvalError::LengthMismatch {
            left: source.len(),
            right: target.len(),
        });
    }
    if source.is_empty() {
        return Err(EvalError::DegenerateAlignment { rank: 0 });
    }

    let n = source.len() as f64;
    let mean_src = centroid(source);
    let mean_tgt = centroid(target);

    let mut h = Mat3::zeros();
    let mut var_src = 0.0;
    let mut var_tgt = 0.0;
    for (p, q) in source.iter().zip(target) {
        let dp = p - mean_src;
        let dq = q - mean_tgt;
        h += dp * dq.transpose();
        var_src += dp.norm_squared();
        var_tgt += dq.norm_squared();
    }
    h /= n;
    var_src /= n;
    var_tgt /= n;

    let svd = h.svd(true, true);
    let u = svd.u.ok_or(EvalError::DegenerateAlignment { rank: 0 })?;
    let v_t = svd.v_t.ok_or(EvalError::DegenerateAlignment { rank: 0 })?;
    let s = svd.singular_values;

    let s_max = s.max();
    let spread = 0.5 * (var_src + var_tgt);
    let rank = if s_max <= RANK_TOLERANCE * spread || s_max <= f64::MIN_POSITIVE {
        0
    } else {
        s.iter().filter(|&&v| v > s_max * RANK_TOLERANCE).count()
    };
    let mut singular_values = [s[0], s[1], s[2]];
    singular_values.sort_by(|a, b| b.total_cmp(a));

    if rank == 0 {
        // one side collapsed to a point: no scale, rotation is arbitrary
        if allow_scale {
            return Err(EvalError::DegenerateAlignment { rank });
        }
        warn!(
            "Degenerate alignment (rank 0, var_src {:.3e}, var_tgt {:.3e}); using identity rotation",
            var_src, var_tgt
        );
        return Ok(Alignment {
            transform: RigidTransform::new(Rot3::identity(), mean_tgt - mean_src),
            singular_values,
            rank,
        });
    }
    if rank < 3 {
        warn!(
            "Rank-deficient alignment (rank {}, singular values {:.3e} {:.3e} {:.3e}); rotation is underdetermined",
            rank, s[0], s[1], s[2]
        );
    }

    let v = v_t.transpose();
    let mut d = Vec3::new(1.0, 1.0, 1.0);
    if (v * u.transpose()).determinant() < 0.0 {
        // reflection: flip the axis of the smallest singular value
        d[s.imin()] = -1.0;
    }
    let r = v * Mat3::from_diagonal(&d) * u.transpose();

    let scale = if allow_scale {
        if var_src <= f64::EPSILON {
            return Err(EvalError::DegenerateAlignment { rank: 0 });
        }
        s.dot(&d) / var_src
    } else {
        1.0
    };

    let mut rotation = Rot3::from_matrix_unchecked(r);
    rotation.renormalize();
    let translation = mean_tgt - scale * (rotation * mean_src);
    let transform = RigidTransform::with_scale(rotation, translation, scale)?;

    debug!(
        "Umeyama fit: scale={:.6} |t|={:.4} rank={}",
        scale,
        translation.norm(),
        rank
    );

    Ok(Alignment {
        transform,
        singular_values,
        rank,
    })
}

/// Align `estimate` onto `reference` using their index-matched positions.
///
/// Returns the solve and a new estimate with transformed positions; the
/// inputs are not modified.
pub fn align_trajectory(
    reference: &PoseTrajectory,
    estimate: &PoseTrajectory,
    allow_scale: bool,
) -> EvalResult<(Alignment, PoseTrajectory)> {
    let alignment = umeyama(&estimate.positions(), &reference.positions(), allow_scale)?;
    let aligned = alignment.transform.apply_to_positions(estimate);
    Ok((alignment, aligned))
}

fn centroid(points: &[Vec3]) -> Vec3 {
    let sum = points.iter().fold(Vec3::zeros(), |acc, p| acc + p);
    sum / points.len() as f64
}
