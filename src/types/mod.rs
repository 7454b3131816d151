pub mod linalg;

pub use linalg::*;

use nalgebra::Quaternion;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// A single timestamped 6-DoF pose.
///
/// Orientation is scalar-first (w, x, y, z) and always unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Seconds
    pub timestamp: f64,
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    /// Build a pose from raw scalar-first quaternion components.
    ///
    /// The quaternion is renormalised; a (near) zero quaternion or any
    /// non-finite component is rejected.
    pub fn new(timestamp: f64, position: Vec3, wxyz: [f64; 4]) -> EvalResult<Self> {
        if !timestamp.is_finite()
            || position.iter().any(|v| !v.is_finite())
            || wxyz.iter().any(|v| !v.is_finite())
        {
            return Err(EvalError::NonFiniteValue { index: 0 });
        }
        let q = Quaternion::new(wxyz[0], wxyz[1], wxyz[2], wxyz[3]);
        let orientation = Quat::try_new(q, MIN_QUATERNION_NORM)
            .ok_or(EvalError::InvalidOrientation { index: 0 })?;
        Ok(Self {
            timestamp,
            position,
            orientation,
        })
    }

    /// Pose with an already valid orientation
    pub fn from_parts(timestamp: f64, position: Vec3, orientation: Quat) -> Self {
        Self {
            timestamp,
            position,
            orientation,
        }
    }

    /// `self⁻¹ · other`, the motion from this pose to `other` expressed in this pose's frame
    pub fn relative_to(&self, other: &Pose) -> (Vec3, Quat) {
        let inv = self.orientation.inverse();
        (inv * (other.position - self.position), inv * other.orientation)
    }
}

/// Immutable, strictly time-ordered sequence of poses.
///
/// Every transform produces a new trajectory, so the inputs of an
/// evaluation stay available for before/after comparisons.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseTrajectory {
    poses: Vec<Pose>,
}

impl PoseTrajectory {
    /// Validate and wrap a pose list.
    ///
    /// Rejects non-finite values and duplicate or out-of-order timestamps.
    /// Orientations are renormalised to resist accumulated drift.
    pub fn new(poses: Vec<Pose>) -> EvalResult<Self> {
        let mut checked: Vec<Pose> = Vec::with_capacity(poses.len());
        for (index, pose) in poses.into_iter().enumerate() {
            if !pose.timestamp.is_finite() || pose.position.iter().any(|v| !v.is_finite()) {
                return Err(EvalError::NonFiniteValue { index });
            }
            let q = pose.orientation.into_inner();
            let orientation = Quat::try_new(q, MIN_QUATERNION_NORM)
                .ok_or(EvalError::InvalidOrientation { index })?;

            if let Some(prev) = checked.last() {
                if pose.timestamp <= prev.timestamp {
                    return Err(EvalError::NonMonotonicTimestamps {
                        index,
                        previous: prev.timestamp,
                        current: pose.timestamp,
                    });
                }
            }
            checked.push(Pose::from_parts(pose.timestamp, pose.position, orientation));
        }
        Ok(Self { poses: checked })
    }

    /// Build from parallel raw arrays, quaternions scalar-first.
    pub fn from_raw(timestamps: &[f64], positions: &[[f64; 3]], wxyz: &[[f64; 4]]) -> EvalResult<Self> {
        if timestamps.len() != positions.len() {
            return Err(EvalError::LengthMismatch {
                left: timestamps.len(),
                right: positions.len(),
            });
        }
        if timestamps.len() != wxyz.len() {
            return Err(EvalError::LengthMismatch {
                left: timestamps.len(),
                right: wxyz.len(),
            });
        }
        let poses = timestamps
            .iter()
            .zip(positions)
            .zip(wxyz)
            .enumerate()
            .map(|(index, ((&t, p), q))| {
                Pose::new(t, Vec3::new(p[0], p[1], p[2]), *q).map_err(|e| e.at_index(index))
            })
            .collect::<EvalResult<Vec<_>>>()?;
        Self::new(poses)
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pose> {
        self.poses.get(index)
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.poses.iter().map(|p| p.timestamp).collect()
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.poses.iter().map(|p| p.position).collect()
    }

    /// Time between first and last pose (0 for fewer than two poses)
    pub fn duration(&self) -> f64 {
        match (self.poses.first(), self.poses.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// Median spacing between consecutive timestamps
    pub fn median_interval(&self) -> Option<f64> {
        if self.poses.len() < 2 {
            return None;
        }
        let mut dts: Vec<f64> = self
            .poses
            .windows(2)
            .map(|w| w[1].timestamp - w[0].timestamp)
            .collect();
        dts.sort_by(|a, b| a.total_cmp(b));
        let n = dts.len();
        Some(if n % 2 == 0 {
            (dts[n / 2 - 1] + dts[n / 2]) / 2.0
        } else {
            dts[n / 2]
        })
    }

    /// Total path length travelled through the positions
    pub fn path_length(&self) -> f64 {
        self.poses
            .windows(2)
            .map(|w| (w[1].position - w[0].position).norm())
            .sum()
    }

    /// Keep only the poses at `indices` (must be increasing), in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            poses: indices.iter().map(|&i| self.poses[i]).collect(),
        }
    }

    /// New trajectory with every pose passed through `f`.
    ///
    /// Timestamps are carried over unchanged so ordering still holds.
    pub fn map_poses<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&Pose) -> (Vec3, Quat),
    {
        Self {
            poses: self
                .poses
                .iter()
                .map(|p| {
                    let (position, orientation) = f(p);
                    Pose::from_parts(p.timestamp, position, orientation)
                })
                .collect(),
        }
    }
}

/// One value of an error time series
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorSample {
    pub timestamp: f64,
    pub value: f64,
}
