//! Linear algebra aliases shared by the evaluation pipeline
//!
//! Everything is 3D and `f64`; the aliases keep signatures short and make
//! the frame conventions explicit in one place.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

// ===== Geometry =====
pub type Vec3 = Vector3<f64>;
pub type Mat3 = Matrix3<f64>;
pub type Rot3 = Rotation3<f64>;

/// Unit quaternion, stored and constructed scalar-first (w, x, y, z)
pub type Quat = UnitQuaternion<f64>;

// ===== Tolerances =====
/// Quaternions with a norm below this are rejected instead of normalised
pub const MIN_QUATERNION_NORM: f64 = 1e-9;

/// Singular values below `max_singular_value * RANK_TOLERANCE` count as zero
pub const RANK_TOLERANCE: f64 = 1e-9;
