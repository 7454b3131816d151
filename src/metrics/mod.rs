//! Trajectory error metrics
//!
//! Both metrics consume a synchronized [`AssociationResult`](crate::association::AssociationResult)
//! and run their own alignment on it, so neither can disturb the other's working set.

pub mod ate;
pub mod rpe;

pub use ate::AbsoluteTrajectoryError;
pub use rpe::RelativePoseError;
