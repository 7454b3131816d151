//! Trajectory accuracy evaluation for visual-inertial odometry.
//!
//! Associates an estimated pose stream with ground truth by timestamp,
//! removes the arbitrary global frame with a closed-form rigid alignment,
//! and scores the result with absolute (ATE) and relative (RPE) pose error.

pub mod alignment;
pub mod association;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod metrics;
pub mod report;
pub mod statistics;
pub mod types;

pub use alignment::{align_trajectory, umeyama, Alignment, RigidTransform};
pub use association::{associate, AssociationResult};
pub use config::{BatchConfig, DatasetJob, DeltaUnit, EvalConfig, RpeConfig};
pub use error::{EvalError, EvalResult};
pub use evaluation::{evaluate, evaluate_batch, DatasetEvaluation, EvaluationRecord};
pub use metrics::{AbsoluteTrajectoryError, RelativePoseError};
pub use statistics::StatSummary;
pub use types::{ErrorSample, Pose, PoseTrajectory};
