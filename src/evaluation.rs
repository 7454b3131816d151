//! Per-dataset evaluation pipeline and batch runner.
//!
//! `associate → ATE → RPE → statistics` for one dataset is a pure function
//! of its two input trajectories. A batch runs each dataset on its own
//! scoped thread; a failing dataset is logged and reported without
//! touching the others.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::alignment::AlignmentSummary;
use crate::association::{associate, AssociationResult};
use crate::config::{check_unique_outputs, DatasetJob, DeltaUnit, EvalConfig};
use crate::error::EvalResult;
use crate::io::{load_euroc_groundtruth, load_tum_trajectory};
use crate::metrics::{AbsoluteTrajectoryError, RelativePoseError};
use crate::report;
use crate::statistics::StatSummary;
use crate::types::PoseTrajectory;

/// Result record for one dataset, as written to `evaluation_results.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub dataset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trajectory_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groundtruth_file: Option<String>,

    pub num_poses_original_ref: usize,
    pub num_poses_original_est: usize,
    pub num_poses_synchronized: usize,
    pub num_unmatched_ref: usize,
    pub num_unmatched_est: usize,
    pub duration_seconds: f64,
    /// Association tolerance used [s]
    pub max_diff: f64,

    pub ate: StatSummary,
    pub ate_axis_rmse: [f64; 3],
    pub ate_alignment: AlignmentSummary,

    pub rpe: StatSummary,
    pub rpe_delta: f64,
    pub rpe_delta_unit: DeltaUnit,
    pub rpe_pairs: usize,
}

/// Everything computed for one dataset; inputs for plots and reports
#[derive(Clone, Debug)]
pub struct DatasetEvaluation {
    pub record: EvaluationRecord,
    pub sync: AssociationResult,
    pub ate: AbsoluteTrajectoryError,
    pub rpe: RelativePoseError,
}

/// Evaluate `estimate` against `reference`.
///
/// Neither input is modified; the ATE and RPE paths each align their own
/// copy of the synchronized pair.
pub fn evaluate(
    dataset: &str,
    reference: &PoseTrajectory,
    estimate: &PoseTrajectory,
    config: &EvalConfig,
) -> EvalResult<DatasetEvaluation> {
    config.validate()?;

    let sync = associate(reference, estimate, config.max_diff)?;
    info!(
        "[{}] Synchronized {} poses ({} ref / {} est unmatched)",
        dataset,
        sync.len(),
        sync.unmatched_ref.len(),
        sync.unmatched_est.len()
    );

    let ate = AbsoluteTrajectoryError::compute(&sync, config.correct_scale)?;
    let ate_stats = ate.statistics()?;
    ate.log_summary(&ate_stats);

    let rpe = RelativePoseError::compute(&sync, &config.rpe, config.correct_scale)?;
    let rpe_stats = rpe.statistics()?;
    rpe.log_summary(&rpe_stats);

    let record = EvaluationRecord {
        dataset: dataset.to_string(),
        trajectory_file: None,
        groundtruth_file: None,
        num_poses_original_ref: reference.len(),
        num_poses_original_est: estimate.len(),
        num_poses_synchronized: sync.len(),
        num_unmatched_ref: sync.unmatched_ref.len(),
        num_unmatched_est: sync.unmatched_est.len(),
        duration_seconds: sync.reference.duration(),
        max_diff: sync.max_diff,
        ate: ate_stats,
        ate_axis_rmse: ate.axis_rmse,
        ate_alignment: ate.alignment.summary(),
        rpe: rpe_stats,
        rpe_delta: rpe.delta,
        rpe_delta_unit: rpe.delta_unit,
        rpe_pairs: rpe.pairs.len(),
    };

    Ok(DatasetEvaluation {
        record,
        sync,
        ate,
        rpe,
    })
}

/// Load, evaluate and write the outputs of one dataset
pub fn run_dataset(job: &DatasetJob, config: &EvalConfig, output_dir: &Path) -> anyhow::Result<EvaluationRecord> {
    info!("Evaluating {}", job.name);
    let reference = load_euroc_groundtruth(&job.groundtruth)?;
    let estimate = load_tum_trajectory(&job.estimate)?;

    let mut evaluation = evaluate(&job.name, &reference, &estimate, config)
        .with_context(|| format!("Evaluation of {} failed", job.name))?;
    evaluation.record.trajectory_file = Some(job.estimate.display().to_string());
    evaluation.record.groundtruth_file = Some(job.groundtruth.display().to_string());

    let dataset_dir = report::write_dataset_outputs(output_dir, &evaluation, config.top_n)?;
    info!("[{}] Results saved to {}", job.name, dataset_dir.display());
    Ok(evaluation.record)
}

/// Evaluate every job concurrently, one scoped thread per dataset.
///
/// Results come back in job order. A failed dataset yields its error in
/// its slot and is logged; the rest still run to completion.
pub fn evaluate_batch(
    jobs: &[DatasetJob],
    config: &EvalConfig,
    output_dir: &Path,
) -> Vec<anyhow::Result<EvaluationRecord>> {
    let outcome = crossbeam::scope(|s| {
        let handles: Vec<_> = jobs
            .iter()
            .map(|job| s.spawn(move |_| run_dataset(job, config, output_dir)))
            .collect();
        handles
            .into_iter()
            .zip(jobs)
            .map(|(handle, job)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("Worker for {} panicked", job.name)))
            })
            .collect::<Vec<_>>()
    });

    let results = match outcome {
        Ok(results) => results,
        Err(_) => jobs
            .iter()
            .map(|job| Err(anyhow!("Worker for {} panicked", job.name)))
            .collect(),
    };

    for (job, result) in jobs.iter().zip(&results) {
        if let Err(e) = result {
            error!("Failed {}: {:#}", job.name, e);
        }
    }
    results
}

/// Evaluate a batch and write `all_results.json` for the successful datasets
pub fn run_batch(jobs: &[DatasetJob], config: &EvalConfig, output_dir: &Path) -> anyhow::Result<(Vec<EvaluationRecord>, usize)> {
    check_unique_outputs(jobs)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let results = evaluate_batch(jobs, config, output_dir);
    let failed = results.iter().filter(|r| r.is_err()).count();
    let records: Vec<EvaluationRecord> = results.into_iter().filter_map(Result::ok).collect();

    if !records.is_empty() {
        let combined: PathBuf = output_dir.join(report::COMBINED_RESULTS_FILE);
        report::write_json(&combined, &records)?;
        info!("Saved combined results to {}", combined.display());
    }
    Ok((records, failed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::RigidTransform;
    use crate::error::EvalError;
    use crate::types::{Pose, Quat, Rot3, Vec3};
    use std::fs;
    use tempfile::TempDir;

    fn line_reference() -> PoseTrajectory {
        let poses: Vec<Pose> = (0..=10)
            .map(|i| Pose::from_parts(i as f64, Vec3::new(i as f64, 0.0, 0.0), Quat::identity()))
            .collect();
        PoseTrajectory::new(poses).unwrap()
    }

    fn wavy_reference(n: usize) -> PoseTrajectory {
        let poses: Vec<Pose> = (0..n)
            .map(|i| {
                let t = i as f64 * 0.1;
                Pose::from_parts(
                    t,
                    Vec3::new(t, (0.5 * t).sin(), 0.2 * (0.3 * t).cos()),
                    Quat::from_euler_angles(0.0, 0.0, 0.1 * t),
                )
            })
            .collect();
        PoseTrajectory::new(poses).unwrap()
    }

    #[test]
    fn test_rotated_line_scenario() {
        let reference = line_reference();
        let motion = RigidTransform::new(
            Rot3::from_axis_angle(&Vec3::z_axis(), std::f64::consts::FRAC_PI_2),
            Vec3::new(5.0, 5.0, 0.0),
        );
        let estimate = motion.apply_to_poses(&reference);

        let result = evaluate("line", &reference, &estimate, &EvalConfig::default()).unwrap();
        let record = &result.record;
        assert_eq!(record.num_poses_original_ref, 11);
        assert_eq!(record.num_poses_original_est, 11);
        assert_eq!(record.num_poses_synchronized, 11);
        assert!((record.duration_seconds - 10.0).abs() < 1e-12);
        assert!(record.ate.rmse < 1e-6);
        assert!(record.rpe.rmse < 1e-6);
        assert_eq!(record.ate_alignment.rank, 1);
    }

    #[test]
    fn test_disjoint_timestamps_fail_with_insufficient_overlap() {
        let reference = line_reference();
        let shifted = PoseTrajectory::new(
            reference
                .poses()
                .iter()
                .map(|p| Pose::from_parts(p.timestamp + 100.0, p.position, p.orientation))
                .collect(),
        )
        .unwrap();

        let err = evaluate("offset", &reference, &shifted, &EvalConfig::default()).unwrap_err();
        assert!(matches!(err, EvalError::InsufficientOverlap { .. }));
    }

    #[test]
    fn test_metrics_do_not_share_alignment_state() {
        let reference = wavy_reference(120);
        let motion = RigidTransform::new(Rot3::from_euler_angles(0.1, 0.2, 0.3), Vec3::new(1.0, -2.0, 0.5));
        let estimate = motion.apply_to_poses(&reference);

        let result = evaluate("wavy", &reference, &estimate, &EvalConfig::default()).unwrap();
        // both metrics solved the same problem independently
        assert_eq!(result.ate.alignment.transform, result.rpe.alignment.transform);
        // synchronized estimate is still in its original frame
        assert_eq!(result.sync.estimate.poses()[0].position, estimate.poses()[0].position);
        assert!(result.record.ate.rmse < 1e-9);
    }

    #[test]
    fn test_frozen_estimate_still_evaluates() {
        let reference = line_reference();
        let frozen = PoseTrajectory::new(
            reference
                .poses()
                .iter()
                .map(|p| Pose::from_parts(p.timestamp, Vec3::new(2.0, 2.0, 0.0), Quat::identity()))
                .collect(),
        )
        .unwrap();

        let result = evaluate("frozen", &reference, &frozen, &EvalConfig::default()).unwrap();
        assert_eq!(result.record.ate_alignment.rank, 0);
        assert!((result.record.ate.max - 5.0).abs() < 1e-9);
        // every 1 m reference window sees zero estimated motion
        assert!((result.record.rpe.mean - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let reference = line_reference();
        let mut config = EvalConfig::default();
        config.rpe.delta = -1.0;
        let err = evaluate("bad", &reference, &reference, &config).unwrap_err();
        assert!(matches!(err, EvalError::InvalidParameter(_)));
    }

    fn write_euroc(path: &Path, traj: &PoseTrajectory) {
        let mut out = String::from("#timestamp,px,py,pz,qw,qx,qy,qz\n");
        for p in traj.poses() {
            let q = p.orientation;
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                (p.timestamp * 1e9).round() as u64,
                p.position.x,
                p.position.y,
                p.position.z,
                q.w,
                q.i,
                q.j,
                q.k
            ));
        }
        fs::write(path, out).unwrap();
    }

    fn write_tum(path: &Path, traj: &PoseTrajectory) {
        let mut out = String::from("# timestamp tx ty tz qx qy qz qw\n");
        for p in traj.poses() {
            let q = p.orientation;
            out.push_str(&format!(
                "{:.9} {} {} {} {} {} {} {}\n",
                p.timestamp, p.position.x, p.position.y, p.position.z, q.i, q.j, q.k, q.w
            ));
        }
        fs::write(path, out).unwrap();
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let reference = wavy_reference(80);
        let motion = RigidTransform::new(Rot3::from_euler_angles(0.0, 0.0, 0.7), Vec3::new(2.0, 1.0, 0.0));
        let estimate = motion.apply_to_poses(&reference);

        write_euroc(&dir.path().join("gt.csv"), &reference);
        write_tum(&dir.path().join("est.txt"), &estimate);

        let jobs = vec![
            DatasetJob {
                name: "Good Run".to_string(),
                estimate: dir.path().join("est.txt"),
                groundtruth: dir.path().join("gt.csv"),
            },
            DatasetJob {
                name: "Missing".to_string(),
                estimate: dir.path().join("nope.txt"),
                groundtruth: dir.path().join("gt.csv"),
            },
        ];
        let out = dir.path().join("out");
        let (records, failed) = run_batch(&jobs, &EvalConfig::default(), &out).unwrap();

        assert_eq!(failed, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dataset, "Good Run");
        assert_eq!(records[0].num_poses_synchronized, 80);
        assert!(records[0].ate.rmse < 1e-6);
        assert!(out.join("good_run").join("evaluation_results.json").exists());
        assert!(out.join(report::COMBINED_RESULTS_FILE).exists());
    }

    #[test]
    fn test_batch_refuses_shared_output_directory() {
        let dir = TempDir::new().unwrap();
        let job = |name: &str| DatasetJob {
            name: name.to_string(),
            estimate: dir.path().join("est.txt"),
            groundtruth: dir.path().join("gt.csv"),
        };
        let jobs = vec![job("MH 01"), job("mh_01")];
        assert!(run_batch(&jobs, &EvalConfig::default(), &dir.path().join("out")).is_err());
        assert!(!dir.path().join("out").exists());
    }
}
