use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use traj_eval::config::{BatchConfig, DatasetJob, DeltaUnit, EvalConfig};
use traj_eval::evaluation::run_batch;
use traj_eval::report;

/// Evaluate VIO trajectories against EuRoC ground truth (ATE / RPE)
#[derive(Parser, Debug)]
struct Args {
    /// Batch config JSON listing datasets to evaluate
    #[arg(long, conflicts_with_all = ["name", "estimate", "groundtruth"])]
    config: Option<PathBuf>,

    /// Dataset name (single-dataset mode)
    #[arg(long, requires_all = ["estimate", "groundtruth"])]
    name: Option<String>,

    /// Estimated trajectory (timestamp tx ty tz qx qy qz qw)[.gz]
    #[arg(long)]
    estimate: Option<PathBuf>,

    /// EuRoC ground-truth CSV[.gz]
    #[arg(long)]
    groundtruth: Option<PathBuf>,

    /// Output directory (default: batch config value, else "evaluation")
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// RPE window size
    #[arg(long)]
    delta: Option<f64>,

    /// RPE window unit: meters, seconds or frames
    #[arg(long)]
    delta_unit: Option<DeltaUnit>,

    /// Accepted RPE window length mismatch, relative to the delta
    #[arg(long)]
    rel_delta_tol: Option<f64>,

    /// Evaluate an RPE window starting at every pose
    #[arg(long, default_value_t = false)]
    all_pairs: bool,

    /// Max timestamp difference for association (seconds)
    #[arg(long)]
    max_diff: Option<f64>,

    /// Estimate a uniform scale in the alignment (monocular)
    #[arg(long, default_value_t = false)]
    correct_scale: bool,

    /// Worst moments listed in the analysis report
    #[arg(long)]
    top_n: Option<usize>,
}

impl Args {
    fn apply_overrides(&self, eval: &mut EvalConfig) {
        if let Some(delta) = self.delta {
            eval.rpe.delta = delta;
        }
        if let Some(unit) = self.delta_unit {
            eval.rpe.delta_unit = unit;
        }
        if let Some(tol) = self.rel_delta_tol {
            eval.rpe.rel_delta_tol = tol;
        }
        if self.all_pairs {
            eval.rpe.all_pairs = true;
        }
        if self.max_diff.is_some() {
            eval.max_diff = self.max_diff;
        }
        if self.correct_scale {
            eval.correct_scale = true;
        }
        if let Some(n) = self.top_n {
            eval.top_n = n;
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (jobs, mut eval, output_dir) = if let Some(path) = args.config.as_ref() {
        let batch = BatchConfig::load(path)?;
        (batch.datasets, batch.eval, batch.output_dir)
    } else if let (Some(name), Some(estimate), Some(groundtruth)) =
        (args.name.as_ref(), args.estimate.as_ref(), args.groundtruth.as_ref())
    {
        let job = DatasetJob {
            name: name.clone(),
            estimate: estimate.clone(),
            groundtruth: groundtruth.clone(),
        };
        (vec![job], EvalConfig::default(), PathBuf::from("evaluation"))
    } else {
        bail!("Provide --config or --name with --estimate and --groundtruth");
    };
    args.apply_overrides(&mut eval);
    eval.validate()?;
    let output_dir = args.output_dir.clone().unwrap_or(output_dir);

    if jobs.is_empty() {
        bail!("No datasets to evaluate");
    }
    info!(
        "Evaluating {} dataset(s) into {} (RPE delta {} {}{})",
        jobs.len(),
        output_dir.display(),
        eval.rpe.delta,
        eval.rpe.delta_unit,
        if eval.rpe.all_pairs { ", all pairs" } else { "" }
    );

    let (records, failed) = run_batch(&jobs, &eval, &output_dir)?;
    if !records.is_empty() {
        println!("{}", report::format_summary(&records));
    }
    if failed > 0 {
        warn!("{} of {} dataset(s) failed", failed, jobs.len());
    }
    if records.is_empty() {
        bail!("All datasets failed");
    }
    Ok(())
}
