//! Evaluation settings and batch job files.
//!
//! A batch file is JSON:
//!
//! ```json
//! {
//!   "output_dir": "results/evaluation",
//!   "eval": { "rpe": { "delta": 1.0, "delta_unit": "meters" } },
//!   "datasets": [
//!     { "name": "MH_01_easy", "estimate": "traj_mh_01.txt", "groundtruth": "mh_01/data.csv" }
//!   ]
//! }
//! ```
//!
//! Relative dataset paths resolve against the batch file's directory.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::report::slug;

/// Unit of the relative pose error window
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaUnit {
    /// Distance travelled along the reference
    #[default]
    Meters,
    /// Elapsed reference time
    Seconds,
    /// Number of synchronized poses
    Frames,
}

impl fmt::Display for DeltaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeltaUnit::Meters => "m",
            DeltaUnit::Seconds => "s",
            DeltaUnit::Frames => "frames",
        };
        f.write_str(s)
    }
}

impl FromStr for DeltaUnit {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "meters" => Ok(DeltaUnit::Meters),
            "s" | "seconds" => Ok(DeltaUnit::Seconds),
            "f" | "frames" => Ok(DeltaUnit::Frames),
            other => Err(EvalError::InvalidParameter(format!(
                "unknown delta unit '{}' (expected meters, seconds or frames)",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpeConfig {
    pub delta: f64,
    pub delta_unit: DeltaUnit,
    /// Evaluate a window starting at every pose instead of consecutive windows
    pub all_pairs: bool,
    /// Accepted window length mismatch, relative to `delta`
    pub rel_delta_tol: f64,
}

impl Default for RpeConfig {
    fn default() -> Self {
        Self {
            delta: 1.0,
            delta_unit: DeltaUnit::Meters,
            all_pairs: false,
            rel_delta_tol: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Association tolerance [s]; `None` picks half the finer median sampling interval
    pub max_diff: Option<f64>,

    /// Estimate a uniform scale during alignment (monocular estimators)
    pub correct_scale: bool,

    pub rpe: RpeConfig,

    /// Number of worst ATE moments listed in the analysis report
    pub top_n: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_diff: None,
            correct_scale: false,
            rpe: RpeConfig::default(),
            top_n: 5,
        }
    }
}

impl EvalConfig {
    pub fn validate(&self) -> EvalResult<()> {
        if let Some(d) = self.max_diff {
            if !d.is_finite() || d < 0.0 {
                return Err(EvalError::InvalidParameter(format!(
                    "max_diff must be a non-negative number, got {}",
                    d
                )));
            }
        }
        let delta = self.rpe.delta;
        if !delta.is_finite() || delta <= 0.0 {
            return Err(EvalError::InvalidParameter(format!(
                "RPE delta must be positive, got {}",
                delta
            )));
        }
        let tol = self.rpe.rel_delta_tol;
        if !tol.is_finite() || tol < 0.0 {
            return Err(EvalError::InvalidParameter(format!(
                "RPE rel_delta_tol must be non-negative, got {}",
                tol
            )));
        }
        if self.rpe.delta_unit == DeltaUnit::Frames && delta.fract() != 0.0 {
            return Err(EvalError::InvalidParameter(format!(
                "RPE delta in frames must be a whole number, got {}",
                delta
            )));
        }
        if self.top_n == 0 {
            return Err(EvalError::InvalidParameter("top_n must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// One trajectory/ground-truth pair to evaluate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetJob {
    pub name: String,
    /// Whitespace-delimited estimate (timestamp tx ty tz qx qy qz qw)
    pub estimate: PathBuf,
    /// EuRoC ground-truth CSV
    pub groundtruth: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub eval: EvalConfig,

    pub datasets: Vec<DatasetJob>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("evaluation")
}

impl BatchConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open batch config {}", path.display()))?;
        let mut config: BatchConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse batch config {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for job in &mut config.datasets {
            job.estimate = resolve(base, &job.estimate);
            job.groundtruth = resolve(base, &job.groundtruth);
        }
        config.eval.validate()?;
        check_unique_outputs(&config.datasets)?;
        Ok(config)
    }
}

/// Fail when two jobs would write the same `<output_dir>/<slug>` directory
pub fn check_unique_outputs(jobs: &[DatasetJob]) -> anyhow::Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for job in jobs {
        if let Some(first) = seen.insert(slug(&job.name), &job.name) {
            bail!(
                "Datasets '{}' and '{}' share the output directory '{}'",
                first,
                job.name,
                slug(&job.name)
            );
        }
    }
    Ok(())
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_follow_standard_evaluation() {
        let config = EvalConfig::default();
        assert_eq!(config.max_diff, None);
        assert!(!config.correct_scale);
        assert_eq!(config.rpe.delta, 1.0);
        assert_eq!(config.rpe.delta_unit, DeltaUnit::Meters);
        assert!(!config.rpe.all_pairs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EvalConfig::default();
        config.rpe.delta = 0.0;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.rpe.delta_unit = DeltaUnit::Frames;
        config.rpe.delta = 2.5;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.max_diff = Some(f64::NAN);
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.top_n = 0;
        assert!(config.validate().is_err());

        let mut config = EvalConfig::default();
        config.rpe.rel_delta_tol = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EvalConfig =
            serde_json::from_str(r#"{ "rpe": { "delta_unit": "seconds" } }"#).unwrap();
        assert_eq!(config.rpe.delta_unit, DeltaUnit::Seconds);
        assert_eq!(config.rpe.delta, 1.0);
        assert_eq!(config.top_n, 5);
    }

    #[test]
    fn test_batch_paths_resolve_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch.json");
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "datasets": [ {{ "name": "MH 01", "estimate": "est.txt", "groundtruth": "/abs/gt.csv" }} ] }}"#
        )
        .unwrap();

        let config = BatchConfig::load(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("evaluation"));
        assert_eq!(config.datasets[0].estimate, dir.path().join("est.txt"));
        assert_eq!(config.datasets[0].groundtruth, PathBuf::from("/abs/gt.csv"));
    }

    #[test]
    fn test_colliding_dataset_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batch.json");
        fs::write(
            &path,
            r#"{ "datasets": [
                { "name": "MH 01", "estimate": "a.txt", "groundtruth": "a.csv" },
                { "name": "mh_01", "estimate": "b.txt", "groundtruth": "b.csv" }
            ] }"#,
        )
        .unwrap();

        let err = BatchConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("mh_01"), "{}", err);
    }

    #[test]
    fn test_delta_unit_display() {
        assert_eq!(DeltaUnit::Meters.to_string(), "m");
        assert_eq!(DeltaUnit::Frames.to_string(), "frames");
    }

    #[test]
    fn test_delta_unit_parse() {
        assert_eq!("meters".parse::<DeltaUnit>().unwrap(), DeltaUnit::Meters);
        assert_eq!("S".parse::<DeltaUnit>().unwrap(), DeltaUnit::Seconds);
        assert_eq!("frames".parse::<DeltaUnit>().unwrap(), DeltaUnit::Frames);
        assert!("furlongs".parse::<DeltaUnit>().is_err());
    }
}
