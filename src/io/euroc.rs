use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use log::info;

use super::{open_reader, parse_field};
use crate::types::{Pose, PoseTrajectory, Vec3};

/// Minimum columns: timestamp, position (3), quaternion (4)
const MIN_COLUMNS: usize = 8;

/// Load a EuRoC `state_groundtruth_estimate0/data.csv`.
///
/// Columns: `timestamp_ns, px, py, pz, qw, qx, qy, qz[, vx, vy, vz, bias_gyro(3), bias_accel(3)]`.
/// Timestamps are converted to seconds; velocity and bias columns are ignored.
pub fn load_euroc_groundtruth(path: &Path) -> Result<PoseTrajectory> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(open_reader(path)?);

    let mut poses = Vec::new();
    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("Failed to read {}", path.display()))?;
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        if rec.len() == 1 && rec[0].is_empty() {
            continue;
        }
        if rec.len() < MIN_COLUMNS {
            bail!(
                "{}:{}: expected at least {} columns, found {}",
                path.display(),
                line,
                MIN_COLUMNS,
                rec.len()
            );
        }
        let pose = parse_row(&rec).with_context(|| format!("{}:{}", path.display(), line))?;
        poses.push(pose);
    }

    let traj = PoseTrajectory::new(poses)
        .with_context(|| format!("Invalid ground truth in {}", path.display()))?;
    info!(
        "Loaded {} ground-truth poses from {} ({:.3}s)",
        traj.len(),
        path.display(),
        traj.duration()
    );
    Ok(traj)
}

fn parse_row(rec: &csv::StringRecord) -> Result<Pose> {
    let ts_ns: u64 = rec[0]
        .parse()
        .with_context(|| format!("invalid timestamp_ns value '{}'", &rec[0]))?;
    let position = Vec3::new(
        parse_field(&rec[1], "px")?,
        parse_field(&rec[2], "py")?,
        parse_field(&rec[3], "pz")?,
    );
    // w-first already
    let wxyz = [
        parse_field(&rec[4], "qw")?,
        parse_field(&rec[5], "qx")?,
        parse_field(&rec[6], "qy")?,
        parse_field(&rec[7], "qz")?,
    ];
    Ok(Pose::new(ts_ns as f64 * 1e-9, position, wxyz)?)
}
