use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;

use super::{open_reader, parse_field};
use crate::types::{Pose, PoseTrajectory, Vec3};

/// Load a whitespace-delimited estimate trajectory.
///
/// Columns: `timestamp_s tx ty tz qx qy qz qw` (TUM / Basalt export).
/// The quaternion is stored scalar-last and reordered to w, x, y, z here.
/// `#` comment lines and blank lines are skipped; extra columns are ignored.
pub fn load_tum_trajectory(path: &Path) -> Result<PoseTrajectory> {
    let reader = BufReader::new(open_reader(path)?);

    let mut poses = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 8 {
            bail!(
                "{}:{}: expected 8 columns (timestamp tx ty tz qx qy qz qw), found {}",
                path.display(),
                idx + 1,
                fields.len()
            );
        }
        let pose = parse_fields(&fields).with_context(|| format!("{}:{}", path.display(), idx + 1))?;
        poses.push(pose);
    }

    let traj = PoseTrajectory::new(poses)
        .with_context(|| format!("Invalid trajectory in {}", path.display()))?;
    info!(
        "Loaded {} estimated poses from {} ({:.3}s)",
        traj.len(),
        path.display(),
        traj.duration()
    );
    Ok(traj)
}

fn parse_fields(fields: &[&str]) -> Result<Pose> {
    let timestamp = parse_field(fields[0], "timestamp")?;
    let position = Vec3::new(
        parse_field(fields[1], "tx")?,
        parse_field(fields[2], "ty")?,
        parse_field(fields[3], "tz")?,
    );
    let (qx, qy, qz, qw) = (
        parse_field(fields[4], "qx")?,
        parse_field(fields[5], "qy")?,
        parse_field(fields[6], "qz")?,
        parse_field(fields[7], "qw")?,
    );
    Ok(Pose::new(timestamp, position, [qw, qx, qy, qz])?)
}
