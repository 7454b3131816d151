//! Trajectory file readers.
//!
//! Readers convert every format to the core convention (seconds,
//! scalar-first quaternions) before building a [`PoseTrajectory`](crate::types::PoseTrajectory).

pub mod euroc;
pub mod tum;

pub use euroc::load_euroc_groundtruth;
pub use tum::load_tum_trajectory;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::Context;
use flate2::read::GzDecoder;

/// Open `path` for reading, transparently decompressing `*.gz`
pub(crate) fn open_reader(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Parse one numeric field, naming the column on failure
pub(crate) fn parse_field(field: &str, column: &str) -> anyhow::Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid {} value '{}'", column, field.trim()))
}
