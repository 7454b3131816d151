//! Result files written for each evaluated dataset.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diagnostics::{worst_errors, Diagnosis};
use crate::evaluation::{DatasetEvaluation, EvaluationRecord};
use crate::statistics::{percentile, StatSummary};
use crate::types::ErrorSample;

pub const RESULTS_FILE: &str = "evaluation_results.json";
pub const COMBINED_RESULTS_FILE: &str = "all_results.json";
pub const ATE_ERRORS_FILE: &str = "ate_errors.csv";
pub const RPE_ERRORS_FILE: &str = "rpe_errors.csv";
pub const ANALYSIS_REPORT_FILE: &str = "analysis_report.txt";

const RULE: &str = "----------------------------------------";
const BANNER: &str = "========================================";

/// Directory name for a dataset: lowercase, spaces become underscores
pub fn slug(dataset: &str) -> String {
    dataset.trim().to_lowercase().replace(' ', "_")
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[derive(Serialize)]
struct ErrorRow {
    timestamp: f64,
    relative_time: f64,
    error: f64,
}

/// Write an error series as `timestamp,relative_time,error`
pub fn write_error_series(path: &Path, samples: &[ErrorSample]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let start = samples.first().map(|s| s.timestamp).unwrap_or(0.0);
    for s in samples {
        wtr.serialize(ErrorRow {
            timestamp: s.timestamp,
            relative_time: s.timestamp - start,
            error: s.value,
        })?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Plain-text root cause report over the ATE series
pub fn render_analysis_report(
    dataset: &str,
    errors: &[ErrorSample],
    top_n: usize,
    generated_at: DateTime<Utc>,
) -> Result<String> {
    let stats = StatSummary::from_samples(errors)?;
    let values: Vec<f64> = errors.iter().map(|s| s.value).collect();
    let p95 = percentile(&values, 95.0)?;
    let diagnosis = Diagnosis::classify(stats.max);

    let mut out = String::new();
    writeln!(out, "ROOT CAUSE ANALYSIS REPORT")?;
    writeln!(out, "Dataset: {}", dataset)?;
    writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "{}\n", BANNER)?;

    writeln!(out, "TOP {} WORST TRACKING MOMENTS:", top_n)?;
    writeln!(out, "{}", RULE)?;
    for w in worst_errors(errors, top_n) {
        writeln!(
            out,
            "Timestamp: {:.3} (Time from start: {:.2}s) --> Error: {:.4} m",
            w.timestamp, w.relative_time, w.error
        )?;
    }

    writeln!(out, "\nAUTOMATED DIAGNOSIS:")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Max Error: {:.4} m", stats.max)?;
    writeln!(out, "RMSE:      {:.4} m", stats.rmse)?;
    writeln!(out, "P95:       {:.4} m\n", p95)?;
    writeln!(out, "CONCLUSION: {}", diagnosis.conclusion())?;
    for line in diagnosis.details() {
        writeln!(out, "{}", line)?;
    }
    Ok(out)
}

/// Write every per-dataset file into `<output_dir>/<slug>/`, returning that directory
pub fn write_dataset_outputs(output_dir: &Path, evaluation: &DatasetEvaluation, top_n: usize) -> Result<PathBuf> {
    let record = &evaluation.record;
    let dir = output_dir.join(slug(&record.dataset));
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    write_json(&dir.join(RESULTS_FILE), record)?;
    write_error_series(&dir.join(ATE_ERRORS_FILE), &evaluation.ate.errors)?;
    write_error_series(&dir.join(RPE_ERRORS_FILE), &evaluation.rpe.errors)?;

    let report = render_analysis_report(&record.dataset, &evaluation.ate.errors, top_n, Utc::now())?;
    let report_path = dir.join(ANALYSIS_REPORT_FILE);
    fs::write(&report_path, report).with_context(|| format!("Failed to write {}", report_path.display()))?;

    Ok(dir)
}

/// Human summary block printed at the end of a run
pub fn format_summary(records: &[EvaluationRecord]) -> String {
    let rule = "=".repeat(80);
    let mut out = format!("\n{}\nEVALUATION SUMMARY\n{}\n", rule, rule);
    for r in records {
        out.push_str(&format!(
            "\n{}:\n  ATE RMSE: {:.6} m\n  RPE RMSE: {:.6} m\n  Duration: {:.2} s\n  Poses: {}\n",
            r.dataset, r.ate.rmse, r.rpe.rmse, r.duration_seconds, r.num_poses_synchronized
        ));
    }
    out.push_str(&format!("\n{}\n", rule));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn samples(values: &[f64]) -> Vec<ErrorSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| ErrorSample {
                timestamp: 10.0 + i as f64,
                value,
            })
            .collect()
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Machine Hall 01"), "machine_hall_01");
        assert_eq!(slug("V1_01_easy"), "v1_01_easy");
    }

    #[test]
    fn test_error_series_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ate.csv");
        write_error_series(&path, &samples(&[0.25, 0.5])).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,relative_time,error");
        assert_eq!(lines[1], "10.0,0.0,0.25");
        assert_eq!(lines[2], "11.0,1.0,0.5");
    }

    #[test]
    fn test_analysis_report_lists_worst_first() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let report = render_analysis_report("MH01", &samples(&[0.05, 0.3, 0.1]), 2, at).unwrap();

        assert!(report.starts_with("ROOT CAUSE ANALYSIS REPORT\nDataset: MH01\n"));
        assert!(report.contains("Generated: 2024-03-01 12:00:00 UTC"));
        assert!(report.contains("TOP 2 WORST TRACKING MOMENTS:"));
        let first = report.find("Error: 0.3000 m").unwrap();
        let second = report.find("Error: 0.1000 m").unwrap();
        assert!(first < second);
        assert!(!report.contains("Error: 0.0500 m"));
        assert!(report.contains("Time from start: 1.00s"));
        assert!(report.contains("Max Error: 0.3000 m"));
        assert!(report.contains("CONCLUSION: MINOR DRIFT."));
    }

    #[test]
    fn test_analysis_report_rejects_empty_series() {
        assert!(render_analysis_report("empty", &[], 5, Utc::now()).is_err());
    }

    #[test]
    fn test_write_json_pretty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        let stats = StatSummary::from_values(&[1.0, 1.0]).unwrap();
        write_json(&path, &stats).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"rmse\": 1.0"));
        let back: StatSummary = serde_json::from_str(&text).unwrap();
        assert_eq!(back, stats);
    }
}
