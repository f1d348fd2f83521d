//! Results archival for staircase experiments.
//!
//! Writes, per subject:
//! - One CSV per staircase with its ordered trial records
//! - A JSON record of the whole run (configuration, timestamps, outcome)

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use staircase_kernel::config::ExperimentConfig;
use staircase_kernel::runner::ExperimentReport;
use staircase_kernel::staircase::Staircase;
use staircase_kernel::trial::{format_value, TrialRecord};

/// Everything archived for one subject's run.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentRecord<'a> {
    pub subject: &'a str,
    pub config: &'a ExperimentConfig,
    pub report: &'a ExperimentReport,
}

/// Where the output files for a run were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub directory: PathBuf,
    pub staircase_csvs: Vec<PathBuf>,
    pub record_json: PathBuf,
    pub plot: PathBuf,
}

/// Replace spaces so identifiers are safe as path components.
pub fn path_safe(name: &str) -> String {
    name.trim().replace(' ', "_")
}

/// Lay out the output paths for a subject under `data_path`.
pub fn output_paths(data_path: &Path, subject: &str, staircases: &[Staircase]) -> OutputPaths {
    let subject = path_safe(subject);
    let directory = data_path.join(&subject);
    let staircase_csvs = staircases
        .iter()
        .map(|s| directory.join(format!("{}_{}_results.csv", subject, path_safe(s.name()))))
        .collect();

    OutputPaths {
        record_json: directory.join(format!("{}_experiment.json", subject)),
        plot: directory.join(format!("{}_results.svg", subject)),
        staircase_csvs,
        directory,
    }
}

/// Write one staircase's records to CSV.
pub fn write_staircase_csv(records: &[TrialRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    // Header
    writeln!(
        writer,
        "Trial,Reference,Test Sample,Ref Presented First,Correct,Reversal,Direction"
    )?;

    for r in records {
        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            r.trial_index,
            csv_value(r.reference),
            csv_value(r.test_sample),
            if r.reference_first() { 1 } else { 2 },
            yes_no(r.correct),
            yes_no(r.reversal),
            r.direction,
        )?;
    }

    writer.flush()
}

/// Integral values without a decimal part, everything else at full precision.
fn csv_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format_value(value)
    } else {
        value.to_string()
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Y"
    } else {
        "N"
    }
}

/// Save the run record as JSON.
pub fn save_record(record: &ExperimentRecord<'_>, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write every CSV and the JSON record, creating the subject directory.
pub fn write_results(
    config: &ExperimentConfig,
    subject: &str,
    report: &ExperimentReport,
) -> Result<OutputPaths> {
    let paths = output_paths(&config.experiment.path, subject, &report.staircases);
    fs::create_dir_all(&paths.directory)
        .with_context(|| format!("failed to create {}", paths.directory.display()))?;

    for (staircase, path) in report.staircases.iter().zip(&paths.staircase_csvs) {
        write_staircase_csv(staircase.records(), path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let record = ExperimentRecord {
        subject,
        config,
        report,
    };
    save_record(&record, &paths.record_json)
        .with_context(|| format!("failed to write {}", paths.record_json.display()))?;

    Ok(paths)
}
