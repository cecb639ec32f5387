//! Export fit results to JSON and datasets to CSV.
//!
//! The JSON export is meant to be easy to consume from downstream scripts:
//! one record per column pair, with either the fitted parameters per model or
//! the reason the pair was skipped.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::pipeline::{DatasetRun, RunOutput};
use crate::domain::{Dataset, PipelineConfig};
use crate::error::AppError;
use crate::fit::EosFit;

#[derive(Debug, Serialize)]
struct ResultsFile<'a> {
    tool: &'static str,
    version: &'static str,
    generated_at: DateTime<Utc>,
    input: String,
    sheet: Option<&'a str>,
    fixed_k0: Option<f64>,
    datasets: Vec<DatasetRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct DatasetRecord<'a> {
    pressure_column: &'a str,
    volume_column: &'a str,
    n_points: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_reason: Option<&'a str>,
    fits: Vec<FitRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FitRecord {
    model: &'static str,
    v0: f64,
    k0: f64,
    k0_prime: f64,
    sse: f64,
    rmse: f64,
    iterations: usize,
    evaluations: usize,
    termination: String,
}

impl FitRecord {
    fn from_fit(fit: &EosFit) -> Self {
        Self {
            model: fit.kind.display_name(),
            v0: fit.params.v0,
            k0: fit.params.k0,
            k0_prime: fit.params.k0_prime,
            sse: fit.sse,
            rmse: fit.rmse,
            iterations: fit.iterations,
            evaluations: fit.evaluations,
            termination: format!("{:?}", fit.termination),
        }
    }
}

impl<'a> DatasetRecord<'a> {
    fn from_run(run: &'a DatasetRun) -> Self {
        let status = if run.skipped.is_some() {
            "skipped"
        } else if run.fits.is_empty() {
            "failed"
        } else {
            "fitted"
        };
        Self {
            pressure_column: &run.columns.pressure,
            volume_column: &run.columns.volume,
            n_points: run.n_points,
            status,
            skip_reason: run.skipped.as_deref(),
            fits: run.fits.iter().map(FitRecord::from_fit).collect(),
            failures: run.failures.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Write the per-dataset fit results of a run to a pretty-printed JSON file.
pub fn write_results_json(path: &Path, output: &RunOutput, config: &PipelineConfig) -> Result<(), AppError> {
    let doc = ResultsFile {
        tool: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        generated_at: Utc::now(),
        input: config.input.display().to_string(),
        sheet: config.sheet.as_deref(),
        fixed_k0: config.fixed_k0,
        datasets: output.runs.iter().map(DatasetRecord::from_run).collect(),
    };

    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &doc)
        .map_err(|e| AppError::new(2, format!("Failed to write export JSON '{}': {e}", path.display())))?;
    Ok(())
}

/// Write a dataset as a two-column CSV using its column names as the header.
pub fn write_dataset_csv(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    let csv_err = |e: csv::Error| AppError::new(2, format!("Failed to write CSV '{}': {e}", path.display()));

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer
        .write_record([dataset.columns.pressure.as_str(), dataset.columns.volume.as_str()])
        .map_err(csv_err)?;
    for (p, v) in dataset.pressures.iter().zip(&dataset.volumes) {
        writer
            .write_record([p.to_string(), v.to_string()])
            .map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write CSV '{}': {e}", path.display())))?;
    Ok(())
}
