//! The fit pipeline shared by `single` and `multi`.
//!
//! load -> (interpolate) -> per column pair: skip on gaps, fit every model,
//! print results, add to the canvas -> save figure -> optional JSON export.
//!
//! Result lines go to the `out` writer passed by the caller so the pipeline
//! can be driven from tests without capturing stdout.

use std::io::Write;

use tracing::{info, warn};

use crate::domain::{BatchPolicy, ColumnPair, EosKind, FigureLayout, MissingPolicy, PipelineConfig};
use crate::error::AppError;
use crate::fit::{EosFit, FitError, FitOptions, fit_eos};
use crate::io::load_table;
use crate::plot::{FIT_GRAY, LegendPlacement, OverlayStyle, PlotCanvas, parse_color};
use crate::report::{format_fit_line, format_missing_warning};

/// Outcome for one column pair.
#[derive(Debug, Clone)]
pub struct DatasetRun {
    pub columns: ColumnPair,
    pub n_points: usize,
    /// Why the pair was not fitted at all.
    pub skipped: Option<String>,
    pub fits: Vec<EosFit>,
    /// Fits that failed under `BatchPolicy::Skip`.
    pub failures: Vec<FitError>,
}

impl DatasetRun {
    pub fn is_fitted(&self) -> bool {
        !self.fits.is_empty()
    }
}

/// All computed outputs of a run.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub runs: Vec<DatasetRun>,
}

impl RunOutput {
    pub fn fitted_count(&self) -> usize {
        self.runs.iter().filter(|r| r.is_fitted()).count()
    }
}

pub fn fit_options(config: &PipelineConfig) -> FitOptions {
    FitOptions {
        seed_preset: config.seed_preset,
        k0_guess: config.k0_guess,
        k0_prime_guess: config.k0_prime_guess,
        fixed_k0: config.fixed_k0,
        max_evaluations: config.max_evaluations,
    }
}

/// Execute the pipeline and return per-dataset outcomes.
///
/// Errors: invalid configuration or unreadable input (exit 2), no dataset
/// could be fitted (exit 3), a fit failed under `BatchPolicy::Abort` (exit 4).
pub fn run_pipeline(config: &PipelineConfig, out: &mut impl Write) -> Result<RunOutput, AppError> {
    if config.pairs.is_empty() {
        return Err(AppError::config("At least one pressure/volume column pair is required."));
    }
    if config.colors.is_empty() {
        return Err(AppError::config("At least one plot colour is required."));
    }
    let colors = config
        .colors
        .iter()
        .map(|c| parse_color(c))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::config(format!("Invalid --colors value: {e}")))?;

    // Request every pressure column, then every volume column.
    let mut requested: Vec<String> = config.pairs.iter().map(|p| p.pressure.clone()).collect();
    requested.extend(config.pairs.iter().map(|p| p.volume.clone()));

    let mut table = load_table(&config.input, &requested, config.sheet.as_deref())?;
    info!(
        path = %config.input.display(),
        rows = table.row_count(),
        columns = table.column_names().len(),
        "loaded table"
    );
    if config.missing == MissingPolicy::Interpolate {
        table.interpolate_linear();
    }

    let opts = fit_options(config);
    let legend = match config.layout {
        FigureLayout::Single => LegendPlacement::Inside,
        FigureLayout::Multi => LegendPlacement::Outside,
    };
    let mut canvas = PlotCanvas::new(config.title.clone(), config.dpi).with_legend(legend);
    let mut output = RunOutput::default();

    for (i, pair) in config.pairs.iter().enumerate() {
        let dataset = table.dataset(pair)?;
        let mut run = DatasetRun {
            columns: pair.clone(),
            n_points: dataset.len(),
            skipped: None,
            fits: Vec::new(),
            failures: Vec::new(),
        };

        if dataset.has_missing() {
            warn!("{}", format_missing_warning(pair));
            run.skipped = Some("missing values".to_string());
            output.runs.push(run);
            continue;
        }

        for kind in EosKind::ALL {
            match fit_eos(kind, &dataset, &opts) {
                Ok(fit) => {
                    writeln!(out, "{}", format_fit_line(&fit, pair))
                        .map_err(|e| AppError::new(2, format!("Failed to write output: {e}")))?;
                    run.fits.push(fit);
                }
                Err(err) => match config.on_error {
                    BatchPolicy::Abort => return Err(err.into()),
                    BatchPolicy::Skip => {
                        warn!("{err}");
                        run.failures.push(err);
                    }
                },
            }
        }

        let drawn: Vec<_> = run
            .fits
            .iter()
            .filter(|f| config.plot_models.contains(&f.kind))
            .map(|f| (f.kind, f.params))
            .collect();
        if run.is_fitted() {
            let color = colors[i % colors.len()];
            let style = match config.layout {
                FigureLayout::Single => OverlayStyle {
                    label: "Data".to_string(),
                    marker: color,
                    curve: FIT_GRAY,
                },
                FigureLayout::Multi => OverlayStyle {
                    label: pair.volume.clone(),
                    marker: color,
                    curve: color,
                },
            };
            canvas.add_dataset(&dataset, style, &drawn);
        }
        output.runs.push(run);
    }

    if output.fitted_count() == 0 {
        return Err(AppError::new(
            3,
            format!("No dataset in '{}' could be fitted.", config.input.display()),
        ));
    }

    canvas.save(&config.output)?;
    info!(path = %config.output.display(), datasets = canvas.overlays().len(), "figure written");

    if let Some(path) = &config.export {
        crate::io::export::write_results_json(path, &output, config)?;
        info!(path = %path.display(), "results exported");
    }

    Ok(output)
}
