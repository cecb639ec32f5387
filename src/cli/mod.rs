//! Command-line parsing for the EOS fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting and plotting code; `app` turns these structs into a `PipelineConfig`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{BatchPolicy, EosKind, MissingPolicy, SeedPreset};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "eosfit",
    version,
    about = "Fit Birch-Murnaghan and Vinet equations of state to pressure-volume data"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one pressure/volume column pair and plot it.
    Single(SingleArgs),
    /// Fit several column pairs from one file and overlay them in one figure.
    Multi(MultiArgs),
    /// Write a synthetic pressure/volume CSV from known EOS parameters.
    Synth(SynthArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SingleArgs {
    /// Spreadsheet (.xlsx, .xls, .ods, ...) or CSV file.
    pub filename: PathBuf,
    /// Name of the pressure column.
    pub pressure_column: String,
    /// Name of the volume column.
    pub volume_column: String,
    /// Output figure (.png or .svg).
    pub output_file: PathBuf,

    /// Figure title.
    #[arg(long, default_value = "EOS: MgSiO3 Bridgmanite")]
    pub title: String,

    /// Marker colour for the data points.
    #[arg(long, default_value = "mediumblue")]
    pub color: String,

    /// Missing value handling.
    #[arg(long, value_enum, default_value_t = MissingPolicy::Skip)]
    pub missing: MissingPolicy,

    /// Output resolution (dots per inch).
    #[arg(long, env = "EOSFIT_DPI", default_value_t = 100)]
    pub dpi: u32,

    #[command(flatten)]
    pub fit: FitArgs,
}

#[derive(Debug, Args, Clone)]
pub struct MultiArgs {
    /// Figure title.
    pub figure_title: String,
    /// Output figure (.png or .svg).
    pub output_file: PathBuf,
    /// Spreadsheet (.xlsx, .xls, .ods, ...) or CSV file.
    pub filename: PathBuf,

    /// Names of the pressure columns.
    #[arg(long, num_args = 1.., required = true)]
    pub pressures: Vec<String>,

    /// Names of the volume columns (same count as --pressures).
    #[arg(long, num_args = 1.., required = true)]
    pub volumes: Vec<String>,

    /// Plot colours, cycled over the datasets.
    #[arg(long, num_args = 1.., default_values_t = crate::plot::DEFAULT_COLORS.map(String::from))]
    pub colors: Vec<String>,

    /// Missing value handling.
    #[arg(long, value_enum, default_value_t = MissingPolicy::Interpolate)]
    pub missing: MissingPolicy,

    /// Output resolution (dots per inch).
    #[arg(long, env = "EOSFIT_DPI", default_value_t = 800)]
    pub dpi: u32,

    #[command(flatten)]
    pub fit: FitArgs,
}

/// Options shared by `single` and `multi`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Worksheet to read (default: first sheet).
    #[arg(long)]
    pub sheet: Option<String>,

    /// Initial (K0, K0') guess.
    #[arg(long, value_enum, env = "EOSFIT_SEED_PRESET", default_value_t = SeedPreset::Bridgmanite)]
    pub seed_preset: SeedPreset,

    /// Override the preset's K0 guess.
    #[arg(long)]
    pub k0_guess: Option<f64>,

    /// Override the preset's K0' guess.
    #[arg(long = "k0-prime-guess")]
    pub k0_prime_guess: Option<f64>,

    /// Hold K0 at this value and fit only V0 and K0'.
    #[arg(long = "fix-k0")]
    pub fix_k0: Option<f64>,

    /// Maximum residual evaluations per fit.
    #[arg(long = "max-evals", env = "EOSFIT_MAX_EVALS", default_value_t = 5000)]
    pub max_evals: usize,

    /// What to do when a fit fails.
    #[arg(long = "on-error", value_enum, default_value_t = BatchPolicy::Abort)]
    pub on_error: BatchPolicy,

    /// Models drawn in the figure (all models are always fitted and printed).
    #[arg(long = "plot-models", value_enum, num_args = 1.., default_values_t = [EosKind::BirchMurnaghan])]
    pub plot_models: Vec<EosKind>,

    /// Export fit results to JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output CSV path.
    pub output_csv: PathBuf,

    /// Model used to generate pressures.
    #[arg(long, value_enum, default_value_t = EosKind::BirchMurnaghan)]
    pub model: EosKind,

    #[arg(long, default_value_t = 162.3)]
    pub v0: f64,

    #[arg(long, default_value_t = 253.0)]
    pub k0: f64,

    #[arg(long = "k0-prime", default_value_t = 3.9)]
    pub k0_prime: f64,

    /// Smallest volume (highest compression).
    #[arg(long, default_value_t = 130.0)]
    pub v_min: f64,

    /// Largest volume. Defaults to V0.
    #[arg(long)]
    pub v_max: Option<f64>,

    /// Number of points.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub count: usize,

    /// Standard deviation of Gaussian pressure noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Header of the pressure column.
    #[arg(long, default_value = "P")]
    pub pressure_column: String,

    /// Header of the volume column.
    #[arg(long, default_value = "V")]
    pub volume_column: String,
}
