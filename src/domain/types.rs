//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - passed between the loader, the fitter and the renderer without conversion
//! - exported to JSON (`serde`)
//! - selected directly from the command line (`clap::ValueEnum`)

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which equation of state to evaluate or fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EosKind {
    /// Third-order Birch-Murnaghan.
    #[value(name = "birch-murnaghan", alias = "bm")]
    BirchMurnaghan,
    /// Vinet (universal) equation of state.
    Vinet,
}

impl EosKind {
    /// Every model the pipeline fits, in report order.
    pub const ALL: [EosKind; 2] = [EosKind::BirchMurnaghan, EosKind::Vinet];

    /// Human-readable label for terminal output and legends.
    pub fn display_name(self) -> &'static str {
        match self {
            EosKind::BirchMurnaghan => "Birch-Murnaghan",
            EosKind::Vinet => "Vinet",
        }
    }
}

/// EOS parameters `(V0, K0, K0')`.
///
/// No positivity is enforced: the fitter may legitimately return a negative
/// `K0` on pathological data and callers get exactly what the optimizer found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EosParams {
    /// Reference (zero-pressure) volume.
    pub v0: f64,
    /// Bulk modulus at `V0`.
    pub k0: f64,
    /// Pressure derivative of the bulk modulus at `V0`.
    pub k0_prime: f64,
}

impl EosParams {
    pub fn new(v0: f64, k0: f64, k0_prime: f64) -> Self {
        Self { v0, k0, k0_prime }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.v0, self.k0, self.k0_prime]
    }
}

/// Names of one (pressure, volume) column pair in the input table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub pressure: String,
    pub volume: String,
}

impl ColumnPair {
    pub fn new(pressure: impl Into<String>, volume: impl Into<String>) -> Self {
        Self {
            pressure: pressure.into(),
            volume: volume.into(),
        }
    }
}

impl std::fmt::Display for ColumnPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pressure column {} and volume column {}",
            self.pressure, self.volume
        )
    }
}

/// One (pressure, volume) series drawn from a column pair.
///
/// `pressures` and `volumes` always have the same length; values may be `NaN`
/// where the source cell was empty or non-numeric.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: ColumnPair,
    pub pressures: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// True if any pressure or volume is missing (`NaN`).
    pub fn has_missing(&self) -> bool {
        self.pressures.iter().any(|v| v.is_nan()) || self.volumes.iter().any(|v| v.is_nan())
    }

    /// `(min, max)` of the observed volumes, ignoring non-finite values.
    pub fn volume_range(&self) -> Option<(f64, f64)> {
        self.volumes
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// What to do with missing values in the loaded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Skip any column pair that contains a missing value.
    Skip,
    /// Fill gaps by linear interpolation over the whole table first; pairs
    /// that still contain gaps (leading `NaN`s) are skipped.
    Interpolate,
}

/// Initial guess for `(K0, K0')`. `V0` is always seeded from the first volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SeedPreset {
    /// `K0 = 1`, `K0' = 1`.
    Generic,
    /// `K0 = 160`, `K0' = 5` (bridgmanite-like stiffness).
    Bridgmanite,
}

impl SeedPreset {
    /// `(K0, K0')` seed values.
    pub fn moduli(self) -> (f64, f64) {
        match self {
            SeedPreset::Generic => (1.0, 1.0),
            SeedPreset::Bridgmanite => (160.0, 5.0),
        }
    }
}

/// What the pipeline does when a fit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BatchPolicy {
    /// Stop the run on the first failed fit.
    Abort,
    /// Log the failure and continue with the next dataset.
    Skip,
}

/// Figure style: one dataset against the fitted curve, or several datasets
/// overlaid with a legend outside the axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureLayout {
    /// Data drawn as "Data", fitted curve in gray, legend inside the axes.
    Single,
    /// Each dataset labelled by its volume column and drawn in its own colour.
    Multi,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults) by either subcommand.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub sheet: Option<String>,
    /// Column pairs to fit, in order. Never empty.
    pub pairs: Vec<ColumnPair>,
    pub missing: MissingPolicy,

    pub seed_preset: SeedPreset,
    pub k0_guess: Option<f64>,
    pub k0_prime_guess: Option<f64>,
    /// Hold `K0` at this value instead of fitting it.
    pub fixed_k0: Option<f64>,
    pub max_evaluations: Option<usize>,
    pub on_error: BatchPolicy,

    pub output: PathBuf,
    pub title: String,
    pub colors: Vec<String>,
    pub layout: FigureLayout,
    pub dpi: u32,
    pub plot_models: Vec<EosKind>,

    pub export: Option<PathBuf>,
}
