//! Fitting routine for a single EOS model on a single dataset.
//!
//! Given:
//! - observed volumes `V_i` and pressures `P_i`
//! - a model kind (Birch-Murnaghan or Vinet)
//! - an initial guess policy and an optional fixed `K0`
//!
//! we minimize `Σ (P(V_i; V0, K0, K0') - P_i)²` with Levenberg-Marquardt and
//! return the optimum along with fit diagnostics.
//!
//! No bounds are applied: a physically implausible optimum (e.g. `K0 < 0`) is
//! returned as-is.

use nalgebra::DMatrix;
use thiserror::Error;

use crate::domain::{ColumnPair, Dataset, EosKind, EosParams, SeedPreset};
use crate::math::{LevenbergMarquardt, LmConfig, LmError, Termination, covariance, forward_jacobian};
use crate::models::pressure;

#[derive(Debug, Clone, Error)]
pub enum FitError {
    #[error("pressure and volume series differ in length ({pressures} vs {volumes}) for {columns}")]
    LengthMismatch {
        columns: ColumnPair,
        pressures: usize,
        volumes: usize,
    },
    #[error("no data points to fit for {columns}")]
    Empty { columns: ColumnPair },
    #[error("Error in {} curve fitting for {columns}: {source}", .model.display_name())]
    Solver {
        model: EosKind,
        columns: ColumnPair,
        #[source]
        source: LmError,
    },
}

/// Fitting options shared by every model in a run.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Seed for `(K0, K0')`. `V0` is always seeded from the first observed volume.
    pub seed_preset: SeedPreset,
    /// Overrides the preset's `K0` seed.
    pub k0_guess: Option<f64>,
    /// Overrides the preset's `K0'` seed.
    pub k0_prime_guess: Option<f64>,
    /// Hold `K0` at this value; only `V0` and `K0'` are optimized.
    pub fixed_k0: Option<f64>,
    /// Residual evaluation budget. `None` uses `200 (n_free + 1)`.
    pub max_evaluations: Option<usize>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            seed_preset: SeedPreset::Bridgmanite,
            k0_guess: None,
            k0_prime_guess: None,
            fixed_k0: None,
            max_evaluations: None,
        }
    }
}

impl FitOptions {
    /// Number of parameters the optimizer moves.
    pub fn free_param_count(&self) -> usize {
        if self.fixed_k0.is_some() { 2 } else { 3 }
    }
}

/// Best fit for a single model kind.
#[derive(Debug, Clone)]
pub struct EosFit {
    pub kind: EosKind,
    pub params: EosParams,
    pub initial: EosParams,
    pub sse: f64,
    pub rmse: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
    /// Covariance of the free parameters (`V0, K0, K0'`, or `V0, K0'` when `K0`
    /// is fixed). `None` without spare degrees of freedom or when singular.
    pub covariance: Option<DMatrix<f64>>,
}

/// Initial guess: `V0 = V[0]`, `(K0, K0')` from the preset unless overridden.
///
/// A fixed `K0` replaces the seed for `K0` too.
pub fn initial_guess(dataset: &Dataset, opts: &FitOptions) -> Option<EosParams> {
    let v0 = *dataset.volumes.first()?;
    let (k0_seed, kp_seed) = opts.seed_preset.moduli();
    let k0 = opts.fixed_k0.or(opts.k0_guess).unwrap_or(k0_seed);
    let k0_prime = opts.k0_prime_guess.unwrap_or(kp_seed);
    Some(EosParams::new(v0, k0, k0_prime))
}

/// Fit one model to one dataset.
pub fn fit_eos(kind: EosKind, dataset: &Dataset, opts: &FitOptions) -> Result<EosFit, FitError> {
    let columns = &dataset.columns;
    if dataset.pressures.len() != dataset.volumes.len() {
        return Err(FitError::LengthMismatch {
            columns: columns.clone(),
            pressures: dataset.pressures.len(),
            volumes: dataset.volumes.len(),
        });
    }
    let Some(initial) = initial_guess(dataset, opts) else {
        return Err(FitError::Empty {
            columns: columns.clone(),
        });
    };

    let fixed_k0 = opts.fixed_k0;
    let volumes = &dataset.volumes;
    let observed = &dataset.pressures;
    let residual_fn = |free: &[f64]| -> Vec<f64> {
        let params = unpack(free, fixed_k0);
        volumes
            .iter()
            .zip(observed.iter())
            .map(|(&v, &p)| pressure(kind, v, &params) - p)
            .collect()
    };

    let n_free = opts.free_param_count();
    let config = LmConfig {
        max_evaluations: opts.max_evaluations.unwrap_or_else(|| LmConfig::default_budget(n_free)),
        ..LmConfig::default()
    };
    let report = LevenbergMarquardt::new(config)
        .minimize(&residual_fn, &pack(&initial, fixed_k0))
        .map_err(|source| FitError::Solver {
            model: kind,
            columns: columns.clone(),
            source,
        })?;

    let jac = forward_jacobian(&residual_fn, &report.params, &report.residuals);
    let covariance = if jac.iter().all(|v| v.is_finite()) {
        covariance(&jac, report.cost)
    } else {
        None
    };

    let n = dataset.len();
    Ok(EosFit {
        kind,
        params: unpack(&report.params, fixed_k0),
        initial,
        sse: report.cost,
        rmse: (report.cost / n as f64).sqrt(),
        iterations: report.iterations,
        evaluations: report.evaluations,
        termination: report.termination,
        covariance,
    })
}

fn pack(params: &EosParams, fixed_k0: Option<f64>) -> Vec<f64> {
    match fixed_k0 {
        Some(_) => vec![params.v0, params.k0_prime],
        None => params.to_array().to_vec(),
    }
}

fn unpack(free: &[f64], fixed_k0: Option<f64>) -> EosParams {
    match fixed_k0 {
        Some(k0) => EosParams::new(free[0], k0, free[1]),
        None => EosParams::new(free[0], free[1], free[2]),
    }
}
