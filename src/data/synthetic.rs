//! Synthetic (P, V) datasets from known EOS parameters.
//!
//! Used by `eosfit synth` and by tests that need realistic compression data
//! with a known answer. Volumes are evenly spaced from `v_max` down to `v_min`
//! (compression order, the way measured series usually arrive) and pressures
//! are evaluated from the model, optionally with Gaussian noise.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{ColumnPair, Dataset, EosKind, EosParams};
use crate::error::AppError;
use crate::models::pressure;

#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub kind: EosKind,
    pub params: EosParams,
    pub v_min: f64,
    pub v_max: f64,
    pub count: usize,
    /// Standard deviation of additive pressure noise. `0` disables noise.
    pub noise_sigma: f64,
    pub seed: u64,
    pub columns: ColumnPair,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            kind: EosKind::BirchMurnaghan,
            params: EosParams::new(162.3, 253.0, 3.9),
            v_min: 130.0,
            v_max: 162.3,
            count: 20,
            noise_sigma: 0.0,
            seed: 42,
            columns: ColumnPair::new("P", "V"),
        }
    }
}

pub fn generate(spec: &SyntheticSpec) -> Result<Dataset, AppError> {
    if spec.count < 2 {
        return Err(AppError::config("Synthetic point count must be >= 2."));
    }
    if !(spec.v_min.is_finite() && spec.v_max.is_finite() && spec.v_min > 0.0 && spec.v_max > spec.v_min) {
        return Err(AppError::config("Invalid synthetic volume range (need 0 < v_min < v_max)."));
    }
    if !(spec.noise_sigma.is_finite() && spec.noise_sigma >= 0.0) {
        return Err(AppError::config("Noise sigma must be finite and >= 0."));
    }

    let noise = Normal::new(0.0, spec.noise_sigma)
        .map_err(|e| AppError::config(format!("Noise distribution error: {e}")))?;
    let mut rng = StdRng::seed_from_u64(spec.seed);

    let step = (spec.v_max - spec.v_min) / (spec.count - 1) as f64;
    let volumes: Vec<f64> = (0..spec.count).map(|i| spec.v_max - step * i as f64).collect();
    let pressures = volumes
        .iter()
        .map(|&v| {
            let p = pressure(spec.kind, v, &spec.params);
            if spec.noise_sigma > 0.0 { p + noise.sample(&mut rng) } else { p }
        })
        .collect();

    Ok(Dataset {
        columns: spec.columns.clone(),
        pressures,
        volumes,
    })
}
