//! Equation-of-state evaluation for Birch-Murnaghan and Vinet.
//!
//! Both models map a volume `V` to a pressure `P(V)` given `(V0, K0, K0')`:
//!
//! - Birch-Murnaghan (3rd order), with `η = V0 / V`:
//!   `P = 3/2 K0 (η^(7/3) - η^(5/3)) (1 + 3/4 (K0' - 4)(η^(2/3) - 1))`
//! - Vinet, with `x = (V / V0)^(1/3)`:
//!   `P = 3 K0 (1 - x) exp(3/2 (K0' - 1)(1 - x))`
//!
//! The functions are pure and unguarded: non-positive `V` or `V0` yields `NaN`,
//! which the fitter treats as a failed evaluation.

use crate::domain::{EosKind, EosParams};

/// Pressure at volume `v` for the given model.
pub fn pressure(kind: EosKind, v: f64, params: &EosParams) -> f64 {
    match kind {
        EosKind::BirchMurnaghan => birch_murnaghan(v, params),
        EosKind::Vinet => vinet(v, params),
    }
}

/// Pressures for every volume in `volumes`.
pub fn pressures(kind: EosKind, volumes: &[f64], params: &EosParams) -> Vec<f64> {
    volumes.iter().map(|&v| pressure(kind, v, params)).collect()
}

/// Third-order Birch-Murnaghan.
pub fn birch_murnaghan(v: f64, params: &EosParams) -> f64 {
    let eta = params.v0 / v;
    let eta_23 = eta.powf(2.0 / 3.0);
    let eta_53 = eta.powf(5.0 / 3.0);
    let eta_73 = eta.powf(7.0 / 3.0);

    1.5 * params.k0 * (eta_73 - eta_53) * (1.0 + 0.75 * (params.k0_prime - 4.0) * (eta_23 - 1.0))
}

/// Vinet.
pub fn vinet(v: f64, params: &EosParams) -> f64 {
    let x = (v / params.v0).cbrt();
    let eta = 1.5 * (params.k0_prime - 1.0);

    3.0 * params.k0 * (1.0 - x) * (eta * (1.0 - x)).exp()
}
