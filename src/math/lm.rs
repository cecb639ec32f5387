//! Levenberg-Marquardt nonlinear least squares.
//!
//! Minimizes `Σ r_i(p)²` for a residual function `r: ℝⁿ → ℝᵐ` (`m ≥ n`).
//!
//! Each iteration:
//! - builds a forward-difference Jacobian `J` at the current point
//! - solves the damped problem `min ‖J δ + r‖² + λ ‖D δ‖²` where `D` holds the
//!   Jacobian column norms (Marquardt scaling), as one stacked least-squares
//!   system through the SVD solver
//! - accepts the step if the cost drops (and relaxes `λ`), otherwise raises `λ`
//!   and retries from the same point
//!
//! Every residual evaluation, including the Jacobian columns, counts against
//! `max_evaluations`.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::debug;

use crate::math::solve_least_squares;

const MIN_DAMPING: f64 = 1e-15;
const MAX_DAMPING: f64 = 1e16;
const DAMPING_FACTOR: f64 = 10.0;

/// Floor for Marquardt column scaling so a dead parameter still gets damped.
const MIN_SCALE: f64 = 1e-12;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LmError {
    #[error("no parameters or residuals to optimize")]
    Empty,
    #[error("improper input: {params} parameters but only {residuals} residuals")]
    TooFewResiduals { residuals: usize, params: usize },
    #[error("residuals are not finite at the initial guess")]
    NonFiniteInitial,
    #[error("Jacobian is not finite at {params:?}")]
    NonFiniteJacobian { params: Vec<f64> },
    #[error("optimal parameters not found: number of calls to function has reached max evaluations = {limit}")]
    MaxEvaluations { limit: usize },
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct LmConfig {
    pub max_evaluations: usize,
    /// Relative cost reduction below which an accepted step ends the search.
    pub ftol: f64,
    /// Relative step size below which an accepted step ends the search.
    pub xtol: f64,
    /// Gradient threshold (scaled by `max(cost, 1)`).
    pub gtol: f64,
    pub initial_damping: f64,
}

impl LmConfig {
    /// Default evaluation budget for `n` parameters: `200 (n + 1)`.
    pub fn default_budget(n_params: usize) -> usize {
        200 * (n_params + 1)
    }
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_evaluations: Self::default_budget(3),
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-14,
            initial_damping: 1e-3,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Residuals are exactly zero.
    ZeroResidual,
    /// Cost reduction of the last accepted step fell below `ftol`.
    CostReduction,
    /// Last accepted step was below `xtol` relative to the parameters.
    StepSize,
    /// Gradient vanished.
    Gradient,
    /// No damping level produced a lower cost; the current point is kept.
    NoFurtherImprovement,
}

/// Converged solver state.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: Vec<f64>,
    pub residuals: Vec<f64>,
    /// `Σ r_i²` at `params`.
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    pub config: LmConfig,
}

impl LevenbergMarquardt {
    pub fn new(config: LmConfig) -> Self {
        Self { config }
    }

    /// Minimize `Σ r_i(p)²` starting from `initial`.
    pub fn minimize<F>(&self, residual_fn: F, initial: &[f64]) -> Result<LmReport, LmError>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let cfg = &self.config;
        let n = initial.len();

        let mut params = initial.to_vec();
        let mut residuals = residual_fn(&params);
        let mut evaluations = 1usize;

        let m = residuals.len();
        if n == 0 || m == 0 {
            return Err(LmError::Empty);
        }
        if m < n {
            return Err(LmError::TooFewResiduals { residuals: m, params: n });
        }
        let Some(mut cost) = finite_cost(&residuals) else {
            return Err(LmError::NonFiniteInitial);
        };

        let mut damping = cfg.initial_damping;
        let mut iterations = 0usize;

        loop {
            if cost == 0.0 {
                return finish(params, residuals, cost, iterations, evaluations, Termination::ZeroResidual);
            }

            if evaluations + n > cfg.max_evaluations {
                return Err(LmError::MaxEvaluations { limit: cfg.max_evaluations });
            }
            let jac = forward_jacobian(&residual_fn, &params, &residuals);
            evaluations += n;
            if jac.iter().any(|v| !v.is_finite()) {
                return Err(LmError::NonFiniteJacobian { params });
            }

            let r = DVector::from_column_slice(&residuals);
            let gradient = jac.transpose() * &r;
            if gradient.amax() <= cfg.gtol * cost.max(1.0) {
                return finish(params, residuals, cost, iterations, evaluations, Termination::Gradient);
            }

            let scale: Vec<f64> = jac
                .column_iter()
                .map(|col| col.norm().max(MIN_SCALE))
                .collect();

            // Inner loop: raise damping until a step lowers the cost.
            loop {
                let Some(step) = damped_step(&jac, &r, &scale, damping) else {
                    damping *= DAMPING_FACTOR;
                    if damping > MAX_DAMPING {
                        return finish(params, residuals, cost, iterations, evaluations, Termination::NoFurtherImprovement);
                    }
                    continue;
                };

                if evaluations >= cfg.max_evaluations {
                    return Err(LmError::MaxEvaluations { limit: cfg.max_evaluations });
                }
                let trial: Vec<f64> = params.iter().zip(step.iter()).map(|(p, d)| p + d).collect();
                let trial_residuals = residual_fn(&trial);
                evaluations += 1;

                match finite_cost(&trial_residuals) {
                    Some(trial_cost) if trial_cost < cost => {
                        let reduction = cost - trial_cost;
                        let step_norm = step.norm();
                        let param_norm = trial.iter().map(|v| v * v).sum::<f64>().sqrt();

                        params = trial;
                        residuals = trial_residuals;
                        cost = trial_cost;
                        damping = (damping / DAMPING_FACTOR).max(MIN_DAMPING);
                        iterations += 1;

                        if cost == 0.0 {
                            return finish(params, residuals, cost, iterations, evaluations, Termination::ZeroResidual);
                        }
                        if reduction <= cfg.ftol * cost {
                            return finish(params, residuals, cost, iterations, evaluations, Termination::CostReduction);
                        }
                        if step_norm <= cfg.xtol * (param_norm + cfg.xtol) {
                            return finish(params, residuals, cost, iterations, evaluations, Termination::StepSize);
                        }
                        break;
                    }
                    _ => {
                        damping *= DAMPING_FACTOR;
                        if damping > MAX_DAMPING {
                            return finish(params, residuals, cost, iterations, evaluations, Termination::NoFurtherImprovement);
                        }
                    }
                }
            }
        }
    }
}

/// Forward-difference Jacobian `∂r_i / ∂p_j` around `params`.
///
/// `base` must be `residual_fn(params)`.
pub fn forward_jacobian<F>(residual_fn: &F, params: &[f64], base: &[f64]) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = base.len();
    let n = params.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut shifted = params.to_vec();

    for j in 0..n {
        let h = f64::EPSILON.sqrt() * params[j].abs().max(1.0);
        shifted[j] = params[j] + h;
        let r = residual_fn(&shifted);
        for i in 0..m {
            jac[(i, j)] = r.get(i).map_or(f64::NAN, |ri| (ri - base[i]) / h);
        }
        shifted[j] = params[j];
    }

    jac
}

/// Parameter covariance estimate `(JᵀJ)⁻¹ · cost / (m - n)`.
///
/// Returns `None` when there are no degrees of freedom left or `JᵀJ` is singular.
pub fn covariance(jac: &DMatrix<f64>, cost: f64) -> Option<DMatrix<f64>> {
    let (m, n) = jac.shape();
    if m <= n {
        return None;
    }
    let jtj = jac.transpose() * jac;
    let inv = jtj.try_inverse()?;
    let s_sq = cost / (m - n) as f64;
    let cov = inv * s_sq;
    cov.iter().all(|v| v.is_finite()).then_some(cov)
}

fn finish(
    params: Vec<f64>,
    residuals: Vec<f64>,
    cost: f64,
    iterations: usize,
    evaluations: usize,
    termination: Termination,
) -> Result<LmReport, LmError> {
    debug!(?termination, iterations, evaluations, cost, "levenberg-marquardt finished");
    Ok(LmReport {
        params,
        residuals,
        cost,
        iterations,
        evaluations,
        termination,
    })
}

fn damped_step(jac: &DMatrix<f64>, r: &DVector<f64>, scale: &[f64], damping: f64) -> Option<DVector<f64>> {
    let (m, n) = jac.shape();
    let mut a = DMatrix::<f64>::zeros(m + n, n);
    let mut b = DVector::<f64>::zeros(m + n);

    a.view_mut((0, 0), (m, n)).copy_from(jac);
    for i in 0..m {
        b[i] = -r[i];
    }
    let sqrt_damping = damping.sqrt();
    for j in 0..n {
        a[(m + j, j)] = sqrt_damping * scale[j];
    }

    solve_least_squares(&a, &b)
}

fn finite_cost(residuals: &[f64]) -> Option<f64> {
    if residuals.iter().all(|r| r.is_finite()) {
        let cost: f64 = residuals.iter().map(|r| r * r).sum();
        cost.is_finite().then_some(cost)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_separable_quadratic() {
        let lm = LevenbergMarquardt::default();
        let report = lm
            .minimize(|p: &[f64]| vec![p[0] - 2.0, p[1] - 3.0], &[0.0, 0.0])
            .unwrap();
        assert!((report.params[0] - 2.0).abs() < 1e-6);
        assert!((report.params[1] - 3.0).abs() < 1e-6);
        assert!(report.cost < 1e-12);
    }

    #[test]
    fn fits_exponential_decay() {
        // y = 5 exp(-0.7 t)
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = t.iter().map(|&ti| 5.0 * (-0.7 * ti).exp()).collect();

        let lm = LevenbergMarquardt::default();
        let report = lm
            .minimize(
                |p: &[f64]| {
                    t.iter()
                        .zip(y.iter())
                        .map(|(&ti, &yi)| p[0] * (-p[1] * ti).exp() - yi)
                        .collect()
                },
                &[1.0, 0.1],
            )
            .unwrap();

        assert!((report.params[0] - 5.0).abs() < 1e-6, "{:?}", report.params);
        assert!((report.params[1] - 0.7).abs() < 1e-6, "{:?}", report.params);
    }

    #[test]
    fn rosenbrock_converges() {
        let lm = LevenbergMarquardt::new(LmConfig {
            max_evaluations: 5000,
            ..LmConfig::default()
        });
        let report = lm
            .minimize(|p: &[f64]| vec![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]], &[-1.2, 1.0])
            .unwrap();
        assert!((report.params[0] - 1.0).abs() < 1e-5, "{:?}", report.params);
        assert!((report.params[1] - 1.0).abs() < 1e-5, "{:?}", report.params);
    }

    #[test]
    fn evaluation_budget_is_enforced() {
        let lm = LevenbergMarquardt::new(LmConfig {
            max_evaluations: 4,
            ..LmConfig::default()
        });
        let err = lm
            .minimize(|p: &[f64]| vec![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]], &[-1.2, 1.0])
            .unwrap_err();
        assert_eq!(err, LmError::MaxEvaluations { limit: 4 });
    }

    #[test]
    fn rejects_bad_inputs() {
        let lm = LevenbergMarquardt::default();
        assert_eq!(
            lm.minimize(|_: &[f64]| vec![1.0], &[0.0, 0.0]).unwrap_err(),
            LmError::TooFewResiduals { residuals: 1, params: 2 }
        );
        assert_eq!(
            lm.minimize(|_: &[f64]| Vec::new(), &[0.0]).unwrap_err(),
            LmError::Empty
        );
        assert_eq!(
            lm.minimize(|p: &[f64]| vec![p[0].ln()], &[-1.0]).unwrap_err(),
            LmError::NonFiniteInitial
        );
    }

    #[test]
    fn covariance_of_linear_fit() {
        // Straight line y = a + b x with unit residual variance.
        let jac = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let cov = covariance(&jac, 2.0).unwrap();
        // (JᵀJ)⁻¹ = [[0.7, -0.3], [-0.3, 0.2]], s² = 2 / 2 = 1.
        assert!((cov[(0, 0)] - 0.7).abs() < 1e-12);
        assert!((cov[(1, 1)] - 0.2).abs() < 1e-12);
        assert!((cov[(0, 1)] + 0.3).abs() < 1e-12);

        let square = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        assert!(covariance(&square, 1.0).is_none());
    }
}
