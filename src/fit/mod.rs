//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - seed the initial guess `(V0, K0, K0')` from the data and the chosen preset
//! - optionally hold `K0` fixed
//! - run Levenberg-Marquardt per model and report typed failures

pub mod fitter;

pub use fitter::*;
