//! `eos-fit` library crate.
//!
//! The binary (`eosfit`) is a thin wrapper around this library so that:
//!
//! - the fitting pipeline is testable without spawning processes
//! - model functions and the solver are reusable on their own

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
