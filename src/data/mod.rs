//! Data sources other than user-supplied files.

pub mod synthetic;

pub use synthetic::{SyntheticSpec, generate};
