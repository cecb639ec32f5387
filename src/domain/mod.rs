//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model selection and parameters (`EosKind`, `EosParams`)
//! - observed data (`ColumnPair`, `Dataset`)
//! - run configuration (`PipelineConfig` and its policy enums)

pub mod types;

pub use types::*;
