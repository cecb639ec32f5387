//! Figure rendering with Plotters.
//!
//! - explicit plot context with per-dataset overlays (`canvas`)
//! - colour name parsing for `--colors` (`color`)

use std::path::PathBuf;

use thiserror::Error;

pub mod canvas;
pub mod color;

pub use canvas::*;
pub use color::*;

#[derive(Debug, Clone, Error)]
pub enum PlotError {
    #[error("nothing to plot")]
    Empty,
    #[error("unknown colour '{0}'")]
    UnknownColor(String),
    #[error("invalid DPI {0} (must be > 0)")]
    InvalidDpi(u32),
    #[error("bundled font could not be loaded")]
    Font,
    #[error("failed to render '{}': {message}", .path.display())]
    Render { path: PathBuf, message: String },
}
