//! Application-level error type.
//!
//! Library modules return their own `thiserror` enums (`LoadError`, `LmError`,
//! `FitError`, `PlotError`). At the application boundary they collapse into an
//! `AppError`: a message for stderr plus the process exit code.
//!
//! Exit codes:
//! - `2` configuration, input and output errors
//! - `3` nothing left to fit
//! - `4` fitting failures

use crate::fit::FitError;
use crate::io::table::LoadError;
use crate::plot::PlotError;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Invalid flags or configuration.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        AppError::new(2, format!("Error reading file: {err}"))
    }
}

impl From<PlotError> for AppError {
    fn from(err: PlotError) -> Self {
        AppError::new(2, format!("Error writing figure: {err}"))
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(4, err.to_string())
    }
}
