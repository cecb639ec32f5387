//! Input/output helpers.
//!
//! - `table`: spreadsheet / CSV ingest into a numeric column table
//! - `export`: JSON results and synthetic CSV output

pub mod export;
pub mod table;

pub use export::{write_dataset_csv, write_results_json};
pub use table::{LoadError, Table, load_table};
