//! Spreadsheet ingest.
//!
//! This module turns a spreadsheet (`.xlsx`, `.xls`, `.ods`, ...) or a CSV file
//! into a column-major numeric `Table`, restricted to the columns the run asks
//! for.
//!
//! Conventions:
//! - the first row of the sheet's used range is the header
//! - columns are addressed by exact name (surrounding whitespace and a UTF-8
//!   BOM are stripped from headers)
//! - empty or non-numeric cells become `NaN` (missing)
//! - no fitting logic here

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use thiserror::Error;
use tracing::debug;

use crate::domain::{ColumnPair, Dataset};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read workbook '{}': {source}", .path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("failed to read CSV '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("sheet '{sheet}' not found in '{}'", .path.display())]
    SheetNotFound { path: PathBuf, sheet: String },
    #[error("'{}' contains no worksheet data", .path.display())]
    EmptySheet { path: PathBuf },
    #[error("unsupported file type '{}' (expected .xlsx, .xlsm, .xlsb, .xls, .ods or .csv)", .path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("not all columns {} exist in the data (missing: {})", .requested.join(", "), .missing.join(", "))]
    MissingColumns {
        requested: Vec<String>,
        missing: Vec<String>,
    },
}

/// Column-major numeric table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl Table {
    /// Build a table from named columns.
    ///
    /// Shorter columns are padded with `NaN` so every column has the same row count.
    pub fn new(columns: Vec<(String, Vec<f64>)>) -> Self {
        let rows = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let (names, mut values): (Vec<String>, Vec<Vec<f64>>) = columns.into_iter().unzip();
        for col in &mut values {
            col.resize(rows, f64::NAN);
        }
        Self { columns: names, values }
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    /// Values of a column by exact name (first match wins for duplicate headers).
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| self.values[idx].as_slice())
    }

    /// Restrict the table to `names` (deduplicated, in request order).
    pub fn select(&self, names: &[String]) -> Result<Table, LoadError> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| self.column(n).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns {
                requested: names.to_vec(),
                missing,
            });
        }

        let mut selected: Vec<(String, Vec<f64>)> = Vec::with_capacity(names.len());
        for name in names {
            if selected.iter().any(|(n, _)| n == name) {
                continue;
            }
            let values = self.column(name).map(<[f64]>::to_vec).unwrap_or_default();
            selected.push((name.clone(), values));
        }
        Ok(Table::new(selected))
    }

    /// Fill missing values column by column.
    ///
    /// Interior gaps are filled linearly by row position, trailing gaps repeat
    /// the last valid value, leading gaps stay missing.
    pub fn interpolate_linear(&mut self) {
        for col in &mut self.values {
            interpolate_column(col);
        }
    }

    /// Extract one (pressure, volume) pair.
    pub fn dataset(&self, pair: &ColumnPair) -> Result<Dataset, LoadError> {
        match (self.column(&pair.pressure), self.column(&pair.volume)) {
            (Some(p), Some(v)) => Ok(Dataset {
                columns: pair.clone(),
                pressures: p.to_vec(),
                volumes: v.to_vec(),
            }),
            (p, v) => {
                let mut missing = Vec::new();
                if p.is_none() {
                    missing.push(pair.pressure.clone());
                }
                if v.is_none() {
                    missing.push(pair.volume.clone());
                }
                Err(LoadError::MissingColumns {
                    requested: vec![pair.pressure.clone(), pair.volume.clone()],
                    missing,
                })
            }
        }
    }
}

/// Load `columns` from a spreadsheet or CSV file.
///
/// `sheet` selects a worksheet by name; the first sheet is used otherwise.
/// It is ignored for CSV input.
pub fn load_table(path: &Path, columns: &[String], sheet: Option<&str>) -> Result<Table, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = match ext.as_str() {
        "csv" => read_csv(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "xla" | "xlam" | "ods" => read_workbook(path, sheet)?,
        _ => {
            return Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };
    debug!(
        path = %path.display(),
        columns = table.columns.len(),
        rows = table.row_count(),
        "table loaded"
    );

    table.select(columns)
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<Table, LoadError> {
    let workbook_err = |source| LoadError::Workbook {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;
    let range = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(LoadError::SheetNotFound {
                    path: path.to_path_buf(),
                    sheet: name.to_string(),
                });
            }
            workbook.worksheet_range(name).map_err(workbook_err)?
        }
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| LoadError::EmptySheet {
                path: path.to_path_buf(),
            })?
            .map_err(workbook_err)?,
    };

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(LoadError::EmptySheet {
            path: path.to_path_buf(),
        });
    };
    let names: Vec<String> = header.iter().map(|c| normalize_header_name(&c.to_string())).collect();

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (idx, col) in values.iter_mut().enumerate() {
            col.push(row.get(idx).map_or(f64::NAN, cell_value));
        }
    }

    Ok(build_table(names, values))
}

fn read_csv(path: &Path) -> Result<Table, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let names: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(normalize_header_name)
        .collect();

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        for (idx, col) in values.iter_mut().enumerate() {
            col.push(record.get(idx).map_or(f64::NAN, parse_number));
        }
    }

    Ok(build_table(names, values))
}

/// Keep the first column for each header name.
fn build_table(names: Vec<String>, values: Vec<Vec<f64>>) -> Table {
    let mut seen: HashSet<String> = HashSet::new();
    let columns = names
        .into_iter()
        .zip(values)
        .filter(|(name, _)| seen.insert(name.clone()))
        .collect();
    Table::new(columns)
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 files with a BOM prefix on the
    // first header. If we don't strip it, column lookup fails.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn cell_value(cell: &Data) -> f64 {
    match cell {
        Data::Float(v) => *v,
        Data::Int(v) => *v as f64,
        Data::Bool(b) => f64::from(u8::from(*b)),
        Data::String(s) => parse_number(s),
        _ => f64::NAN,
    }
}

fn parse_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn interpolate_column(values: &mut [f64]) {
    let mut last_valid: Option<usize> = None;
    for i in 0..values.len() {
        if values[i].is_nan() {
            continue;
        }
        if let Some(prev) = last_valid {
            let gap = i - prev;
            if gap > 1 {
                let (y0, y1) = (values[prev], values[i]);
                for k in prev + 1..i {
                    let t = (k - prev) as f64 / gap as f64;
                    values[k] = y0 + t * (y1 - y0);
                }
            }
        }
        last_valid = Some(i);
    }

    if let Some(last) = last_valid {
        let fill = values[last];
        for v in &mut values[last + 1..] {
            *v = fill;
        }
    }
}
