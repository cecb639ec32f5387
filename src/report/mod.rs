//! Console reporting: result lines, warnings and the run summary.

use crate::domain::ColumnPair;
use crate::fit::EosFit;

/// One result line per fitted model:
/// `<Model> optimized parameters for pressure column P and volume column V: V0=.., K0=.., K0_prime=..`
pub fn format_fit_line(fit: &EosFit, columns: &ColumnPair) -> String {
    format!(
        "{} optimized parameters for {columns}: V0={}, K0={}, K0_prime={}",
        fit.kind.display_name(),
        format_float(fit.params.v0),
        format_float(fit.params.k0),
        format_float(fit.params.k0_prime)
    )
}

/// Shortest round-trip form of `value`, keeping a `.0` on whole numbers
/// (`160.0`, not `160`).
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Warning emitted when a column pair is skipped because of missing values.
pub fn format_missing_warning(columns: &ColumnPair) -> String {
    format!("Warning: missing values in data for {columns}. Skipping this data.")
}

/// Closing summary: how many datasets were fitted and where the figure went.
pub fn format_run_summary(fitted: usize, total: usize, figure: &std::path::Path) -> String {
    format!(
        "Fitted {fitted} of {total} dataset(s); figure written to {}",
        figure.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EosKind, EosParams};
    use crate::math::Termination;

    fn fit() -> EosFit {
        EosFit {
            kind: EosKind::BirchMurnaghan,
            params: EosParams::new(10.5, 160.0, 4.25),
            initial: EosParams::new(10.0, 160.0, 5.0),
            sse: 0.0,
            rmse: 0.0,
            iterations: 3,
            evaluations: 15,
            termination: Termination::CostReduction,
            covariance: None,
        }
    }

    #[test]
    fn fit_line_matches_console_format() {
        let line = format_fit_line(&fit(), &ColumnPair::new("P1", "V1"));
        assert_eq!(
            line,
            "Birch-Murnaghan optimized parameters for pressure column P1 and volume column V1: V0=10.5, K0=160.0, K0_prime=4.25"
        );
    }

    #[test]
    fn whole_numbers_keep_a_decimal() {
        assert_eq!(format_float(160.0), "160.0");
        assert_eq!(format_float(-3.0), "-3.0");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(162.21872), "162.21872");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn missing_warning_names_columns() {
        let msg = format_missing_warning(&ColumnPair::new("P2", "V2"));
        assert!(msg.contains("pressure column P2 and volume column V2"));
        assert!(msg.ends_with("Skipping this data."));
    }
}
