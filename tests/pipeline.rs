//! End-to-end runs of the fit pipeline on files written to a temp directory.

use std::path::PathBuf;

use eos_fit::app::pipeline::run_pipeline;
use eos_fit::domain::{
    BatchPolicy, ColumnPair, EosKind, EosParams, FigureLayout, MissingPolicy, PipelineConfig, SeedPreset,
};
use eos_fit::models::pressure;

const TRUTH: EosParams = EosParams {
    v0: 10.0,
    k0: 160.0,
    k0_prime: 4.5,
};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("eosfit-it-{}-{name}", std::process::id()))
}

fn volumes() -> Vec<f64> {
    (0..21).map(|i| 10.0 - 0.1 * i as f64).collect()
}

/// Write a CSV whose columns are given as (header, cells); `None` is a blank cell.
fn write_csv(name: &str, columns: &[(&str, Vec<Option<f64>>)]) -> PathBuf {
    let rows = columns.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
    let mut text = columns.iter().map(|(h, _)| *h).collect::<Vec<_>>().join(",");
    text.push('\n');
    for r in 0..rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|(_, c)| c.get(r).copied().flatten().map(|v| v.to_string()).unwrap_or_default())
            .collect();
        text.push_str(&cells.join(","));
        text.push('\n');
    }
    let path = temp_path(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn bm_columns() -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let v = volumes();
    let p = v.iter().map(|&v| Some(pressure(EosKind::BirchMurnaghan, v, &TRUTH))).collect();
    (p, v.into_iter().map(Some).collect())
}

fn config(input: PathBuf, pairs: Vec<ColumnPair>, output: &str) -> PipelineConfig {
    PipelineConfig {
        input,
        sheet: None,
        pairs,
        missing: MissingPolicy::Skip,
        seed_preset: SeedPreset::Bridgmanite,
        k0_guess: None,
        k0_prime_guess: None,
        fixed_k0: None,
        max_evaluations: Some(5000),
        on_error: BatchPolicy::Abort,
        output: temp_path(output),
        title: "EOS: test".to_string(),
        colors: vec!["mediumblue".to_string(), "red".to_string()],
        layout: FigureLayout::Single,
        dpi: 40,
        plot_models: vec![EosKind::BirchMurnaghan],
        export: None,
    }
}

#[test]
fn single_pair_prints_both_models_and_writes_figure() {
    let (p, v) = bm_columns();
    let input = write_csv("single.csv", &[("P", p), ("V", v)]);
    let cfg = config(input, vec![ColumnPair::new("P", "V")], "single.svg");

    let mut out = Vec::new();
    let run = run_pipeline(&cfg, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with(
        "Birch-Murnaghan optimized parameters for pressure column P and volume column V: V0="
    ));
    assert!(lines[1].starts_with("Vinet optimized parameters for pressure column P and volume column V: V0="));

    let bm = &run.runs[0].fits[0];
    assert!((bm.params.v0 - 10.0).abs() < 1e-3);
    assert!((bm.params.k0 - 160.0).abs() < 1.0);
    assert!((bm.params.k0_prime - 4.5).abs() < 0.05);

    let svg = std::fs::read_to_string(&cfg.output).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("EOS: test"));
    assert!(svg.contains("Data"), "single figures label the points as Data");
    assert!(svg.contains("Birch-Murnaghan Fit"));
}

#[test]
fn multi_skips_pairs_with_gaps_and_continues() {
    let (p, v) = bm_columns();
    // Leading blank survives interpolation, so pair 2 is skipped.
    let mut p2 = p.clone();
    p2[0] = None;
    // Interior blank is filled by interpolation.
    let mut p3 = p.clone();
    p3[7] = None;

    let input = write_csv(
        "multi.csv",
        &[("P1", p.clone()), ("P2", p2), ("P3", p3), ("V1", v.clone()), ("V2", v.clone()), ("V3", v)],
    );
    let mut cfg = config(
        input,
        vec![ColumnPair::new("P1", "V1"), ColumnPair::new("P2", "V2"), ColumnPair::new("P3", "V3")],
        "multi.png",
    );
    cfg.missing = MissingPolicy::Interpolate;
    cfg.layout = FigureLayout::Multi;

    let mut out = Vec::new();
    let run = run_pipeline(&cfg, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(run.runs.len(), 3);
    assert!(run.runs[0].is_fitted());
    assert!(run.runs[1].skipped.is_some());
    assert!(run.runs[2].is_fitted());
    assert_eq!(run.fitted_count(), 2);
    assert!(!text.contains("column P2"));
    assert!(text.contains("pressure column P3 and volume column V3"));
    assert!(std::fs::metadata(&cfg.output).unwrap().len() > 0);
}

#[test]
fn skip_policy_without_interpolation_leaves_nothing() {
    let (mut p, v) = bm_columns();
    p[5] = None;
    let input = write_csv("gap.csv", &[("P", p), ("V", v)]);
    let cfg = config(input, vec![ColumnPair::new("P", "V")], "gap.svg");

    let err = run_pipeline(&cfg, &mut Vec::new()).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn skip_policy_moves_past_a_gap_to_the_next_pair() {
    let (p, v) = bm_columns();
    let mut p1 = p.clone();
    p1[5] = None;
    let input = write_csv("skip-next.csv", &[("P1", p1), ("P2", p), ("V1", v.clone()), ("V2", v)]);
    let cfg = config(
        input,
        vec![ColumnPair::new("P1", "V1"), ColumnPair::new("P2", "V2")],
        "skip-next.svg",
    );
    assert_eq!(cfg.missing, MissingPolicy::Skip);

    let mut out = Vec::new();
    let run = run_pipeline(&cfg, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(run.runs.len(), 2);
    assert_eq!(run.runs[0].skipped.as_deref(), Some("missing values"));
    assert!(run.runs[0].fits.is_empty());
    assert!(run.runs[1].is_fitted());
    assert_eq!(run.fitted_count(), 1);
    assert!(!text.contains("column P1"));
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("pressure column P2 and volume column V2"));
    assert!(std::fs::metadata(&cfg.output).unwrap().len() > 0);
}

#[test]
fn output_without_extension_is_written_as_png() {
    let (p, v) = bm_columns();
    let input = write_csv("noext.csv", &[("P", p), ("V", v)]);
    let cfg = config(input, vec![ColumnPair::new("P", "V")], "noext-figure");

    run_pipeline(&cfg, &mut Vec::new()).unwrap();
    let bytes = std::fs::read(&cfg.output).unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));
}

#[test]
fn missing_column_is_a_load_error() {
    let (p, v) = bm_columns();
    let input = write_csv("schema.csv", &[("P", p), ("V", v)]);
    let cfg = config(input, vec![ColumnPair::new("P", "Volume")], "schema.svg");

    let mut out = Vec::new();
    let err = run_pipeline(&cfg, &mut out).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.message().starts_with("Error reading file"));
    assert!(err.message().contains("Volume"));
    assert!(out.is_empty());
}

fn bad_pair_input(name: &str) -> PathBuf {
    let (p, v) = bm_columns();
    let mut bad_v = v.clone();
    bad_v[1] = Some(-9.9);
    write_csv(name, &[("P1", p.clone()), ("P2", p), ("V1", v), ("V2", bad_v)])
}

#[test]
fn abort_policy_stops_on_first_failed_fit() {
    let input = bad_pair_input("abort.csv");
    let cfg = config(
        input,
        vec![ColumnPair::new("P1", "V1"), ColumnPair::new("P2", "V2")],
        "abort.svg",
    );

    let mut out = Vec::new();
    let err = run_pipeline(&cfg, &mut out).unwrap_err();
    assert_eq!(err.exit_code(), 4);
    assert!(err.message().starts_with(
        "Error in Birch-Murnaghan curve fitting for pressure column P2 and volume column V2"
    ));
    // Results for the first pair were already printed.
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
}

#[test]
fn skip_policy_records_failures_and_continues() {
    let input = bad_pair_input("skip.csv");
    let mut cfg = config(
        input,
        vec![ColumnPair::new("P1", "V1"), ColumnPair::new("P2", "V2")],
        "skip.svg",
    );
    cfg.on_error = BatchPolicy::Skip;

    let run = run_pipeline(&cfg, &mut Vec::new()).unwrap();
    assert!(run.runs[0].is_fitted());
    let failures = &run.runs[1].failures;
    assert!(!failures.is_empty());
    assert!(failures[0].to_string().contains("Birch-Murnaghan"));
}

#[test]
fn fixed_k0_is_reported_verbatim() {
    let (p, v) = bm_columns();
    let input = write_csv("fixed.csv", &[("P", p), ("V", v)]);
    let mut cfg = config(input, vec![ColumnPair::new("P", "V")], "fixed.svg");
    cfg.fixed_k0 = Some(160.0);

    let mut out = Vec::new();
    let run = run_pipeline(&cfg, &mut out).unwrap();
    for fit in &run.runs[0].fits {
        assert_eq!(fit.params.k0, 160.0);
    }
    assert!(String::from_utf8(out).unwrap().contains("K0=160.0,"));
}

#[test]
fn json_export_lists_every_dataset() {
    let (p, v) = bm_columns();
    let mut p2 = p.clone();
    p2[3] = None;
    let input = write_csv("export.csv", &[("P1", p), ("P2", p2), ("V1", v.clone()), ("V2", v)]);
    let mut cfg = config(
        input,
        vec![ColumnPair::new("P1", "V1"), ColumnPair::new("P2", "V2")],
        "export.svg",
    );
    let export = temp_path("results.json");
    cfg.export = Some(export.clone());

    run_pipeline(&cfg, &mut Vec::new()).unwrap();

    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(export).unwrap()).unwrap();
    assert_eq!(doc["tool"], "eos-fit");
    assert!(doc["generated_at"].is_string());
    let datasets = doc["datasets"].as_array().unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0]["status"], "fitted");
    assert_eq!(datasets[0]["fits"][0]["model"], "Birch-Murnaghan");
    assert_eq!(datasets[0]["fits"][1]["model"], "Vinet");
    assert_eq!(datasets[1]["status"], "skipped");
    assert_eq!(datasets[1]["n_points"], 21);
}

#[test]
fn unknown_colour_is_rejected_before_loading() {
    let mut cfg = config(temp_path("does-not-exist.csv"), vec![ColumnPair::new("P", "V")], "c.svg");
    cfg.colors = vec!["blurple".to_string()];
    let err = run_pipeline(&cfg, &mut Vec::new()).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.message().contains("blurple"));
}
