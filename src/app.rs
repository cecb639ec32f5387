//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs logging
//! - parses CLI arguments
//! - turns them into a `PipelineConfig` and runs the fit pipeline
//! - writes synthetic datasets for `synth`

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, FitArgs, MultiArgs, SingleArgs, SynthArgs};
use crate::data::{SyntheticSpec, generate};
use crate::domain::{ColumnPair, EosParams, FigureLayout, MissingPolicy, PipelineConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `eosfit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `eosfit data.xlsx P V out.png` behaves like `eosfit single ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    init_logging(cli.verbose);

    match cli.command {
        Command::Single(args) => run_fit(single_config(args)),
        Command::Multi(args) => run_fit(multi_config(args)?),
        Command::Synth(args) => handle_synth(args),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run_fit(config: PipelineConfig) -> Result<(), AppError> {
    let stdout = io::stdout();
    let output = pipeline::run_pipeline(&config, &mut stdout.lock())?;
    info!(
        "{}",
        crate::report::format_run_summary(output.fitted_count(), output.runs.len(), &config.output)
    );
    Ok(())
}

pub fn single_config(args: SingleArgs) -> PipelineConfig {
    let mut config = base_config(&args.fit, args.filename, args.output_file);
    config.pairs = vec![ColumnPair::new(args.pressure_column, args.volume_column)];
    config.title = args.title;
    config.colors = vec![args.color];
    config.missing = args.missing;
    config.dpi = args.dpi;
    config
}

/// Build the multi-dataset configuration.
///
/// Mismatched `--pressures` / `--volumes` counts are rejected here, before
/// anything is loaded.
pub fn multi_config(args: MultiArgs) -> Result<PipelineConfig, AppError> {
    if args.pressures.len() != args.volumes.len() {
        return Err(AppError::config(format!(
            "Number of pressure columns and volume columns must be equal ({} vs {}).",
            args.pressures.len(),
            args.volumes.len()
        )));
    }

    let mut config = base_config(&args.fit, args.filename, args.output_file);
    config.pairs = args
        .pressures
        .into_iter()
        .zip(args.volumes)
        .map(|(p, v)| ColumnPair::new(p, v))
        .collect();
    config.title = args.figure_title;
    config.colors = args.colors;
    config.layout = FigureLayout::Multi;
    config.missing = args.missing;
    config.dpi = args.dpi;
    Ok(config)
}

fn base_config(fit: &FitArgs, input: PathBuf, output: PathBuf) -> PipelineConfig {
    PipelineConfig {
        input,
        sheet: fit.sheet.clone(),
        pairs: Vec::new(),
        missing: MissingPolicy::Skip,
        seed_preset: fit.seed_preset,
        k0_guess: fit.k0_guess,
        k0_prime_guess: fit.k0_prime_guess,
        fixed_k0: fit.fix_k0,
        max_evaluations: Some(fit.max_evals),
        on_error: fit.on_error,
        output,
        title: String::new(),
        colors: Vec::new(),
        layout: FigureLayout::Single,
        dpi: 100,
        plot_models: fit.plot_models.clone(),
        export: fit.export.clone(),
    }
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SyntheticSpec {
        kind: args.model,
        params: EosParams::new(args.v0, args.k0, args.k0_prime),
        v_min: args.v_min,
        v_max: args.v_max.unwrap_or(args.v0),
        count: args.count,
        noise_sigma: args.noise,
        seed: args.seed,
        columns: ColumnPair::new(args.pressure_column, args.volume_column),
    };
    let dataset = generate(&spec)?;
    crate::io::write_dataset_csv(&args.output_csv, &dataset)?;
    info!(path = %args.output_csv.display(), points = dataset.len(), "synthetic dataset written");
    println!("Wrote {} points to {}", dataset.len(), args.output_csv.display());
    Ok(())
}

/// Rewrite argv so a bare `eosfit <file> <P> <V> <out>` runs `single`.
///
/// Rules:
/// - `eosfit`                        -> unchanged (clap prints usage)
/// - `eosfit --help/--version/-h`    -> unchanged
/// - `eosfit single|multi|synth ...` -> unchanged
/// - `eosfit <anything else> ...`    -> `eosfit single <anything else> ...`
pub fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1) else {
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    let is_subcommand = matches!(arg1.as_str(), "single" | "multi" | "synth");
    if is_top_level_help_or_version || is_subcommand || arg1.starts_with('-') {
        return argv;
    }

    argv.insert(1, "single".to_string());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::{BatchPolicy, SeedPreset};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_positionals_run_single() {
        let argv = rewrite_args(args(&["eosfit", "data.xlsx", "P", "V", "out.png"]));
        assert_eq!(argv, args(&["eosfit", "single", "data.xlsx", "P", "V", "out.png"]));
    }

    #[test]
    fn subcommands_and_help_untouched() {
        for argv in [
            args(&["eosfit"]),
            args(&["eosfit", "--help"]),
            args(&["eosfit", "multi", "T", "o.png", "d.xlsx"]),
            args(&["eosfit", "-v", "single", "d.xlsx", "P", "V", "o.png"]),
        ] {
            assert_eq!(rewrite_args(argv.clone()), argv);
        }
    }

    #[test]
    fn single_config_defaults() {
        let cli = Cli::parse_from(rewrite_args(args(&["eosfit", "data.xlsx", "P", "V", "out.png"])));
        let Command::Single(single) = cli.command else {
            panic!("expected single");
        };
        let config = single_config(single);
        assert_eq!(config.pairs, vec![ColumnPair::new("P", "V")]);
        assert_eq!(config.title, "EOS: MgSiO3 Bridgmanite");
        assert_eq!(config.missing, MissingPolicy::Skip);
        assert_eq!(config.seed_preset, SeedPreset::Bridgmanite);
        assert_eq!(config.on_error, BatchPolicy::Abort);
        assert_eq!(config.colors, vec!["mediumblue".to_string()]);
        assert_eq!(config.fixed_k0, None);
        assert_eq!(config.layout, FigureLayout::Single);
    }

    #[test]
    fn multi_rejects_mismatched_lists() {
        let cli = Cli::parse_from(args(&[
            "eosfit", "multi", "T", "o.png", "d.xlsx", "--pressures", "P1", "P2", "--volumes", "V1",
        ]));
        let Command::Multi(multi) = cli.command else {
            panic!("expected multi");
        };
        let err = multi_config(multi).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("must be equal"));
    }

    #[test]
    fn multi_pairs_in_order() {
        let cli = Cli::parse_from(args(&[
            "eosfit", "multi", "T", "o.png", "d.xlsx", "--pressures", "P1", "P2", "--volumes", "V1", "V2",
        ]));
        let Command::Multi(multi) = cli.command else {
            panic!("expected multi");
        };
        let config = multi_config(multi).unwrap();
        assert_eq!(config.pairs, vec![ColumnPair::new("P1", "V1"), ColumnPair::new("P2", "V2")]);
        assert_eq!(config.missing, MissingPolicy::Interpolate);
        assert_eq!(config.title, "T");
        assert_eq!(config.layout, FigureLayout::Multi);
    }
}
