//! `ivyrecon`: config-driven benefits-enrollment reconciliation.

mod exit_codes;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ivyrecon_engine::engine::load_csv_rows;
use ivyrecon_engine::model::{ErrorCategory, ReconInput, Source};
use ivyrecon_engine::{build_report, run, ReconConfig};

use exit_codes::{EXIT_FINDINGS, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "ivyrecon")]
#[command(about = "Benefits-enrollment reconciliation (Payroll / Carrier / BenAdmin)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  ivyrecon run august.recon.toml
  ivyrecon run august.recon.toml --json
  ivyrecon run august.recon.toml --output report.json
  ivyrecon run august.recon.toml --threshold 0.85 --strict")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output the JSON report to stdout instead of a human summary
        #[arg(long)]
        json: bool,

        /// Write the JSON report to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override similarity_threshold for this invocation only
        #[arg(long)]
        threshold: Option<f64>,

        /// Exit nonzero when any finding exists
        #[arg(long)]
        strict: bool,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  ivyrecon validate august.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

struct CliError {
    code: u8,
    message: String,
}

fn cli_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into() }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { config, json, output, threshold, strict } => {
            cmd_run(config, json, output, threshold, strict)
        }
        Commands::Validate { config } => cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            ExitCode::from(e.code)
        }
    }
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(|e| cli_err(EXIT_INVALID_CONFIG, e.to_string()))
}

fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    threshold: Option<f64>,
    strict: bool,
) -> Result<(), CliError> {
    let mut config = load_config(&config_path)?;
    if config.sources.is_empty() {
        return Err(cli_err(EXIT_INVALID_CONFIG, "config declares no [sources.*] tables"));
    }

    // Per-invocation override; the config file itself is never rewritten.
    if let Some(threshold) = threshold {
        config.similarity_threshold = threshold;
        config
            .validate()
            .map_err(|e| cli_err(EXIT_INVALID_CONFIG, e.to_string()))?;
    }

    // Resolve source files relative to the config file's directory.
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let mut rows: BTreeMap<Source, _> = BTreeMap::new();
    for (source, source_config) in &config.sources {
        let csv_path = base_dir.join(&source_config.file);
        let csv_data = std::fs::read_to_string(&csv_path).map_err(|e| {
            cli_err(EXIT_RUNTIME, format!("cannot read {}: {e}", csv_path.display()))
        })?;
        let loaded = load_csv_rows(&csv_data).map_err(|e| cli_err(EXIT_RUNTIME, e.to_string()))?;
        rows.insert(*source, loaded);
    }

    let result = run(&config, &ReconInput { rows })
        .map_err(|e| cli_err(EXIT_RUNTIME, e.to_string()))?;
    let report = build_report(&result);

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "{}: {} records across {} sources, {} finding(s){}",
        result.meta.config_name,
        s.total_records,
        config.sources.len(),
        s.total_findings,
        if s.truncated { " (truncated)" } else { "" },
    );
    for category in ErrorCategory::ALL {
        let n = s.category_counts[&category];
        if n > 0 {
            eprintln!("  {category}: {n}");
        }
    }

    if strict && s.total_findings > 0 {
        return Err(cli_err(
            EXIT_FINDINGS,
            format!("{} finding(s) present (--strict)", s.total_findings),
        ));
    }
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "config '{}' is valid: {} source(s), {} alias class(es), threshold {}",
        config.name,
        config.sources.len(),
        config.alias_classes.len(),
        config.similarity_threshold,
    );
    Ok(())
}
