//! stepconv CLI - batch STEP to STL conversion
//!
//! Converts every `*.STP` file in the configured input directory and prints
//! one line per file. Per-file failures never change the exit status.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use stepconv::{ConvertConfig, Converter};

#[derive(Parser, Debug)]
#[command(name = "stepconv", version)]
#[command(about = "Convert STEP files to STL meshes", long_about = None)]
struct Cli {
    /// Keep millimetre coordinates instead of scaling to metres
    #[arg(long = "keep-mm")]
    keep_mm: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConvertConfig::discover().context("failed to load configuration")?;
    if cli.keep_mm {
        config.keep_millimetres = true;
    }

    let level = resolve_log_level(std::env::var("RUST_LOG").ok(), &config);
    logger(&level)
        .try_init()
        .context("failed to initialize logging")?;

    let stdout = std::io::stdout();
    let report = Converter::native(config).run(&mut stdout.lock())?;
    info!(
        "{} converted, {} failed",
        report.converted.len(),
        report.failed.len()
    );
    Ok(())
}

/// `RUST_LOG` when set, then the config's `log_level`, then `warn`.
fn resolve_log_level(env: Option<String>, config: &ConvertConfig) -> String {
    if let Some(level) = env {
        if !level.trim().is_empty() {
            return level;
        }
    }

    if let Some(level) = &config.log_level {
        return level.clone();
    }

    "warn".to_string()
}

/// Stderr logger at `warn` refined by `level` directives, without
/// timestamps.
fn logger(level: &str) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .target(env_logger::Target::Stderr)
        .filter_level(log::LevelFilter::Warn)
        .parse_filters(level)
        .format_timestamp(None);
    builder
}
