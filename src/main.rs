// src/main.rs

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::{bail, Result};
use strum::IntoEnumIterator;
use tracing::info;
use url::Url;

use gapscan::config::Config;
use gapscan::core::orchestrator::BatchOrchestrator;
use gapscan::core::registry::ModuleId;
use gapscan::logging;

#[derive(Debug, Parser)]
#[command(name = "gapscan", version, about = "Automated security control assessment")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target URL; repeat for multiple targets. Overrides the config list.
    #[arg(short, long = "target")]
    targets: Vec<String>,

    /// Modules to run; defaults to every enabled module.
    #[arg(short, long = "module", value_enum)]
    modules: Vec<ModuleId>,

    /// Output directory for JSON results.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of targets analyzed concurrently per module.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Maximum crawl depth.
    #[arg(short, long)]
    depth: Option<usize>,

    /// Analyze targets one at a time.
    #[arg(long)]
    sequential: bool,
}

/// Adds a scheme where missing and drops duplicates, preserving order.
fn normalize_targets(raw: &[String]) -> Result<Vec<String>> {
    let mut targets = Vec::new();
    for entry in raw {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let with_scheme = if entry.starts_with("http://") || entry.starts_with("https://") {
            entry.to_string()
        } else {
            format!("https://{entry}")
        };
        if Url::parse(&with_scheme).is_err() {
            bail!("invalid target url: {entry}");
        }
        if !targets.contains(&with_scheme) {
            targets.push(with_scheme);
        }
    }
    Ok(targets)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    logging::initialize_logging()?;

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(output) = cli.output {
        config.output.directory = output;
    }
    if let Some(workers) = cli.workers {
        config.scan.workers = workers;
    }
    if let Some(depth) = cli.depth {
        config.scan.max_depth = depth;
    }
    if cli.sequential {
        config.scan.workers = 1;
    }

    let raw_targets = if cli.targets.is_empty() {
        config.target.urls.clone()
    } else {
        cli.targets.clone()
    };
    let targets = normalize_targets(&raw_targets)?;
    if targets.is_empty() {
        bail!("no targets given; use --target or the [target] config section");
    }

    let modules: Vec<ModuleId> = if cli.modules.is_empty() {
        ModuleId::iter().collect()
    } else {
        cli.modules.clone()
    };

    info!(targets = targets.len(), modules = modules.len(), "starting assessment");
    let orchestrator = BatchOrchestrator::new(config);
    let result = orchestrator.execute_all(&modules, &targets).await;
    let path = orchestrator.save(&result)?;

    println!("Assessment complete in {:.2}s", result.execution_time);
    println!(
        "Modules: {} ok, {} failed",
        result.summary.successful_modules, result.summary.failed_modules
    );
    for (number, outcome) in &result.module_results {
        let title = ModuleId::from_number(*number)
            .map(ModuleId::title)
            .unwrap_or("unknown");
        let state = if outcome.is_success() { "ok" } else { "failed" };
        println!("  module {number} ({title}): {state}");
    }
    println!(
        "Controls: {} passed, {} failed, {} not tested (pass rate {:.2}%)",
        result.summary.controls.passed,
        result.summary.controls.failed,
        result.summary.controls.not_tested,
        result.summary.controls.pass_rate
    );
    for error in &result.errors {
        eprintln!("warning: {error}");
    }
    println!("Results written to {}", path.display());

    if result.summary.successful_modules == 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
