use anyhow::{Context, Result};
use clap::Parser;
use safewipe::{
    config::Config,
    orchestrator::EraseOrchestrator,
    replacement::FillPattern,
    reporter::{BatchReport, ConsoleReporter},
    targets::{collect_targets, TargetOptions},
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// SafeWipe - overwrite files with a replacement pattern, then delete them
#[derive(Parser, Debug)]
#[command(name = "safewipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Files to erase (folders require --folders)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Allow folder arguments (files directly inside and one level below)
    #[arg(short, long)]
    folders: bool,

    /// Descend into folders up to --max-depth levels (implies --folders)
    #[arg(short, long)]
    recursive: bool,

    /// Deepest folder level visited with --recursive
    #[arg(long)]
    max_depth: Option<usize>,

    /// Replacement pattern: zeros or random
    #[arg(short, long)]
    pattern: Option<FillPattern>,

    /// Files erased concurrently (defaults to available CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Overwrite chunk size in bytes
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,

    /// Wait for Enter before exiting
    #[arg(long)]
    pause: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Use RUST_LOG environment variable to control log level (e.g., RUST_LOG=info,safewipe=debug)
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    info!(paths = cli.paths.len(), "SafeWipe starting");

    let cfg = resolve_config(&cli)?;
    let result = cmd_erase(&cli, &cfg).await;

    if cli.pause {
        wait_for_enter()?;
    }
    result
}

/// Merge CLI flags over file/environment config
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut cfg = Config::load_with_env(cli.config.as_deref())?;

    if let Some(workers) = cli.workers {
        cfg.workers = Some(workers);
    }
    if let Some(chunk_size) = cli.chunk_size {
        cfg.chunk_size = chunk_size;
    }
    if let Some(pattern) = cli.pattern {
        cfg.pattern = pattern;
    }
    if let Some(max_depth) = cli.max_depth {
        cfg.max_depth = max_depth;
    }

    cfg.validate().context("invalid options")?;
    Ok(cfg)
}

async fn cmd_erase(cli: &Cli, cfg: &Config) -> Result<()> {
    let options = TargetOptions {
        allow_folders: cli.folders || cli.recursive,
        recursive: cli.recursive,
        max_depth: cfg.max_depth,
    };
    let targets = collect_targets(&cli.paths, options);

    if targets.is_empty() {
        println!("Nothing to erase.");
        return Ok(());
    }

    if !cli.yes && !confirm(targets.len(), cfg.pattern)? {
        println!("Cancelled.");
        return Ok(());
    }

    let mut orch = EraseOrchestrator::from_config(cfg, Arc::new(ConsoleReporter::new()));
    let report = orch.run(targets).await?;

    print_summary(&report);

    if !report.all_succeeded() {
        anyhow::bail!("{} file(s) could not be erased", report.failed);
    }
    Ok(())
}

fn confirm(count: usize, pattern: FillPattern) -> Result<bool> {
    print!(
        "Overwrite ({}) and delete {} file(s)? This cannot be undone. [y/N]: ",
        pattern, count
    );
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}

fn print_summary(report: &BatchReport) {
    println!();
    println!("TOTAL:   {}", report.total);
    println!("OK:      {}", report.succeeded);
    println!("FAILED:  {}", report.failed);
    println!("SKIPPED: {}", report.skipped);
}

fn wait_for_enter() -> Result<()> {
    print!("Press Enter to finish...");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(())
}
