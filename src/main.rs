//! Recon intel — one-shot binary entrypoint.
//! Loads config, runs every scan module once, maintains and persists the
//! intel store. Meant to be driven by an external scheduler (cron, systemd timer).

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recon_intel::metrics::Metrics;
use recon_intel::{HttpFetcher, Pipeline, ReconConfig};

#[derive(Debug, Parser)]
#[command(name = "recon-intel", version, about = "Harvest, score and cross-reference regional news into a bounded intel store")]
struct Args {
    /// Config file (TOML or JSON). Falls back to config/recon.{toml,json}, then the built-in seed.
    #[arg(long, env = "RECON_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override `[store].path`.
    #[arg(long, env = "RECON_STORE_PATH")]
    store: Option<PathBuf>,

    /// Emit JSON log lines.
    #[arg(long, env = "RECON_LOG_JSON", value_parser = clap::builder::FalseyValueParser::new())]
    json_logs: bool,

    /// Run everything but do not lock or write the store; print the report.
    #[arg(long)]
    dry_run: bool,

    /// Write Prometheus exposition text here after the run (textfile collector).
    #[arg(long, env = "RECON_METRICS_FILE")]
    metrics_file: Option<PathBuf>,
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recon_intel=info,warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn run(args: Args) -> Result<()> {
    let mut cfg = ReconConfig::load(args.config.as_deref())?;
    if let Some(p) = args.store {
        cfg.store.path = p;
    }

    let metrics = match &args.metrics_file {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    let fetcher = HttpFetcher::new(&cfg.fetch.user_agent).context("building HTTP client")?;
    let mut pipeline = Pipeline::new(cfg, Arc::new(fetcher)).context("compiling recon rules")?;

    let report = pipeline
        .run_once(chrono::Utc::now(), !args.dry_run)
        .await
        .with_context(|| format!("recon run failed (store {})", pipeline.store().path().display()))?;

    for name in report.failed_modules() {
        tracing::warn!(module = name, "module produced no findings due to failure");
    }
    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if let (Some(m), Some(path)) = (metrics, args.metrics_file.as_deref()) {
        m.write_textfile(path)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.json_logs);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("recon run aborted: {e:#}");
            ExitCode::FAILURE
        }
    }
}
