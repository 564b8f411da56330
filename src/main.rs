//! Dutch Subsidy Finder — Binary Entrypoint
//! Fetches open funding calls from the configured Dutch/EU sources, scores
//! them against the research keywords, and exports a ranked CSV report.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use subsidy_finder::config::Config;
use subsidy_finder::fetch::sources::build_sources;
use subsidy_finder::report::{render_summary, CsvExporter, ReportSink};
use subsidy_finder::score::Scorer;

#[derive(Parser, Debug)]
#[command(name = "subsidy-finder", about = "Dutch research funding aggregator")]
struct Cli {
    /// Config file (defaults to config/subsidy_finder.toml or $SUBSIDY_CONFIG_PATH).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for the CSV report (overrides the config file).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("subsidy_finder=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op elsewhere.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    // Configuration errors are the only thing that halts a run, and they
    // surface here, before any fetching.
    let cfg = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let scorer = Scorer::from_config(&cfg).context("compiling keyword set")?;

    info!(
        keywords = cfg.keywords.terms.len(),
        min_score = cfg.scoring.min_score,
        "starting subsidy finder"
    );

    let sources = build_sources(&cfg.fetch)?;
    let report = subsidy_finder::pipeline::run(&cfg, &scorer, sources).await;

    let out_dir = cli.output.unwrap_or_else(|| cfg.output.dir.clone());
    let path = CsvExporter::new(&out_dir).export(&report)?;
    let summary_path = subsidy_finder::report::export_summary_json(&report, &out_dir)?;
    info!(path = %path.display(), summary = %summary_path.display(), "report written");

    print!("{}", render_summary(&report));
    Ok(())
}
