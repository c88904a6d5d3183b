use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use poi_compositor::app::compose_use_case::CompositorUseCase;
use poi_compositor::classify::{DefaultClassifier, PhoneClassifier};
use poi_compositor::config::Config;
use poi_compositor::infra::NdjsonRowSource;
use poi_compositor::logging;
use poi_compositor::observability::metrics;

#[derive(Parser)]
#[command(name = "poi_compositor")]
#[command(about = "Normalize OSM point-of-interest tags into canonical place records")]
#[command(version)]
struct Cli {
    /// Write a Prometheus text snapshot of the run's counters to this file
    #[arg(long, global = true)]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every relevant upstream row and merge it into the place store
    Run {
        /// Path to config.toml (defaults to ./config.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Classify and merge, then roll back instead of committing
        #[arg(long)]
        dry_run: bool,
    },
    /// Classify NDJSON source rows and print one JSON record per line
    Classify {
        /// NDJSON file of source rows
        #[arg(long)]
        input: PathBuf,
        /// Path to config.toml (defaults to ./config.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn build_use_case(config: &Config) -> Result<CompositorUseCase> {
    let phone = PhoneClassifier::for_region(&config.phone.default_region)?;
    Ok(CompositorUseCase::new(Box::new(DefaultClassifier::new(phone))))
}

#[cfg(feature = "db")]
async fn run_compositor(config: &Config, dry_run: bool) -> Result<()> {
    use poi_compositor::db::DatabaseManager;

    let use_case = build_use_case(config)?;
    let db = DatabaseManager::new(config).await?;
    let store = db.place_store(config);

    let summary = use_case.run(&store, dry_run).await?;
    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(not(feature = "db"))]
async fn run_compositor(_config: &Config, _dry_run: bool) -> Result<()> {
    anyhow::bail!("poi_compositor was built without the `db` feature; rebuild with --features db")
}

async fn classify_file(config: &Config, input: &Path) -> Result<()> {
    let use_case = build_use_case(config)?;
    let mut source = NdjsonRowSource::open(input)
        .await
        .with_context(|| format!("Failed to open {}", input.display()))?;

    let records = use_case.classify_rows(&mut source).await?;
    info!("Classified {} rows from {}", records.len(), input.display());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (shape, record) in &records {
        let line = serde_json::json!({ "shape": shape, "record": record });
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

fn write_metrics_snapshot(path: &Path) -> Result<()> {
    match metrics::render() {
        Some(snapshot) => {
            std::fs::write(path, snapshot)
                .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
            info!("Wrote metrics snapshot to {}", path.display());
        }
        None => warn!("Metrics recorder not installed, no snapshot written"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();

    if let Err(e) = metrics::init() {
        warn!("Metrics disabled: {}", e);
    }

    match cli.command {
        Commands::Run { config, dry_run } => {
            let config = Config::load(config.as_deref())?;
            run_compositor(&config, dry_run).await?;
        }
        Commands::Classify { input, config } => {
            let config = Config::load(config.as_deref())?;
            classify_file(&config, &input).await?;
        }
    }

    if let Some(path) = cli.metrics_out.as_deref() {
        write_metrics_snapshot(path)?;
    }
    Ok(())
}
