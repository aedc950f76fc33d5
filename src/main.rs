//! Shelf-Harvest main entry point
//!
//! This is the command-line interface for the Shelf-Harvest product harvester.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use shelf_harvest::config::{load_config_with_overrides, Config, ConfigOverrides};
use shelf_harvest::crawler::{Coordinator, JobRunner, JobScheduler};
use shelf_harvest::output::{
    print_jobs, print_sources, print_statistics, product_details, search, SearchQuery,
};
use shelf_harvest::storage::{open_store, ProductFilter, ProductStore, SqliteProductStore};
use shelf_harvest::SourceRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Shelf-Harvest: scheduled retail product harvesting
///
/// Shelf-Harvest crawls retailer sitemaps on a schedule, extracts product
/// listings with configurable selectors, and keeps them in a searchable
/// SQLite store.
#[derive(Parser, Debug)]
#[command(name = "shelf-harvest")]
#[command(version)]
#[command(about = "Scheduled retail product harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Override the artifact output directory
    #[arg(long, value_name = "DIR", global = true)]
    output_dir: Option<String>,

    /// Override the product database path
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured sources
    List,

    /// Crawl one source now and ingest the results
    Run {
        /// Source name (case-insensitive), or "all" for every enabled source
        source: String,

        /// Crawl at most this many product URLs
        #[arg(long)]
        max_urls: Option<usize>,

        /// Override the source's fetch concurrency
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Run the scheduler until interrupted
    Start {
        /// Override every source's fetch concurrency
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show store statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search stored products
    Search {
        /// Words that must all occur in title, description, brand or category
        query: Option<String>,

        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        brand: Option<String>,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,

        #[arg(long, default_value_t = 100)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show one product as JSON
    Show {
        /// Product id
        id: String,
    },

    /// Delete every stored product of a source
    Purge {
        source: String,
    },

    /// Copy the database to a backup file
    Backup {
        /// Destination (defaults to a timestamped file next to the database)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let overrides = ConfigOverrides {
        output_dir: cli.output_dir.clone(),
        database_path: cli.db_path.clone(),
    };
    let config = load_config_with_overrides(&cli.config, &overrides)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded: {} sources", config.sources.len());

    match cli.command {
        Command::List => handle_list(&config)?,
        Command::Run {
            source,
            max_urls,
            concurrency,
        } => handle_run(&config, &source, max_urls, concurrency).await?,
        Command::Start { concurrency } => handle_start(&config, concurrency).await?,
        Command::Stats { json } => handle_stats(&config, json)?,
        Command::Search {
            query,
            source,
            category,
            brand,
            min_price,
            max_price,
            limit,
            offset,
        } => {
            let query = SearchQuery {
                filter: ProductFilter {
                    query,
                    source,
                    category,
                    brand,
                    min_price,
                    max_price,
                },
                limit,
                offset,
            };
            let store = open_product_store(&config)?;
            let response = search(&store, &query)?;
            tracing::info!(
                "Showing {} of {} matching products",
                response.page_len(),
                response.total_products
            );
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Show { id } => {
            let store = open_product_store(&config)?;
            match product_details(&store, &id)? {
                Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
                None => bail!("no product with id {}", id),
            }
        }
        Command::Purge { source } => {
            let mut store = open_product_store(&config)?;
            let removed = store.delete_by_source(&source)?;
            println!("Removed {} products of {}", removed, source);
        }
        Command::Backup { path } => {
            let store = open_product_store(&config)?;
            let path = path.unwrap_or_else(|| default_backup_path(&config.scheduler.database_path));
            store.backup_to(&path)?;
            println!("Backup written to {}", path.display());
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelf_harvest=info,warn"),
            1 => EnvFilter::new("shelf_harvest=debug,info"),
            2 => EnvFilter::new("shelf_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_product_store(config: &Config) -> anyhow::Result<SqliteProductStore> {
    let path = Path::new(&config.scheduler.database_path);
    open_store(path).with_context(|| format!("failed to open database {}", path.display()))
}

fn default_backup_path(database_path: &str) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{}.backup-{}", database_path, stamp))
}

fn handle_list(config: &Config) -> anyhow::Result<()> {
    let registry = SourceRegistry::from_config(config)?;
    print_sources(&registry.sources(), Path::new(&config.scheduler.output_dir));
    Ok(())
}

async fn handle_run(
    config: &Config,
    source: &str,
    max_urls: Option<usize>,
    concurrency: Option<usize>,
) -> anyhow::Result<()> {
    let coordinator = Coordinator::from_config(config)?;

    if source.eq_ignore_ascii_case("all") {
        let mut failures = 0;
        for (name, result) in coordinator.run_all(max_urls).await {
            match result {
                Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                Err(e) => {
                    failures += 1;
                    eprintln!("{}: {}", name, e);
                }
            }
        }
        if failures > 0 {
            bail!("{} sources failed", failures);
        }
        return Ok(());
    }

    let summary = coordinator.run_once(source, max_urls, concurrency).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn handle_start(config: &Config, concurrency: Option<usize>) -> anyhow::Result<()> {
    let coordinator = Arc::new(Coordinator::from_config(config)?);
    let registry = Arc::clone(coordinator.registry());
    let runner: Arc<dyn JobRunner> = coordinator;
    let scheduler = JobScheduler::from_registry(
        runner,
        Duration::from_secs(config.scheduler.check_interval),
        &registry,
    );

    if scheduler.jobs().is_empty() {
        bail!("no enabled sources to schedule");
    }

    if let Some(concurrency) = concurrency {
        for job in scheduler.jobs() {
            scheduler.add_job(job.with_concurrency(concurrency.max(1)));
        }
    }

    scheduler.start();
    tracing::info!("Scheduler running; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("Stopping, waiting for the current job to finish");
    scheduler.stop().await;
    let jobs = scheduler.jobs();
    let finished = jobs.iter().filter(|job| job.status.is_finished()).count();
    tracing::info!("{} of {} jobs ran to completion or failure", finished, jobs.len());
    print_jobs(&jobs);
    Ok(())
}

fn handle_stats(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_product_store(config)?;
    let stats = store.stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_statistics(&stats);
    }
    Ok(())
}
