//! Convenio-Search main entry point
//!
//! Command-line interface: serves the search API by default, or runs one
//! crawl, validates the configuration, or prints dataset statistics.

use anyhow::Context;
use clap::Parser;
use convenio_search::api::{self, AppState};
use convenio_search::config::{load_config_with_hash, Config, StoreBackend};
use convenio_search::crawler::JobCoordinator;
use convenio_search::storage::DatasetStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Convenio-Search: crawl and search professional-discount agreements
///
/// Crawls the configured listing site, extracts each convênio into a
/// structured record and serves the dataset through a paginated full-text
/// search API.
#[derive(Parser, Debug)]
#[command(name = "convenio-search")]
#[command(version)]
#[command(about = "Crawl and search convênio discount agreements", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run one crawl, ingest the result and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    crawl: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["crawl", "stats"])]
    dry_run: bool,

    /// Show statistics from the dataset store and exit
    #[arg(long, conflicts_with_all = ["crawl", "dry_run"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let state = AppState::from_config(&config)
        .await
        .context("Failed to initialize services")?;

    if cli.stats {
        handle_stats(state.engine.store().as_ref()).await
    } else if cli.crawl {
        handle_crawl(&state.jobs).await
    } else {
        api::serve(state, &config.server)
            .await
            .context("HTTP server failed")
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("convenio_search=info,warn"),
            1 => EnvFilter::new("convenio_search=debug,info"),
            2 => EnvFilter::new("convenio_search=trace,debug"),
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

/// Handles the --dry-run mode: the configuration is already valid here
fn handle_dry_run(config: &Config) {
    println!("=== Convenio-Search Dry Run ===\n");

    println!("Crawler:");
    println!("  Seed URL: {}", config.crawler.seed_url);
    println!("  Allowed domains: {}", config.crawler.allowed_domains.join(", "));
    println!("  Artifact: {}", config.crawler.artifact_path);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nStore:");
    match config.store.backend {
        StoreBackend::Sqlite => println!("  SQLite database: {}", config.store.database_path),
        StoreBackend::Meilisearch => println!(
            "  Meilisearch index '{}' at {}",
            config.store.meili_index, config.store.meili_url
        ),
    }

    println!("\nServer:");
    println!("  Bind address: {}", config.server.bind_address);
    println!("  Allowed origins: {}", config.server.allowed_origins.join(", "));

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling at {}", config.crawler.seed_url);
}

/// Handles the --stats mode: record and category counts
async fn handle_stats(store: &dyn DatasetStore) -> anyhow::Result<()> {
    let total = store.count(None, None).await?;
    let categories = store.categories().await?;

    println!("Backend: {}\n", store.backend_name());
    println!("Convênios: {}", total);
    println!("Categories: {}", categories.len());
    for category in &categories {
        let count = store.count(None, Some(category)).await?;
        println!("  - {} ({})", category, count);
    }

    Ok(())
}

/// Handles the --crawl mode: one synchronous crawl
async fn handle_crawl(coordinator: &JobCoordinator) -> anyhow::Result<()> {
    match coordinator.run().await {
        Ok(status) => {
            tracing::info!(
                "Crawl completed: {} pages, {} convênios",
                status.pages_crawled,
                status.items_scraped
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
