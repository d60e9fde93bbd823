//! Gleaner main entry point
//!
//! This is the command-line interface for the Gleaner crawler.

use anyhow::Context;
use clap::Parser;
use gleaner::config::{load_config_with_hash, Settings};
use gleaner::crawler::{CrawlServices, Coordinator};
use gleaner::output::{load_statistics, print_statistics, print_summary};
use gleaner::storage::{RunStatus, SqliteRequestQueue};
use gleaner::GleanError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Gleaner: crawl websites and ask a language model about every page
///
/// Gleaner crawls from a set of start URLs, turns each page into compact
/// text and records the model's answer to the configured instructions,
/// staying within the page budget, the depth limit and the model's
/// context window.
#[derive(Parser, Debug)]
#[command(name = "gleaner")]
#[command(version = "1.0.0")]
#[command(about = "An LLM-driven website crawler and extractor", long_about = None)]
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

    /// Start a fresh crawl, discarding the previous queue and dataset
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the dataset file and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let settings = Settings::resolve(config)?;

    if cli.dry_run {
        handle_dry_run(&settings);
    } else if cli.stats {
        handle_stats(&settings)?;
    } else {
        handle_crawl(settings, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gleaner=info,warn"),
            1 => EnvFilter::new("gleaner=debug,info"),
            2 => EnvFilter::new("gleaner=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved settings
fn handle_dry_run(settings: &Settings) {
    let config = &settings.config;

    println!("=== Gleaner Dry Run ===\n");

    println!("Model:");
    println!("  Name: {}", settings.model.name);
    println!("  Context window: {} tokens", settings.model.max_tokens);
    println!(
        "  Structured output: {}",
        if settings.schema.is_some() { "yes" } else { "no" }
    );

    println!("\nLimits:");
    match settings.max_pages {
        Some(limit) => println!("  Max pages: {}", limit),
        None => println!("  Max pages: unlimited"),
    }
    match settings.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unlimited"),
    }

    println!("\nCrawler:");
    println!(
        "  Concurrency: {}..{}",
        config.crawler.min_concurrency, config.crawler.max_concurrency
    );
    println!("  Max retries: {}", config.crawler.max_request_retries);
    println!(
        "  Handler timeout: {}s",
        config.crawler.request_handler_timeout_secs
    );
    println!(
        "  Proxies: {} datacenter, {} residential",
        config.proxy.datacenter.len(),
        config.proxy.residential.len()
    );

    println!("\nOutput:");
    println!("  Dataset: {}", config.output.dataset_path);
    println!("  Queue: {}", config.output.queue_path);
    println!("  Snapshots: {}", config.output.save_snapshots);

    println!(
        "\nURL globs: {} include, {} exclude, {} skip extraction",
        settings.include_globs.len(),
        settings.exclude_globs.len(),
        settings.skip_extraction_globs.len()
    );

    println!("\nStart URLs ({}):", config.crawl.start_urls.len());
    for url in &config.crawl.start_urls {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the dataset file
fn handle_stats(settings: &Settings) -> anyhow::Result<()> {
    let path = Path::new(&settings.config.output.dataset_path);
    println!("Dataset: {}\n", path.display());

    let stats = load_statistics(path)
        .with_context(|| format!("failed to read dataset {}", path.display()))?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(settings: Settings, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    let queue_path = PathBuf::from(&settings.config.output.queue_path);
    if let Some(parent) = queue_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let queue = Arc::new(SqliteRequestQueue::open(&queue_path)?);

    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
        queue.clear()?;
    } else {
        if let Some(run) = queue.get_latest_run()? {
            if run.status == RunStatus::Running {
                tracing::info!(
                    "Resuming interrupted run {} started at {}",
                    run.id,
                    run.started_at
                );
            }
        }
        tracing::info!("Starting crawl (will resume if interrupted run exists)");
    }

    tracing::info!(
        "Model: {}, start URLs: {}",
        settings.model.name,
        settings.config.crawl.start_urls.len()
    );

    let run_id = queue.create_run(config_hash)?;
    let services = CrawlServices::standard(&settings, queue.clone(), fresh).await?;

    match Coordinator::new(Arc::new(settings), services).run().await {
        Ok(summary) => {
            queue.finish_run(run_id, RunStatus::Completed)?;
            tracing::info!("Crawl completed successfully");
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            let status = match e {
                GleanError::RunAborted(_) => RunStatus::Aborted,
                _ => RunStatus::Failed,
            };
            queue.finish_run(run_id, status)?;
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
