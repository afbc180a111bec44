//! Exam Crawler main entry point
//!
//! This is the command-line interface for the exam archive crawler.

use anyhow::Context;
use clap::Parser;
use exam_crawler::config::{load_config_with_hash, Config};
use exam_crawler::crawler::run_crawl;
use exam_crawler::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Exam Crawler: a focused crawler for course archives
///
/// Exam Crawler discovers HTML pages and PDF exams on a fixed set of
/// university hosts, a forum service, and web-archive snapshots. It runs
/// until interrupted and keeps its frontier and documents in SQLite.
#[derive(Parser, Debug)]
#[command(name = "exam-crawler")]
#[command(version)]
#[command(about = "A focused crawler for course archives", long_about = None)]
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

    /// Validate config and print what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show frontier and document counts from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        tracing::info!(
            "Hosts: {}, Seeds: {}, Archive prefixes: {}",
            config.hosts.len(),
            config.seeds.len(),
            config.archive.prefixes.len()
        );
        run_crawl(config).await.context("crawl failed")?;
        tracing::info!("Crawler stopped");
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("exam_crawler=info,warn"),
            1 => EnvFilter::new("exam_crawler=debug,info"),
            2 => EnvFilter::new("exam_crawler=trace,debug"),
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

/// Handles the --dry-run mode: prints the resolved configuration
fn handle_dry_run(config: &Config) {
    println!("=== Exam Crawler Dry Run ===\n");

    println!("Crawler:");
    println!("  Workers: {}", config.crawler.effective_workers());
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Max body bytes: {}", config.crawler.max_body_bytes);
    println!("  Max attempts: {}", config.crawler.max_attempts);
    println!(
        "  Empty backoff: {}s",
        config.crawler.empty_backoff_secs
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!(
        "  Seen-sets: {} entries at {} false positives",
        config.filter.capacity, config.filter.false_positive_rate
    );
    println!("  Blobs: {:?}", config.blob.kind);

    match &config.forum {
        Some(forum) => println!("\nForum: {}:// via {}", forum.scheme, forum.base_url),
        None => println!("\nForum: disabled"),
    }

    println!("\nHosts ({}):", config.hosts.len());
    for host in &config.hosts {
        println!("  - {} ({} whitelist patterns)", host.name, host.whitelist.len());
    }

    println!("\nBlacklist patterns: {}", config.blacklist.len());
    println!("Score rules: {}", config.scores.len());

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  * {}", seed);
    }

    println!("\nArchive prefixes ({}):", config.archive.prefixes.len());
    for prefix in &config.archive.prefixes {
        println!("  * {}", prefix);
    }

    println!("\nConfiguration is valid");
}

/// Handles the --stats mode: prints store counts
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(Path::new(&config.storage.database_path))
        .context("failed to open database")?;

    println!("Frontier:");
    println!("  Live: {}", storage.live_count()?);
    println!("  Known: {}", storage.frontier_count()?);
    println!("\nDocuments: {}", storage.document_count()?);

    Ok(())
}
