//! share-crawler - Periodic re-indexer for network file shares
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use share_crawler::config::{
    parse_duration, stale_threshold, CliArgs, Command, CrawlArgs, CrawlConfig,
};
use share_crawler::report::{hosts_json, print_header, print_hosts, print_summary};
use share_crawler::{Coordinator, HostStore, MountedShares, SqliteHostStore};
use std::collections::HashSet;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    match &args.command {
        Command::Crawl(crawl_args) => run_crawl(&args, crawl_args),
        Command::Add { names } => run_add(&args.db, names),
        Command::Hosts {
            stale,
            max_host_age,
            json,
        } => run_hosts(&args.db, *stale, max_host_age, *json),
    }
}

/// Run the coordinator and worker pool until interrupted
fn run_crawl(args: &CliArgs, crawl_args: &CrawlArgs) -> Result<()> {
    // Validate and create config
    let config = CrawlConfig::from_args(args, crawl_args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(&config);
    }

    let store = SqliteHostStore::open(&config.db_path).context("Failed to open host database")?;

    let discovery = MountedShares::new(&config.share_root)
        .exclude(config.exclude_patterns.clone())
        .max_depth(config.max_depth)
        .include_admin_shares(config.include_admin_shares);

    let show_progress = config.show_progress;
    let db_path = config.db_path.display().to_string();

    let coordinator = Coordinator::new(config, Arc::new(store), Arc::new(discovery))
        .context("Failed to initialize crawler")?;

    // Setup signal handler for graceful shutdown
    let shutdown = coordinator.shutdown_signal();
    ctrlc::set_handler(move || {
        if shutdown.is_triggered() {
            eprintln!("\nForce shutdown!");
            std::process::exit(130);
        }
        eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
        shutdown.trigger();
    })
    .context("Failed to set signal handler")?;

    let summary = coordinator.run().context("Crawler failed")?;

    if show_progress {
        print_summary(&summary, &db_path);
    }

    if summary.totals.hosts_failed > 0 {
        info!(failed = summary.totals.hosts_failed, "Crawl finished with errors");
    }

    Ok(())
}

/// Register hosts, skipping names already present
fn run_add(db: &Path, names: &[String]) -> Result<()> {
    let store = SqliteHostStore::open(db).context("Failed to open host database")?;

    for name in names {
        let existing = store
            .find_by_name(name.trim())
            .with_context(|| format!("Failed to look up host '{}'", name))?;
        if !existing.is_empty() {
            warn!(host = %name, "Host already registered, skipping");
            continue;
        }

        let record = store
            .add_host(name)
            .with_context(|| format!("Failed to add host '{}'", name))?;
        info!(host = %name, host_key = %record.key, "Host added");
        println!("{}\t{}", record.key, name.trim());
    }

    Ok(())
}

/// List known hosts, optionally only the stale ones
fn run_hosts(db: &Path, stale_only: bool, max_host_age: &str, json: bool) -> Result<()> {
    let store = SqliteHostStore::open(db).context("Failed to open host database")?;
    let now = Utc::now();

    let mut records = store.list_hosts().context("Failed to list hosts")?;

    if stale_only {
        let max_host_age = parse_duration(max_host_age).context("Invalid --max-host-age")?;
        let stale: HashSet<_> = store
            .query_stale(stale_threshold(now, max_host_age))
            .context("Failed to query stale hosts")?
            .into_iter()
            .map(|host| host.key)
            .collect();
        records.retain(|record| stale.contains(&record.key));
    }

    if json {
        println!("{}", hosts_json(&records).context("Failed to encode hosts")?);
    } else {
        print_hosts(&records, now);
    }
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("share_crawler=debug,warn")
    } else {
        EnvFilter::new("share_crawler=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
