//! Configuration types for share-crawler
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Human-friendly duration parsing ("45s", "6h", "2d")

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_THREADS: usize = 512;

/// Default age after which a host is re-crawled
pub const DEFAULT_MAX_HOST_AGE: &str = "6h";

/// Default coordinator cycle length
pub const DEFAULT_POLL_INTERVAL: &str = "45s";

/// Default worker tick length
pub const DEFAULT_WORKER_POLL_INTERVAL: &str = "1s";

/// Periodic re-indexer for network file shares
#[derive(Parser, Debug, Clone)]
#[command(
    name = "share-crawler",
    version,
    about = "Periodically re-indexes the file shares of network hosts",
    long_about = "Finds hosts whose index is older than --max-host-age, lists every file on \n\
                  their shares and writes the refreshed listing back to the host database.\n\n\
                  Shares are read from mounted hosts: <share-root>/<host>/<share>/...",
    after_help = "EXAMPLES:\n    \
        share-crawler add srv01 srv02\n    \
        share-crawler crawl --share-root /mnt/shares -t 8\n    \
        share-crawler crawl --share-root /mnt/shares --max-host-age 12h\n    \
        share-crawler crawl --share-root /mnt/shares --exclude '\\.snapshot'\n    \
        share-crawler hosts --stale"
)]
pub struct CliArgs {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Host database file
    #[arg(
        long,
        env = "SHARE_CRAWLER_DB",
        default_value = "crawler.db",
        value_name = "FILE",
        global = true
    )]
    pub db: PathBuf,

    /// Quiet mode - suppress header and summary output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the coordinator and worker pool until interrupted
    Crawl(CrawlArgs),

    /// Register hosts to be crawled
    Add {
        /// Host names as they appear under the share root
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// List known hosts
    Hosts {
        /// Only show hosts the next cycle would schedule
        #[arg(long)]
        stale: bool,

        /// Age threshold used with --stale
        #[arg(long, default_value = DEFAULT_MAX_HOST_AGE, value_name = "DURATION")]
        max_host_age: String,

        /// Print full records, file index included, as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Arguments of the `crawl` subcommand
#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Directory holding one sub-directory per host
    #[arg(long, env = "SHARE_CRAWLER_ROOT", value_name = "DIR")]
    pub share_root: PathBuf,

    /// Number of worker threads
    #[arg(short = 't', long, default_value_t = default_threads(), value_name = "NUM")]
    pub threads: usize,

    /// Re-crawl hosts whose index is older than this
    #[arg(long, default_value = DEFAULT_MAX_HOST_AGE, value_name = "DURATION")]
    pub max_host_age: String,

    /// Time between stale-host queries
    #[arg(long, default_value = DEFAULT_POLL_INTERVAL, value_name = "DURATION")]
    pub poll_interval: String,

    /// Time between worker polls of the claim queue
    #[arg(long, default_value = DEFAULT_WORKER_POLL_INTERVAL, value_name = "DURATION")]
    pub worker_poll_interval: String,

    /// Exclude share paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Maximum directory depth below a share (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Also index administrative shares (names ending in '$')
    #[arg(long)]
    pub include_admin_shares: bool,
}

fn default_threads() -> usize {
    // Crawls are I/O bound, but each holds a store connection slot
    num_cpus::get()
}

/// Parse a human-readable duration (e.g. "500ms", "45s", "30m", "6h", "2d")
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: s.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = s.trim().to_lowercase();
    let (num_str, unit_secs) = if let Some(n) = trimmed.strip_suffix("ms") {
        (n, 0.001)
    } else if let Some(n) = trimmed.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = trimmed.strip_suffix('m') {
        (n, 60.0)
    } else if let Some(n) = trimmed.strip_suffix('h') {
        (n, 3600.0)
    } else if let Some(n) = trimmed.strip_suffix('d') {
        (n, 86400.0)
    } else {
        (trimmed.as_str(), 1.0)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| invalid("expected a number with an optional ms/s/m/h/d suffix"))?;

    if !num.is_finite() || num < 0.0 {
        return Err(invalid("must be a non-negative number"));
    }

    Duration::try_from_secs_f64(num * unit_secs).map_err(|_| invalid("out of range"))
}

/// Validated runtime configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Host database path
    pub db_path: PathBuf,

    /// Directory of mounted hosts
    pub share_root: PathBuf,

    /// Number of worker threads
    pub thread_count: usize,

    /// Age after which a host is stale
    pub max_host_age: Duration,

    /// Coordinator cycle length
    pub poll_interval: Duration,

    /// Worker tick length
    pub worker_poll_interval: Duration,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Maximum depth below a share
    pub max_depth: Option<usize>,

    /// Index shares ending in '$'
    pub include_admin_shares: bool,

    /// Print header and summary
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("crawler.db"),
            share_root: PathBuf::from("."),
            thread_count: default_threads(),
            max_host_age: Duration::from_secs(6 * 3600),
            poll_interval: Duration::from_secs(45),
            worker_poll_interval: Duration::from_secs(1),
            exclude_patterns: Vec::new(),
            max_depth: None,
            include_admin_shares: false,
            show_progress: true,
            verbose: false,
        }
    }
}

impl CrawlConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(cli: &CliArgs, args: &CrawlArgs) -> Result<Self, ConfigError> {
        if !args.share_root.is_dir() {
            return Err(ConfigError::InvalidShareRoot {
                path: args.share_root.clone(),
                reason: "not a directory".to_string(),
            });
        }

        // Validate database path
        if let Some(parent) = cli.db.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidDatabasePath {
                    path: cli.db.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        // Compile exclude patterns
        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            db_path: cli.db.clone(),
            share_root: args.share_root.clone(),
            thread_count: args.threads,
            max_host_age: parse_duration(&args.max_host_age)?,
            poll_interval: parse_duration(&args.poll_interval)?,
            worker_poll_interval: parse_duration(&args.worker_poll_interval)?,
            exclude_patterns,
            max_depth: args.max_depth,
            include_admin_shares: args.include_admin_shares,
            show_progress: !cli.quiet,
            verbose: cli.verbose,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check ranges that clap cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count == 0 || self.thread_count > MAX_THREADS {
            return Err(ConfigError::InvalidThreadCount {
                count: self.thread_count,
                max: MAX_THREADS,
            });
        }

        for (name, value) in [
            ("max_host_age", self.max_host_age),
            ("poll_interval", self.poll_interval),
            ("worker_poll_interval", self.worker_poll_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidDuration {
                    value: format!("{}=0", name),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Hosts last crawled before this instant are stale
    pub fn stale_threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        stale_threshold(now, self.max_host_age)
    }
}

/// `now - max_host_age`, clamped to the earliest representable time
pub fn stale_threshold(now: DateTime<Utc>, max_host_age: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(max_host_age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("6h").unwrap(), Duration::from_secs(21600));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(172800));
        assert_eq!(parse_duration(" 1.5H ").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("5w").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(CrawlConfig::default().validate().is_ok());

        let config = CrawlConfig {
            thread_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreadCount { .. })
        ));

        let config = CrawlConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_stale_threshold() {
        let now = Utc::now();
        let config = CrawlConfig {
            max_host_age: Duration::from_secs(6 * 3600),
            ..Default::default()
        };
        assert_eq!(config.stale_threshold(now), now - chrono::Duration::hours(6));

        // Absurd ages clamp instead of overflowing
        let threshold = stale_threshold(now, Duration::from_secs(u64::MAX));
        assert_eq!(threshold, DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_cli_parses_crawl() {
        let cli = CliArgs::try_parse_from([
            "share-crawler",
            "--db",
            "hosts.db",
            "crawl",
            "--share-root",
            "/mnt/shares",
            "-t",
            "4",
            "--exclude",
            "tmp",
        ])
        .unwrap();

        assert_eq!(cli.db, PathBuf::from("hosts.db"));
        match cli.command {
            Command::Crawl(args) => {
                assert_eq!(args.threads, 4);
                assert_eq!(args.max_host_age, DEFAULT_MAX_HOST_AGE);
                assert_eq!(args.exclude_patterns, ["tmp"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_hosts_json() {
        let cli = CliArgs::try_parse_from(["share-crawler", "hosts", "--stale", "--json"]).unwrap();

        match cli.command {
            Command::Hosts {
                stale,
                max_host_age,
                json,
            } => {
                assert!(stale);
                assert!(json);
                assert_eq!(max_host_age, DEFAULT_MAX_HOST_AGE);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_from_args_rejects_bad_pattern() {
        let root = tempfile::tempdir().unwrap();
        let root_str = root.path().to_str().unwrap();
        let cli = CliArgs::try_parse_from([
            "share-crawler",
            "crawl",
            "--share-root",
            root_str,
            "--exclude",
            "(",
        ])
        .unwrap();

        let Command::Crawl(args) = &cli.command else {
            panic!("expected crawl");
        };
        assert!(matches!(
            CrawlConfig::from_args(&cli, args),
            Err(ConfigError::InvalidExcludePattern { .. })
        ));
    }
}
