//! Console output for the CLI

use crate::config::CrawlConfig;
use crate::coordinator::CrawlSummary;
use crate::host::HostRecord;
use chrono::{DateTime, Utc};
use console::style;
use std::time::Duration;

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Compact duration, largest two units (e.g. "6h", "1d 2h", "45s")
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }

    let units = [(86400, "d"), (3600, "h"), (60, "m"), (1, "s")];
    let mut parts = Vec::new();
    let mut rest = secs;
    for (size, suffix) in units {
        if rest >= size {
            parts.push(format!("{}{}", rest / size, suffix));
            rest %= size;
        }
        if parts.len() == 2 {
            break;
        }
    }
    parts.join(" ")
}

/// How long ago a host was crawled
pub fn format_age(age: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match age {
        None => "never".to_string(),
        Some(age) => match (now - age).to_std() {
            Ok(elapsed) => format!("{} ago", format_duration(elapsed)),
            // Clock skew between writers
            Err(_) => "just now".to_string(),
        },
    }
}

/// Print a header at the start of a crawl
pub fn print_header(config: &CrawlConfig) {
    println!();
    println!(
        "{} {}",
        style("share-crawler").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Shares:").bold(),
        config.share_root.display()
    );
    println!("  {} {}", style("Database:").bold(), config.db_path.display());
    println!("  {} {}", style("Workers:").bold(), config.thread_count);
    println!(
        "  {} {} (polling every {})",
        style("Max age:").bold(),
        format_duration(config.max_host_age),
        format_duration(config.poll_interval)
    );
    println!();
}

/// Print a summary of a finished crawl
pub fn print_summary(summary: &CrawlSummary, db_path: &str) {
    let totals = &summary.totals;

    println!();
    println!("{}", style("Crawl Stopped").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Hosts crawled:").bold(),
        format_number(totals.hosts_crawled)
    );
    println!(
        "  {} {}",
        style("Files indexed:").bold(),
        format_number(totals.files_indexed)
    );
    println!(
        "  {} {} ({} admitted)",
        style("Cycles:").bold(),
        format_number(summary.cycles),
        format_number(summary.admitted)
    );
    println!(
        "  {} {:.1}s ({:.2} hosts/sec)",
        style("Duration:").bold(),
        summary.duration.as_secs_f64(),
        summary.hosts_per_second()
    );
    if totals.hosts_skipped > 0 {
        println!(
            "  {} {}",
            style("Skipped:").yellow().bold(),
            format_number(totals.hosts_skipped)
        );
    }
    if totals.hosts_failed > 0 || totals.shares_failed > 0 {
        println!(
            "  {} {} hosts, {} shares",
            style("Errors:").yellow().bold(),
            format_number(totals.hosts_failed),
            format_number(totals.shares_failed)
        );
    }
    println!("  {} {}", style("Database:").bold(), db_path);
    println!();
}

/// Print one line per host: key, name, last crawl, indexed files
pub fn print_hosts(records: &[HostRecord], now: DateTime<Utc>) {
    if records.is_empty() {
        println!("{}", style("No hosts").dim());
        return;
    }

    let name_width = records
        .iter()
        .map(|r| r.name.as_deref().map_or(1, str::len))
        .max()
        .unwrap_or(0)
        .max(4);

    println!(
        "{}",
        style(format!(
            "{:<36}  {:<name_width$}  {:<14}  {:>10}",
            "KEY", "NAME", "CRAWLED", "FILES"
        ))
        .bold()
    );

    for record in records {
        let name = record.name.as_deref().unwrap_or("-");
        println!(
            "{:<36}  {:<name_width$}  {:<14}  {:>10}",
            record.key,
            name,
            format_age(record.age, now),
            format_number(record.files.len() as u64)
        );
    }
}

/// Host records as a pretty-printed JSON array
///
/// Ages are RFC 3339 timestamps, `null` for never-crawled hosts.
pub fn hosts_json(records: &[HostRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(6 * 3600)), "6h");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 12 * 60 + 5)), "3h 12m");
        assert_eq!(format_duration(Duration::from_secs(86400 + 7200)), "1d 2h");
    }

    #[test]
    fn test_hosts_json() {
        let age = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let mut crawled = HostRecord::new("h1", "srv01").with_age(age);
        crawled.files.insert("abc".into(), "publica.txt".into());
        let never = HostRecord::new("h2", "srv02");

        let json = hosts_json(&[crawled, never]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["key"], "h1");
        assert_eq!(value[0]["name"], "srv01");
        assert_eq!(value[0]["age"], "2023-11-14T22:13:20Z");
        assert_eq!(value[0]["files"]["abc"], "publica.txt");
        assert!(value[1]["age"].is_null());
        assert_eq!(value[1]["files"], serde_json::json!({}));
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(None, now), "never");
        assert_eq!(
            format_age(Some(now - chrono::Duration::minutes(90)), now),
            "1h 30m ago"
        );
        assert_eq!(
            format_age(Some(now + chrono::Duration::seconds(5)), now),
            "just now"
        );
    }
}
