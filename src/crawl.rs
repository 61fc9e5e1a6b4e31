//! Per-host crawl
//!
//! Enumerates every reachable share of a host, rebuilds its file index from
//! scratch and writes the record back with a fresh age. Discovery failures
//! only shrink the index: an unreachable host is written back with an empty
//! index, and a failing share is left out while the others are kept. Either
//! way the age advances, so a broken host is retried once per
//! `max_host_age` rather than on every cycle.

use crate::discovery::ShareDiscovery;
use crate::error::StoreResult;
use crate::fingerprint::{fingerprint, qualify};
use crate::host::{FileIndex, HostRecord};
use crate::store::HostStore;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// What a crawl found on one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostScan {
    /// Fingerprint -> qualified path for every file found
    pub files: FileIndex,

    /// Shares successfully listed
    pub shares_listed: usize,

    /// Shares whose file listing failed
    pub shares_failed: usize,

    /// The share list itself could not be fetched
    pub host_unreachable: bool,
}

/// Enumerate all shares and files of `host` into a fresh file index
pub fn scan_host(discovery: &dyn ShareDiscovery, host: &str) -> HostScan {
    let mut scan = HostScan::default();

    let shares = match discovery.list_shares(host) {
        Ok(shares) => shares,
        Err(e) => {
            warn!(host, error = %e, "Failed to list shares, indexing host as empty");
            scan.host_unreachable = true;
            return scan;
        }
    };

    for share in &shares {
        let files = match discovery.list_files(host, share) {
            Ok(files) => files,
            Err(e) => {
                warn!(host, share = %share, error = %e, "Failed to list share, skipping it");
                scan.shares_failed += 1;
                continue;
            }
        };

        debug!(host, share = %share, files = files.len(), "Share listed");
        scan.shares_listed += 1;

        for path in files {
            let qualified = qualify(share, &path);
            scan.files.insert(fingerprint(&qualified), qualified);
        }
    }

    scan
}

/// Crawl one host and persist the refreshed record
///
/// `host` must be the record's crawl name. The record's file index is
/// replaced (not merged) and its age set to `now` before the write. A failed
/// write is returned to the caller; discovery failures never are.
pub fn crawl_host(
    store: &dyn HostStore,
    discovery: &dyn ShareDiscovery,
    mut record: HostRecord,
    host: &str,
    now: DateTime<Utc>,
) -> StoreResult<HostScan> {
    let mut scan = scan_host(discovery, host);

    record.refresh(std::mem::take(&mut scan.files), now);
    store.put(&record)?;

    // Hand the index back for reporting
    scan.files = record.files;
    Ok(scan)
}
