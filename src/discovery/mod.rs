//! Share discovery
//!
//! Discovery answers two questions for the crawler: which shares a host
//! exposes, and which files live under a share. Failures are reported per
//! call so the crawler can isolate a bad share from the rest of the host.

mod mounted;

pub use mounted::MountedShares;

use crate::error::DiscoveryResult;

/// Enumerates shares and files on network hosts
pub trait ShareDiscovery: Send + Sync {
    /// Names of the shares exported by `host`
    fn list_shares(&self, host: &str) -> DiscoveryResult<Vec<String>>;

    /// Share-relative paths of every file under `share` on `host`
    fn list_files(&self, host: &str, share: &str) -> DiscoveryResult<Vec<String>>;
}
