//! Discovery over locally mounted shares
//!
//! Expects one directory per host under a root, and one directory per share
//! under each host, e.g. CIFS mounts laid out as:
//!
//! ```text
//! /mnt/shares/
//! ├── srv01/
//! │   ├── public/
//! │   └── docs/
//! └── srv02/
//!     └── media/
//! ```
//!
//! File paths are returned relative to the share with a leading `/`, so the
//! qualified path of `/mnt/shares/srv01/docs/q1/report.pdf` is
//! `docs/q1/report.pdf`.

use crate::discovery::ShareDiscovery;
use crate::error::{DiscoveryError, DiscoveryResult};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Share discovery backed by a directory of mounted hosts
#[derive(Debug, Clone)]
pub struct MountedShares {
    root: PathBuf,
    exclude_patterns: Vec<Regex>,
    max_depth: Option<usize>,
    include_admin_shares: bool,
}

impl MountedShares {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude_patterns: Vec::new(),
            max_depth: None,
            include_admin_shares: false,
        }
    }

    /// Skip files and directories whose share-relative path matches any pattern
    pub fn exclude(mut self, patterns: Vec<Regex>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Limit how deep below the share root files are listed
    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Also report administrative shares (names ending in `$`)
    pub fn include_admin_shares(mut self, include: bool) -> Self {
        self.include_admin_shares = include;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.exclude_patterns.iter().any(|re| re.is_match(relative))
    }

    fn host_dir(&self, host: &str) -> DiscoveryResult<PathBuf> {
        if !is_plain_component(host) {
            return Err(DiscoveryError::HostUnreachable {
                host: host.to_string(),
                reason: "host name is not a plain path component".into(),
            });
        }
        Ok(self.root.join(host))
    }
}

impl ShareDiscovery for MountedShares {
    fn list_shares(&self, host: &str) -> DiscoveryResult<Vec<String>> {
        let host_dir = self.host_dir(host)?;

        let entries = fs::read_dir(&host_dir).map_err(|e| DiscoveryError::HostUnreachable {
            host: host.to_string(),
            reason: format!("{}: {}", host_dir.display(), e),
        })?;

        let mut shares = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DiscoveryError::InvalidResponse {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

            // Follow symlinks: mount points are often linked into place
            if !entry.path().is_dir() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!(host, path = %entry.path().display(), "Skipping share with non-UTF-8 name");
                continue;
            };

            if name.ends_with('$') && !self.include_admin_shares {
                trace!(host, share = %name, "Skipping administrative share");
                continue;
            }

            shares.push(name);
        }

        shares.sort();
        Ok(shares)
    }

    fn list_files(&self, host: &str, share: &str) -> DiscoveryResult<Vec<String>> {
        let unreadable = |reason: String| DiscoveryError::ShareUnreadable {
            host: host.to_string(),
            share: share.to_string(),
            reason,
        };

        if !is_plain_component(share) {
            return Err(unreadable("share name is not a plain path component".into()));
        }
        let share_dir = self.host_dir(host)?.join(share);

        // Surface an unreadable share root as an error rather than an empty listing
        fs::read_dir(&share_dir)
            .map_err(|e| unreadable(format!("{}: {}", share_dir.display(), e)))?;

        let mut walker = WalkDir::new(&share_dir).min_depth(1).follow_links(false);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut files = Vec::new();
        let entries = walker.into_iter().filter_entry(|entry| {
            relative_path(&share_dir, entry.path())
                .map(|rel| !self.is_excluded(&rel))
                .unwrap_or(true)
        });

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(host, share, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            match relative_path(&share_dir, entry.path()) {
                Some(rel) => files.push(rel),
                None => debug!(
                    host,
                    share,
                    path = %entry.path().display(),
                    "Skipping file with non-UTF-8 path"
                ),
            }
        }

        files.sort();
        Ok(files)
    }
}

/// `/`-prefixed, `/`-separated path of `path` below `base`
///
/// None if `path` is not below `base` or any component is not UTF-8.
fn relative_path(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let mut out = String::new();
    for component in rel.components() {
        out.push('/');
        out.push_str(component.as_os_str().to_str()?);
    }
    Some(out)
}

/// Rejects names that would escape the root (`..`, separators, empty)
fn is_plain_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
