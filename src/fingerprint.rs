//! Fingerprints for qualified share paths
//!
//! A host's file index is keyed by a hash of the fully qualified path
//! (`share` immediately followed by the share-relative path), hashed with
//! BLAKE3 and hex encoded.

/// Build the fully qualified path for a file on a share
///
/// The two parts are concatenated verbatim, so discovery backends decide
/// whether relative paths carry a leading separator.
pub fn qualify(share: &str, path: &str) -> String {
    let mut qualified = String::with_capacity(share.len() + path.len());
    qualified.push_str(share);
    qualified.push_str(path);
    qualified
}

/// Compute the fingerprint of a qualified path
///
/// Returns a 64 character lowercase hex string (256-bit digest).
///
/// # Example
///
/// ```
/// use share_crawler::fingerprint::fingerprint;
///
/// let key = fingerprint("publica.txt");
/// assert_eq!(key.len(), 64);
/// assert_eq!(key, fingerprint("publica.txt"));
/// ```
pub fn fingerprint(qualified: &str) -> String {
    blake3::hash(qualified.as_bytes()).to_hex().to_string()
}
