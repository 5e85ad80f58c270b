//! Cache key generation using SHA-256 hashes

use sha2::{Digest, Sha256};

use crate::classify::TargetRequest;

/// Generate a deterministic cache key from the target URL and forwarded headers.
///
/// Header names are compared case-insensitively and sorted, so the key does
/// not depend on the order they were supplied in.
pub fn cache_key(url: &str, headers: &[(&str, &str)]) -> String {
    let mut hasher = Sha256::new();

    hasher.update(url.as_bytes());
    hasher.update(b"|");

    let mut sorted: Vec<(String, &str)> = headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), *v))
        .collect();
    sorted.sort();

    for (k, v) in sorted {
        hasher.update(k.as_bytes());
        hasher.update(b":");
        hasher.update(v.as_bytes());
        hasher.update(b"\n");
    }

    format!("{:x}", hasher.finalize())
}

impl TargetRequest {
    /// Cache key for this request
    pub fn cache_key(&self) -> String {
        cache_key(&self.url, &self.headers())
    }
}
