//! Origin response cache
//!
//! Entries are keyed by the target request and carry their own capture time.
//! The store decides when an entry physically disappears (retention); the
//! fetcher decides when it is too old to serve (freshness).

pub mod fetcher;
pub mod key;
pub mod memory;
pub mod storage;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Cache durations
pub struct CacheTtl;

impl CacheTtl {
    /// Entries older than this are re-fetched
    pub const FRESHNESS: Duration = Duration::from_secs(5 * 60); // 5 min

    /// Entries older than this are dropped by the store
    pub const RETENTION: Duration = Duration::from_secs(24 * 60 * 60); // 24 hr

    /// How often the server purges entries past retention
    pub const PURGE_EVERY: Duration = Duration::from_secs(10 * 60); // 10 min
}

/// A stored origin response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Upstream HTTP status
    pub status: u16,

    /// Upstream response headers, in arrival order
    pub headers: Vec<(String, String)>,

    /// Raw response body
    pub body: Vec<u8>,

    /// When the proxy fetched this response
    pub captured_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age of the entry at `now`. Negative if captured in the future.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.captured_at
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Key-value store shared by all requests.
///
/// `lookup` returns whatever entry is present, stale or not; evaluating
/// freshness is the caller's job. `store` overwrites (last writer wins).
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn store(&self, key: &str, url: &str, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Drop entries past the store's retention. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, CacheError>;
}

// Re-export main types
pub use fetcher::CachedFetcher;
pub use key::cache_key;
pub use memory::MemoryStore;
pub use storage::SqliteStore;
