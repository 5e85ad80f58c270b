//! Cache-backed origin fetcher
//!
//! Wraps any `OriginFetch` with a freshness-checked cache lookup. The store
//! is injected; the fetcher never creates one itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{CacheEntry, CacheStore};
use crate::classify::TargetRequest;
use crate::client::OriginFetch;
use crate::error::FetchError;

/// Serves fresh cache entries, otherwise fetches live and writes back.
pub struct CachedFetcher<O: OriginFetch> {
    origin: Arc<O>,
    store: Arc<dyn CacheStore>,
    freshness: chrono::Duration,
}

impl<O: OriginFetch> CachedFetcher<O> {
    pub fn new(origin: O, store: Arc<dyn CacheStore>, freshness: Duration) -> Self {
        Self {
            origin: Arc::new(origin),
            store,
            freshness: chrono::Duration::from_std(freshness).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Get the inner origin client
    pub fn origin(&self) -> &O {
        &self.origin
    }

    /// An entry is fresh while its age is strictly below the window.
    pub fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        entry.age_at(now) < self.freshness
    }

    /// Look up `target`, re-fetching when the entry is missing or stale.
    ///
    /// Live fetch failures propagate; there is no stale fallback. Store
    /// failures are logged and never fail the request.
    pub async fn fetch(&self, target: &TargetRequest) -> Result<CacheEntry, FetchError> {
        let key = target.cache_key();

        match self.store.lookup(&key).await {
            Ok(Some(entry)) if self.is_fresh(&entry, Utc::now()) => {
                log::debug!("Cache hit: {}", target.url);
                return Ok(entry);
            }
            Ok(Some(_)) => log::debug!("Cache stale: {}", target.url),
            Ok(None) => log::debug!("Cache miss: {}", target.url),
            Err(e) => log::warn!("Cache lookup failed for {}: {}", target.url, e),
        }

        let response = self.origin.fetch(target).await?;
        let entry = CacheEntry {
            status: response.status,
            headers: response.headers,
            body: response.body,
            captured_at: Utc::now(),
        };

        if let Err(e) = self.store.store(&key, &target.url, &entry).await {
            log::warn!("Cache store failed for {}: {}", target.url, e);
        }

        Ok(entry)
    }
}
