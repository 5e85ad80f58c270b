//! In-process cache store

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CacheEntry, CacheStore};
use crate::error::CacheError;

/// HashMap-backed store. Entries past retention are invisible to lookups
/// and removed by `purge_expired`.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    retention: chrono::Duration,
}

impl MemoryStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention: chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn retained(&self, entry: &CacheEntry) -> bool {
        entry.age_at(Utc::now()) < self.retention
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn lookup(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).filter(|e| self.retained(e)).cloned())
    }

    async fn store(&self, key: &str, _url: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| self.retained(e));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTtl;

    fn entry(age: chrono::Duration) -> CacheEntry {
        CacheEntry {
            status: 200,
            headers: vec![],
            body: b"<html></html>".to_vec(),
            captured_at: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let store = MemoryStore::new(CacheTtl::RETENTION);
        let e = entry(chrono::Duration::zero());

        store.store("k", "https://example.com", &e).await.unwrap();

        assert_eq!(store.lookup("k").await.unwrap(), Some(e));
        assert_eq!(store.lookup("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let store = MemoryStore::new(CacheTtl::RETENTION);
        let first = entry(chrono::Duration::minutes(1));
        let second = entry(chrono::Duration::zero());

        store.store("k", "https://example.com", &first).await.unwrap();
        store.store("k", "https://example.com", &second).await.unwrap();

        assert_eq!(store.lookup("k").await.unwrap(), Some(second));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store
            .store("old", "https://a.example", &entry(chrono::Duration::minutes(2)))
            .await
            .unwrap();
        store
            .store("new", "https://b.example", &entry(chrono::Duration::zero()))
            .await
            .unwrap();

        assert_eq!(store.lookup("old").await.unwrap(), None);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }
}
