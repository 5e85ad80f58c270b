//! cardcloak - link-preview cloaking proxy
//!
//! Ordinary visitors following a proxy link are redirected to the real
//! target. A link-preview crawler gets a synthetic page holding only the
//! target's card metadata, fetched and cached by the proxy.

pub mod cache;
pub mod classify;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod preview;
pub mod proxy;
pub mod server;

use std::sync::Arc;

use crate::cache::{CacheStore, CachedFetcher, MemoryStore, SqliteStore};
use crate::client::HttpOrigin;
use crate::config::{CacheBackend, Config};
use crate::error::Result;
use crate::proxy::CloakProxy;

/// A wired-up server and the cache store it shares with housekeeping
pub struct App {
    pub router: axum::Router,
    pub store: Arc<dyn CacheStore>,
}

/// Open the configured store and assemble the proxy behind a router
pub fn build_app(config: &Config) -> Result<App> {
    config.validate()?;

    let store: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Sqlite => {
            let dir = config.cache_dir()?;
            log::info!("Using SQLite cache at {}", dir.display());
            Arc::new(SqliteStore::open_at(&dir, config.retention())?)
        }
        CacheBackend::Memory => {
            log::info!("Using in-memory cache");
            Arc::new(MemoryStore::new(config.retention()))
        }
    };

    let origin = HttpOrigin::new(config.origin_timeout(), config.origin_rate_limit()?)?
        .with_max_body_bytes(config.origin.max_body_bytes);
    let fetcher = CachedFetcher::new(origin, store.clone(), config.freshness());
    let proxy = CloakProxy::new(fetcher, config.preview.bot_signature.clone());

    Ok(App {
        router: server::build_router(Arc::new(proxy)),
        store,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_build_app_with_sqlite_backend() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.cache.dir = Some(dir.path().to_path_buf());

        let app = build_app(&config).unwrap();
        assert!(dir.path().join("cache.db").exists());

        let entry = CacheEntry {
            status: 200,
            headers: vec![],
            body: b"<html></html>".to_vec(),
            captured_at: chrono::Utc::now(),
        };
        app.store.store("k", "https://example.com", &entry).await.unwrap();
        let found = app.store.lookup("k").await.unwrap().unwrap();
        assert_eq!(found.body, entry.body);
        assert_eq!(
            found.captured_at.timestamp_millis(),
            entry.captured_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_build_app_with_memory_backend() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.cache.backend = CacheBackend::Memory;
        config.cache.dir = Some(dir.path().join("unused"));

        let app = build_app(&config).unwrap();

        assert!(!dir.path().join("unused").exists());
        assert_eq!(app.store.lookup("k").await.unwrap(), None);
    }

    #[test]
    fn test_build_app_rejects_invalid_config() {
        let mut config = Config::default();
        config.cache.backend = CacheBackend::Memory;
        config.preview.freshness_secs = 0;

        assert!(build_app(&config).is_err());
    }
}
