//! SQLite-based cache storage with file blob support
//!
//! Stores small bodies inline in SQLite, large bodies (>64KB) as files.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::{CacheEntry, CacheStore, CacheTtl};
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

/// Bodies larger than this are stored as external blobs
const INLINE_THRESHOLD: usize = 64 * 1024; // 64KB

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed cache storage with file blob support.
///
/// Clones share one connection. The async `CacheStore` methods run the
/// blocking work on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    blobs_dir: PathBuf,
    retention: Duration,
}

impl SqliteStore {
    /// Open or create cache storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir, CacheTtl::RETENTION)
    }

    /// Get the default cache directory path (~/.cache/cardcloak on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("cardcloak"))
    }

    /// Open cache storage at a specific directory
    pub fn open_at(cache_dir: &Path, retention: Duration) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let blobs_dir = cache_dir.join("blobs");
        std::fs::create_dir_all(&blobs_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create blobs dir: {}", e)))?;

        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path, &blobs_dir)?;
            return Self::open_at(cache_dir, retention);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                data BLOB,
                blob_path TEXT,
                captured_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_expires_at ON cache_entries(expires_at);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            blobs_dir,
            retention,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Io("Cache connection lock poisoned".to_string()))
    }

    /// Get an entry if it is still within retention
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let now = Utc::now().timestamp_millis();
        let conn = self.conn()?;

        let row: Option<(u16, String, Option<Vec<u8>>, Option<String>, i64)> = conn
            .query_row(
                "SELECT status, headers, data, blob_path, captured_at FROM cache_entries
                 WHERE cache_key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, headers, data, blob_path, captured_at)) = row else {
            return Ok(None);
        };

        let body = match (data, blob_path) {
            (Some(data), None) => data,
            (None, Some(blob_path)) => {
                let full_path = self.blobs_dir.join(&blob_path);
                match std::fs::read(&full_path) {
                    Ok(data) => data,
                    Err(e) => {
                        log::warn!("Failed to read blob {}: {}", blob_path, e);
                        // Delete dangling entry
                        let _ = conn.execute("DELETE FROM cache_entries WHERE cache_key = ?1", [key]);
                        return Ok(None);
                    }
                }
            }
            _ => return Err(CacheError::Corrupt(format!("entry {} has no body", key))),
        };

        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
            .map_err(|e| CacheError::Corrupt(format!("headers for {}: {}", key, e)))?;
        let captured_at = DateTime::<Utc>::from_timestamp_millis(captured_at)
            .ok_or_else(|| CacheError::Corrupt(format!("timestamp for {}", key)))?;

        Ok(Some(CacheEntry {
            status,
            headers,
            body,
            captured_at,
        }))
    }

    /// Store an entry, replacing any previous one for the same key
    pub fn put(&self, key: &str, url: &str, entry: &CacheEntry) -> Result<()> {
        let captured = entry.captured_at.timestamp_millis();
        let expires = captured + self.retention.as_millis() as i64;
        let headers = serde_json::to_string(&entry.headers)
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;
        let size = entry.body.len();

        if size <= INLINE_THRESHOLD {
            let conn = self.conn()?;
            // Drop the blob left by an earlier large body under this key
            let old_blob: Option<String> = conn
                .query_row(
                    "SELECT blob_path FROM cache_entries WHERE cache_key = ?1",
                    [key],
                    |r| r.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();

            conn.execute(
                "INSERT OR REPLACE INTO cache_entries
                 (cache_key, url, status, headers, data, blob_path, captured_at, expires_at, size_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8)",
                params![
                    key,
                    url,
                    entry.status,
                    headers,
                    entry.body,
                    captured,
                    expires,
                    size
                ],
            )?;
            drop(conn);

            if let Some(blob_path) = old_blob {
                self.remove_blob(&blob_path);
            }
        } else {
            let blob_path = self.write_blob(key, &entry.body)?;
            self.conn()?.execute(
                "INSERT OR REPLACE INTO cache_entries
                 (cache_key, url, status, headers, data, blob_path, captured_at, expires_at, size_bytes)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8)",
                params![key, url, entry.status, headers, blob_path, captured, expires, size],
            )?;
        }
        Ok(())
    }

    /// Delete entries past retention, along with their blob files
    pub fn purge(&self) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let conn = self.conn()?;

        let blob_paths: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT blob_path FROM cache_entries
                 WHERE expires_at <= ?1 AND blob_path IS NOT NULL",
            )?;
            let rows = stmt.query_map([now], |r| r.get::<_, String>(0))?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        for blob_path in &blob_paths {
            self.remove_blob(blob_path);
        }

        let deleted = conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", [now])?;
        Ok(deleted)
    }

    /// Clear all cache entries
    pub fn clear_all(&self) -> Result<ClearStats> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;

        conn.execute("DELETE FROM cache_entries", [])?;

        // Clear blobs directory
        if self.blobs_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.blobs_dir) {
                log::warn!("Failed to clear blobs directory: {}", e);
            }
            std::fs::create_dir_all(&self.blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to recreate blobs dir: {}", e)))?;
        }

        Ok(ClearStats {
            entries_removed: count as usize,
        })
    }

    /// Get cache statistics. `freshness` splits retained entries into fresh and stale.
    pub fn stats(&self, freshness: Duration) -> Result<CacheStats> {
        let now = Utc::now().timestamp_millis();
        let fresh_after = now - freshness.as_millis() as i64;
        let conn = self.conn()?;

        let total_entries: i64 =
            conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;

        let retained_entries: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE expires_at > ?1",
            [now],
            |r| r.get(0),
        )?;

        let fresh_entries: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE expires_at > ?1 AND captured_at > ?2",
            params![now, fresh_after],
            |r| r.get(0),
        )?;

        let total_size: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM cache_entries",
            [],
            |r| r.get(0),
        )?;

        let (oldest, newest): (Option<i64>, Option<i64>) = conn.query_row(
            "SELECT MIN(captured_at), MAX(captured_at) FROM cache_entries WHERE expires_at > ?1",
            [now],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        Ok(CacheStats {
            total_entries: total_entries as usize,
            fresh_entries: fresh_entries as usize,
            stale_entries: (retained_entries - fresh_entries) as usize,
            expired_entries: (total_entries - retained_entries) as usize,
            total_size_bytes: total_size as usize,
            oldest_entry: oldest.and_then(DateTime::<Utc>::from_timestamp_millis),
            newest_entry: newest.and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }

    /// Write a blob file, sharded by first 2 chars of key
    fn write_blob(&self, key: &str, data: &[u8]) -> Result<String> {
        let shard = &key[..2.min(key.len())];
        let shard_dir = self.blobs_dir.join(shard);
        std::fs::create_dir_all(&shard_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create shard dir: {}", e)))?;

        let filename = format!("{}.body", key);
        let rel_path = format!("{}/{}", shard, filename);
        let full_path = shard_dir.join(&filename);

        std::fs::write(&full_path, data)
            .map_err(|e| CacheError::Io(format!("Failed to write blob: {}", e)))?;

        Ok(rel_path)
    }

    fn remove_blob(&self, blob_path: &str) {
        if let Err(e) = std::fs::remove_file(self.blobs_dir.join(blob_path)) {
            log::warn!("Failed to remove blob {}: {}", blob_path, e);
        }
    }

    /// Nuke the cache (delete DB and all blobs)
    fn nuke(db_path: &Path, blobs_dir: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        if blobs_dir.exists() {
            std::fs::remove_dir_all(blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to remove blobs dir: {}", e)))?;
        }
        Ok(())
    }
}

impl SqliteStore {
    /// Run `f` against a clone of this store on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn lookup(&self, key: &str) -> Result<Option<CacheEntry>> {
        let key = key.to_string();
        self.blocking(move |store| store.get(&key)).await
    }

    async fn store(&self, key: &str, url: &str, entry: &CacheEntry) -> Result<()> {
        let (key, url, entry) = (key.to_string(), url.to_string(), entry.clone());
        self.blocking(move |store| store.put(&key, &url, &entry)).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.blocking(|store| store.purge()).await
    }
}

/// Statistics about cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub entries_removed: usize,
}

/// Statistics about cache state
#[derive(Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
    pub expired_entries: usize,
    pub total_size_bytes: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_storage(retention: Duration) -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStore::open_at(dir.path(), retention).unwrap();
        (storage, dir)
    }

    fn entry(body: &[u8], age: chrono::Duration) -> CacheEntry {
        CacheEntry {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: body.to_vec(),
            captured_at: Utc::now() - age,
        }
    }

    #[test]
    fn test_put_get_inline() {
        let (storage, _dir) = test_storage(CacheTtl::RETENTION);
        let stored = entry(b"<html></html>", chrono::Duration::zero());

        storage.put("key1", "https://example.com", &stored).unwrap();

        let result = storage.get("key1").unwrap().unwrap();
        assert_eq!(result.body, stored.body);
        assert_eq!(result.headers, stored.headers);
        assert_eq!(result.status, 200);
        assert_eq!(
            result.captured_at.timestamp_millis(),
            stored.captured_at.timestamp_millis()
        );
    }

    #[test]
    fn test_put_get_blob() {
        let (storage, _dir) = test_storage(CacheTtl::RETENTION);
        let stored = entry(&vec![b'x'; 100_000], chrono::Duration::zero());

        storage.put("key2", "https://example.com", &stored).unwrap();

        let result = storage.get("key2").unwrap().unwrap();
        assert_eq!(result.body, stored.body);
    }

    #[test]
    fn test_binary_body_survives() {
        let (storage, _dir) = test_storage(CacheTtl::RETENTION);
        let stored = entry(&[0xff, 0x00, 0xfe], chrono::Duration::zero());

        storage.put("bin", "https://example.com", &stored).unwrap();

        assert_eq!(storage.get("bin").unwrap().unwrap().body, vec![0xff, 0x00, 0xfe]);
    }

    #[test]
    fn test_stale_entry_still_returned_within_retention() {
        let (storage, _dir) = test_storage(CacheTtl::RETENTION);
        let stored = entry(b"old", chrono::Duration::minutes(30));

        storage.put("stale", "https://example.com", &stored).unwrap();

        assert!(storage.get("stale").unwrap().is_some());
    }

    #[test]
    fn test_retention_expiry() {
        let (storage, _dir) = test_storage(Duration::from_secs(60));
        let stored = entry(b"data", chrono::Duration::minutes(2));

        storage.put("key3", "https://example.com", &stored).unwrap();

        assert_eq!(storage.get("key3").unwrap(), None);
    }

    #[test]
    fn test_put_overwrites() {
        let (storage, _dir) = test_storage(CacheTtl::RETENTION);
        storage
            .put("k", "https://example.com", &entry(b"first", chrono::Duration::zero()))
            .unwrap();
        storage
            .put("k", "https://example.com", &entry(b"second", chrono::Duration::zero()))
            .unwrap();

        assert_eq!(storage.get("k").unwrap().unwrap().body, b"second".to_vec());
    }

    #[test]
    fn test_purge_removes_only_expired() {
        let (storage, _dir) = test_storage(Duration::from_secs(60));
        storage
            .put("old", "https://a.example", &entry(b"a", chrono::Duration::minutes(5)))
            .unwrap();
        storage
            .put(
                "old-blob",
                "https://b.example",
                &entry(&vec![b'y'; 100_000], chrono::Duration::minutes(5)),
            )
            .unwrap();
        storage
            .put("new", "https://c.example", &entry(b"c", chrono::Duration::zero()))
            .unwrap();

        assert_eq!(storage.purge().unwrap(), 2);
        assert!(storage.get("new").unwrap().is_some());

        let stats = storage.stats(CacheTtl::FRESHNESS).unwrap();
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_clear_all() {
        let (storage, _dir) = test_storage(CacheTtl::RETENTION);

        storage
            .put("k1", "https://a.example", &entry(b"d1", chrono::Duration::zero()))
            .unwrap();
        storage
            .put("k2", "https://b.example", &entry(b"d2", chrono::Duration::zero()))
            .unwrap();

        let stats = storage.clear_all().unwrap();
        assert_eq!(stats.entries_removed, 2);

        assert!(storage.get("k1").unwrap().is_none());
        assert!(storage.get("k2").unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let (storage, _dir) = test_storage(CacheTtl::RETENTION);

        storage
            .put("k1", "https://a.example", &entry(b"data1", chrono::Duration::zero()))
            .unwrap();
        storage
            .put("k2", "https://b.example", &entry(b"data2", chrono::Duration::minutes(10)))
            .unwrap();

        let stats = storage.stats(CacheTtl::FRESHNESS).unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.fresh_entries, 1);
        assert_eq!(stats.stale_entries, 1);
        assert_eq!(stats.expired_entries, 0);
        assert_eq!(stats.total_size_bytes, 10);
        assert!(stats.oldest_entry < stats.newest_entry);
    }

    #[test]
    fn test_shrunk_body_removes_old_blob() {
        let (storage, dir) = test_storage(CacheTtl::RETENTION);
        let blob = dir.path().join("blobs").join("ab").join("abcd.body");

        let large = entry(&vec![b'x'; 100_000], chrono::Duration::zero());
        storage.put("abcd", "https://example.com", &large).unwrap();
        assert!(blob.exists());

        let small = entry(b"small body", chrono::Duration::zero());
        storage.put("abcd", "https://example.com", &small).unwrap();

        assert!(!blob.exists());
        assert_eq!(storage.get("abcd").unwrap().unwrap().body, b"small body".to_vec());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cache_store_runs_off_the_runtime() {
        let (storage, _dir) = test_storage(CacheTtl::RETENTION);
        let store: Arc<dyn CacheStore> = Arc::new(storage);
        let stored = entry(b"<html></html>", chrono::Duration::zero());

        store.store("k", "https://example.com", &stored).await.unwrap();

        let lookups: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.lookup("k").await })
            })
            .collect();
        for lookup in lookups {
            let found = lookup.await.unwrap().unwrap().unwrap();
            assert_eq!(found.body, stored.body);
        }

        assert_eq!(store.lookup("missing").await.unwrap(), None);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }
}
