//! Cache management commands

use cardcloak::cache::SqliteStore;
use cardcloak::config::Config;
use cardcloak::error::Result;

use super::{CacheArgs, OutputFormat};

/// Resolve config plus `--cache-dir` and open the SQLite store
fn open(args: &CacheArgs, config_path: Option<&str>) -> Result<(SqliteStore, Config)> {
    let mut config = Config::load(config_path)?;
    args.apply(&mut config);
    let dir = config.cache_dir()?;
    let store = SqliteStore::open_at(&dir, config.retention())?;
    Ok((store, config))
}

/// Show cache status/statistics
pub fn status(args: &CacheArgs, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let (store, config) = open(args, config_path)?;
    let stats = store.stats(config.freshness())?;
    let path = config.cache_dir()?.display().to_string();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "total_entries": stats.total_entries,
                "fresh_entries": stats.fresh_entries,
                "stale_entries": stats.stale_entries,
                "expired_entries": stats.expired_entries,
                "total_size_bytes": stats.total_size_bytes,
                "total_size_human": format_size(stats.total_size_bytes),
                "oldest_entry": stats.oldest_entry.map(|d| d.to_rfc3339()),
                "newest_entry": stats.newest_entry.map(|d| d.to_rfc3339()),
                "path": path,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Pretty => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            println!("Location:       {}", path);
            println!("Fresh entries:  {}", stats.fresh_entries);
            println!("Stale:          {}", stats.stale_entries);
            println!("Expired:        {}", stats.expired_entries);
            println!("Total size:     {}", format_size(stats.total_size_bytes));

            if let Some(oldest) = stats.oldest_entry {
                println!(
                    "Oldest entry:   {}",
                    oldest.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
                );
            }

            if let Some(newest) = stats.newest_entry {
                println!(
                    "Newest entry:   {}",
                    newest.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}

/// Clear all cache entries
pub fn clear(args: &CacheArgs, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let (store, _) = open(args, config_path)?;
    let stats = store.clear_all()?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Pretty => {
            if stats.entries_removed > 0 {
                println!("Cleared {} cache entries", stats.entries_removed);
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Drop entries past retention
pub fn purge(args: &CacheArgs, config_path: Option<&str>) -> Result<()> {
    let (store, _) = open(args, config_path)?;
    let removed = store.purge()?;
    println!("Purged {} expired cache entries", removed);
    Ok(())
}

/// Show cache path
pub fn path(args: &CacheArgs, config_path: Option<&str>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    args.apply(&mut config);
    println!("{}", config.cache_dir()?.display());
    Ok(())
}

/// Format bytes as human-readable size
fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
