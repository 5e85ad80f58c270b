//! Configuration management for cardcloak

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{CacheTtl, SqliteStore};
use crate::classify::BotSignature;
use crate::client::origin::{DEFAULT_MAX_BODY_BYTES, DEFAULT_RATE_LIMIT_PER_SECOND, DEFAULT_TIMEOUT};
use crate::error::{ConfigError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub origin: OriginConfig,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Crawler detection and freshness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// User-Agent substring identifying the crawler
    #[serde(default)]
    pub bot_signature: BotSignature,

    /// Seconds before a cached preview is re-fetched
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
}

fn default_freshness_secs() -> u64 {
    CacheTtl::FRESHNESS.as_secs()
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            bot_signature: BotSignature::default(),
            freshness_secs: default_freshness_secs(),
        }
    }
}

/// Which store backs the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Cache store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// SQLite cache directory (defaults to the XDG cache dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Seconds an entry is kept before the store drops it
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Seconds between purges of entries past retention
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

fn default_retention_secs() -> u64 {
    CacheTtl::RETENTION.as_secs()
}

fn default_purge_interval_secs() -> u64 {
    CacheTtl::PURGE_EVERY.as_secs()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            dir: None,
            retention_secs: default_retention_secs(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

/// Outbound fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: u32,

    /// Bytes read from an origin body before it is cut off
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT_PER_SECOND
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            rate_limit_per_second: default_rate_limit(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".cardcloak").join("config.yaml"))
    }

    /// Load from an explicit path, or from the default path if it exists.
    ///
    /// A missing default file means defaults; a missing explicit file is an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(PathBuf::from(p)),
            None => {
                let default = Self::default_path()?;
                if default.exists() {
                    Self::load_from(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.preview.bot_signature.as_str().is_empty() {
            return Err(ConfigError::Invalid("bot_signature must not be empty".to_string()).into());
        }
        if self.preview.freshness_secs == 0 {
            return Err(ConfigError::Invalid("freshness_secs must be positive".to_string()).into());
        }
        if self.origin.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()).into());
        }
        if self.origin.rate_limit_per_second == 0 {
            return Err(
                ConfigError::Invalid("rate_limit_per_second must be positive".to_string()).into(),
            );
        }
        if self.origin.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be positive".to_string()).into());
        }
        if self.cache.purge_interval_secs == 0 {
            return Err(
                ConfigError::Invalid("purge_interval_secs must be positive".to_string()).into(),
            );
        }
        Ok(())
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.preview.freshness_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.cache.retention_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.cache.purge_interval_secs)
    }

    pub fn origin_timeout(&self) -> Duration {
        Duration::from_secs(self.origin.timeout_secs)
    }

    pub fn origin_rate_limit(&self) -> Result<NonZeroU32> {
        NonZeroU32::new(self.origin.rate_limit_per_second).ok_or_else(|| {
            ConfigError::Invalid("rate_limit_per_second must be positive".to_string()).into()
        })
    }

    /// Configured cache directory, or the default one
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(SqliteStore::cache_dir()?),
        }
    }
}
