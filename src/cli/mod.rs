//! CLI command definitions

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cardcloak::config::{CacheBackend, Config};

pub mod args;
pub mod cache;
pub mod serve;
pub mod token;

pub use args::OutputFormat;

/// cardcloak - redirect people, show crawlers only the preview card
#[derive(Parser, Debug)]
#[command(name = "cardcloak")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Override config file location
    #[arg(long, global = true, env = "CARDCLOAK_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "CARDCLOAK_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the proxy server
    Serve(ServeArgs),

    /// Encode a URL into a proxy token
    Encode {
        /// Target URL
        url: String,

        /// Print a full link using this proxy base URL
        #[arg(long, env = "CARDCLOAK_BASE_URL", hide_env = true)]
        base: Option<String>,
    },

    /// Decode a proxy token back into its URL
    Decode {
        /// Token from a proxy link's `url` parameter
        token: String,
    },

    /// Manage the preview cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

/// Server options. Each overrides the config file.
#[derive(Debug, Clone, Args, Default)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "CARDCLOAK_BIND", hide_env = true)]
    pub bind: Option<IpAddr>,

    /// Port to listen on
    #[arg(long, short, env = "PORT", hide_env = true)]
    pub port: Option<u16>,

    /// User-Agent substring identifying the preview crawler
    #[arg(long, env = "CARDCLOAK_BOT_SIGNATURE", hide_env = true)]
    pub bot_signature: Option<String>,

    /// Seconds before a cached preview is re-fetched
    #[arg(long, env = "CARDCLOAK_FRESHNESS_SECS", hide_env = true)]
    pub freshness_secs: Option<u64>,

    /// Cache store backend
    #[arg(long, env = "CARDCLOAK_CACHE_BACKEND", hide_env = true)]
    pub cache_backend: Option<CacheBackend>,

    #[command(flatten)]
    pub cache: CacheArgs,
}

/// Cache location options shared by `serve` and `cache`
#[derive(Debug, Clone, Args, Default)]
pub struct CacheArgs {
    /// SQLite cache directory
    #[arg(long, env = "CARDCLOAK_CACHE_DIR", hide_env = true)]
    pub cache_dir: Option<PathBuf>,
}

/// Cache management commands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status {
        #[command(flatten)]
        cache: CacheArgs,

        /// Output format
        #[arg(long, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Remove every cache entry
    Clear {
        #[command(flatten)]
        cache: CacheArgs,

        /// Output format
        #[arg(long, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Remove entries past retention
    Purge {
        #[command(flatten)]
        cache: CacheArgs,
    },

    /// Print the cache directory
    Path {
        #[command(flatten)]
        cache: CacheArgs,
    },
}

impl ServeArgs {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.server.bind = bind.to_string();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(sig) = &self.bot_signature {
            config.preview.bot_signature = cardcloak::classify::BotSignature::new(sig.clone());
        }
        if let Some(secs) = self.freshness_secs {
            config.preview.freshness_secs = secs;
        }
        if let Some(backend) = self.cache_backend {
            config.cache.backend = backend;
        }
        self.cache.apply(config);
    }
}

impl CacheArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "cardcloak",
            "serve",
            "--port",
            "9001",
            "--bot-signature",
            "Slackbot",
            "--cache-backend",
            "memory",
        ])
        .unwrap();

        let Commands::Serve(args) = cli.command else {
            panic!("Expected serve command");
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.server.port, 9001);
        assert_eq!(config.preview.bot_signature.as_str(), "Slackbot");
        assert_eq!(config.cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn test_cli_rejects_bad_backend() {
        let result = Cli::try_parse_from(["cardcloak", "serve", "--cache-backend", "redis"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
