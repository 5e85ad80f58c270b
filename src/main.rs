//! cardcloak CLI - run the cloaking proxy and manage its cache

use clap::Parser;

mod cli;

use cardcloak::error::Result;
use cli::{CacheCommands, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--debug`
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Serve(args) => cli::serve::run(&args, config).await,
        Commands::Encode { url, base } => cli::token::encode(&url, base.as_deref()),
        Commands::Decode { token } => cli::token::decode(&token),
        Commands::Cache(cmd) => match cmd {
            CacheCommands::Status { cache, format } => cli::cache::status(&cache, config, format),
            CacheCommands::Clear { cache, format } => cli::cache::clear(&cache, config, format),
            CacheCommands::Purge { cache } => cli::cache::purge(&cache, config),
            CacheCommands::Path { cache } => cli::cache::path(&cache, config),
        },
    }
}
