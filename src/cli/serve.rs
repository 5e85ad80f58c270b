//! `serve` command

use std::net::{IpAddr, SocketAddr};

use cardcloak::config::Config;
use cardcloak::error::{ConfigError, Result};
use cardcloak::server;

use super::ServeArgs;

/// Load config, apply overrides, and run the proxy until shutdown
pub async fn run(args: &ServeArgs, config_path: Option<&str>) -> Result<()> {
    let mut config = Config::load(config_path)?;
    args.apply(&mut config);

    let ip: IpAddr = config
        .server
        .bind
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("bind address '{}': {}", config.server.bind, e)))?;
    let addr = SocketAddr::new(ip, config.server.port);

    let app = cardcloak::build_app(&config)?;
    let cleanup = server::start_cleanup(app.store.clone(), config.purge_interval());

    log::info!(
        "Serving previews to '{}', fresh for {}s",
        config.preview.bot_signature.as_str(),
        config.preview.freshness_secs
    );
    let result = server::serve(app.router, addr).await;
    cleanup.abort();

    Ok(result?)
}
