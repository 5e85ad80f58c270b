//! HTTP front end
//!
//! Every path and method lands on one dispatcher; the proxy decides what to
//! do with it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::http::header::USER_AGENT;
use axum::response::{IntoResponse, Response};

use crate::cache::CacheStore;
use crate::client::OriginFetch;
use crate::proxy::{CloakProxy, ProxyRequest, ProxyResponse};

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, Body::from(self.body)).into_response()
    }
}

/// Build the router around a shared proxy
pub fn build_router<O: OriginFetch + 'static>(proxy: Arc<CloakProxy<O>>) -> Router {
    Router::new().fallback(dispatch::<O>).with_state(proxy)
}

async fn dispatch<O: OriginFetch + 'static>(
    State(proxy): State<Arc<CloakProxy<O>>>,
    request: Request<Body>,
) -> ProxyResponse {
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
    let (parts, _body) = request.into_parts();

    let request = ProxyRequest::new(parts.method, parts.uri, user_agent);
    proxy.handle(&request).await
}

/// Periodically drop entries past the store's retention
pub fn start_cleanup(store: Arc<dyn CacheStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(n) => log::info!("Purged {} expired cache entries", n),
                Err(e) => log::warn!("Cache purge failed: {}", e),
            }
        }
    })
}

/// Serve until Ctrl-C
pub async fn serve(router: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
