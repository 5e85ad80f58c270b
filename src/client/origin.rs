//! reqwest-backed origin client

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client as HttpClient;
use reqwest::header::USER_AGENT;

use super::{OriginFetch, OriginResponse};
use crate::classify::TargetRequest;
use crate::error::FetchError;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on outbound fetches
pub const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 10;

/// Default cap on bytes read from one origin body
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Origin client with a shared outbound rate limit.
///
/// Fetches wait for a permit instead of failing when the limit is hit.
/// Bodies are truncated at `max_body_bytes`; card tags live in the head.
pub struct HttpOrigin {
    http: HttpClient,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    max_body_bytes: usize,
}

impl HttpOrigin {
    pub fn new(timeout: Duration, per_second: NonZeroU32) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            http,
            rate_limiter,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Override the body size cap
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

#[async_trait]
impl OriginFetch for HttpOrigin {
    async fn fetch(&self, target: &TargetRequest) -> Result<OriginResponse, FetchError> {
        self.rate_limiter.until_ready().await;

        let mut request = self.http.get(&target.url);
        if let Some(ua) = &target.user_agent {
            request = request.header(USER_AGENT, ua);
        }

        log::debug!("Fetching origin {}", target.url);
        let mut response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                log::debug!("Truncated {} at {} bytes", target.url, self.max_body_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(OriginResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}
