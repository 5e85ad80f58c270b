//! Origin fetch client

use async_trait::async_trait;

use crate::classify::TargetRequest;
use crate::error::FetchError;

#[cfg(test)]
pub mod mock;
pub mod origin;

#[cfg(test)]
pub use mock::MockOrigin;
pub use origin::HttpOrigin;

/// Fetches a target from the real origin on the crawler's behalf.
///
/// Implementations make a single attempt: no retries, no fallbacks.
/// Non-2xx responses are errors.
#[async_trait]
pub trait OriginFetch: Send + Sync {
    async fn fetch(&self, target: &TargetRequest) -> Result<OriginResponse, FetchError>;
}

/// A successful origin response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}
