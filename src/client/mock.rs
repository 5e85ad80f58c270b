//! Mock origin for testing
//!
//! Serves canned responses per URL and records every fetch so tests can
//! assert on how often the real origin would have been hit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{OriginFetch, OriginResponse};
use crate::classify::TargetRequest;
use crate::error::FetchError;

/// Mock origin client.
///
/// # Example
/// ```ignore
/// let origin = MockOrigin::new().with_html("https://example.com", "<html></html>");
/// let response = origin.fetch(&target).await?;
/// assert_eq!(origin.fetch_count().await, 1);
/// ```
#[derive(Default)]
pub struct MockOrigin {
    /// HTML bodies by URL
    pages: Arc<Mutex<HashMap<String, String>>>,
    /// Error to return (if any) - consumed on first use
    error: Arc<Mutex<Option<FetchError>>>,
    /// Every request received, in order
    captured_requests: Arc<Mutex<Vec<TargetRequest>>>,
}

impl MockOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`
    pub fn with_html(self, url: &str, html: &str) -> Self {
        if let Ok(mut pages) = self.pages.try_lock() {
            pages.insert(url.to_string(), html.to_string());
        }
        self
    }

    /// Fail the next fetch with `error`
    pub fn with_error(self, error: FetchError) -> Self {
        if let Ok(mut slot) = self.error.try_lock() {
            *slot = Some(error);
        }
        self
    }

    /// Replace the page served for `url`
    pub async fn set_html(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .await
            .insert(url.to_string(), html.to_string());
    }

    pub async fn fetch_count(&self) -> usize {
        self.captured_requests.lock().await.len()
    }

    pub async fn captured_requests(&self) -> Vec<TargetRequest> {
        self.captured_requests.lock().await.clone()
    }
}

#[async_trait]
impl OriginFetch for MockOrigin {
    async fn fetch(&self, target: &TargetRequest) -> Result<OriginResponse, FetchError> {
        self.captured_requests.lock().await.push(target.clone());

        if let Some(err) = self.error.lock().await.take() {
            return Err(err);
        }

        match self.pages.lock().await.get(&target.url) {
            Some(html) => Ok(OriginResponse {
                status: 200,
                headers: vec![("content-type".to_string(), "text/html".to_string())],
                body: html.as_bytes().to_vec(),
            }),
            None => Err(FetchError::Status(404)),
        }
    }
}
