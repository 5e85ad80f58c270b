//! Request classification
//!
//! Picks one of three handling paths from the `url` parameter and the
//! caller's `User-Agent`.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::CodecError;

/// Default crawler signature
pub const DEFAULT_BOT_SIGNATURE: &str = "Twitterbot";

/// Substring identifying the link-preview crawler in a `User-Agent` header.
///
/// Matching is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotSignature(String);

impl BotSignature {
    pub fn new(signature: impl Into<String>) -> Self {
        Self(signature.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A missing header never matches.
    pub fn matches(&self, user_agent: Option<&str>) -> bool {
        user_agent.is_some_and(|ua| ua.contains(self.0.as_str()))
    }
}

impl Default for BotSignature {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_SIGNATURE)
    }
}

/// The request the proxy issues on the crawler's behalf.
///
/// Doubles as the cache key: two tokens resolving to the same URL and
/// identity share an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRequest {
    pub url: String,
    pub user_agent: Option<String>,
}

impl TargetRequest {
    pub fn new(url: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            url: url.into(),
            user_agent,
        }
    }

    /// Headers forwarded to the origin, as (lowercase name, value) pairs
    pub fn headers(&self) -> Vec<(&str, &str)> {
        match self.user_agent.as_deref() {
            Some(ua) => vec![("user-agent", ua)],
            None => vec![],
        }
    }
}

/// Handling path selected for an inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// No target supplied: serve the landing page
    Landing,
    /// Ordinary visitor: send them to the real target
    Redirect { location: String },
    /// Crawler: fetch the target and serve its card metadata
    Preview(TargetRequest),
}

/// Select the handling path.
///
/// An absent or empty token is the landing page. A token that fails to
/// decode is an error on both the redirect and preview paths.
pub fn classify(
    token: Option<&str>,
    user_agent: Option<&str>,
    signature: &BotSignature,
) -> Result<Route, CodecError> {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(Route::Landing),
    };

    let target = codec::decode(token)?;

    if signature.matches(user_agent) {
        Ok(Route::Preview(TargetRequest::new(
            target,
            user_agent.map(str::to_string),
        )))
    } else {
        Ok(Route::Redirect { location: target })
    }
}
