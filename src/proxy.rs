//! Request dispatch
//!
//! Transport-independent handling of one inbound request. The HTTP server
//! converts to and from these types; everything else happens here.

use axum::http::header::{ALLOW, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};

use crate::cache::CachedFetcher;
use crate::classify::{self, BotSignature, Route, TargetRequest};
use crate::client::OriginFetch;
use crate::error::CodecError;
use crate::preview;

/// Query parameter carrying the encoded target
pub const TARGET_PARAM: &str = "url";

/// Landing page served when no target is supplied
pub const LANDING_PAGE: &str = include_str!("landing.html");

const TEXT_HTML: &str = "text/html";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Read-only view of an inbound request
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub user_agent: Option<String>,
}

impl ProxyRequest {
    pub fn new(method: Method, uri: Uri, user_agent: Option<String>) -> Self {
        Self {
            method,
            uri,
            user_agent,
        }
    }

    /// Value of the first `url` query parameter, form-decoded
    pub fn target_token(&self) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == TARGET_PARAM)
            .map(|(_, v)| v.into_owned())
    }
}

/// Structured response: status, headers, body
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ProxyResponse {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    fn with_content_type(status: StatusCode, content_type: &'static str, body: impl Into<String>) -> Self {
        let mut response = Self::new(status, body);
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }

    fn html(body: impl Into<String>) -> Self {
        Self::with_content_type(StatusCode::OK, TEXT_HTML, body)
    }

    fn redirect(location: HeaderValue) -> Self {
        let mut response = Self::new(StatusCode::FOUND, "");
        response.headers.insert(LOCATION, location);
        response
    }

    fn method_not_allowed() -> Self {
        let mut response = Self::new(StatusCode::METHOD_NOT_ALLOWED, "");
        response
            .headers
            .insert(ALLOW, HeaderValue::from_static("GET"));
        response
    }

    fn bad_request(err: &CodecError) -> Self {
        Self::with_content_type(
            StatusCode::BAD_REQUEST,
            TEXT_PLAIN,
            format!("Invalid url parameter: {}", err),
        )
    }

    fn bad_gateway() -> Self {
        Self::with_content_type(StatusCode::BAD_GATEWAY, TEXT_PLAIN, "Failed to fetch preview")
    }

    /// Value of a header as text, if present
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The cloaking proxy: classifier, fetcher and synthesizer wired together
pub struct CloakProxy<O: OriginFetch> {
    fetcher: CachedFetcher<O>,
    signature: BotSignature,
}

impl<O: OriginFetch> CloakProxy<O> {
    pub fn new(fetcher: CachedFetcher<O>, signature: BotSignature) -> Self {
        Self { fetcher, signature }
    }

    pub fn fetcher(&self) -> &CachedFetcher<O> {
        &self.fetcher
    }

    /// Handle one request. Never fails: every error becomes a response.
    pub async fn handle(&self, request: &ProxyRequest) -> ProxyResponse {
        if request.method != Method::GET {
            log::debug!("{} {} -> 405", request.method, request.uri);
            return ProxyResponse::method_not_allowed();
        }

        let token = request.target_token();
        let route = match classify::classify(
            token.as_deref(),
            request.user_agent.as_deref(),
            &self.signature,
        ) {
            Ok(route) => route,
            Err(e) => {
                log::debug!("Rejecting {}: {}", request.uri, e);
                return ProxyResponse::bad_request(&e);
            }
        };

        match route {
            Route::Landing => ProxyResponse::html(LANDING_PAGE),
            Route::Redirect { location } => {
                log::debug!("Redirecting to {}", location);
                match HeaderValue::from_bytes(location.as_bytes()) {
                    Ok(value) => ProxyResponse::redirect(value),
                    Err(_) => ProxyResponse::bad_request(&CodecError::InvalidLocation),
                }
            }
            Route::Preview(target) => self.preview(&target).await,
        }
    }

    async fn preview(&self, target: &TargetRequest) -> ProxyResponse {
        log::debug!("Serving preview of {}", target.url);
        match self.fetcher.fetch(target).await {
            Ok(entry) => {
                let tags = preview::extract(&entry.text());
                log::debug!("Extracted {} card tags from {}", tags.len(), target.url);
                ProxyResponse::html(preview::synthesize(&tags))
            }
            Err(e) => {
                log::warn!("Preview fetch failed for {}: {}", target.url, e);
                ProxyResponse::bad_gateway()
            }
        }
    }
}
