//! Document fetching.
//!
//! [`DocumentFetcher`] is the seam between the prefetch machinery and the
//! network. [`HttpFetcher`] is the reqwest-backed implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::FetchError;

pub const REQUESTED_WITH_HEADER: &str = "x-requested-with";
pub const PREFETCH_HEADER: &str = "x-prefetch";

// Connection-scoped; never relayed in either direction
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether a request anticipates navigation or is a real one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Speculative,
    Navigation,
}

/// A GET request for a document.
#[derive(Debug, Clone)]
pub struct DocumentRequest {
    pub url: String,
    pub kind: RequestKind,
    /// Raw `Cookie` header to attach
    pub credentials: Option<String>,
    /// The browser's own request headers, relayed on navigations
    pub forwarded: HeaderMap,
}

impl DocumentRequest {
    pub fn speculative(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: RequestKind::Speculative,
            credentials: None,
            forwarded: HeaderMap::new(),
        }
    }

    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: RequestKind::Navigation,
            credentials: None,
            forwarded: HeaderMap::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<String>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Relay the caller's headers. `Cookie` travels as credentials instead.
    pub fn with_forwarded_headers(mut self, headers: HeaderMap) -> Self {
        self.forwarded = headers;
        self.forwarded.remove(COOKIE);
        self
    }

    pub fn is_speculative(&self) -> bool {
        self.kind == RequestKind::Speculative
    }

    /// Headers sent on the wire for this request
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if self.is_speculative() {
            headers.push((REQUESTED_WITH_HEADER, "XMLHttpRequest".to_string()));
            headers.push((PREFETCH_HEADER, "true".to_string()));
        }
        if let Some(cookie) = &self.credentials {
            headers.push(("cookie", cookie.clone()));
        }
        headers
    }
}

/// A complete HTTP response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedDocument {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedDocument {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reject non-2xx responses
    pub fn ensure_success(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                url: self.url,
                status: self.status,
            })
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Result of a speculative operation. Failures collapse into
/// [`PrefetchOutcome::Discarded`] instead of surfacing as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PrefetchOutcome {
    Stored { key: String },
    AlreadyCached { key: String },
    NoPrediction,
    Disabled,
    Discarded { key: String, reason: String },
}

impl PrefetchOutcome {
    pub fn discarded(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        PrefetchOutcome::Discarded {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, PrefetchOutcome::Stored { .. })
    }
}

/// Retrieves documents over the network.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch a document. Any HTTP status is returned as a document; only
    /// transport failures are errors.
    async fn fetch(&self, request: &DocumentRequest) -> Result<FetchedDocument, FetchError>;
}

/// Fetch and reject non-success statuses, the policy of every speculative path.
pub async fn fetch_success(
    fetcher: &dyn DocumentFetcher,
    request: &DocumentRequest,
) -> Result<FetchedDocument, FetchError> {
    fetcher.fetch(request).await?.ensure_success()
}

/// reqwest-backed fetcher with a cookie jar and a request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    /// Fetcher for the intercepting proxy: no shared cookie jar, since each
    /// request carries its caller's cookies, and redirects are handed back
    /// to the browser instead of followed.
    pub fn for_proxy(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn header_map(request: &DocumentRequest) -> HeaderMap {
        // Request-level headers win over the client's default User-Agent
        let mut map = request.forwarded.clone();
        for (name, value) in request.headers() {
            let Ok(value) = HeaderValue::from_str(&value) else {
                tracing::debug!("Dropping unrepresentable {} header", name);
                continue;
            };
            let name = if name == "cookie" { COOKIE } else { HeaderName::from_static(name) };
            map.insert(name, value);
        }
        map
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, request: &DocumentRequest) -> Result<FetchedDocument, FetchError> {
        let url = url::Url::parse(&request.url)?;
        let mut builder = self.client.get(url).headers(Self::header_map(request));

        // Real navigations are not bounded by the speculative timeout
        if request.is_speculative() {
            builder = builder.timeout(self.timeout);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(url = %final_url, status, bytes = body.len(), speculative = request.is_speculative(), "Fetched document");

        Ok(FetchedDocument {
            url: final_url,
            status,
            headers,
            body,
            fetched_at: Utc::now(),
        })
    }
}

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Whether a response header may be written to or replayed from a cache.
/// `Set-Cookie` belongs to the response that carried it.
pub fn storable_header(name: &str) -> bool {
    !is_hop_by_hop(name) && !name.eq_ignore_ascii_case("set-cookie")
}
