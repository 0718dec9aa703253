//! Background cache agent.
//!
//! A long-lived task that owns the persistent cache. It answers navigation
//! requests from the cache when it can and accepts fire-and-forget prefetch
//! messages from pages. Pages never share memory with it; they hold an
//! [`AgentHandle`] and post messages.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheStorage, PersistentCache};
use crate::error::FetchError;
use crate::fetch::{fetch_success, DocumentFetcher, DocumentRequest, FetchedDocument, PrefetchOutcome};

/// Messages pages can post to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentMessage {
    #[serde(rename = "PREFETCH_ADMIN_URL")]
    PrefetchAdminUrl { url: String },
}

impl AgentMessage {
    pub fn prefetch(url: impl Into<String>) -> Self {
        AgentMessage::PrefetchAdminUrl { url: url.into() }
    }
}

#[derive(Debug)]
struct Envelope {
    message: AgentMessage,
    credentials: Option<String>,
}

/// Where an intercepted navigation was answered from
#[derive(Debug)]
pub enum Intercepted {
    Cache(FetchedDocument),
    Network(FetchedDocument),
}

impl Intercepted {
    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Intercepted::Cache(_))
    }

    pub fn into_document(self) -> FetchedDocument {
        match self {
            Intercepted::Cache(doc) | Intercepted::Network(doc) => doc,
        }
    }
}

/// The agent itself. Without a cache it degrades to network-only.
pub struct CacheAgent {
    cache: Option<PersistentCache>,
    fetcher: Arc<dyn DocumentFetcher>,
}

impl CacheAgent {
    pub fn new(cache: Option<PersistentCache>, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self { cache, fetcher }
    }

    /// Open the named cache, optionally reaping caches from older versions.
    /// A store that cannot be opened is logged and the agent runs uncached.
    pub async fn install(
        storage: &CacheStorage,
        cache_name: &str,
        reap_others: bool,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        let cache = match storage.open(cache_name).await {
            Ok(cache) => {
                info!("Cache agent installed with cache {}", cache_name);
                Some(cache)
            }
            Err(e) => {
                warn!("Cache {} unavailable, serving from network only: {}", cache_name, e);
                None
            }
        };

        if reap_others && cache.is_some() {
            if let Err(e) = storage.reap_except(cache_name).await {
                warn!("Failed to reap old caches: {}", e);
            }
        }

        Self::new(cache, fetcher)
    }

    pub fn cache(&self) -> Option<&PersistentCache> {
        self.cache.as_ref()
    }

    /// Answer a navigation request: cache first, then the network.
    ///
    /// Only entries stored under the request's own cookies are served.
    /// Network responses are passed through untouched and are not cached.
    /// Only network failures are errors; a broken cache falls through.
    pub async fn intercept(&self, request: &DocumentRequest) -> Result<Intercepted, FetchError> {
        if let Some(cache) = &self.cache {
            match cache.match_url(&request.url, request.credentials.as_deref()).await {
                Ok(Some(doc)) => {
                    debug!("Serving {} from cache {}", request.url, cache.name());
                    return Ok(Intercepted::Cache(doc));
                }
                Ok(None) => {}
                Err(e) => warn!("Cache lookup for {} failed: {}", request.url, e),
            }
        }

        let doc = self.fetcher.fetch(request).await?;
        Ok(Intercepted::Network(doc))
    }

    /// Handle one message. Every failure ends as `Discarded`.
    pub async fn handle_message(&self, message: AgentMessage, credentials: Option<String>) -> PrefetchOutcome {
        match message {
            AgentMessage::PrefetchAdminUrl { url } => self.prefetch(url, credentials).await,
        }
    }

    async fn prefetch(&self, url: String, credentials: Option<String>) -> PrefetchOutcome {
        let Some(cache) = &self.cache else {
            return PrefetchOutcome::Disabled;
        };

        let request = DocumentRequest::speculative(url.clone()).with_credentials(credentials);
        let doc = match fetch_success(self.fetcher.as_ref(), &request).await {
            Ok(doc) => doc,
            Err(e) => {
                debug!("Agent prefetch of {} dropped: {}", url, e);
                return PrefetchOutcome::discarded(url, e);
            }
        };

        match cache.put(&url, request.credentials.as_deref(), &doc).await {
            Ok(true) => PrefetchOutcome::Stored { key: url },
            Ok(false) => PrefetchOutcome::discarded(url, format!("status {}", doc.status)),
            Err(e) => {
                warn!("Failed to store {} in cache {}: {}", url, cache.name(), e);
                PrefetchOutcome::discarded(url, e)
            }
        }
    }

    /// Run the message loop on its own task.
    ///
    /// Each message is handled on a separate task, so slow fetches do not
    /// hold up the queue. The loop ends when every handle is dropped.
    pub fn spawn(self: Arc<Self>) -> (AgentHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();

        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let agent = Arc::clone(&self);
                tokio::spawn(async move {
                    let outcome = agent.handle_message(envelope.message, envelope.credentials).await;
                    debug!(?outcome, "Agent message handled");
                });
            }
            debug!("Cache agent message loop stopped");
        });

        (AgentHandle { tx }, task)
    }
}

/// Sending side of the agent's queue. There are no replies.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl AgentHandle {
    pub fn post_message(&self, message: AgentMessage, credentials: Option<String>) {
        if self.tx.send(Envelope { message, credentials }).is_err() {
            debug!("Cache agent is gone, message dropped");
        }
    }
}
