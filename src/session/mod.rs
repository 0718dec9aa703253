//! Prefetch session: everything that lives as long as one page load.
//!
//! A [`PrefetchSession`] owns the navigation log, the volatile cache and the
//! page. It is built when a page loads and dropped when it unloads. The
//! methods here are synchronous state transitions plus one inline async
//! prediction run; [`driver`] runs the same session as an event loop.

pub mod driver;

pub use driver::{spawn, PageEvent, SessionHandle, SessionSnapshot};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::agent::{AgentHandle, AgentMessage};
use crate::cache::VolatileCache;
use crate::config::AppConfig;
use crate::error::FetchError;
use crate::fetch::{fetch_success, DocumentFetcher, DocumentRequest, FetchedDocument, PrefetchOutcome};
use crate::hints;
use crate::navigation::{LinkScope, NavigationLog, NavigationTracker};
use crate::page::{cache_key, Page};
use crate::prediction::{PredictionEngine, PredictionResult};

/// Per-session switches and timings
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub scope: LinkScope,
    pub max_log_edges: usize,
    pub content_prefetch: bool,
    pub link_hints: bool,
    pub forward_to_agent: bool,
    pub interval: Duration,
    pub debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::development())
    }
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            scope: LinkScope::admin(config.prediction.admin_prefix.clone()),
            max_log_edges: config.prediction.max_log_edges,
            content_prefetch: config.prefetch.content_prefetch,
            link_hints: config.prefetch.link_hints,
            forward_to_agent: config.prefetch.forward_to_agent,
            interval: config.prefetch.interval(),
            debounce: config.prefetch.debounce(),
        }
    }
}

/// What happened to a click on a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    /// Served from the volatile cache; default navigation cancelled
    Instant { url: String },
    /// Default navigation goes ahead over the network
    Proceed { tracked: bool },
}

/// A speculative fetch that is ready to be issued
#[derive(Debug, Clone)]
pub struct PlannedPrefetch {
    pub key: String,
    pub request: DocumentRequest,
}

pub struct PrefetchSession {
    page: Page,
    log: NavigationLog,
    tracker: NavigationTracker,
    engine: PredictionEngine,
    volatile: VolatileCache,
    fetcher: Arc<dyn DocumentFetcher>,
    agent: Option<AgentHandle>,
    credentials: Option<String>,
    options: SessionOptions,
}

impl PrefetchSession {
    pub fn new(
        page: Page,
        options: SessionOptions,
        engine: PredictionEngine,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        info!("Prefetch session started at {}", page.location());
        Self {
            log: NavigationLog::new(options.max_log_edges),
            tracker: NavigationTracker::new(options.scope.clone()),
            page,
            engine,
            volatile: VolatileCache::new(),
            fetcher,
            agent: None,
            credentials: None,
            options,
        }
    }

    /// Forward predicted targets to a background agent
    pub fn with_agent(mut self, agent: AgentHandle) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Cookie header attached to speculative requests
    pub fn with_credentials(mut self, cookie: impl Into<String>) -> Self {
        self.credentials = Some(cookie.into());
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn log(&self) -> &NavigationLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut NavigationLog {
        &mut self.log
    }

    pub fn volatile(&self) -> &VolatileCache {
        &self.volatile
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn fetcher(&self) -> Arc<dyn DocumentFetcher> {
        Arc::clone(&self.fetcher)
    }

    /// Capture-phase click on a link.
    ///
    /// The edge is recorded against the page the click happened on, then a
    /// volatile cache hit replaces the document in place.
    pub fn on_click(&mut self, href: &str) -> ClickOutcome {
        let current = self.page.path().to_string();
        let tracked = self.tracker.record_click(&mut self.log, &current, href);
        if !tracked {
            return ClickOutcome::Proceed { tracked };
        }

        let Some(url) = self.page.resolve(href) else {
            return ClickOutcome::Proceed { tracked };
        };
        let key = cache_key(&url);
        let Some(entry) = self.volatile.get(&key) else {
            return ClickOutcome::Proceed { tracked };
        };

        let body = entry.content.clone();
        info!("Instant navigation to {} from volatile cache", key);
        self.page.replace_document(url.clone(), body);
        ClickOutcome::Instant { url: url.to_string() }
    }

    /// Browser history pop to `location`
    pub fn on_pop_state(&mut self, location: &str) -> bool {
        let Some(url) = self.page.resolve(location) else {
            debug!("Ignoring pop to foreign location {}", location);
            return false;
        };
        self.page.pop_to(url);
        let referrer = self.page.referrer_path();
        let current = self.page.path().to_string();
        self.tracker.record_pop_state(&mut self.log, referrer.as_deref(), &current)
    }

    /// Pointer hover over a link. Returns whether a resource hint was added.
    pub fn on_hover(&mut self, href: &str) -> bool {
        if !self.options.link_hints {
            return false;
        }
        hints::on_link_hover(self.page.head_mut(), href)
    }

    pub fn predict(&self) -> PredictionResult {
        self.engine.predict(&self.log, self.page.path())
    }

    /// Decide whether a speculative fetch is due. `Err` carries the no-op
    /// outcome when it is not.
    pub fn plan_prefetch(&self) -> Result<PlannedPrefetch, PrefetchOutcome> {
        if !self.options.content_prefetch {
            return Err(PrefetchOutcome::Disabled);
        }

        let prediction = self.predict();
        let Some(target) = prediction.target else {
            return Err(PrefetchOutcome::NoPrediction);
        };

        let Some(url) = self.page.resolve(&target) else {
            return Err(PrefetchOutcome::discarded(target, "target is not same-origin"));
        };
        let key = cache_key(&url);
        if self.volatile.contains(&key) {
            return Err(PrefetchOutcome::AlreadyCached { key });
        }

        debug!("Predictively loading {} (confidence {:.2})", key, prediction.confidence);
        let request = DocumentRequest::speculative(url.to_string()).with_credentials(self.credentials.clone());
        Ok(PlannedPrefetch { key, request })
    }

    /// Tell the background agent about a planned fetch, when attached
    pub fn notify_agent(&self, planned: &PlannedPrefetch) {
        if !self.options.forward_to_agent {
            return;
        }
        if let Some(agent) = &self.agent {
            agent.post_message(AgentMessage::prefetch(planned.request.url.clone()), self.credentials.clone());
        }
    }

    /// Apply the result of a speculative fetch. Failures leave the cache
    /// untouched.
    pub fn complete_prefetch(&mut self, key: String, result: Result<FetchedDocument, FetchError>) -> PrefetchOutcome {
        match result {
            Ok(doc) if self.volatile.store(key.clone(), &doc) => PrefetchOutcome::Stored { key },
            Ok(doc) => PrefetchOutcome::discarded(key, format!("status {}", doc.status)),
            Err(e) => {
                debug!("Background fetch of {} failed silently: {}", key, e);
                PrefetchOutcome::discarded(key, e)
            }
        }
    }

    /// One prediction round, awaiting the fetch inline
    pub async fn run_prediction(&mut self) -> PrefetchOutcome {
        let planned = match self.plan_prefetch() {
            Ok(planned) => planned,
            Err(outcome) => return outcome,
        };
        self.notify_agent(&planned);

        let result = fetch_success(self.fetcher.as_ref(), &planned.request).await;
        self.complete_prefetch(planned.key, result)
    }

    /// Tear down on page unload. Everything volatile goes with it.
    pub fn unload(self) {
        info!(
            "Prefetch session at {} unloaded ({} edges, {} cached pages)",
            self.page.location(),
            self.log.len(),
            self.volatile.len()
        );
    }
}
