//! The loaded document a prefetch session works against.

use url::Url;

use crate::hints::DocumentHead;

/// Cache key for a URL: path plus query, fragment dropped.
pub fn cache_key(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// State of one loaded page: where it is, where it came from, what it shows.
#[derive(Debug, Clone)]
pub struct Page {
    location: Url,
    referrer: Option<Url>,
    body: String,
    history: Vec<Url>,
    head: DocumentHead,
}

impl Page {
    pub fn load(location: Url, referrer: Option<Url>, body: impl Into<String>) -> Self {
        Self {
            history: vec![location.clone()],
            location,
            referrer,
            body: body.into(),
            head: DocumentHead::new(),
        }
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Path component of the current location
    pub fn path(&self) -> &str {
        self.location.path()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn history(&self) -> &[Url] {
        &self.history
    }

    pub fn head(&self) -> &DocumentHead {
        &self.head
    }

    pub fn head_mut(&mut self) -> &mut DocumentHead {
        &mut self.head
    }

    /// Resolve an href against the current location. Cross-origin targets
    /// resolve to `None`.
    pub fn resolve(&self, href: &str) -> Option<Url> {
        let url = self.location.join(href).ok()?;
        (url.origin() == self.location.origin()).then_some(url)
    }

    /// Path of the referring document when it shares this page's origin
    pub fn referrer_path(&self) -> Option<String> {
        self.referrer
            .as_ref()
            .filter(|r| r.origin() == self.location.origin())
            .map(|r| r.path().to_string())
    }

    /// Swap the whole body for `body` and push `url` onto history without a
    /// reload. Nothing in the new body is executed.
    pub fn replace_document(&mut self, url: Url, body: String) {
        self.body = body;
        self.history.push(url.clone());
        self.location = url;
    }

    /// History traversal to an existing entry
    pub fn pop_to(&mut self, url: Url) {
        self.location = url;
    }
}
