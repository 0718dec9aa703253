//! Resource hints for hover-triggered link prefetching.
//!
//! Hovering an internal link inserts a `<link rel="prefetch">` into the
//! document head and leaves the actual caching to the browser.

use serde::Serialize;

use crate::navigation::is_internal_href;

/// A `<link rel="prefetch" as="document">` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceHint {
    pub rel: &'static str,
    pub href: String,
    #[serde(rename = "as")]
    pub destination: &'static str,
}

impl ResourceHint {
    pub fn prefetch_document(href: impl Into<String>) -> Self {
        Self {
            rel: "prefetch",
            href: href.into(),
            destination: "document",
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<link rel="{}" href="{}" as="{}">"#,
            self.rel,
            escape_attr(&self.href),
            self.destination
        )
    }
}

/// The part of a document head this crate writes to.
#[derive(Debug, Clone, Default)]
pub struct DocumentHead {
    hints: Vec<ResourceHint>,
}

impl DocumentHead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing hint for exactly this href
    pub fn find_link(&self, href: &str) -> Option<&ResourceHint> {
        self.hints.iter().find(|hint| hint.href == href)
    }

    /// Insert a prefetch hint unless one for `href` already exists.
    /// Returns whether a hint was added.
    pub fn prefetch_page(&mut self, href: &str) -> bool {
        if self.find_link(href).is_some() {
            return false;
        }
        self.hints.push(ResourceHint::prefetch_document(href));
        true
    }

    pub fn hints(&self) -> &[ResourceHint] {
        &self.hints
    }

    pub fn to_html(&self) -> String {
        self.hints
            .iter()
            .map(ResourceHint::to_html)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Hover over a link: hint internal hrefs, ignore everything else.
pub fn on_link_hover(head: &mut DocumentHead, href: &str) -> bool {
    if !is_internal_href(href) {
        return false;
    }
    let inserted = head.prefetch_page(href);
    if inserted {
        tracing::debug!("Added prefetch hint for {}", href);
    }
    inserted
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
