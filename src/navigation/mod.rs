//! Navigation tracking.
//!
//! Records `(from, to)` edges for every observed navigation into a bounded,
//! insertion-ordered log that the prediction engine reads.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One observed navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEdge {
    pub from: String,
    pub to: String,
}

impl NavigationEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Insertion-ordered navigation history.
///
/// With a non-zero capacity the log behaves as a ring buffer and evicts the
/// oldest edge first. A capacity of zero keeps every edge.
#[derive(Debug, Clone, Default)]
pub struct NavigationLog {
    edges: VecDeque<NavigationEdge>,
    capacity: usize,
}

impl NavigationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            edges: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn push(&mut self, edge: NavigationEdge) {
        if self.capacity > 0 && self.edges.len() == self.capacity {
            self.edges.pop_front();
        }
        self.edges.push_back(edge);
    }

    pub fn iter(&self) -> impl Iterator<Item = &NavigationEdge> {
        self.edges.iter()
    }

    /// Edges leaving `path`, oldest first
    pub fn outgoing<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a NavigationEdge> + 'a {
        self.edges.iter().filter(move |edge| edge.from == path)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl FromIterator<NavigationEdge> for NavigationLog {
    fn from_iter<I: IntoIterator<Item = NavigationEdge>>(iter: I) -> Self {
        let mut log = NavigationLog::unbounded();
        for edge in iter {
            log.push(edge);
        }
        log
    }
}

/// Which link hrefs are tracked and eligible for instant navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkScope {
    /// Only hrefs starting with the admin section prefix, e.g. `/admin/`
    AdminSection { prefix: String },
    /// Any href starting with `/` and not `#`
    Internal,
}

impl LinkScope {
    pub fn admin(prefix: impl Into<String>) -> Self {
        LinkScope::AdminSection { prefix: prefix.into() }
    }

    pub fn matches(&self, href: &str) -> bool {
        match self {
            LinkScope::AdminSection { prefix } => href.starts_with(prefix.as_str()),
            LinkScope::Internal => is_internal_href(href),
        }
    }
}

/// Same-origin link check used by hover hints and the `Internal` scope.
pub fn is_internal_href(href: &str) -> bool {
    href.starts_with('/') && !href.starts_with('#')
}

/// Appends edges to a [`NavigationLog`] from click and history events.
#[derive(Debug, Clone)]
pub struct NavigationTracker {
    scope: LinkScope,
}

impl NavigationTracker {
    pub fn new(scope: LinkScope) -> Self {
        Self { scope }
    }

    /// Capture-phase click on a link. Returns whether an edge was recorded.
    pub fn record_click(&self, log: &mut NavigationLog, current: &str, href: &str) -> bool {
        if !self.scope.matches(href) {
            return false;
        }
        log.push(NavigationEdge::new(current, href));
        true
    }

    /// History pop. Nothing is recorded when there is no referring path.
    pub fn record_pop_state(&self, log: &mut NavigationLog, referrer: Option<&str>, current: &str) -> bool {
        match referrer {
            Some(from) => {
                log.push(NavigationEdge::new(from, current));
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_evicts_oldest_edge() {
        let mut log = NavigationLog::new(3);
        for to in ["/admin/a/", "/admin/b/", "/admin/c/", "/admin/d/"] {
            log.push(NavigationEdge::new("/admin/", to));
        }

        let targets: Vec<&str> = log.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(targets, vec!["/admin/b/", "/admin/c/", "/admin/d/"]);
    }

    #[test]
    fn unbounded_log_keeps_duplicates() {
        let mut log = NavigationLog::unbounded();
        for _ in 0..2000 {
            log.push(NavigationEdge::new("/admin/", "/admin/users/"));
        }
        assert_eq!(log.len(), 2000);
    }

    #[test]
    fn admin_scope_filters_clicks() {
        let tracker = NavigationTracker::new(LinkScope::admin("/admin/"));
        let mut log = NavigationLog::unbounded();

        assert!(tracker.record_click(&mut log, "/admin/", "/admin/auth/user/"));
        assert!(!tracker.record_click(&mut log, "/admin/", "/accounts/logout/"));
        assert!(!tracker.record_click(&mut log, "/admin/", "https://example.com/admin/"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn internal_scope_rejects_fragments_and_external() {
        let scope = LinkScope::Internal;
        assert!(scope.matches("/reports/"));
        assert!(!scope.matches("#top"));
        assert!(!scope.matches("https://example.com/"));
        assert!(!scope.matches("mailto:ops@example.com"));
    }

    #[test]
    fn pop_state_needs_referrer() {
        let tracker = NavigationTracker::new(LinkScope::Internal);
        let mut log = NavigationLog::unbounded();

        assert!(!tracker.record_pop_state(&mut log, None, "/admin/"));
        assert!(tracker.record_pop_state(&mut log, Some("/admin/orders/"), "/admin/"));
        assert_eq!(log.iter().next(), Some(&NavigationEdge::new("/admin/orders/", "/admin/")));
    }
}
