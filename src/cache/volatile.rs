use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::fetch::FetchedDocument;

/// A fetched document body held for instant navigation
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub content: String,
    pub fetched_at: DateTime<Utc>,
}

/// In-memory page cache keyed by path (plus query).
///
/// Only successful responses get in: [`VolatileCache::store`] refuses
/// anything outside 2xx.
#[derive(Debug, Default)]
pub struct VolatileCache {
    entries: HashMap<String, CacheEntry>,
}

impl VolatileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document under `key`. Returns false when the document is not
    /// a success response and nothing was stored.
    pub fn store(&mut self, key: impl Into<String>, document: &FetchedDocument) -> bool {
        if !document.is_success() {
            return false;
        }
        let key = key.into();
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                content: document.text(),
                fetched_at: document.fetched_at,
            },
        );
        true
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_success_bodies() {
        let mut cache = VolatileCache::new();
        let doc = FetchedDocument::new("http://localhost/admin/users/", 200, "<h1>Users</h1>");

        assert!(cache.store("/admin/users/", &doc));
        assert_eq!(cache.get("/admin/users/").map(|e| e.content.as_str()), Some("<h1>Users</h1>"));
    }

    #[test]
    fn refuses_error_bodies() {
        let mut cache = VolatileCache::new();
        let doc = FetchedDocument::new("http://localhost/admin/users/", 403, "Forbidden");

        assert!(!cache.store("/admin/users/", &doc));
        assert!(cache.is_empty());
    }

    #[test]
    fn store_overwrites_existing_key() {
        let mut cache = VolatileCache::new();
        cache.store("/admin/", &FetchedDocument::new("http://localhost/admin/", 200, "old"));
        cache.store("/admin/", &FetchedDocument::new("http://localhost/admin/", 200, "new"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("/admin/").map(|e| e.content.as_str()), Some("new"));
    }
}
