use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::CacheStorage;
use crate::error::FetchError;
use crate::fetch::{DocumentFetcher, DocumentRequest, FetchedDocument};

#[derive(Debug, Clone)]
enum Script {
    Respond { status: u16, body: String, delay: Option<Duration> },
    Fail,
}

/// Fetcher that answers from a per-URL script and records every request.
/// Unscripted URLs fail like an unreachable host.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<DocumentRequest>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.script(url, Script::Respond { status, body: body.to_string(), delay: None });
    }

    pub fn respond_after(&self, url: &str, delay: Duration, body: &str) {
        self.script(url, Script::Respond { status: 200, body: body.to_string(), delay: Some(delay) });
    }

    pub fn fail(&self, url: &str) {
        self.script(url, Script::Fail);
    }

    pub fn requests(&self) -> Vec<DocumentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| r.url == url).count()
    }

    fn script(&self, url: &str, script: Script) {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
    }
}

#[async_trait]
impl DocumentFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &DocumentRequest) -> Result<FetchedDocument, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.scripts.lock().unwrap().get(&request.url).cloned();

        match script {
            Some(Script::Respond { status, body, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(FetchedDocument::new(request.url.clone(), status, body)
                    .with_header("content-type", "text/html; charset=utf-8"))
            }
            Some(Script::Fail) | None => Err(FetchError::Network(format!("connection refused: {}", request.url))),
        }
    }
}

/// Cache storage rooted in a fresh temp directory
pub fn scratch_storage() -> CacheStorage {
    CacheStorage::new(std::env::temp_dir().join(format!("admin-prefetch-test-{}", Uuid::new_v4().simple())))
}
