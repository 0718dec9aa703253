#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use reqwest::redirect::Policy;

pub const CACHE_NAME: &str = "test-v1";

/// One request as the fake admin backend saw it
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub path: String,
    pub prefetch: Option<String>,
    pub requested_with: Option<String>,
    pub cookie: Option<String>,
    pub accept_language: Option<String>,
    pub user_agent: Option<String>,
}

impl Seen {
    pub fn is_speculative(&self) -> bool {
        self.prefetch.is_some() && self.requested_with.as_deref() == Some("XMLHttpRequest")
    }
}

/// In-process stand-in for the admin backend
#[derive(Clone)]
pub struct MockUpstream {
    pub base_url: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl MockUpstream {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let upstream = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            seen: Arc::default(),
        };

        let app = Router::new().fallback(serve).with_state(upstream.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(upstream)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|s| s.path == path).count()
    }
}

async fn serve(State(upstream): State<MockUpstream>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    upstream.seen.lock().unwrap().push(Seen {
        method: method.clone(),
        path: uri.path().to_string(),
        prefetch: header("x-prefetch"),
        requested_with: header("x-requested-with"),
        cookie: header("cookie"),
        accept_language: header("accept-language"),
        user_agent: header("user-agent"),
    });

    let html = |status: StatusCode, body: &'static str| {
        (status, [(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response()
    };

    match (method, uri.path()) {
        (Method::GET, "/admin/") => html(StatusCode::OK, "<h1>Dashboard</h1>"),
        (Method::GET, "/admin/sales/") => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8"), (header::SET_COOKIE, "csrftoken=fresh")],
            "<h1>Sales</h1>",
        )
            .into_response(),
        (Method::GET, "/admin/reports/") => html(StatusCode::OK, "<h1>Reports</h1>"),
        (Method::GET, "/admin/broken/") => html(StatusCode::INTERNAL_SERVER_ERROR, "<h1>Server Error</h1>"),
        (Method::GET, "/admin/private/") => {
            (StatusCode::FOUND, [(header::LOCATION, "/admin/login/")], "").into_response()
        }
        (Method::GET, "/admin/login/") => html(StatusCode::OK, "<h1>Log in</h1>"),
        (Method::GET, "/admin/slow/") => {
            tokio::time::sleep(Duration::from_millis(400)).await;
            html(StatusCode::OK, "<h1>Slow</h1>")
        }
        (Method::GET, "/static/admin/app.js") => {
            ([(header::CONTENT_TYPE, "application/javascript")], "console.log('admin');").into_response()
        }
        (Method::POST, "/admin/echo/") => (StatusCode::CREATED, body).into_response(),
        _ => html(StatusCode::NOT_FOUND, "<h1>Not Found</h1>"),
    }
}

/// The agent binary running in front of a [`MockUpstream`]
pub struct TestAgent {
    pub base_url: String,
    pub upstream: MockUpstream,
    pub cache_dir: PathBuf,
    child: Child,
}

impl TestAgent {
    pub async fn start() -> Result<Self> {
        let upstream = MockUpstream::start().await?;
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let cache_dir = std::env::temp_dir().join(format!("admin-prefetch-it-{}", uuid::Uuid::new_v4().simple()));

        let child = Command::new(env!("CARGO_BIN_EXE_admin-prefetch"))
            .env("APP_ENV", "development")
            .env("PREFETCH_PORT", port.to_string())
            .env("PREFETCH_UPSTREAM_URL", &upstream.base_url)
            .env("PREFETCH_CACHE_DIR", &cache_dir)
            .env("PREFETCH_CACHE_NAME", CACHE_NAME)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn agent binary")?;

        let agent = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            upstream,
            cache_dir,
            child,
        };
        agent.wait_ready(Duration::from_secs(10)).await?;
        Ok(agent)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(self.url("/__prefetch/health")).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("agent did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Number of responses committed to the persistent cache
    pub fn stored_entries(&self) -> usize {
        std::fs::read_dir(self.cache_dir.join(CACHE_NAME))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
                    .count()
            })
            .unwrap_or(0)
    }

    pub async fn wait_for_entries(&self, expected: usize) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.stored_entries() >= expected {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        anyhow::bail!("cache never reached {} entries (has {})", expected, self.stored_entries())
    }

    /// A browser-like client: no redirect following, navigations marked
    pub fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .expect("failed to build client")
    }

    pub fn navigate(&self, client: &reqwest::Client, path: &str) -> reqwest::RequestBuilder {
        client.get(self.url(path)).header("sec-fetch-mode", "navigate")
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.cache_dir);
    }
}
