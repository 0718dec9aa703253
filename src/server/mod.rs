//! HTTP surface of the background agent.
//!
//! The agent runs as a reverse proxy in front of the admin backend. Browser
//! navigations pass through [`CacheAgent::intercept`]; everything else is
//! forwarded untouched. Pages post prefetch messages to
//! `POST /__prefetch/message`.

pub mod handlers;
pub mod proxy;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use url::Url;

use crate::agent::{AgentHandle, CacheAgent};
use crate::cache::CacheStorage;
use crate::config::AppConfig;
use crate::error::FetchError;
use crate::fetch::HttpFetcher;

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<CacheAgent>,
    pub messages: AgentHandle,
    pub upstream: Url,
    pub client: reqwest::Client,
}

impl AppState {
    /// Install the agent from configuration and start its message loop
    pub async fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        let upstream = Url::parse(&config.server.upstream_url)?;
        let fetcher = HttpFetcher::for_proxy(&config.fetch)?;
        let client = fetcher.client().clone();

        let storage = CacheStorage::new(config.cache.cache_dir.clone());
        let agent = Arc::new(
            CacheAgent::install(
                &storage,
                &config.cache.cache_name,
                config.cache.reap_on_install,
                Arc::new(fetcher),
            )
            .await,
        );

        Ok(Self::new(agent, upstream, client))
    }

    pub fn new(agent: Arc<CacheAgent>, upstream: Url, client: reqwest::Client) -> Self {
        let (messages, _task) = Arc::clone(&agent).spawn();
        Self {
            agent,
            messages,
            upstream,
            client,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/__prefetch/health", get(handlers::health))
        .route("/__prefetch/message", post(handlers::post_message))
        .fallback(proxy::proxy)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scratch_storage, ScriptedFetcher};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn state(with_cache: bool) -> AppState {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let agent = if with_cache {
            CacheAgent::install(&scratch_storage(), "v1", false, fetcher).await
        } else {
            CacheAgent::new(None, fetcher)
        };
        let upstream = Url::parse("http://backend.local/").unwrap();
        AppState::new(Arc::new(agent), upstream, reqwest::Client::new())
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_degraded_without_cache() {
        let app = router(state(false).await);
        let response = app
            .oneshot(Request::get("/__prefetch/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["status"], "degraded");
        assert_eq!(body["data"]["cache"], Value::Null);
    }

    #[tokio::test]
    async fn message_endpoint_validates_payload() {
        let app = router(state(true).await);

        let accepted = app
            .clone()
            .oneshot(
                Request::post("/__prefetch/message")
                    .body(Body::from(r#"{"type":"PREFETCH_ADMIN_URL","url":"/admin/"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::ACCEPTED);

        let rejected = app
            .clone()
            .oneshot(Request::post("/__prefetch/message").body(Body::from("[]")).unwrap())
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(rejected).await["code"], "INVALID_JSON");

        let foreign = app
            .oneshot(
                Request::post("/__prefetch/message")
                    .body(Body::from(r#"{"type":"PREFETCH_ADMIN_URL","url":"http://evil.example/admin/"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(foreign.status(), StatusCode::BAD_REQUEST);
    }
}
