mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_reports_cache_and_upstream() -> Result<()> {
    let agent = common::TestAgent::start().await?;

    let res = reqwest::get(agent.url("/__prefetch/health")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true, "unexpected body: {}", body);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["cache"], common::CACHE_NAME);
    assert!(
        body["data"]["upstream"].as_str().unwrap_or_default().starts_with(&agent.upstream.base_url),
        "upstream missing: {}",
        body
    );

    // Health checks never reach the backend
    assert!(agent.upstream.requests().is_empty());
    Ok(())
}
