mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn subresources_bypass_the_cache() -> Result<()> {
    let agent = common::TestAgent::start().await?;
    let client = common::TestAgent::client();

    // Cache the page, then fetch it without navigation semantics
    client
        .post(agent.url("/__prefetch/message"))
        .json(&json!({ "type": "PREFETCH_ADMIN_URL", "url": "/admin/sales/" }))
        .send()
        .await?;
    agent.wait_for_entries(1).await?;

    let res = client.get(agent.url("/admin/sales/")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-prefetch-cache").is_none());
    assert_eq!(res.headers().get("set-cookie").map(|v| v.to_str().unwrap()), Some("csrftoken=fresh"));
    assert_eq!(agent.upstream.hits("/admin/sales/"), 2);

    let res = client.get(agent.url("/static/admin/app.js")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").map(|v| v.to_str().unwrap()),
        Some("application/javascript")
    );
    assert_eq!(res.text().await?, "console.log('admin');");
    Ok(())
}

#[tokio::test]
async fn non_get_requests_are_forwarded_with_body() -> Result<()> {
    let agent = common::TestAgent::start().await?;
    let client = common::TestAgent::client();

    let res = client
        .post(agent.url("/admin/echo/"))
        .header("sec-fetch-mode", "navigate")
        .header("cookie", "sessionid=abc")
        .body("name=widget")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.text().await?, "name=widget");

    let seen = agent.upstream.requests();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, reqwest::Method::POST);
    assert_eq!(seen[0].cookie.as_deref(), Some("sessionid=abc"));
    assert_eq!(agent.stored_entries(), 0);
    Ok(())
}

#[tokio::test]
async fn unknown_pages_pass_through_upstream_status() -> Result<()> {
    let agent = common::TestAgent::start().await?;
    let client = common::TestAgent::client();

    let res = agent.navigate(&client, "/admin/missing/").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await?, "<h1>Not Found</h1>");
    Ok(())
}
