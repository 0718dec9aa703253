use clap::Args;
use reqwest::header::COOKIE;
use serde_json::json;

use crate::agent::AgentMessage;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Args)]
pub struct SendArgs {
    #[arg(help = "URL to prefetch, absolute or relative to the agent's upstream")]
    pub url: String,

    #[arg(long, help = "Agent base URL (defaults to http://127.0.0.1:<configured port>)")]
    pub agent: Option<String>,

    #[arg(long, help = "Cookie header forwarded as the prefetch credentials")]
    pub cookie: Option<String>,
}

pub async fn handle(args: SendArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let base = args
        .agent
        .unwrap_or_else(|| format!("http://127.0.0.1:{}", config::config().server.port));
    let endpoint = format!("{}/__prefetch/message", base.trim_end_matches('/'));

    let mut request = reqwest::Client::new()
        .post(&endpoint)
        .json(&AgentMessage::prefetch(args.url.clone()));
    if let Some(cookie) = &args.cookie {
        request = request.header(COOKIE, cookie);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let error = body.get("error").and_then(|e| e.as_str()).unwrap_or("unknown error");
        anyhow::bail!("Agent rejected message ({}): {}", status, error);
    }

    output_success(
        &output_format,
        &format!("Queued prefetch of {}", args.url),
        Some(json!({ "url": args.url, "agent": base })),
    )
}
