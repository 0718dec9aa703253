use clap::Args;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;

use crate::agent::{AgentMessage, CacheAgent};
use crate::cache::CacheStorage;
use crate::cli::utils::output_record;
use crate::cli::OutputFormat;
use crate::config;
use crate::fetch::{HttpFetcher, PrefetchOutcome};

#[derive(Args)]
pub struct FetchArgs {
    #[arg(required = true, help = "Absolute URLs to prefetch")]
    pub urls: Vec<String>,

    #[arg(long, help = "Cookie header to send, e.g. 'sessionid=...'")]
    pub cookie: Option<String>,
}

/// Warm the persistent cache the same way the agent does for posted messages
pub async fn handle(args: FetchArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let fetcher = Arc::new(HttpFetcher::for_proxy(&config.fetch)?);
    let storage = CacheStorage::new(config.cache.cache_dir.clone());
    let agent = CacheAgent::install(&storage, &config.cache.cache_name, false, fetcher).await;
    if agent.cache().is_none() {
        anyhow::bail!("Cache {} could not be opened", config.cache.cache_name);
    }

    let outcomes = join_all(args.urls.iter().map(|url| {
        agent.handle_message(AgentMessage::prefetch(url.clone()), args.cookie.clone())
    }))
    .await;

    let stored = outcomes.iter().filter(|o| o.is_stored()).count();
    let report: Vec<_> = outcomes.iter().map(describe).collect();
    output_record(
        &output_format,
        &json!({
            "stored": stored,
            "requested": args.urls.len(),
            "outcomes": report,
        }),
    )?;

    if stored < args.urls.len() {
        anyhow::bail!("{} of {} URLs were not cached", args.urls.len() - stored, args.urls.len());
    }
    Ok(())
}

fn describe(outcome: &PrefetchOutcome) -> String {
    match outcome {
        PrefetchOutcome::Stored { key } => format!("stored {}", key),
        PrefetchOutcome::AlreadyCached { key } => format!("already cached {}", key),
        PrefetchOutcome::Discarded { key, reason } => format!("discarded {}: {}", key, reason),
        PrefetchOutcome::NoPrediction => "no prediction".to_string(),
        PrefetchOutcome::Disabled => "disabled".to_string(),
    }
}
