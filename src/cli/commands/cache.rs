use clap::Subcommand;
use serde_json::json;
use url::Url;

use crate::cache::{CacheStorage, PersistentCache};
use crate::cli::utils::{output_list, output_record, output_success};
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum CacheCommands {
    #[command(about = "List request URLs stored in the current cache")]
    List,

    #[command(about = "Show a stored response")]
    Show {
        #[arg(help = "Request URL, absolute or relative to the upstream")]
        url: String,

        #[arg(long, help = "Print the stored body as well")]
        body: bool,

        #[arg(long, help = "Cookie header the entry was stored under (omit for anonymous)")]
        cookie: Option<String>,
    },

    #[command(about = "Remove one stored response")]
    Delete {
        #[arg(help = "Request URL, absolute or relative to the upstream")]
        url: String,

        #[arg(long, help = "Cookie header the entry was stored under (omit for anonymous)")]
        cookie: Option<String>,
    },

    #[command(about = "Remove every response in the current cache")]
    Clear,

    #[command(about = "List cache names present on disk")]
    Names,

    #[command(about = "Delete every cache except the current one")]
    Reap,
}

pub async fn handle(cmd: CacheCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    let storage = CacheStorage::new(config.cache.cache_dir.clone());

    match cmd {
        CacheCommands::List => {
            let cache = storage.open(&config.cache.cache_name).await?;
            let keys = cache.keys().await?;
            output_list(&output_format, "keys", &keys, "Cache is empty")
        }
        CacheCommands::Show { url, body, cookie } => {
            let cache = storage.open(&config.cache.cache_name).await?;
            show(&cache, &resolve(&url)?, cookie.as_deref(), body, &output_format).await
        }
        CacheCommands::Delete { url, cookie } => {
            let cache = storage.open(&config.cache.cache_name).await?;
            let url = resolve(&url)?;
            if !cache.delete(&url, cookie.as_deref()).await? {
                anyhow::bail!("{} is not cached", url);
            }
            output_success(&output_format, &format!("Deleted {}", url), Some(json!({ "url": url })))
        }
        CacheCommands::Clear => {
            let cache = storage.open(&config.cache.cache_name).await?;
            let removed = cache.clear().await?;
            output_success(
                &output_format,
                &format!("Removed {} entries from {}", removed, cache.name()),
                Some(json!({ "removed": removed })),
            )
        }
        CacheCommands::Names => {
            let names = storage.names().await?;
            output_list(&output_format, "caches", &names, "No caches found")
        }
        CacheCommands::Reap => {
            let reaped = storage.reap_except(&config.cache.cache_name).await?;
            output_success(
                &output_format,
                &format!("Reaped {} caches", reaped.len()),
                Some(json!({ "reaped": reaped })),
            )
        }
    }
}

async fn show(
    cache: &PersistentCache,
    url: &str,
    cookie: Option<&str>,
    body: bool,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let Some(doc) = cache.match_url(url, cookie).await? else {
        anyhow::bail!("{} is not cached", url);
    };

    let mut record = json!({
        "url": doc.url,
        "status": doc.status,
        "fetched_at": doc.fetched_at,
        "bytes": doc.body.len(),
        "content_type": doc.header("content-type"),
    });
    if body {
        record["body"] = json!(doc.text());
    }
    output_record(output_format, &record)
}

/// Cache keys are absolute URLs; paths resolve against the upstream
fn resolve(url: &str) -> anyhow::Result<String> {
    if let Ok(absolute) = Url::parse(url) {
        return Ok(absolute.to_string());
    }
    let upstream = Url::parse(&config::config().server.upstream_url)?;
    Ok(upstream.join(url)?.to_string())
}
