use tracing_subscriber::EnvFilter;

use admin_prefetch::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up PREFETCH_UPSTREAM_URL, PREFETCH_CACHE_DIR, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = admin_prefetch::config::config();
    tracing::info!("Starting prefetch agent in {:?} mode", config.environment);
    if config.cache.reap_on_install {
        tracing::info!("Reaping caches other than {}", config.cache.cache_name);
    }

    let state = AppState::from_config(config).await?;
    let app = server::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!(
        "Prefetch agent listening on http://{} in front of {}",
        bind_addr,
        config.server.upstream_url
    );

    axum::serve(listener, app).await?;
    Ok(())
}
