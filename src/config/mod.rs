use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub prediction: PredictionConfig,
    pub prefetch: PrefetchConfig,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Matching edges must strictly exceed this count before predicting
    pub min_samples: usize,
    /// Confidence must strictly exceed this fraction
    pub threshold: f64,
    /// Navigation log capacity, 0 for unbounded
    pub max_log_edges: usize,
    pub admin_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchConfig {
    pub interval_secs: u64,
    pub debounce_ms: u64,
    pub content_prefetch: bool,
    pub link_hints: bool,
    pub forward_to_agent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub cache_name: String,
    pub reap_on_install: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub upstream_url: String,
}

impl PrefetchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Prediction overrides
        if let Ok(v) = env::var("PREFETCH_MIN_SAMPLES") {
            self.prediction.min_samples = v.parse().unwrap_or(self.prediction.min_samples);
        }
        if let Ok(v) = env::var("PREFETCH_THRESHOLD") {
            self.prediction.threshold = v.parse().unwrap_or(self.prediction.threshold);
        }
        if let Ok(v) = env::var("PREFETCH_MAX_LOG_EDGES") {
            self.prediction.max_log_edges = v.parse().unwrap_or(self.prediction.max_log_edges);
        }
        if let Ok(v) = env::var("PREFETCH_ADMIN_PREFIX") {
            self.prediction.admin_prefix = v;
        }

        // Prefetch overrides
        if let Ok(v) = env::var("PREFETCH_INTERVAL_SECS") {
            self.prefetch.interval_secs = v.parse().unwrap_or(self.prefetch.interval_secs);
        }
        if let Ok(v) = env::var("PREFETCH_DEBOUNCE_MS") {
            self.prefetch.debounce_ms = v.parse().unwrap_or(self.prefetch.debounce_ms);
        }
        if let Ok(v) = env::var("PREFETCH_CONTENT") {
            self.prefetch.content_prefetch = v.parse().unwrap_or(self.prefetch.content_prefetch);
        }
        if let Ok(v) = env::var("PREFETCH_LINK_HINTS") {
            self.prefetch.link_hints = v.parse().unwrap_or(self.prefetch.link_hints);
        }
        if let Ok(v) = env::var("PREFETCH_FORWARD_TO_AGENT") {
            self.prefetch.forward_to_agent = v.parse().unwrap_or(self.prefetch.forward_to_agent);
        }

        // Fetch overrides
        if let Ok(v) = env::var("PREFETCH_TIMEOUT_MS") {
            self.fetch.timeout_ms = v.parse().unwrap_or(self.fetch.timeout_ms);
        }
        if let Ok(v) = env::var("PREFETCH_USER_AGENT") {
            self.fetch.user_agent = v;
        }

        // Cache overrides
        if let Ok(v) = env::var("PREFETCH_CACHE_DIR") {
            self.cache.cache_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("PREFETCH_CACHE_NAME") {
            self.cache.cache_name = v;
        }
        if let Ok(v) = env::var("PREFETCH_REAP_ON_INSTALL") {
            self.cache.reap_on_install = v.parse().unwrap_or(self.cache.reap_on_install);
        }

        // Server overrides
        if let Some(port) = env::var("PREFETCH_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("PREFETCH_UPSTREAM_URL") {
            self.server.upstream_url = v;
        }

        self
    }

    fn base() -> Self {
        Self {
            environment: Environment::Development,
            prediction: PredictionConfig {
                min_samples: 3,
                threshold: 0.7,
                max_log_edges: 1000,
                admin_prefix: "/admin/".to_string(),
            },
            prefetch: PrefetchConfig {
                interval_secs: 30,
                debounce_ms: 1000,
                content_prefetch: true,
                link_hints: true,
                forward_to_agent: false,
            },
            fetch: FetchConfig {
                timeout_ms: 3000,
                user_agent: format!("admin-prefetch/{}", env!("CARGO_PKG_VERSION")),
            },
            cache: CacheConfig {
                cache_dir: default_cache_dir(),
                cache_name: "django-admin-prefetch-v1".to_string(),
                reap_on_install: false,
            },
            server: ServerConfig {
                port: 3000,
                upstream_url: "http://127.0.0.1:8000".to_string(),
            },
        }
    }

    pub fn development() -> Self {
        Self::base()
    }

    pub fn staging() -> Self {
        let mut config = Self::base();
        config.environment = Environment::Staging;
        config.prefetch.forward_to_agent = true;
        config.cache.reap_on_install = true;
        config
    }

    pub fn production() -> Self {
        let mut config = Self::base();
        config.environment = Environment::Production;
        config.prediction.max_log_edges = 500;
        config.prefetch.forward_to_agent = true;
        config.fetch.timeout_ms = 2000;
        config.cache.reap_on_install = true;
        config
    }
}

fn default_cache_dir() -> PathBuf {
    match env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".cache").join("admin-prefetch"),
        Err(_) => env::temp_dir().join("admin-prefetch"),
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
