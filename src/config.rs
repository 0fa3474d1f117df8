//! Engine and server configuration (environment variables + defaults).

use std::time::Duration;

/// Tunables injected into the search index and cart manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Deadline for one variant's search or suggestion query; a late variant contributes nothing.
    pub variant_timeout: Duration,
    /// Deadline for ledger writes on the search path.
    pub ledger_timeout: Duration,
    /// Terms at least this long (in characters) are counted as popular searches.
    pub popular_min_len: usize,
    pub suggestion_min_len: usize,
    pub suggestions_per_source: usize,
    pub suggestion_cap: usize,
    pub popular_limit: usize,
    pub history_limit: usize,
    /// Attempts at a cart mutation before a version conflict is surfaced.
    pub max_cart_retries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            variant_timeout: Duration::from_secs(2),
            ledger_timeout: Duration::from_secs(2),
            popular_min_len: 3,
            suggestion_min_len: 2,
            suggestions_per_source: 5,
            suggestion_cap: 10,
            popular_limit: 10,
            history_limit: 50,
            max_cart_retries: 16,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub catalog_seed: Option<String>,
    pub lookup_timeout: Duration,
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: u64| {
            Duration::from_millis(get(key).and_then(|v| v.parse().ok()).unwrap_or(default))
        };
        let engine = EngineConfig {
            variant_timeout: millis("SEARCH_VARIANT_TIMEOUT_MS", 2_000),
            ..EngineConfig::default()
        };
        Self {
            port: get("PORT").and_then(|v| v.parse().ok()).unwrap_or(8083),
            database_url: get("DATABASE_URL").filter(|v| !v.is_empty()),
            nats_url: get("NATS_URL").filter(|v| !v.is_empty()),
            catalog_seed: get("CATALOG_SEED").filter(|v| !v.is_empty()),
            lookup_timeout: millis("LOOKUP_TIMEOUT_MS", 5_000),
            engine,
        }
    }

    pub fn bind_addr(&self) -> String { format!("0.0.0.0:{}", self.port) }
}
