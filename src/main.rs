//! Storefront Engine - catalog search and cart consistency service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_engine::cart::{CartStore, InMemoryCartStore};
use storefront_engine::catalog::memory::{in_memory_catalog, load_seed};
use storefront_engine::http::{router, AppState};
use storefront_engine::notify::{EventPublisher, NatsPublisher, NoopPublisher};
use storefront_engine::search::{InMemorySearchLedger, SearchLedger};
use storefront_engine::store::{PgCartStore, PgSearchLedger};
use storefront_engine::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let products = match &config.catalog_seed {
        Some(path) => load_seed(path).await?,
        None => Vec::new(),
    };
    tracing::info!(products = products.len(), "catalog loaded");
    let catalog = Arc::new(in_memory_catalog(products, config.lookup_timeout)?);

    let (carts, ledger): (Arc<dyn CartStore>, Arc<dyn SearchLedger>) = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            (Arc::new(PgCartStore::new(db.clone())), Arc::new(PgSearchLedger::new(db)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, carts and search stats live in memory");
            (Arc::new(InMemoryCartStore::new()), Arc::new(InMemorySearchLedger::new()))
        }
    };

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match NatsPublisher::connect(url, "storefront").await {
            Ok(nats) => Arc::new(nats),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events will not be published");
                Arc::new(NoopPublisher)
            }
        },
        None => Arc::new(NoopPublisher),
    };

    let state = AppState::new(catalog, carts, ledger, publisher, config.engine.clone());
    let app = router(state);

    let addr = config.bind_addr();
    tracing::info!("🚀 Storefront engine listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
