//! Food Shop - grocery catalog and shopping cart service

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use food_shop::fixtures::{self, CatalogFixture};
use food_shop::service::EventPublisher;
use food_shop::store::PgStore;
use food_shop::{api, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to the database")?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let store = Arc::new(PgStore::new(db));

    if let Some(path) = &config.catalog_fixture {
        let fixture = CatalogFixture::load(path).await?;
        fixtures::import(store.as_ref(), fixture).await?;
    }

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, %url, "NATS unavailable, cart events will not be published");
                None
            }
        },
        None => None,
    };

    let state = api::AppState::new(store, EventPublisher::new(nats), config.page_size);
    let app = api::router(state);

    let addr = config.listen_addr();
    tracing::info!("food-shop listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
