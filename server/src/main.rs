//! Backfeed Server - relays social responses to an owned site.

use backfeed_engine::SyncDriver;
use backfeed_server::config::Config;
use backfeed_server::db::{self, PgLedger, PoolSettings};
use backfeed_server::publisher::MicropubPublisher;
use backfeed_server::{app, scheduler, sources, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "backfeed_server=debug,backfeed_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        categories = %config.categories,
        "Starting Backfeed Server on {}:{}",
        config.host,
        config.port
    );

    // Open the ledger and run migrations
    let pool = db::connect_ledger(&PoolSettings::from_config(&config)).await?;

    // Wire the engine
    let source = sources::from_config(&config.source, config.http_timeout)?;
    let publisher = MicropubPublisher::new(
        config.micropub_endpoint.clone(),
        config.micropub_token.clone(),
        config.http_timeout,
    )?;
    let driver = Arc::new(SyncDriver::new(
        source,
        Arc::new(PgLedger::new(pool)),
        Arc::new(publisher),
        config.categories.clone(),
        config.sync_options(),
    ));

    if let Some(every) = config.poll_interval {
        tracing::info!(every_secs = every.as_secs(), "Starting internal scheduler");
        let _scheduler = scheduler::spawn(driver.clone(), every);
    }

    let state = AppState {
        driver,
        config: Arc::new(config.clone()),
    };

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
