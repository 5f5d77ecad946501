use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use persistence::repositories::HistoryRepository;
use site_console_api::{
    app,
    config::Config,
    jobs::{JobScheduler, PoolMetricsJob, RetentionJob},
    middleware,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics().context("Failed to install metrics recorder")?;

    info!("Starting Site Console API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database.pool_config())
        .await
        .context("Failed to connect to database")?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let history = HistoryRepository::new(pool.clone());
    for table in &config.history.tracked_tables {
        match history.enable_table_tracking(table).await {
            Ok(true) => info!(table = %table, "Change tracking installed"),
            Ok(false) => {}
            Err(e) => warn!(table = %table, error = %e, "Could not enable change tracking"),
        }
    }

    let mut scheduler = JobScheduler::new();
    scheduler.register(PoolMetricsJob::new(pool.clone()));
    if config.history.prune_enabled {
        scheduler.register(RetentionJob::new(
            pool.clone(),
            config.history.retention_days,
            config.history.audit_retention_days,
        ));
    }
    scheduler.start();

    let addr = config.socket_addr()?;
    let app = app::create_app(config, pool);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
