//! Chronicle API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;

use chronicle_api::config::AppConfig;
use chronicle_api::error::AppError;
use chronicle_api::state::AppState;
use chronicle_api::{app, telemetry};
use chronicle_core::config::CLEANUP_LIMIT_KEY;
use chronicle_event_store::cleanup::{CleanupSettings, EventCleanupAgent};
use chronicle_event_store::dynamic_config::PgDynamicConfig;
use chronicle_event_store::pg_event_repository::{PgEventRepository, RepositorySettings};
use chronicle_event_store::schema::MIGRATOR;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Chronicle API server");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let event_repository = PgEventRepository::new(pool.clone()).with_settings(RepositorySettings {
        operation_timeout: config.operation_timeout,
        service_version: Some(env!("CARGO_PKG_VERSION").to_owned()),
    });
    let cleanup_agent = Arc::new(EventCleanupAgent::new(
        pool.clone(),
        Arc::new(PgDynamicConfig::new(pool.clone())),
        CleanupSettings {
            retention: config.retention,
            default_limit: config.cleanup_default_limit,
        },
    ));

    tracing::info!(
        interval_secs = config.cleanup_interval.as_secs(),
        retention_days = config.retention.num_days(),
        default_limit = config.cleanup_default_limit,
        limit_key = CLEANUP_LIMIT_KEY,
        "scheduling event cleanup"
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Arc::clone(&cleanup_agent).spawn(config.cleanup_interval, shutdown_rx);

    let app_state = AppState::new(pool, Arc::new(event_repository), cleanup_agent);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = scheduler.await {
        tracing::warn!(error = %err, "cleanup scheduler ended abnormally");
    }
    telemetry.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
