//! Ingestion worker
//!
//! Long-running process: resumes paused import runs, starts imports for daily
//! vote winners, and drives the scheduled grant and maintenance jobs. On
//! Ctrl-C every live run is paused so the next start picks it up again.

use anyhow::{Context, Result};
use ingest_core::domains::import_runs::ImportOrchestrator;
use ingest_core::kernel::{start_scheduler, EventBus, IngestDeps};
use ingest_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ingest_core=info,ingest_server=info")),
        )
        .with_target(true)
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        parser_service = %config.parser_service_url,
        uploads_dir = %config.uploads_dir.display(),
        "Starting ingestion worker"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let bus = EventBus::new();
    let deps = IngestDeps::from_pool(pool.clone(), &config, bus.clone())?;
    let orchestrator = ImportOrchestrator::new(deps);
    orchestrator.register(&bus);

    match orchestrator.resume_paused().await {
        Ok(0) => {}
        Ok(resumed) => tracing::info!(resumed, "Resumed paused import runs"),
        Err(e) => tracing::error!("Failed to resume paused runs: {:#}", e),
    }

    let tasks = start_scheduler(pool.clone(), bus).await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutdown requested, pausing live imports");
    let paused = orchestrator.pause_all().await;
    orchestrator.wait_idle().await;
    tasks.stop().await;
    pool.close().await;

    tracing::info!(paused, "Ingestion worker stopped");
    Ok(())
}
