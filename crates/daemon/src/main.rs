//! Taskboard Daemon - Main Entry Point
//!
//! Wires the SQLite adapter into the recurrence scheduler and dependency
//! graph, runs the scheduling loop and serves the JSON-RPC trigger surface.

mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use settings::{DaemonConfig, LogFormat};
use taskboard_api_rpc::{RpcHandler, RpcServer};
use taskboard_core::application::{shutdown_channel, BoardLocks, DependencyGraph, RecurrenceScheduler};
use taskboard_core::port::id_provider::UuidProvider;
use taskboard_core::port::time_provider::SystemTimeProvider;
use taskboard_core::port::{ActivityRecorder, TimeProvider};
use taskboard_infra_sqlite::{create_pool, run_migrations, SqliteActivityRecorder, SqliteTaskRepository};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Install the global subscriber; the guard must outlive the process' logging
fn init_logging(config: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("taskboard=info"))
        .context("Failed to create env filter")?;

    let (otel, otel_warning) = telemetry::otel_layer();

    let (file_writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender =
                tracing_appender::rolling::daily(shellexpand::tilde(dir).as_ref(), "taskboardd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = match config.log_format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };
    let file_layer = file_writer.map(|writer| fmt::layer().json().with_writer(writer).with_ansi(false));

    tracing_subscriber::registry()
        .with(otel)
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    if let Some(message) = otel_warning {
        warn!("{}", message);
    }
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::load().context("Failed to load configuration")?;
    let _log_guard = init_logging(&config)?;

    info!(version = VERSION, "Taskboard daemon starting...");

    // 2. Database
    let database_url = config.database_url();
    if let Some(parent) = database_url
        .strip_prefix("sqlite://")
        .and_then(|path| Path::new(path).parent())
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    info!(database_url = %database_url, "Initializing database...");
    let pool = create_pool(&database_url)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Dependency wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let repo = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let activity: Arc<dyn ActivityRecorder> = Arc::new(SqliteActivityRecorder::new(
        pool.clone(),
        time_provider.clone(),
    ));
    let board_locks = Arc::new(BoardLocks::new());

    let scheduler = Arc::new(RecurrenceScheduler::new(
        repo.clone(),
        repo.clone(),
        activity.clone(),
        Arc::new(UuidProvider),
        time_provider.clone(),
        board_locks.clone(),
        config.scheduler(),
    ));
    let graph = Arc::new(DependencyGraph::new(repo, activity, board_locks));

    // 4. JSON-RPC server
    let handler = Arc::new(RpcHandler::new(
        scheduler.clone(),
        graph,
        time_provider.clone(),
    ));
    let (rpc_addr, rpc_handle) = RpcServer::new(config.rpc(), handler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 5. Scheduling loop
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let scheduler_handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    info!(rpc_addr = %rpc_addr, "System ready");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, scheduler_handle)
        .await
        .is_err()
    {
        error!("Scheduler did not stop within the shutdown timeout");
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
