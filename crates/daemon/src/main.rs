//! Line Counter Daemon - Main Entry Point
//! Composition root: settings, logging, adapters, engine, RPC server

mod settings;

use anyhow::{anyhow, Context, Result};
use settings::{IoBackend, Settings};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use linecount_api_rpc::{RpcServer, RpcServerConfig};
use linecount_core::application::engine::constants::SHUTDOWN_TIMEOUT;
use linecount_core::application::{
    shutdown_channel, CountingEngine, EngineConfig, ResourceWatchdog, WatchdogConfig,
};
use linecount_core::port::time_provider::SystemTimeProvider;
use linecount_core::port::{LineIo, SessionStore};
use linecount_infra_sqlite::{create_pool, run_migrations, SqliteSessionStore};
use linecount_infra_system::{GpioConfig, SimulatedLine, SysfsGpio, SystemProbeImpl};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_FILE_PREFIX: &str = "linecount.log";
const WATCHDOG_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration (before logging, the log directory comes from it)
    let settings = Settings::load()?;

    // 2. Logging; the guard flushes the file writer on exit
    let _log_guard = init_logging(&settings)?;
    info!("Line Counter v{} starting...", VERSION);
    info!(
        database = %settings.database_url,
        io_backend = ?settings.io_backend,
        rpc_port = settings.rpc.port,
        "Configuration loaded"
    );

    // 3. Database
    if let Some(parent) = settings.database_file().as_deref().and_then(|p| p.parent()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }
    let pool = create_pool(&settings.database_url)
        .await
        .map_err(|e| anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow!("Migration failed: {}", e))?;
    let store = Arc::new(SqliteSessionStore::new(pool));

    // 4. Sessions left open by a previous run can no longer be finalized
    match store.deactivate_open_sessions().await {
        Ok(0) => {}
        Ok(count) => warn!(sessions = count, "Closed sessions left open by a previous run"),
        Err(e) => error!(error = %e, "Failed to close stale sessions"),
    }

    // 5. Line adapter
    let line: Arc<dyn LineIo> = match settings.io_backend {
        IoBackend::Gpio => {
            let gpio = SysfsGpio::open(GpioConfig {
                base_path: settings.gpio.base_path.clone().into(),
                counter_pin: settings.gpio.counter_pin,
                gate_pin: settings.gpio.gate_pin,
                ..Default::default()
            })
            .context("GPIO initialization failed")?;
            Arc::new(gpio)
        }
        IoBackend::Simulated => {
            info!(units_per_hour = settings.simulated_rate, "Using simulated line");
            Arc::new(SimulatedLine::new(settings.simulated_rate))
        }
    };

    // 6. Engine + background tasks
    let engine_config = EngineConfig {
        pause_schedule: settings.pause_schedule()?,
        ..Default::default()
    };
    let engine = CountingEngine::new(
        line,
        store.clone(),
        Arc::new(SystemTimeProvider),
        engine_config,
    );
    let tasks = engine.spawn_tasks();

    // 7. Resource watchdog (warn only)
    let (watchdog_tx, watchdog_token) = shutdown_channel();
    let watchdog = ResourceWatchdog::new(Arc::new(SystemProbeImpl::new()), WatchdogConfig::default());
    let watchdog_handle = tokio::spawn(watchdog.run(watchdog_token));

    // 8. JSON-RPC server
    let rpc_server = RpcServer::new(
        RpcServerConfig {
            host: settings.rpc.host.clone(),
            port: settings.rpc.port,
        },
        engine.clone(),
        store,
    );
    let (rpc_addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow!("RPC server start failed: {}", e))?;

    info!(rpc = %rpc_addr, "System ready");
    info!("Press Ctrl+C to shutdown");

    // 9. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 10. Graceful shutdown: no new commands, close the session, stop tasks
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    if let Err(e) = engine.stop_counting().await {
        error!(error = %e, "Failed to stop counting cleanly");
    }
    tasks.shutdown(SHUTDOWN_TIMEOUT).await;
    watchdog_tx.shutdown();
    if tokio::time::timeout(WATCHDOG_STOP_TIMEOUT, watchdog_handle)
        .await
        .is_err()
    {
        warn!("Resource watchdog did not stop in time");
    }

    info!("Shutdown complete.");
    Ok(())
}

/// Console layer (pretty or JSON via `LINECOUNT_LOG_FORMAT`) plus a daily-rolling file
fn init_logging(settings: &Settings) -> Result<WorkerGuard> {
    let log_format =
        std::env::var("LINECOUNT_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("linecount=info"))
        .context("Failed to create env filter")?;

    std::fs::create_dir_all(&settings.log_dir)
        .with_context(|| format!("Failed to create log directory {}", settings.log_dir))?;
    let file_appender = tracing_appender::rolling::daily(&settings.log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    build_subscriber(&log_format, env_filter, file_writer).init();
    Ok(guard)
}

fn build_subscriber(
    log_format: &str,
    env_filter: EnvFilter,
    file_writer: NonBlocking,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    let console = match log_format {
        // Production: JSON structured logging
        "json" => fmt::layer().json().boxed(),
        // Development: Pretty formatting with colors
        _ => fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(console)
}
