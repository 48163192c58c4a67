//! Store and controller construction, background loops and serving.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hashctl_control::{run_periodic, Controller, CycleTask, MemoryStore, RecordStore};
use hashctl_core::Config;
use hashctl_driver::HttpMinerDriver;
use hashctl_store::PgStore;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::fleet::FleetFile;
use crate::router::build_router;
use crate::state::AppState;

fn load_fleet(path: &Path) -> anyhow::Result<Vec<hashctl_control::Device>> {
    let devices = FleetFile::load(path)?.into_devices()?;
    info!(path = %path.display(), devices = devices.len(), "fleet file loaded");
    Ok(devices)
}

/// PostgreSQL when configured (seeded from `fleet` if given), otherwise an
/// in-memory store holding the fleet file's devices.
pub async fn build_store(config: &Config, fleet: Option<&Path>) -> anyhow::Result<Arc<dyn RecordStore>> {
    if config.postgres.is_configured() {
        let store = PgStore::connect(&config.postgres)
            .await
            .context("failed to open PostgreSQL store")?;
        if let Some(path) = fleet {
            store.import_devices(&load_fleet(path)?).await?;
        }
        return Ok(Arc::new(store));
    }

    let devices = match fleet {
        Some(path) => load_fleet(path)?,
        None => {
            warn!("no PostgreSQL and no fleet file configured, starting with an empty fleet");
            Vec::new()
        }
    };
    info!(devices = devices.len(), "using in-memory store");
    Ok(Arc::new(MemoryStore::with_devices(devices)))
}

pub fn build_controller(config: &Config, store: Arc<dyn RecordStore>) -> anyhow::Result<Arc<Controller>> {
    let driver = HttpMinerDriver::new(&config.driver).context("failed to build miner HTTP client")?;
    Ok(Arc::new(Controller::new(Arc::new(driver), store, config.control.clone())))
}

/// One sampling pass followed by one enforcement pass.
pub async fn run_once(controller: &Controller) -> anyhow::Result<()> {
    for task in [CycleTask::Sample, CycleTask::Enforce] {
        let report = task.run_once(controller).await?;
        println!("{task}: {}", serde_json::to_string(&report)?);
    }
    Ok(())
}

pub async fn import(config: &Config, path: &Path) -> anyhow::Result<()> {
    if !config.postgres.is_configured() {
        anyhow::bail!("PostgreSQL is not configured (set PG_USERNAME)");
    }
    let devices = load_fleet(path)?;
    let store = PgStore::connect(&config.postgres)
        .await
        .context("failed to open PostgreSQL store")?;
    let count = store.import_devices(&devices).await?;
    println!("imported {count} devices from {}", path.display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Serve the API and drive both control loops until interrupted.
pub async fn serve(config: &Config, controller: Arc<Controller>) -> anyhow::Result<()> {
    let shutdown = Arc::new(Notify::new());
    let loops = [
        (CycleTask::Sample, config.control.sample_period_secs),
        (CycleTask::Enforce, config.control.enforce_period_secs),
    ]
    .map(|(task, secs)| {
        tokio::spawn(run_periodic(
            controller.clone(),
            task,
            Duration::from_secs(secs),
            shutdown.clone(),
        ))
    });

    let state = Arc::new(AppState { controller });
    let app = build_router(state, &config.server.cors_origin);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.notify_waiters();
    for handle in loops {
        match handle.await {
            Ok(cycles) => info!(cycles, "control loop finished"),
            Err(e) => warn!(error = %e, "control loop aborted"),
        }
    }
    Ok(())
}
