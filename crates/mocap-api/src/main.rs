//! Axum API server binary.
//!
//! Runs the HTTP server and the render job executor in one process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use mocap_media::{BlenderConfig, BlenderRenderer, RenderBackend};
use mocap_queue::{JobQueue, JobStore};
use mocap_worker::{JobExecutor, WorkerConfig};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mocap_api::{create_router, metrics, ApiConfig, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting mocap-api");

    if let Err(e) = run().await {
        error!("mocap-api failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    if config.api_token.is_empty() {
        anyhow::bail!("API_TOKEN must be set");
    }

    let store = JobStore::from_env().context("Failed to create job store")?;
    let queue = JobQueue::new();

    let worker_config = WorkerConfig {
        output_dir: config.output_dir.clone(),
        ..WorkerConfig::from_env()
    };
    let blender_config = BlenderConfig::from_env();
    info!(
        "Worker config: max_jobs={}, views={:?}, blender={}",
        worker_config.max_concurrent_jobs,
        blender_config.views,
        blender_config.blender_bin.display()
    );
    if let Err(e) = mocap_media::check_blender(&blender_config.blender_bin) {
        warn!("Renders will fail until Blender is available: {}", e);
    }
    if let Err(e) = mocap_media::check_ffmpeg(&blender_config.ffmpeg_bin) {
        warn!("Jobs with audio will fail until FFmpeg is available: {}", e);
    }

    // Tools still running when the shutdown grace period ends are killed.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let backend = BlenderRenderer::new(blender_config).with_cancel(cancel_rx);
    if backend.view_count() != worker_config.naming.expected_count() {
        warn!(
            "{} camera views configured but {} result names; every job will fail",
            backend.view_count(),
            worker_config.naming.expected_count()
        );
    }
    let executor = Arc::new(JobExecutor::new(
        worker_config,
        queue.clone(),
        store.clone(),
        Arc::new(backend),
    ));
    let executor_task = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run().await })
    };

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;
    let app = create_router(AppState::new(config, store, queue), metrics_handle);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    executor.shutdown();
    match executor_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Job executor stopped with error: {}", e),
        Err(e) => warn!("Job executor task failed: {}", e),
    }
    let _ = cancel_tx.send(true);

    Ok(())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
