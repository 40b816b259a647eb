//! Rendermill conversion worker service.
//!
//! Starts the process-wide dispatcher (bounded queue plus fixed worker
//! pool) and keeps it alive until shutdown. Conversion requests enter
//! through the embedding request layer, which hands sources and converters
//! to [`rendermill::fallback::FallbackController::run`].
//!
//! ## Configuration
//!
//! Environment variables:
//! - `WORKER_CONCURRENCY`: number of worker tasks (default: 4)
//! - `QUEUE_CAPACITY`: bounded queue depth (default: 32)
//! - `RENDER_CMD`: base command line for the local render CLI
//! - `CONVERSION_FALLBACK` / `RETRY_ON_TIMEOUT`: fallback policy
//! - `REMOTE_API_URL` / `REMOTE_API_KEY`: secondary conversion API
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP collector endpoint
//! - `RUST_LOG`: log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rendermill::config::Config;
use rendermill::queue::Dispatcher;
use rendermill::telemetry::{self, Metrics};
use rendermill::upload::NullUploader;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = telemetry::init_telemetry() {
        warn!("failed to initialize telemetry: {}", e);
    }

    info!("starting rendermill conversion worker service");

    let config = Config::from_env();
    info!(
        workers = config.worker_concurrency,
        queue_capacity = config.queue_capacity,
        fallback = config.conversion_fallback,
        render_cmd = %config.render_cmd,
        "configuration loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let dispatcher = Arc::new(Dispatcher::new(
        config.queue_capacity,
        config.worker_concurrency,
        Arc::new(NullUploader),
        metrics,
    ));

    let heartbeat_dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            telemetry::record_heartbeat(&heartbeat_dispatcher.stats());
        }
    });

    info!("worker service ready, press Ctrl+C to shutdown");
    signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    let stats = dispatcher.stats();
    info!(
        queued = stats.queued,
        active = stats.active,
        "received shutdown signal"
    );

    info!("worker service shutdown complete");
    Ok(())
}
