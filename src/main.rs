use std::sync::Arc;

use clap::Parser;
use meshplane::{
    config::SnapshotConfig,
    observability::{init_observability, ObservabilityConfig},
    server::{MemorySnapshotCache, SnapshotUpdater, StreamCallbacks},
    Result, APP_NAME, VERSION,
};
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "meshplane", version, about = "Permission-aware Envoy control plane core")]
struct Args {
    /// Path to the YAML configuration file; environment variables override
    /// file values, and everything falls back to defaults.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Expose a Prometheus scrape endpoint.
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let observability = ObservabilityConfig {
        json_logs: args.json_logs,
        enable_metrics: args.metrics,
        ..Default::default()
    };
    init_observability(&observability)?;

    info!(app_name = APP_NAME, version = VERSION, "Starting meshplane control plane core");

    let config = match &args.config {
        Some(path) => SnapshotConfig::from_file(path)?,
        None => SnapshotConfig::from_env()?,
    };

    let cache = Arc::new(MemorySnapshotCache::new());
    let (updater, handle) = SnapshotUpdater::new(&config, Arc::clone(&cache))?;
    let _callbacks = StreamCallbacks::new(config, handle);

    let worker = tokio::spawn(updater.run());

    // The discovery wire transport plugs into the callbacks and the cache;
    // until one is attached this process only runs the update worker.
    signal::ctrl_c().await.map_err(meshplane::MeshplaneError::from)?;
    info!("Shutdown signal received");
    worker.abort();
    Ok(())
}
