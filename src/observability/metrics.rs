//! # Metrics Collection
//!
//! Prometheus metrics for the snapshot pipeline.

use crate::errors::{MeshplaneError, Result};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use super::ObservabilityConfig;

/// Install the Prometheus recorder and scrape endpoint.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let address: SocketAddr = config
        .metrics_address
        .parse()
        .map_err(|e| MeshplaneError::config(format!("Invalid metrics address: {}", e)))?;

    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| MeshplaneError::config(format!("Failed to install metrics exporter: {}", e)))?;

    describe_counter!("meshplane_metadata_rejected_total", "Node metadata rejections by reason");
    describe_counter!("meshplane_snapshot_updates_total", "Snapshots published to the cache");
    describe_counter!(
        "meshplane_snapshot_versions_bumped_total",
        "Resource version bumps by resource type"
    );
    describe_gauge!("meshplane_groups", "Groups currently tracked by the snapshot updater");

    Ok(())
}

/// Domain-level metric hooks used throughout the pipeline. Cheap to clone;
/// all state lives in the global recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotMetrics;

impl SnapshotMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_metadata_rejected(&self, reason: &'static str) {
        counter!("meshplane_metadata_rejected_total", "reason" => reason).increment(1);
    }

    pub fn record_snapshot_update(&self) {
        counter!("meshplane_snapshot_updates_total").increment(1);
    }

    pub fn record_version_bump(&self, resource_type: &'static str) {
        counter!("meshplane_snapshot_versions_bumped_total", "type" => resource_type).increment(1);
    }

    pub fn update_group_count(&self, groups: usize) {
        gauge!("meshplane_groups").set(groups as f64);
    }
}
