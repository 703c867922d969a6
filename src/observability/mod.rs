//! # Observability Infrastructure
//!
//! Structured logging via the tracing ecosystem and Prometheus metrics for
//! the snapshot pipeline (group churn, version bumps, metadata rejections).

pub mod metrics;

pub use metrics::{init_metrics, SnapshotMetrics};

use crate::errors::{MeshplaneError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Observability settings, loaded alongside the snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive when `RUST_LOG` is unset, e.g. `info` or
    /// `meshplane=debug,info`.
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Expose a Prometheus scrape endpoint.
    pub enable_metrics: bool,

    /// Listen address for the Prometheus exporter.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            enable_metrics: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Safe to call once
/// per process; a second call fails because a global subscriber is already
/// installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| MeshplaneError::config(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logs {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    result.map_err(|e| MeshplaneError::config(format!("Failed to install subscriber: {}", e)))
}

/// Initialize logging and metrics together.
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_tracing(config)?;

    if config.enable_metrics {
        init_metrics(config)?;
    }

    tracing::info!(
        log_level = %config.log_level,
        json_logs = config.json_logs,
        metrics_enabled = config.enable_metrics,
        "Observability initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.enable_metrics);
    }

    #[test]
    fn init_tracing_rejects_bad_filter() {
        let config =
            ObservabilityConfig { log_level: "not==a==filter".to_string(), ..Default::default() };
        // Either the filter parse fails or a subscriber from another test is
        // already installed; both are errors here.
        assert!(init_tracing(&config).is_err());
    }
}
