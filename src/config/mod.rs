//! # Configuration
//!
//! Static, operator-owned configuration for the control plane core. Loaded
//! once at startup from a YAML file with environment overrides; inconsistent
//! configuration fails startup immediately.

mod settings;

pub use settings::{
    CompressionConfig, EgressConfig, EnabledCommunicationModes, IncomingPermissionsConfig,
    IpFromServiceDiscoveryConfig, JwtFilterConfig, OAuthProviderConfig, OutgoingPermissionsConfig,
    PathMatchKind, RoutingConfig, SelectorMatchingConfig, ServiceTagsConfig, SnapshotConfig,
    SourceIpAuthenticationConfig, StatusEndpointConfig, StatusRoutesConfig,
    TlsAuthenticationConfig, SERVICE_NAME_TOKEN,
};

use crate::errors::Result;
use std::path::Path;

impl SnapshotConfig {
    /// Load configuration from a YAML file, with `MESHPLANE_*` environment
    /// variables taking precedence over file values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("MESHPLANE").separator("__"))
            .build()?;

        let snapshot_config: SnapshotConfig = settings.try_deserialize()?;
        snapshot_config.validate()?;
        Ok(snapshot_config)
    }

    /// Load configuration from environment variables only, falling back to
    /// defaults for everything unset.
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("MESHPLANE").separator("__"))
            .build()?;

        let snapshot_config: SnapshotConfig = settings.try_deserialize().unwrap_or_default();
        snapshot_config.validate()?;
        Ok(snapshot_config)
    }
}
