//! Builders for the four Envoy resource lists of a snapshot.

pub mod clusters;
pub mod endpoints;
pub mod listeners;
pub mod routes;

pub use clusters::ClusterFactory;
pub use endpoints::EndpointFactory;
pub use listeners::ListenerFactory;
pub use routes::RouteFactory;

use envoy_types::pb::envoy::config::core::v3::{
    config_source, AggregatedConfigSource, ApiVersion, ConfigSource,
};

/// Cluster serving the local application; defined in the proxy bootstrap,
/// referenced by ingress routes.
pub const LOCAL_SERVICE_CLUSTER: &str = "local_service";

pub const INGRESS_ROUTES_NAME: &str = "ingress_routes";
pub const EGRESS_ROUTES_NAME: &str = "default_routes";

/// ADS config source used by EDS clusters and RDS references.
pub(crate) fn ads_config_source() -> ConfigSource {
    ConfigSource {
        config_source_specifier: Some(config_source::ConfigSourceSpecifier::Ads(
            AggregatedConfigSource::default(),
        )),
        resource_api_version: ApiVersion::V3 as i32,
        ..Default::default()
    }
}
