//! HTTP filter compilers and the ordered pipeline they compose into.
//!
//! Each compiler maps `(&Group, &GlobalSnapshot)` to an optional
//! [`HttpFilter`]; `None` omits the filter for that group. The pipeline fixes
//! the order: metadata-producing filters (client identity, authorization
//! header marker, JWT verification) run before authorization, which runs
//! before rate limiting, and the router is always last.

pub mod compression;
pub mod header_to_metadata;
pub mod jwt;
pub mod rate_limit;
pub mod rbac;

pub use rbac::RbacFilterFactory;

use envoy_types::pb::envoy::extensions::filters::http::router::v3::Router;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_filter, HttpFilter,
};
use envoy_types::pb::google::protobuf::Any;
use prost::Message;

use crate::config::SnapshotConfig;
use crate::errors::Result;
use crate::groups::Group;
use crate::topology::GlobalSnapshot;

pub const ROUTER_FILTER_NAME: &str = "envoy.filters.http.router";
pub const ROUTER_TYPE_URL: &str = "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router";
pub const HEADER_TO_METADATA_FILTER_NAME: &str = "envoy.filters.http.header_to_metadata";
pub const JWT_FILTER_NAME: &str = "envoy.filters.http.jwt_authn";
pub const RBAC_FILTER_NAME: &str = "envoy.filters.http.rbac";
pub const LOCAL_RATE_LIMIT_FILTER_NAME: &str = "envoy.filters.http.local_ratelimit";
pub const COMPRESSOR_FILTER_NAME: &str = "envoy.filters.http.compressor";

/// Pack a message into `Any` under the given type URL.
pub(crate) fn any_from_message<M: Message>(type_url: &str, message: &M) -> Any {
    Any { type_url: type_url.to_string(), value: message.encode_to_vec() }
}

/// Named HTTP filter with typed config.
pub(crate) fn http_filter(name: &str, config: Any) -> HttpFilter {
    HttpFilter {
        name: name.to_string(),
        config_type: Some(http_filter::ConfigType::TypedConfig(config)),
        ..Default::default()
    }
}

/// The terminal router filter.
pub fn router_filter() -> HttpFilter {
    http_filter(ROUTER_FILTER_NAME, any_from_message(ROUTER_TYPE_URL, &Router::default()))
}

/// Compiles the ordered ingress and egress filter chains for a group.
pub struct HttpFilterPipeline {
    header_to_metadata: header_to_metadata::HeaderToMetadataFilterFactory,
    jwt: jwt::JwtFilterFactory,
    rbac: RbacFilterFactory,
    rate_limit: rate_limit::RateLimitFilterFactory,
    compression: compression::CompressionFilterFactory,
}

impl HttpFilterPipeline {
    /// Fails when the configuration is internally inconsistent (boot-time
    /// configuration error), never per group.
    pub fn new(config: &SnapshotConfig) -> Result<Self> {
        Ok(Self {
            header_to_metadata: header_to_metadata::HeaderToMetadataFilterFactory::new(config),
            jwt: jwt::JwtFilterFactory::new(config),
            rbac: RbacFilterFactory::new(config)?,
            rate_limit: rate_limit::RateLimitFilterFactory::new(),
            compression: compression::CompressionFilterFactory::new(config),
        })
    }

    /// Ingress chain. Identity/JWT metadata producers come first so that the
    /// RBAC shadow logging and enforcement can consume their output; router
    /// is always last.
    pub fn ingress_filters(&self, group: &Group, snapshot: &GlobalSnapshot) -> Vec<HttpFilter> {
        let mut filters = Vec::new();
        filters.extend(self.header_to_metadata.ingress_filter(group));
        filters.extend(self.jwt.filter(group));
        filters.extend(self.rbac.filter(group, snapshot));
        filters.extend(self.rate_limit.filter(group));
        filters.extend(self.compression.filter());
        filters.push(router_filter());
        filters
    }

    /// Egress chain: service-tag routing metadata, then the router.
    pub fn egress_filters(&self, _group: &Group) -> Vec<HttpFilter> {
        let mut filters = Vec::new();
        filters.extend(self.header_to_metadata.egress_filter());
        filters.push(router_filter());
        filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::GroupKind;
    use crate::metadata::parser::struct_from_json;
    use crate::metadata::{CommunicationMode, NodeMetadata, ProxySettings};
    use serde_json::json;

    fn group_with_incoming(json: serde_json::Value) -> Group {
        let config = SnapshotConfig::default();
        let metadata = NodeMetadata::from_node_struct(&struct_from_json(json), &config)
            .unwrap_or_else(|e| panic!("metadata should parse: {e}"));
        Group {
            kind: GroupKind::Services,
            communication_mode: CommunicationMode::Ads,
            service_name: metadata.service_name.clone(),
            discovery_service_name: None,
            proxy_settings: metadata.proxy_settings,
            listeners_config: None,
        }
    }

    fn plain_group() -> Group {
        Group {
            kind: GroupKind::Services,
            communication_mode: CommunicationMode::Ads,
            service_name: "echo".to_string(),
            discovery_service_name: None,
            proxy_settings: ProxySettings::default(),
            listeners_config: None,
        }
    }

    #[test]
    fn router_is_always_last_on_both_chains() {
        let pipeline = HttpFilterPipeline::new(&SnapshotConfig::default())
            .unwrap_or_else(|e| panic!("pipeline should build: {e}"));
        let snapshot = GlobalSnapshot::new();
        let group = plain_group();

        let ingress = pipeline.ingress_filters(&group, &snapshot);
        assert_eq!(ingress.last().map(|f| f.name.as_str()), Some(ROUTER_FILTER_NAME));

        let egress = pipeline.egress_filters(&group);
        assert_eq!(egress.last().map(|f| f.name.as_str()), Some(ROUTER_FILTER_NAME));
    }

    #[test]
    fn metadata_producers_precede_rbac() {
        let pipeline = HttpFilterPipeline::new(&SnapshotConfig::default())
            .unwrap_or_else(|e| panic!("pipeline should build: {e}"));
        let group = group_with_incoming(json!({"service_name": "echo", "proxy_settings": {
            "incoming": {"endpoints": [{"path": "/orders", "clients": ["billing"]}]}
        }}));

        let ingress = pipeline.ingress_filters(&group, &GlobalSnapshot::new());
        let names: Vec<&str> = ingress.iter().map(|f| f.name.as_str()).collect();
        let header_position = names.iter().position(|n| *n == HEADER_TO_METADATA_FILTER_NAME);
        let rbac_position = names.iter().position(|n| *n == RBAC_FILTER_NAME);
        assert!(header_position.is_some());
        assert!(rbac_position.is_some());
        assert!(header_position < rbac_position);
    }

    #[test]
    fn open_group_gets_no_rbac_filter() {
        let pipeline = HttpFilterPipeline::new(&SnapshotConfig::default())
            .unwrap_or_else(|e| panic!("pipeline should build: {e}"));
        let ingress = pipeline.ingress_filters(&plain_group(), &GlobalSnapshot::new());
        assert!(!ingress.iter().any(|f| f.name == RBAC_FILTER_NAME));
    }
}
