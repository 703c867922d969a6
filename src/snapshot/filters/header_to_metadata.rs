//! Header-to-metadata filters.
//!
//! Two concerns share the filter type: on ingress, surfacing the declared
//! client identity and the `jwt-status` marker (present/missing authorization
//! header) into dynamic metadata for the authorization principals and
//! logging; on egress, copying the service-tag routing header into load
//! balancer metadata for subset selection.

use envoy_types::pb::envoy::extensions::filters::http::header_to_metadata::v3::{config, Config};
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::HttpFilter;

use crate::config::SnapshotConfig;
use crate::groups::Group;

use super::{any_from_message, http_filter, HEADER_TO_METADATA_FILTER_NAME};

pub const HEADER_TO_METADATA_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.http.header_to_metadata.v3.Config";

/// Metadata key carrying the jwt-status marker read by OAuth principals.
pub const JWT_STATUS_KEY: &str = "jwt-status";
pub const JWT_STATUS_PRESENT: &str = "present";
pub const JWT_STATUS_MISSING: &str = "missing";

/// Metadata key carrying the surfaced client identity.
pub const CLIENT_IDENTITY_KEY: &str = "client_identity";

/// Metadata namespace consumed by subset load balancing.
const LB_METADATA_NAMESPACE: &str = "envoy.lb";

pub struct HeaderToMetadataFilterFactory {
    ingress_filter: HttpFilter,
    egress_filter: Option<HttpFilter>,
    incoming_permissions_enabled: bool,
}

impl HeaderToMetadataFilterFactory {
    pub fn new(config: &SnapshotConfig) -> Self {
        let ingress_config = Config {
            request_rules: vec![
                identity_rule(&config.incoming_permissions.client_identity_header),
                jwt_status_rule(),
            ],
            ..Default::default()
        };
        let ingress_filter = http_filter(
            HEADER_TO_METADATA_FILTER_NAME,
            any_from_message(HEADER_TO_METADATA_TYPE_URL, &ingress_config),
        );

        let egress_filter = config.routing.service_tags.enabled.then(|| {
            let egress_config = Config {
                request_rules: vec![service_tag_rule(
                    &config.routing.service_tags.header,
                    &config.routing.service_tags.metadata_key,
                )],
                ..Default::default()
            };
            http_filter(
                HEADER_TO_METADATA_FILTER_NAME,
                any_from_message(HEADER_TO_METADATA_TYPE_URL, &egress_config),
            )
        });

        Self {
            ingress_filter,
            egress_filter,
            incoming_permissions_enabled: config.incoming_permissions.enabled,
        }
    }

    /// Metadata producers are only useful when something downstream consumes
    /// them; skip the filter for groups without permission enforcement.
    pub fn ingress_filter(&self, group: &Group) -> Option<HttpFilter> {
        (self.incoming_permissions_enabled && group.proxy_settings.incoming.permissions_enabled)
            .then(|| self.ingress_filter.clone())
    }

    pub fn egress_filter(&self) -> Option<HttpFilter> {
        self.egress_filter.clone()
    }
}

fn identity_rule(header: &str) -> config::Rule {
    config::Rule {
        header: header.to_string(),
        on_header_present: Some(config::KeyValuePair {
            metadata_namespace: HEADER_TO_METADATA_FILTER_NAME.to_string(),
            key: CLIENT_IDENTITY_KEY.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn jwt_status_rule() -> config::Rule {
    config::Rule {
        header: "authorization".to_string(),
        on_header_present: Some(config::KeyValuePair {
            metadata_namespace: HEADER_TO_METADATA_FILTER_NAME.to_string(),
            key: JWT_STATUS_KEY.to_string(),
            value: JWT_STATUS_PRESENT.to_string(),
            ..Default::default()
        }),
        on_header_missing: Some(config::KeyValuePair {
            metadata_namespace: HEADER_TO_METADATA_FILTER_NAME.to_string(),
            key: JWT_STATUS_KEY.to_string(),
            value: JWT_STATUS_MISSING.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn service_tag_rule(header: &str, metadata_key: &str) -> config::Rule {
    config::Rule {
        header: header.to_string(),
        on_header_present: Some(config::KeyValuePair {
            metadata_namespace: LB_METADATA_NAMESPACE.to_string(),
            key: metadata_key.to_string(),
            ..Default::default()
        }),
        remove: false,
        ..Default::default()
    }
}
