//! Cluster builders.
//!
//! Service dependencies become EDS clusters fed by the assembled load
//! assignments; domain dependencies become STRICT_DNS clusters resolving the
//! declared host. Groups with the wildcard dependency pull a cluster for
//! every service currently known to discovery.

use std::collections::BTreeSet;
use std::time::Duration as StdDuration;

use envoy_types::pb::envoy::config::cluster::v3::{cluster, Cluster};
use envoy_types::pb::envoy::config::core::v3::{
    address, transport_socket, Address, SocketAddress, TransportSocket,
};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::UpstreamTlsContext;
use envoy_types::pb::google::protobuf::Duration;

use crate::config::{OAuthProviderConfig, SnapshotConfig};
use crate::groups::Group;
use crate::snapshot::filters::any_from_message;
use crate::topology::GlobalSnapshot;

use super::ads_config_source;

const TLS_TRANSPORT_SOCKET_NAME: &str = "envoy.transport_sockets.tls";
const UPSTREAM_TLS_CONTEXT_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext";
const CONNECT_TIMEOUT: StdDuration = StdDuration::from_secs(5);

pub struct ClusterFactory {
    jwt_provider_clusters: Vec<Cluster>,
}

impl ClusterFactory {
    pub fn new(config: &SnapshotConfig) -> Self {
        let jwt_provider_clusters = config
            .jwt
            .providers
            .values()
            .map(jwt_provider_cluster)
            .collect();
        Self { jwt_provider_clusters }
    }

    pub fn clusters(&self, group: &Group, snapshot: &GlobalSnapshot) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = self
            .service_names_for(group, snapshot)
            .into_iter()
            .map(eds_cluster)
            .collect();
        for dependency in group.proxy_settings.outgoing.domain_dependencies() {
            clusters.push(domain_cluster(
                &dependency.cluster_name(),
                dependency.host(),
                dependency.port(),
                dependency.use_ssl(),
            ));
        }
        if group.proxy_settings.incoming.permissions_enabled {
            clusters.extend(self.jwt_provider_clusters.iter().cloned());
        }
        clusters
    }

    /// Only services the topology currently knows; transiently missing
    /// dependencies are omitted, never an error.
    fn service_names_for(&self, group: &Group, snapshot: &GlobalSnapshot) -> Vec<String> {
        if group.is_all_services()
            || group.proxy_settings.outgoing.has_all_services_dependencies()
        {
            return snapshot.service_names().map(String::from).collect();
        }
        group
            .proxy_settings
            .outgoing
            .service_dependencies()
            .iter()
            .map(|dep| dep.service.clone())
            .filter(|service| snapshot.has_service(service))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn eds_cluster(name: String) -> Cluster {
    Cluster {
        name: name.clone(),
        cluster_discovery_type: Some(cluster::ClusterDiscoveryType::Type(
            cluster::DiscoveryType::Eds as i32,
        )),
        eds_cluster_config: Some(cluster::EdsClusterConfig {
            eds_config: Some(ads_config_source()),
            service_name: name,
        }),
        connect_timeout: Some(duration(CONNECT_TIMEOUT)),
        lb_policy: cluster::LbPolicy::LeastRequest as i32,
        ..Default::default()
    }
}

fn domain_cluster(name: &str, host: &str, port: u32, use_ssl: bool) -> Cluster {
    Cluster {
        name: name.to_string(),
        cluster_discovery_type: Some(cluster::ClusterDiscoveryType::Type(
            cluster::DiscoveryType::StrictDns as i32,
        )),
        load_assignment: Some(static_load_assignment(name, host, port)),
        connect_timeout: Some(duration(CONNECT_TIMEOUT)),
        lb_policy: cluster::LbPolicy::LeastRequest as i32,
        transport_socket: use_ssl.then(|| TransportSocket {
            name: TLS_TRANSPORT_SOCKET_NAME.to_string(),
            config_type: Some(transport_socket::ConfigType::TypedConfig(any_from_message(
                UPSTREAM_TLS_CONTEXT_TYPE_URL,
                &UpstreamTlsContext::default(),
            ))),
        }),
        ..Default::default()
    }
}

fn jwt_provider_cluster(provider: &OAuthProviderConfig) -> Cluster {
    let (host, port, use_ssl) = jwks_endpoint(&provider.jwks_uri);
    domain_cluster(&provider.cluster_name, host, port, use_ssl)
}

fn jwks_endpoint(uri: &str) -> (&str, u32, bool) {
    let (use_ssl, rest) = match uri.strip_prefix("https://") {
        Some(rest) => (true, rest),
        None => (false, uri.strip_prefix("http://").unwrap_or(uri)),
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().unwrap_or(if use_ssl { 443 } else { 80 }), use_ssl),
        None => (authority, if use_ssl { 443 } else { 80 }, use_ssl),
    }
}

fn static_load_assignment(cluster_name: &str, host: &str, port: u32) -> ClusterLoadAssignment {
    ClusterLoadAssignment {
        cluster_name: cluster_name.to_string(),
        endpoints: vec![LocalityLbEndpoints {
            lb_endpoints: vec![LbEndpoint {
                host_identifier: Some(lb_endpoint::HostIdentifier::Endpoint(Endpoint {
                    address: Some(socket_address(host, port)),
                    ..Default::default()
                })),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub(crate) fn socket_address(host: &str, port: u32) -> Address {
    Address {
        address: Some(address::Address::SocketAddress(SocketAddress {
            address: host.to_string(),
            port_specifier: Some(
                envoy_types::pb::envoy::config::core::v3::socket_address::PortSpecifier::PortValue(
                    port,
                ),
            ),
            ..Default::default()
        })),
    }
}

fn duration(value: StdDuration) -> Duration {
    Duration { seconds: value.as_secs() as i64, nanos: value.subsec_nanos() as i32 }
}
