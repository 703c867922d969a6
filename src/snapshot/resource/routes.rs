//! Route configuration builders.
//!
//! Ingress routes send everything to the local application cluster, with
//! dedicated routes for the custom health check and for rate-limited
//! endpoints (which carry per-route token buckets). Egress routes get one
//! virtual host per dependency, with timeouts, host rewrite, internal
//! redirect handling and service-tag preference from the dependency
//! settings.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use envoy_types::pb::envoy::config::core::v3::Metadata;
use envoy_types::pb::envoy::config::route::v3::{
    route, route_action, route_match, Route, RouteAction, RouteConfiguration, RouteMatch,
    VirtualHost,
};
use envoy_types::pb::envoy::r#type::matcher::v3::{regex_matcher, RegexMatcher};
use envoy_types::pb::google::protobuf::{value, BoolValue, Duration, Struct, Value};

use crate::config::SnapshotConfig;
use crate::groups::Group;
use crate::metadata::{
    DependencySettings, DomainDependency, IncomingTimeoutPolicy, PathMatchingType,
    RateLimitEndpoint, ServiceDependency,
};
use crate::snapshot::filters::{rate_limit, LOCAL_RATE_LIMIT_FILTER_NAME};
use crate::topology::GlobalSnapshot;

use super::{EGRESS_ROUTES_NAME, INGRESS_ROUTES_NAME, LOCAL_SERVICE_CLUSTER};

const LB_METADATA_NAMESPACE: &str = "envoy.lb";

pub struct RouteFactory {
    default_settings: DependencySettings,
    service_tag_metadata_key: String,
}

impl RouteFactory {
    pub fn new(config: &SnapshotConfig) -> Self {
        Self {
            default_settings: DependencySettings {
                handle_internal_redirect: config.egress.handle_internal_redirect,
                timeout_policy: crate::metadata::OutgoingTimeoutPolicy {
                    idle_timeout: config.egress.idle_timeout(),
                    request_timeout: config.egress.request_timeout(),
                },
                rewrite_host_header: false,
                service_tag_preference: Vec::new(),
            },
            service_tag_metadata_key: config.routing.service_tags.metadata_key.clone(),
        }
    }

    /// Route configurations for a group; empty when the proxy manages its own
    /// listeners (nothing references them over RDS then).
    pub fn routes(&self, group: &Group, snapshot: &GlobalSnapshot) -> Vec<RouteConfiguration> {
        if group.listeners_config.is_none() {
            return Vec::new();
        }
        vec![self.ingress_routes(group), self.egress_routes(group, snapshot)]
    }

    fn ingress_routes(&self, group: &Group) -> RouteConfiguration {
        let incoming = &group.proxy_settings.incoming;
        let mut routes = Vec::new();
        if incoming.health_check.has_custom_health_check() {
            routes.push(Route {
                r#match: Some(RouteMatch {
                    path_specifier: Some(route_match::PathSpecifier::Path(
                        incoming.health_check.path.clone(),
                    )),
                    ..Default::default()
                }),
                action: Some(route::Action::Route(cluster_action(
                    &incoming.health_check.cluster_name,
                ))),
                ..Default::default()
            });
        }
        for endpoint in &incoming.rate_limit_endpoints {
            routes.push(rate_limited_route(endpoint, &incoming.timeout_policy));
        }
        routes.push(Route {
            r#match: Some(prefix_match("/")),
            action: Some(route::Action::Route(local_service_action(&incoming.timeout_policy))),
            ..Default::default()
        });

        RouteConfiguration {
            name: INGRESS_ROUTES_NAME.to_string(),
            virtual_hosts: vec![VirtualHost {
                name: "ingress".to_string(),
                domains: vec!["*".to_string()],
                routes,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn egress_routes(&self, group: &Group, snapshot: &GlobalSnapshot) -> RouteConfiguration {
        let outgoing = &group.proxy_settings.outgoing;
        let mut virtual_hosts = Vec::new();

        if group.is_all_services() || outgoing.has_all_services_dependencies() {
            for service in snapshot.service_names() {
                let settings = outgoing
                    .dependency_for_service(service)
                    .map(|dep| &dep.settings)
                    .unwrap_or(&self.default_settings);
                virtual_hosts.push(self.service_virtual_host(service, settings));
            }
        } else {
            for dependency in outgoing.service_dependencies() {
                if !snapshot.has_service(&dependency.service) {
                    continue;
                }
                virtual_hosts.push(self.service_dependency_virtual_host(dependency));
            }
        }
        for dependency in outgoing.domain_dependencies() {
            virtual_hosts.push(self.domain_virtual_host(dependency));
        }

        RouteConfiguration {
            name: EGRESS_ROUTES_NAME.to_string(),
            virtual_hosts,
            ..Default::default()
        }
    }

    fn service_dependency_virtual_host(&self, dependency: &ServiceDependency) -> VirtualHost {
        self.service_virtual_host(&dependency.service, &dependency.settings)
    }

    fn service_virtual_host(&self, service: &str, settings: &DependencySettings) -> VirtualHost {
        VirtualHost {
            name: service.to_string(),
            domains: vec![service.to_string()],
            routes: vec![Route {
                r#match: Some(prefix_match("/")),
                action: Some(route::Action::Route(self.dependency_action(service, settings))),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn domain_virtual_host(&self, dependency: &DomainDependency) -> VirtualHost {
        let cluster = dependency.cluster_name();
        VirtualHost {
            name: cluster.clone(),
            domains: vec![dependency.route_domain()],
            routes: vec![Route {
                r#match: Some(prefix_match("/")),
                action: Some(route::Action::Route(
                    self.dependency_action(&cluster, &dependency.settings),
                )),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn dependency_action(&self, cluster: &str, settings: &DependencySettings) -> RouteAction {
        let mut action = cluster_action(cluster);
        action.timeout = Some(duration(settings.timeout_policy.request_timeout));
        action.idle_timeout = Some(duration(settings.timeout_policy.idle_timeout));
        if settings.rewrite_host_header {
            action.host_rewrite_specifier = Some(
                route_action::HostRewriteSpecifier::AutoHostRewrite(BoolValue { value: true }),
            );
        }
        if settings.handle_internal_redirect {
            action.internal_redirect_policy = Some(Default::default());
        }
        if let Some(tag) = settings.service_tag_preference.first() {
            action.metadata_match = Some(tag_metadata_match(&self.service_tag_metadata_key, tag));
        }
        action
    }
}

fn rate_limited_route(
    endpoint: &RateLimitEndpoint,
    timeouts: &IncomingTimeoutPolicy,
) -> Route {
    let path_specifier = match endpoint.path_matching_type {
        PathMatchingType::Path => route_match::PathSpecifier::Path(endpoint.path.clone()),
        PathMatchingType::PathPrefix => route_match::PathSpecifier::Prefix(endpoint.path.clone()),
        PathMatchingType::PathRegex => route_match::PathSpecifier::SafeRegex(RegexMatcher {
            engine_type: Some(regex_matcher::EngineType::GoogleRe2(Default::default())),
            regex: endpoint.path.clone(),
        }),
    };
    let mut typed_per_filter_config = HashMap::new();
    if let Some(config) = rate_limit::per_route_config(&endpoint.path, &endpoint.rate_limit) {
        typed_per_filter_config.insert(LOCAL_RATE_LIMIT_FILTER_NAME.to_string(), config);
    }
    Route {
        r#match: Some(RouteMatch { path_specifier: Some(path_specifier), ..Default::default() }),
        action: Some(route::Action::Route(local_service_action(timeouts))),
        typed_per_filter_config,
        ..Default::default()
    }
}

fn local_service_action(timeouts: &IncomingTimeoutPolicy) -> RouteAction {
    let mut action = cluster_action(LOCAL_SERVICE_CLUSTER);
    action.timeout = timeouts.response_timeout.map(duration);
    action.idle_timeout = timeouts.idle_timeout.map(duration);
    action
}

fn cluster_action(cluster: &str) -> RouteAction {
    RouteAction {
        cluster_specifier: Some(route_action::ClusterSpecifier::Cluster(cluster.to_string())),
        ..Default::default()
    }
}

fn prefix_match(prefix: &str) -> RouteMatch {
    RouteMatch {
        path_specifier: Some(route_match::PathSpecifier::Prefix(prefix.to_string())),
        ..Default::default()
    }
}

/// Single-entry `envoy.lb` metadata match keeps the encoding deterministic.
fn tag_metadata_match(metadata_key: &str, tag: &str) -> Metadata {
    let mut fields = HashMap::new();
    fields.insert(
        metadata_key.to_string(),
        Value { kind: Some(value::Kind::StringValue(tag.to_string())) },
    );
    let mut filter_metadata = HashMap::new();
    filter_metadata.insert(LB_METADATA_NAMESPACE.to_string(), Struct { fields });
    Metadata { filter_metadata, ..Default::default() }
}

fn duration(value: StdDuration) -> Duration {
    Duration { seconds: value.as_secs() as i64, nanos: value.subsec_nanos() as i32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::GroupKind;
    use crate::metadata::{
        CommunicationMode, Dependency, Incoming, ListenersConfig, Outgoing,
        OutgoingTimeoutPolicy, ProxySettings,
    };
    use crate::topology::ServiceInstance;

    fn listeners_config() -> ListenersConfig {
        ListenersConfig {
            ingress_host: "0.0.0.0".to_string(),
            ingress_port: 80,
            egress_host: "127.0.0.1".to_string(),
            egress_port: 1234,
            use_remote_address: true,
            access_log_enabled: false,
        }
    }

    fn settings(tags: Vec<&str>) -> DependencySettings {
        DependencySettings {
            handle_internal_redirect: true,
            timeout_policy: OutgoingTimeoutPolicy {
                idle_timeout: StdDuration::from_secs(60),
                request_timeout: StdDuration::from_secs(15),
            },
            rewrite_host_header: true,
            service_tag_preference: tags.into_iter().map(String::from).collect(),
        }
    }

    fn group(outgoing: Outgoing, incoming: Incoming) -> Group {
        Group {
            kind: GroupKind::Services,
            communication_mode: CommunicationMode::Ads,
            service_name: "echo".to_string(),
            discovery_service_name: None,
            proxy_settings: ProxySettings { incoming, outgoing },
            listeners_config: Some(listeners_config()),
        }
    }

    #[test]
    fn no_routes_without_listener_config() {
        let factory = RouteFactory::new(&SnapshotConfig::default());
        let mut group = group(Outgoing::default(), Incoming::default());
        group.listeners_config = None;
        assert!(factory.routes(&group, &GlobalSnapshot::new()).is_empty());
    }

    #[test]
    fn ingress_catch_all_targets_local_service() {
        let factory = RouteFactory::new(&SnapshotConfig::default());
        let routes = factory.routes(&group(Outgoing::default(), Incoming::default()), &GlobalSnapshot::new());
        let ingress = &routes[0];
        assert_eq!(ingress.name, INGRESS_ROUTES_NAME);
        let last = ingress.virtual_hosts[0].routes.last().unwrap();
        let Some(route::Action::Route(action)) = &last.action else {
            panic!("expected a route action");
        };
        assert_eq!(
            action.cluster_specifier,
            Some(route_action::ClusterSpecifier::Cluster(LOCAL_SERVICE_CLUSTER.to_string()))
        );
    }

    #[test]
    fn rate_limited_routes_carry_per_route_config() {
        let factory = RouteFactory::new(&SnapshotConfig::default());
        let incoming = Incoming {
            rate_limit_endpoints: vec![RateLimitEndpoint {
                path: "/orders".to_string(),
                path_matching_type: PathMatchingType::Path,
                methods: Default::default(),
                rate_limit: "10/s".to_string(),
            }],
            ..Default::default()
        };
        let routes = factory.routes(&group(Outgoing::default(), incoming), &GlobalSnapshot::new());
        let ingress_routes = &routes[0].virtual_hosts[0].routes;
        assert_eq!(ingress_routes.len(), 2);
        assert!(ingress_routes[0]
            .typed_per_filter_config
            .contains_key(LOCAL_RATE_LIMIT_FILTER_NAME));
    }

    #[test]
    fn egress_virtual_hosts_per_dependency() {
        let factory = RouteFactory::new(&SnapshotConfig::default());
        let outgoing = Outgoing::new(
            vec![
                Dependency::Service(ServiceDependency {
                    service: "billing".to_string(),
                    settings: settings(vec!["lvov"]),
                }),
                Dependency::Domain(DomainDependency {
                    domain: "http://domain.pl:80".to_string(),
                    settings: settings(vec![]),
                }),
            ],
            false,
        );
        let snapshot = GlobalSnapshot::new()
            .with_service("billing", vec![ServiceInstance::new("10.0.0.1", 8080)]);
        let routes = factory.routes(&group(outgoing, Incoming::default()), &snapshot);
        let egress = &routes[1];
        assert_eq!(egress.name, EGRESS_ROUTES_NAME);
        assert_eq!(egress.virtual_hosts.len(), 2);
        assert_eq!(egress.virtual_hosts[0].domains, vec!["billing"]);
        assert_eq!(egress.virtual_hosts[1].domains, vec!["domain.pl:80"]);

        let Some(route::Action::Route(action)) = &egress.virtual_hosts[0].routes[0].action else {
            panic!("expected a route action");
        };
        assert!(action.metadata_match.is_some());
        assert!(action.internal_redirect_policy.is_some());
        assert_eq!(action.timeout.as_ref().map(|d| d.seconds), Some(15));
    }

    #[test]
    fn wildcard_groups_route_to_every_known_service() {
        let factory = RouteFactory::new(&SnapshotConfig::default());
        let snapshot = GlobalSnapshot::new()
            .with_service("billing", vec![ServiceInstance::new("10.0.0.1", 8080)])
            .with_service("payments", vec![ServiceInstance::new("10.0.0.2", 8080)]);
        let mut group = group(Outgoing::new(vec![], true), Incoming::default());
        group.kind = GroupKind::AllServices;
        let routes = factory.routes(&group, &snapshot);
        assert_eq!(routes[1].virtual_hosts.len(), 2);
    }
}
