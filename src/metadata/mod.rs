//! Typed model of proxy-declared node metadata.
//!
//! A connecting proxy describes itself with an arbitrary structured document
//! (service identity, incoming endpoint permissions, outgoing dependencies,
//! rate limits, timeouts). [`parser`] turns that document into the values in
//! this module; [`validator`] enforces tenant-wide policy over the parsed
//! result before any configuration is served.

pub mod parser;
pub mod validator;

pub use parser::NodeMetadata;
pub use validator::NodeMetadataValidator;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// How a proxy talks to the discovery server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommunicationMode {
    #[default]
    Ads,
    Xds,
}

impl fmt::Display for CommunicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ads => f.write_str("ADS"),
            Self::Xds => f.write_str("XDS"),
        }
    }
}

/// Behavior for clients or endpoints that are not explicitly declared.
///
/// `Log` allows and observes; `BlockAndLog` denies and observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnlistedPolicy {
    #[default]
    Log,
    BlockAndLog,
}

impl fmt::Display for UnlistedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => f.write_str("LOG"),
            Self::BlockAndLog => f.write_str("BLOCKANDLOG"),
        }
    }
}

/// Path matching flavor of a declared endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathMatchingType {
    #[default]
    Path,
    PathPrefix,
    PathRegex,
}

impl fmt::Display for PathMatchingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => f.write_str("PATH"),
            Self::PathPrefix => f.write_str("PATH_PREFIX"),
            Self::PathRegex => f.write_str("PATH_REGEX"),
        }
    }
}

/// The closed set of HTTP methods endpoints may declare.
///
/// Declared methods are kept as raw strings through parsing and checked
/// against this set by the validator; compilers downstream may assume
/// validated input.
pub const SUPPORTED_HTTP_METHODS: [&str; 9] =
    ["GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH"];

/// Returns true when `method` is a member of the supported HTTP method set.
pub fn is_supported_http_method(method: &str) -> bool {
    SUPPORTED_HTTP_METHODS.contains(&method)
}

/// A client identity reference in an endpoint's client list.
///
/// `name` is a client/service identity, a role name, or the wildcard
/// sentinel. The optional `selector` is a secondary matching dimension
/// (per-tenant / per-environment). Ordering is lexicographic by name then
/// selector so client sets deduplicate into a stable order regardless of
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientWithSelector {
    pub name: String,
    pub selector: Option<String>,
    pub negated: bool,
}

impl ClientWithSelector {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), selector: None, negated: false }
    }

    pub fn with_selector<S: Into<String>, T: Into<String>>(name: S, selector: T) -> Self {
        Self { name: name.into(), selector: Some(selector.into()), negated: false }
    }

    /// Parse `"name"`, `"name:selector"`, with an optional leading `!`
    /// marking negation.
    pub fn decompose(raw: &str) -> Self {
        let (negated, rest) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        match rest.split_once(':') {
            Some((name, selector)) => Self {
                name: name.to_string(),
                selector: Some(selector.to_string()),
                negated,
            },
            None => Self { name: rest.to_string(), selector: None, negated },
        }
    }

    pub fn compound_name(&self) -> String {
        let base = match &self.selector {
            Some(selector) => format!("{}:{}", self.name, selector),
            None => self.name.clone(),
        };
        if self.negated {
            format!("!{}", base)
        } else {
            base
        }
    }
}

impl fmt::Display for ClientWithSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compound_name())
    }
}

/// The wildcard client identifier.
pub const WILDCARD_CLIENT: &str = "*";

/// A named alias expanding to a set of clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role {
    pub name: String,
    pub clients: Vec<ClientWithSelector>,
}

/// OAuth verification mode for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OAuthVerification {
    #[default]
    Offline,
}

/// How strictly JWT presence/validity is enforced for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthPolicy {
    Strict,
    AllowMissing,
    AllowMissingOrFailed,
}

impl fmt::Display for OAuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("STRICT"),
            Self::AllowMissing => f.write_str("ALLOW_MISSING"),
            Self::AllowMissingOrFailed => f.write_str("ALLOW_MISSING_OR_FAILED"),
        }
    }
}

/// OAuth requirement declared on an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OAuth {
    pub provider: String,
    pub verification: OAuthVerification,
    pub policy: Option<OAuthPolicy>,
}

/// One declared incoming endpoint with its permission rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncomingEndpoint {
    pub path: String,
    pub path_matching_type: PathMatchingType,
    pub methods: BTreeSet<String>,
    pub clients: Vec<ClientWithSelector>,
    pub unlisted_clients_policy: UnlistedPolicy,
    pub oauth: Option<OAuth>,
}

impl IncomingEndpoint {
    /// Canonical representation used as the policy name for restricted
    /// endpoints. Clients and methods are emitted sorted and deduplicated so
    /// equal declarations produce identical keys regardless of input order.
    pub fn policy_key(&self) -> String {
        let clients: BTreeSet<&ClientWithSelector> = self.clients.iter().collect();
        let clients =
            clients.iter().map(|c| c.compound_name()).collect::<Vec<_>>().join(", ");
        let methods = self.methods.iter().cloned().collect::<Vec<_>>().join(", ");
        let oauth = match &self.oauth {
            Some(oauth) => format!(
                "OAuth(provider={}, policy={})",
                oauth.provider,
                oauth.policy.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string())
            ),
            None => "none".to_string(),
        };
        format!(
            "IncomingEndpoint(path={}, matching={}, methods=[{}], clients=[{}], \
             unlistedClientsPolicy={}, oauth={})",
            self.path, self.path_matching_type, methods, clients, self.unlisted_clients_policy,
            oauth
        )
    }
}

/// One declared rate-limited endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitEndpoint {
    pub path: String,
    pub path_matching_type: PathMatchingType,
    pub methods: BTreeSet<String>,
    /// `<requests>/<unit>` where unit is one of s, m, h. Validated by the
    /// node metadata validator.
    pub rate_limit: String,
}

/// Health check route override.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HealthCheck {
    pub path: String,
    pub cluster_name: String,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self { path: String::new(), cluster_name: "local_service_health_check".to_string() }
    }
}

impl HealthCheck {
    pub fn has_custom_health_check(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Ingress timeout overrides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct IncomingTimeoutPolicy {
    pub idle_timeout: Option<Duration>,
    pub response_timeout: Option<Duration>,
    pub connection_idle_timeout: Option<Duration>,
}

/// Incoming (ingress) permission declaration of one service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Incoming {
    pub endpoints: Vec<IncomingEndpoint>,
    /// True iff the metadata carried an explicit `endpoints` field. Absence
    /// of the field means "allow all traffic": no RBAC filter is compiled.
    pub permissions_enabled: bool,
    pub unlisted_endpoints_policy: UnlistedPolicy,
    pub roles: Vec<Role>,
    pub rate_limit_endpoints: Vec<RateLimitEndpoint>,
    pub health_check: HealthCheck,
    pub timeout_policy: IncomingTimeoutPolicy,
}

impl Default for Incoming {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            permissions_enabled: false,
            unlisted_endpoints_policy: UnlistedPolicy::Log,
            roles: Vec::new(),
            rate_limit_endpoints: Vec::new(),
            health_check: HealthCheck::default(),
            timeout_policy: IncomingTimeoutPolicy::default(),
        }
    }
}

/// Egress timeout policy of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutgoingTimeoutPolicy {
    pub idle_timeout: Duration,
    pub request_timeout: Duration,
}

/// Per-dependency settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencySettings {
    pub handle_internal_redirect: bool,
    pub timeout_policy: OutgoingTimeoutPolicy,
    pub rewrite_host_header: bool,
    /// Ordered routing preference tags, matched against instance tags by the
    /// service-tag filter. Subject to the configured tag prefix restriction.
    pub service_tag_preference: Vec<String>,
}

/// A dependency on another mesh service, resolved via discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceDependency {
    pub service: String,
    pub settings: DependencySettings,
}

/// A dependency on an external domain, resolved via DNS.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainDependency {
    /// Raw declared value including scheme, e.g. `https://example.com:8443`.
    pub domain: String,
    pub settings: DependencySettings,
}

impl DomainDependency {
    fn scheme_and_rest(&self) -> (&str, &str) {
        match self.domain.strip_prefix("https://") {
            Some(rest) => ("https", rest),
            None => ("http", self.domain.strip_prefix("http://").unwrap_or(&self.domain)),
        }
    }

    fn explicit_port(&self) -> Option<u32> {
        let (_, rest) = self.scheme_and_rest();
        rest.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
    }

    pub fn host(&self) -> &str {
        let (_, rest) = self.scheme_and_rest();
        match rest.rsplit_once(':') {
            Some((host, port)) if port.parse::<u32>().is_ok() => host,
            _ => rest,
        }
    }

    pub fn port(&self) -> u32 {
        self.explicit_port().unwrap_or(match self.scheme_and_rest().0 {
            "https" => 443,
            _ => 80,
        })
    }

    pub fn use_ssl(&self) -> bool {
        self.scheme_and_rest().0 == "https"
    }

    /// Cluster name in the `domain_pl_80` form.
    pub fn cluster_name(&self) -> String {
        format!("{}:{}", self.host(), self.port()).replace(['.', ':'], "_")
    }

    /// Route authority: port echoed only when it was explicit in the
    /// declaration, even if it equals the scheme default.
    pub fn route_domain(&self) -> String {
        match self.explicit_port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_string(),
        }
    }
}

/// Sealed dependency declaration; compilers match exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    Service(ServiceDependency),
    Domain(DomainDependency),
}

/// Outgoing (egress) dependency declaration of one service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Outgoing {
    service_dependencies: Vec<ServiceDependency>,
    domain_dependencies: Vec<DomainDependency>,
    service_index: BTreeMap<String, usize>,
    all_services_dependencies: bool,
}

impl Outgoing {
    pub fn new(dependencies: Vec<Dependency>, all_services_dependencies: bool) -> Self {
        let mut service_dependencies = Vec::new();
        let mut domain_dependencies = Vec::new();
        for dependency in dependencies {
            match dependency {
                Dependency::Service(dep) => service_dependencies.push(dep),
                Dependency::Domain(dep) => domain_dependencies.push(dep),
            }
        }
        let service_index = service_dependencies
            .iter()
            .enumerate()
            .map(|(index, dep)| (dep.service.clone(), index))
            .collect();
        Self {
            service_dependencies,
            domain_dependencies,
            service_index,
            all_services_dependencies,
        }
    }

    pub fn service_dependencies(&self) -> &[ServiceDependency] {
        &self.service_dependencies
    }

    pub fn domain_dependencies(&self) -> &[DomainDependency] {
        &self.domain_dependencies
    }

    pub fn dependency_for_service(&self, service: &str) -> Option<&ServiceDependency> {
        self.service_index.get(service).map(|index| &self.service_dependencies[*index])
    }

    pub fn contains_dependency_for_service(&self, service: &str) -> bool {
        self.service_index.contains_key(service)
    }

    /// True when the wildcard dependency sentinel was declared: the service
    /// depends on every known service.
    pub fn has_all_services_dependencies(&self) -> bool {
        self.all_services_dependencies
    }
}

/// Listener addresses a proxy asks the control plane to configure.
///
/// Only materialized when the proxy declares a complete, well-formed set of
/// ingress/egress addresses; otherwise the proxy gets no listeners and
/// manages them itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenersConfig {
    pub ingress_host: String,
    pub ingress_port: u32,
    pub egress_host: String,
    pub egress_port: u32,
    pub use_remote_address: bool,
    pub access_log_enabled: bool,
}

/// Immutable pair of incoming and outgoing declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProxySettings {
    pub incoming: Incoming,
    pub outgoing: Outgoing,
}

impl ProxySettings {
    /// Strip incoming permission declarations to defaults. Used when ingress
    /// permission enforcement is globally disabled so that proxies differing
    /// only in incoming rules classify into the same group.
    pub fn with_incoming_permissions_disabled(&self) -> Self {
        Self { incoming: Incoming::default(), outgoing: self.outgoing.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_with_selector_decompose() {
        assert_eq!(ClientWithSelector::decompose("billing"), ClientWithSelector::new("billing"));
        assert_eq!(
            ClientWithSelector::decompose("billing:prod"),
            ClientWithSelector::with_selector("billing", "prod")
        );
        let negated = ClientWithSelector::decompose("!billing:prod");
        assert!(negated.negated);
        assert_eq!(negated.name, "billing");
        assert_eq!(negated.selector.as_deref(), Some("prod"));
    }

    #[test]
    fn client_ordering_is_name_then_selector() {
        let mut clients = vec![
            ClientWithSelector::with_selector("b", "x"),
            ClientWithSelector::new("b"),
            ClientWithSelector::new("a"),
        ];
        clients.sort();
        assert_eq!(clients[0].name, "a");
        assert_eq!(clients[1], ClientWithSelector::new("b"));
        assert_eq!(clients[2].selector.as_deref(), Some("x"));
    }

    #[test]
    fn domain_dependency_default_port() {
        let dep = DomainDependency {
            domain: "http://domain.pl".to_string(),
            settings: test_settings(),
        };
        assert_eq!(dep.host(), "domain.pl");
        assert_eq!(dep.port(), 80);
        assert_eq!(dep.cluster_name(), "domain_pl_80");
        assert_eq!(dep.route_domain(), "domain.pl");
        assert!(!dep.use_ssl());
    }

    #[test]
    fn domain_dependency_explicit_default_port_is_echoed() {
        let dep = DomainDependency {
            domain: "http://domain.pl:80".to_string(),
            settings: test_settings(),
        };
        assert_eq!(dep.port(), 80);
        assert_eq!(dep.cluster_name(), "domain_pl_80");
        assert_eq!(dep.route_domain(), "domain.pl:80");
    }

    #[test]
    fn domain_dependency_https_defaults() {
        let dep = DomainDependency {
            domain: "https://secure.example.com".to_string(),
            settings: test_settings(),
        };
        assert_eq!(dep.port(), 443);
        assert!(dep.use_ssl());
        assert_eq!(dep.cluster_name(), "secure_example_com_443");
    }

    #[test]
    fn outgoing_indexes_service_dependencies() {
        let outgoing = Outgoing::new(
            vec![
                Dependency::Service(ServiceDependency {
                    service: "billing".to_string(),
                    settings: test_settings(),
                }),
                Dependency::Domain(DomainDependency {
                    domain: "http://domain.pl".to_string(),
                    settings: test_settings(),
                }),
            ],
            false,
        );
        assert!(outgoing.contains_dependency_for_service("billing"));
        assert!(!outgoing.contains_dependency_for_service("domain.pl"));
        assert_eq!(outgoing.domain_dependencies().len(), 1);
        assert!(!outgoing.has_all_services_dependencies());
    }

    #[test]
    fn policy_key_is_order_independent() {
        let endpoint = |clients: Vec<&str>| IncomingEndpoint {
            path: "/orders".to_string(),
            path_matching_type: PathMatchingType::Path,
            methods: ["POST".to_string(), "GET".to_string()].into(),
            clients: clients.into_iter().map(ClientWithSelector::new).collect(),
            unlisted_clients_policy: UnlistedPolicy::BlockAndLog,
            oauth: None,
        };
        assert_eq!(
            endpoint(vec!["b", "a", "a"]).policy_key(),
            endpoint(vec!["a", "b"]).policy_key()
        );
    }

    fn test_settings() -> DependencySettings {
        DependencySettings {
            handle_internal_redirect: false,
            timeout_policy: OutgoingTimeoutPolicy {
                idle_timeout: Duration::from_secs(120),
                request_timeout: Duration::from_secs(120),
            },
            rewrite_host_header: false,
            service_tag_preference: Vec::new(),
        }
    }
}
