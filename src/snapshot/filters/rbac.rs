//! Authorization policy compiler.
//!
//! Compiles one group's incoming permission declaration into two RBAC rule
//! sets: `rules` (enforced) and `shadow_rules` (logged only). The shadow set
//! always carries the complete policy picture so operators can observe the
//! impact of a LOG policy before flipping it to BLOCKANDLOG.
//!
//! Principal derivation is priority-ordered per client: source IPs of the
//! client's own service taken from the current topology snapshot, then
//! statically configured IP ranges, then JWT claim matching, then the TLS
//! SAN URI identity. Client sets are deduplicated through a sorted set so
//! equal declarations compile to byte-identical policies regardless of
//! declaration order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use envoy_types::pb::envoy::config::core::v3::CidrRange;
use envoy_types::pb::envoy::config::rbac::v3::rbac::Action;
use envoy_types::pb::envoy::config::rbac::v3::{permission, principal, Permission, Policy, Principal};
use envoy_types::pb::envoy::config::route::v3::{header_matcher, HeaderMatcher};
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::HttpFilter;
use envoy_types::pb::envoy::r#type::matcher::v3::{
    list_matcher, metadata_matcher, path_matcher, regex_matcher, string_matcher, value_matcher,
    ListMatcher, MetadataMatcher, PathMatcher, RegexMatcher, StringMatcher, ValueMatcher,
};
use envoy_types::pb::google::protobuf::UInt32Value;
use tracing::warn;

use crate::config::{
    OAuthProviderConfig, PathMatchKind, SelectorMatchingConfig, SnapshotConfig,
    TlsAuthenticationConfig, SERVICE_NAME_TOKEN,
};
use crate::errors::{MeshplaneError, Result};
use crate::groups::Group;
use crate::metadata::{
    ClientWithSelector, Incoming, IncomingEndpoint, OAuthPolicy, PathMatchingType, UnlistedPolicy,
};
use crate::topology::GlobalSnapshot;

use super::header_to_metadata::{JWT_STATUS_KEY, JWT_STATUS_MISSING, JWT_STATUS_PRESENT};
use super::{any_from_message, http_filter, HEADER_TO_METADATA_FILTER_NAME, JWT_FILTER_NAME,
    RBAC_FILTER_NAME};

pub const RBAC_TYPE_URL: &str = "type.googleapis.com/envoy.extensions.filters.http.rbac.v3.RBAC";

pub const ALLOW_UNLISTED_POLICY_NAME: &str = "ALLOW_UNLISTED_POLICY";
pub const ALLOW_LOGGED_POLICY_NAME: &str = "ALLOW_LOGGED_POLICY";
pub const STATUS_ROUTE_POLICY_NAME: &str = "STATUS_ALLOW_ALL_POLICY";

const EXACT_IP_MASK: u32 = 32;

/// Wire-compatible mirror of `envoy.config.rbac.v3.RBAC` using an ordered
/// policy map, so equal rule sets always encode to identical bytes (the
/// version engine hashes encoded resources).
#[derive(Clone, PartialEq, prost::Message)]
pub struct RbacRules {
    #[prost(int32, tag = "1")]
    pub action: i32,
    #[prost(btree_map = "string, message", tag = "2")]
    pub policies: BTreeMap<String, Policy>,
}

/// Wire-compatible mirror of `envoy.extensions.filters.http.rbac.v3.RBAC`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RbacFilterConfig {
    #[prost(message, optional, tag = "1")]
    pub rules: Option<RbacRules>,
    #[prost(message, optional, tag = "2")]
    pub shadow_rules: Option<RbacRules>,
}

/// Compiled enforced and observed rule sets of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    pub shadow_rules: RbacRules,
    pub actual_rules: RbacRules,
}

pub struct RbacFilterFactory {
    enabled: bool,
    overlapping_paths_fix: bool,
    clients_from_discovery: Vec<String>,
    selector_matching: BTreeMap<String, SelectorMatchingConfig>,
    static_ip_ranges: BTreeMap<String, Principal>,
    jwt_providers: BTreeMap<String, OAuthProviderConfig>,
    oauth_matching_clients: BTreeSet<String>,
    payload_in_metadata: String,
    full_access_clients: Vec<String>,
    san_matcher: SanUriMatcher,
    status_route_policy: Option<Policy>,
    strict_policy_principal: Principal,
    allow_missing_policy_principal: Principal,
}

impl RbacFilterFactory {
    /// Fails on inconsistent configuration: selector matching referencing a
    /// client absent from both IP sources, malformed CIDR ranges, malformed
    /// SAN URI template.
    pub fn new(config: &SnapshotConfig) -> Result<Self> {
        let incoming = &config.incoming_permissions;
        let clients_from_discovery =
            incoming.source_ip_authentication.ip_from_service_discovery.enabled_for_incoming_services.clone();

        for client in incoming.selector_matching.keys() {
            if !incoming.source_ip_authentication.ip_from_range.contains_key(client)
                && !clients_from_discovery.contains(client)
            {
                return Err(MeshplaneError::config(format!(
                    "{} is not defined in ip range or ip from discovery section",
                    client
                )));
            }
        }

        let mut static_ip_ranges = BTreeMap::new();
        for (client, ranges) in &incoming.source_ip_authentication.ip_from_range {
            let mut principals = Vec::with_capacity(ranges.len());
            for range in ranges {
                principals.push(cidr_principal(parse_cidr(range)?));
            }
            static_ip_ranges.insert(client.clone(), or_principals(principals));
        }

        let oauth_matching_clients = config
            .jwt
            .providers
            .values()
            .flat_map(|provider| provider.matchings.keys().cloned())
            .collect();

        let status_route_policy = (config.status_routes.enabled
            && !config.status_routes.endpoints.is_empty())
        .then(|| Policy {
            permissions: vec![any_of_permissions(
                config
                    .status_routes
                    .endpoints
                    .iter()
                    .map(|endpoint| status_path_permission(&endpoint.path, endpoint.match_kind))
                    .collect(),
            )],
            principals: vec![any_principal()],
            ..Default::default()
        });

        let strict_policy_principal = strict_principal(
            &config.jwt.payload_in_metadata,
            &config.jwt.field_required_in_token,
        );
        let allow_missing_policy_principal = or_principals(vec![
            jwt_status_principal(JWT_STATUS_MISSING),
            strict_policy_principal.clone(),
        ]);

        Ok(Self {
            enabled: incoming.enabled,
            overlapping_paths_fix: incoming.overlapping_paths_fix,
            clients_from_discovery,
            selector_matching: incoming.selector_matching.clone(),
            static_ip_ranges,
            jwt_providers: config.jwt.providers.clone(),
            oauth_matching_clients,
            payload_in_metadata: config.jwt.payload_in_metadata.clone(),
            full_access_clients: incoming.clients_allowed_to_all_endpoints.clone(),
            san_matcher: SanUriMatcher::new(&incoming.tls_authentication)?,
            status_route_policy,
            strict_policy_principal,
            allow_missing_policy_principal,
        })
    }

    /// The RBAC filter for a group, or `None` when enforcement is globally
    /// disabled or the group never declared endpoints (default-allow).
    pub fn filter(&self, group: &Group, snapshot: &GlobalSnapshot) -> Option<HttpFilter> {
        if !self.enabled || !group.proxy_settings.incoming.permissions_enabled {
            return None;
        }
        let rules = self.rules(&group.proxy_settings.incoming, snapshot);
        let config = RbacFilterConfig {
            rules: Some(rules.actual_rules),
            shadow_rules: Some(rules.shadow_rules),
        };
        Some(http_filter(RBAC_FILTER_NAME, any_from_message(RBAC_TYPE_URL, &config)))
    }

    /// Compile the full rule pair for one incoming declaration.
    pub fn rules(&self, incoming: &Incoming, snapshot: &GlobalSnapshot) -> Rules {
        let endpoint_policies = self.endpoint_policies(incoming, snapshot);

        let mut restricted: BTreeMap<String, Policy> = BTreeMap::new();
        let mut logged: BTreeMap<String, Policy> = BTreeMap::new();
        for (endpoint, policy) in endpoint_policies {
            let has_oauth_policy =
                endpoint.oauth.as_ref().and_then(|oauth| oauth.policy).is_some();
            if endpoint.unlisted_clients_policy == UnlistedPolicy::BlockAndLog || has_oauth_policy
            {
                restricted.insert(endpoint.policy_key(), policy);
            } else {
                logged.insert(endpoint.policy_key(), policy);
            }
        }

        let status = self
            .status_route_policy
            .clone()
            .map(|policy| (STATUS_ROUTE_POLICY_NAME.to_string(), policy));

        // Shadow rules freeze the complete picture before the enforced set is
        // widened with catch-all and full-access policies.
        let mut shadow_policies = BTreeMap::new();
        shadow_policies.extend(status.clone());
        shadow_policies.extend(restricted.clone());
        shadow_policies.extend(logged.clone());
        let shadow_rules =
            RbacRules { action: Action::Allow as i32, policies: shadow_policies };

        let defined_permissions: Vec<Permission> = status
            .iter()
            .map(|(_, policy)| policy)
            .chain(restricted.values())
            .flat_map(|policy| policy.permissions.iter().cloned())
            .collect();
        let logged_permissions: Vec<Permission> =
            logged.values().flat_map(|policy| policy.permissions.iter().cloned()).collect();

        let mut actual_policies = BTreeMap::new();
        actual_policies.extend(status);
        for (key, policy) in restricted {
            actual_policies.insert(key, self.with_full_access_clients(policy));
        }
        match incoming.unlisted_endpoints_policy {
            UnlistedPolicy::Log => {
                if self.overlapping_paths_fix {
                    actual_policies.extend(allow_logged_policy(&logged_permissions));
                }
                actual_policies.insert(
                    ALLOW_UNLISTED_POLICY_NAME.to_string(),
                    Policy {
                        permissions: vec![none_of_permissions(defined_permissions)],
                        principals: vec![any_principal()],
                        ..Default::default()
                    },
                );
            }
            UnlistedPolicy::BlockAndLog => {
                actual_policies.extend(allow_logged_policy(&logged_permissions));
            }
        }
        let actual_rules =
            RbacRules { action: Action::Allow as i32, policies: actual_policies };

        Rules { shadow_rules, actual_rules }
    }

    fn endpoint_policies(
        &self,
        incoming: &Incoming,
        snapshot: &GlobalSnapshot,
    ) -> Vec<(IncomingEndpoint, Policy)> {
        let mut principal_cache: HashMap<ClientWithSelector, Vec<Principal>> = HashMap::new();
        incoming
            .endpoints
            .iter()
            .map(|endpoint| {
                let clients = resolve_clients(endpoint, incoming);
                let policy = endpoint.oauth.as_ref().and_then(|oauth| oauth.policy);
                let mut principals: Vec<Principal> = Vec::new();
                for client in &clients {
                    let derived = principal_cache
                        .entry(client.clone())
                        .or_insert_with(|| self.client_principals(client, snapshot))
                        .clone();
                    for principal in derived {
                        let merged = self.merge_with_oauth_policy(client, principal, policy);
                        if !principals.contains(&merged) {
                            principals.push(merged);
                        }
                    }
                }
                // Endpoints that log unlisted clients but still declare an
                // OAuth requirement stay open to everyone in the enforced
                // set; the OAuth constraint is observed via shadow logs.
                if !principals.is_empty()
                    && endpoint.unlisted_clients_policy == UnlistedPolicy::Log
                    && endpoint.oauth.is_some()
                {
                    principals.push(any_principal());
                }
                if principals.is_empty() {
                    principals.push(self.principal_for_empty_clients(endpoint));
                }
                let policy = Policy {
                    permissions: vec![combined_permission(endpoint)],
                    principals,
                    ..Default::default()
                };
                (endpoint.clone(), policy)
            })
            .collect()
    }

    /// Priority-ordered principal derivation for one client.
    fn client_principals(
        &self,
        client: &ClientWithSelector,
        snapshot: &GlobalSnapshot,
    ) -> Vec<Principal> {
        let provider = self
            .jwt_providers
            .values()
            .find(|provider| provider.matchings.contains_key(&client.name));
        let selector_matching =
            if provider.is_none() { self.selector_matching(client) } else { None };

        let principals = if self.clients_from_discovery.contains(&client.name) {
            self.discovery_principals(client, selector_matching, snapshot)
        } else if let Some(ranges) = self.static_ip_ranges.get(&client.name) {
            vec![with_selector_matching(ranges.clone(), client, selector_matching)]
        } else if let (Some(provider), Some(_)) = (provider, &client.selector) {
            vec![self.jwt_selector_principal(client, provider)]
        } else {
            vec![self.tls_principal(&client.name)]
        };

        if client.negated {
            principals.into_iter().map(not_principal).collect()
        } else {
            principals
        }
    }

    fn selector_matching(&self, client: &ClientWithSelector) -> Option<&SelectorMatchingConfig> {
        let matching = self.selector_matching.get(&client.name);
        if matching.is_none() && client.selector.is_some() {
            warn!(
                client = %client.name,
                selector = client.selector.as_deref().unwrap_or_default(),
                "No selector matching configured for client; source IP authentication will not \
                 contain additional matching"
            );
        }
        matching
    }

    /// Point-in-time materialization: the client's CURRENT instance addresses
    /// become exact /32 matches. Changed instances change the compiled policy
    /// and therefore the snapshot version.
    fn discovery_principals(
        &self,
        client: &ClientWithSelector,
        selector_matching: Option<&SelectorMatchingConfig>,
        snapshot: &GlobalSnapshot,
    ) -> Vec<Principal> {
        let addresses = snapshot.addresses_of(&client.name);
        if addresses.is_empty() {
            return Vec::new();
        }
        let principal = or_principals(
            addresses
                .into_iter()
                .map(|address| cidr_principal((address.to_string(), EXACT_IP_MASK)))
                .collect(),
        );
        vec![with_selector_matching(principal, client, selector_matching)]
    }

    fn jwt_selector_principal(
        &self,
        client: &ClientWithSelector,
        provider: &OAuthProviderConfig,
    ) -> Principal {
        let claim = provider.matchings.get(&client.name).cloned().unwrap_or_default();
        let selector = client.selector.clone().unwrap_or_default();
        metadata_principal(
            JWT_FILTER_NAME,
            vec![self.payload_in_metadata.clone(), claim],
            ValueMatcher {
                match_pattern: Some(value_matcher::MatchPattern::ListMatch(Box::new(
                    ListMatcher {
                        match_pattern: Some(list_matcher::MatchPattern::OneOf(Box::new(
                            ValueMatcher {
                                match_pattern: Some(value_matcher::MatchPattern::StringMatch(
                                    exact_matcher(&selector),
                                )),
                            },
                        ))),
                    },
                ))),
            },
        )
    }

    fn tls_principal(&self, client: &str) -> Principal {
        Principal {
            identifier: Some(principal::Identifier::Authenticated(principal::Authenticated {
                principal_name: Some(self.san_matcher.matcher_for(client)),
            })),
        }
    }

    fn merge_with_oauth_policy(
        &self,
        client: &ClientWithSelector,
        principal: Principal,
        policy: Option<OAuthPolicy>,
    ) -> Principal {
        if self.oauth_matching_clients.contains(&client.name) {
            // The client is identified by a JWT claim already; stacking the
            // provider-wide policy on top would be redundant.
            return principal;
        }
        match policy {
            Some(OAuthPolicy::Strict) => {
                and_principals(vec![self.strict_policy_principal.clone(), principal])
            }
            Some(OAuthPolicy::AllowMissing) => {
                and_principals(vec![self.allow_missing_policy_principal.clone(), principal])
            }
            Some(OAuthPolicy::AllowMissingOrFailed) | None => principal,
        }
    }

    fn principal_for_empty_clients(&self, endpoint: &IncomingEndpoint) -> Principal {
        let policy = endpoint.oauth.as_ref().and_then(|oauth| oauth.policy);
        match endpoint.unlisted_clients_policy {
            UnlistedPolicy::Log => match policy {
                Some(OAuthPolicy::Strict) => self.strict_policy_principal.clone(),
                Some(OAuthPolicy::AllowMissing) => self.allow_missing_policy_principal.clone(),
                Some(OAuthPolicy::AllowMissingOrFailed) | None => any_principal(),
            },
            UnlistedPolicy::BlockAndLog => not_principal(any_principal()),
        }
    }

    /// The operational backdoor: configured clients get TLS-authenticated
    /// access to every restricted policy in the enforced rules. Shadow rules
    /// are built beforehand and never include them.
    fn with_full_access_clients(&self, mut policy: Policy) -> Policy {
        policy
            .principals
            .extend(self.full_access_clients.iter().map(|client| self.tls_principal(client)));
        policy
    }
}

/// Role expansion then sorted-set dedup. A client name matching a declared
/// role always expands to the role's clients, shadowing any literal client of
/// the same name.
fn resolve_clients(
    endpoint: &IncomingEndpoint,
    incoming: &Incoming,
) -> BTreeSet<ClientWithSelector> {
    endpoint
        .clients
        .iter()
        .flat_map(|client| {
            match incoming.roles.iter().find(|role| role.name == client.name) {
                Some(role) => role.clients.clone(),
                None => vec![client.clone()],
            }
        })
        .collect()
}

fn combined_permission(endpoint: &IncomingEndpoint) -> Permission {
    let mut rules = vec![path_permission(&endpoint.path, endpoint.path_matching_type)];
    if !endpoint.methods.is_empty() {
        rules.push(any_of_permissions(
            endpoint.methods.iter().map(|method| method_permission(method)).collect(),
        ));
    }
    and_permissions(rules)
}

fn path_permission(path: &str, matching_type: PathMatchingType) -> Permission {
    let matcher = match matching_type {
        PathMatchingType::Path => exact_matcher(path),
        PathMatchingType::PathPrefix => prefix_matcher(path),
        PathMatchingType::PathRegex => safe_regex_matcher(path),
    };
    url_path_permission(matcher)
}

fn status_path_permission(path: &str, match_kind: PathMatchKind) -> Permission {
    let matcher = match match_kind {
        PathMatchKind::Exact => exact_matcher(path),
        PathMatchKind::Prefix => prefix_matcher(path),
        PathMatchKind::Regex => safe_regex_matcher(path),
    };
    url_path_permission(matcher)
}

fn url_path_permission(matcher: StringMatcher) -> Permission {
    Permission {
        rule: Some(permission::Rule::UrlPath(PathMatcher {
            rule: Some(path_matcher::Rule::Path(matcher)),
        })),
    }
}

fn method_permission(method: &str) -> Permission {
    Permission {
        rule: Some(permission::Rule::Header(HeaderMatcher {
            name: ":method".to_string(),
            header_match_specifier: Some(header_matcher::HeaderMatchSpecifier::ExactMatch(
                method.to_string(),
            )),
            ..Default::default()
        })),
    }
}

fn and_permissions(rules: Vec<Permission>) -> Permission {
    Permission { rule: Some(permission::Rule::AndRules(permission::Set { rules })) }
}

fn any_of_permissions(rules: Vec<Permission>) -> Permission {
    Permission { rule: Some(permission::Rule::OrRules(permission::Set { rules })) }
}

fn none_of_permissions(rules: Vec<Permission>) -> Permission {
    if rules.is_empty() {
        Permission { rule: Some(permission::Rule::Any(true)) }
    } else {
        Permission {
            rule: Some(permission::Rule::NotRule(Box::new(any_of_permissions(rules)))),
        }
    }
}

fn allow_logged_policy(logged_permissions: &[Permission]) -> Option<(String, Policy)> {
    if logged_permissions.is_empty() {
        return None;
    }
    Some((
        ALLOW_LOGGED_POLICY_NAME.to_string(),
        Policy {
            permissions: vec![any_of_permissions(logged_permissions.to_vec())],
            principals: vec![any_principal()],
            ..Default::default()
        },
    ))
}

fn any_principal() -> Principal {
    Principal { identifier: Some(principal::Identifier::Any(true)) }
}

fn not_principal(principal: Principal) -> Principal {
    Principal { identifier: Some(principal::Identifier::NotId(Box::new(principal))) }
}

fn and_principals(ids: Vec<Principal>) -> Principal {
    Principal { identifier: Some(principal::Identifier::AndIds(principal::Set { ids })) }
}

fn or_principals(ids: Vec<Principal>) -> Principal {
    Principal { identifier: Some(principal::Identifier::OrIds(principal::Set { ids })) }
}

fn cidr_principal((address, prefix_len): (String, u32)) -> Principal {
    Principal {
        identifier: Some(principal::Identifier::DirectRemoteIp(CidrRange {
            address_prefix: address,
            prefix_len: Some(UInt32Value { value: prefix_len }),
        })),
    }
}

fn header_principal(name: &str, value: &str) -> Principal {
    Principal {
        identifier: Some(principal::Identifier::Header(HeaderMatcher {
            name: name.to_string(),
            header_match_specifier: Some(header_matcher::HeaderMatchSpecifier::ExactMatch(
                value.to_string(),
            )),
            ..Default::default()
        })),
    }
}

fn metadata_principal(filter: &str, path: Vec<String>, value: ValueMatcher) -> Principal {
    Principal {
        identifier: Some(principal::Identifier::Metadata(MetadataMatcher {
            filter: filter.to_string(),
            path: path
                .into_iter()
                .map(|key| metadata_matcher::PathSegment {
                    segment: Some(metadata_matcher::path_segment::Segment::Key(key)),
                })
                .collect(),
            value: Some(value),
            ..Default::default()
        })),
    }
}

fn jwt_status_principal(status: &str) -> Principal {
    metadata_principal(
        HEADER_TO_METADATA_FILTER_NAME,
        vec![JWT_STATUS_KEY.to_string()],
        ValueMatcher {
            match_pattern: Some(value_matcher::MatchPattern::StringMatch(exact_matcher(status))),
        },
    )
}

fn strict_principal(payload_in_metadata: &str, field_required: &str) -> Principal {
    and_principals(vec![
        jwt_status_principal(JWT_STATUS_PRESENT),
        metadata_principal(
            JWT_FILTER_NAME,
            vec![payload_in_metadata.to_string(), field_required.to_string()],
            ValueMatcher { match_pattern: Some(value_matcher::MatchPattern::PresentMatch(true)) },
        ),
    ])
}

fn with_selector_matching(
    principal: Principal,
    client: &ClientWithSelector,
    matching: Option<&SelectorMatchingConfig>,
) -> Principal {
    match (&client.selector, matching) {
        (Some(selector), Some(matching)) if !matching.header.is_empty() => {
            and_principals(vec![principal, header_principal(&matching.header, selector)])
        }
        _ => principal,
    }
}

fn parse_cidr(range: &str) -> Result<(String, u32)> {
    let (address, prefix) = range
        .split_once('/')
        .ok_or_else(|| MeshplaneError::config(format!("Invalid CIDR range: {}", range)))?;
    let prefix_len = prefix
        .parse::<u32>()
        .map_err(|_| MeshplaneError::config(format!("Invalid CIDR prefix length: {}", range)))?;
    Ok((address.to_string(), prefix_len))
}

fn exact_matcher(value: &str) -> StringMatcher {
    StringMatcher {
        match_pattern: Some(string_matcher::MatchPattern::Exact(value.to_string())),
        ..Default::default()
    }
}

fn prefix_matcher(value: &str) -> StringMatcher {
    StringMatcher {
        match_pattern: Some(string_matcher::MatchPattern::Prefix(value.to_string())),
        ..Default::default()
    }
}

fn safe_regex_matcher(pattern: &str) -> StringMatcher {
    StringMatcher {
        match_pattern: Some(string_matcher::MatchPattern::SafeRegex(RegexMatcher {
            engine_type: Some(regex_matcher::EngineType::GoogleRe2(
                regex_matcher::GoogleRe2::default(),
            )),
            regex: pattern.to_string(),
        })),
        ..Default::default()
    }
}

/// Builds SAN URI matchers from the configured template. Allow-listed fleet
/// identities expand to a wildcard regex, everything else to an exact match.
struct SanUriMatcher {
    format: String,
    wildcard_regex: String,
    wildcard_clients: Vec<String>,
}

impl SanUriMatcher {
    fn new(config: &TlsAuthenticationConfig) -> Result<Self> {
        let parts: Vec<&str> = config.san_uri_format.split(SERVICE_NAME_TOKEN).collect();
        if parts.len() != 2 {
            return Err(MeshplaneError::config(format!(
                "SAN URI format {} does not properly contain {}",
                config.san_uri_format, SERVICE_NAME_TOKEN
            )));
        }
        let wildcard_regex =
            format!("{}.+{}", regex::escape(parts[0]), regex::escape(parts[1]));
        Ok(Self {
            format: config.san_uri_format.clone(),
            wildcard_regex,
            wildcard_clients: config.san_uri_wildcard_clients.clone(),
        })
    }

    fn matcher_for(&self, client: &str) -> StringMatcher {
        if self.wildcard_clients.iter().any(|wildcard| wildcard == client) {
            safe_regex_matcher(&self.wildcard_regex)
        } else {
            exact_matcher(&self.format.replace(SERVICE_NAME_TOKEN, client))
        }
    }
}
