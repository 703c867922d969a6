//! Parsing of the proxy-declared metadata document into [`NodeMetadata`].
//!
//! The document arrives as a `google.protobuf.Struct` on the discovery
//! request's node. Parsing is lenient about absent fields (defaults apply)
//! and strict about malformed ones; every rejection is a typed
//! [`ValidationError`] so the connection can be refused with a stable
//! message.

use std::collections::BTreeSet;
use std::time::Duration;

use envoy_types::pb::google::protobuf::{value::Kind, Struct, Value};
use tracing::warn;

use crate::config::SnapshotConfig;
use crate::errors::ValidationError;

use super::{
    ClientWithSelector, CommunicationMode, Dependency, DependencySettings, DomainDependency,
    HealthCheck, Incoming, IncomingEndpoint, IncomingTimeoutPolicy, ListenersConfig, OAuth,
    OAuthPolicy, OAuthVerification, Outgoing, OutgoingTimeoutPolicy, PathMatchingType,
    ProxySettings, RateLimitEndpoint, Role, ServiceDependency, UnlistedPolicy,
};

/// Everything a proxy declared about itself, in typed form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeMetadata {
    /// Declared service identity; empty when not declared.
    pub service_name: String,
    /// Identity used for discovery lookups when it differs from
    /// `service_name`.
    pub discovery_service_name: Option<String>,
    pub communication_mode: CommunicationMode,
    pub proxy_settings: ProxySettings,
    /// Present only when the proxy declared a complete, well-formed listener
    /// address set.
    pub listeners_config: Option<ListenersConfig>,
}

impl NodeMetadata {
    /// Parse the node metadata struct of a discovery request.
    pub fn from_node_struct(
        metadata: &Struct,
        config: &SnapshotConfig,
    ) -> Result<Self, ValidationError> {
        let service_name =
            metadata.string_field("service_name").unwrap_or_default().to_string();
        let discovery_service_name =
            metadata.string_field("discovery_service_name").map(str::to_string);
        let communication_mode = match metadata.bool_field("ads") {
            Some(true) => CommunicationMode::Ads,
            _ => CommunicationMode::Xds,
        };
        let proxy_settings = match metadata.field("proxy_settings").and_then(Value::as_struct) {
            Some(settings) => parse_proxy_settings(settings, config)?,
            None => ProxySettings::default(),
        };
        let listeners_config = parse_listeners_config(metadata);

        Ok(Self {
            service_name,
            discovery_service_name,
            communication_mode,
            proxy_settings,
            listeners_config,
        })
    }
}

/// Listener configuration is best-effort: a partial or malformed declaration
/// downgrades the proxy to managing its own listeners instead of rejecting
/// the connection.
fn parse_listeners_config(metadata: &Struct) -> Option<ListenersConfig> {
    let declared = ["ingress_host", "ingress_port", "egress_host", "egress_port"]
        .iter()
        .any(|field| metadata.field(field).is_some());
    if !declared {
        return None;
    }

    let ingress_host = metadata.string_field("ingress_host");
    let ingress_port = port_field(metadata, "ingress_port");
    let egress_host = metadata.string_field("egress_host");
    let egress_port = port_field(metadata, "egress_port");

    match (ingress_host, ingress_port, egress_host, egress_port) {
        (Some(ingress_host), Some(ingress_port), Some(egress_host), Some(egress_port)) => {
            Some(ListenersConfig {
                ingress_host: ingress_host.to_string(),
                ingress_port,
                egress_host: egress_host.to_string(),
                egress_port,
                use_remote_address: metadata.bool_field("use_remote_address").unwrap_or(false),
                access_log_enabled: metadata.bool_field("access_log_enabled").unwrap_or(false),
            })
        }
        _ => {
            warn!("Incomplete or malformed listener declaration, serving no listeners");
            None
        }
    }
}

fn port_field(metadata: &Struct, key: &str) -> Option<u32> {
    match metadata.field(key)?.kind {
        Some(Kind::NumberValue(port))
            if port.fract() == 0.0 && (1.0..=65535.0).contains(&port) =>
        {
            Some(port as u32)
        }
        _ => None,
    }
}

fn parse_proxy_settings(
    settings: &Struct,
    config: &SnapshotConfig,
) -> Result<ProxySettings, ValidationError> {
    let incoming = match settings.field("incoming").and_then(Value::as_struct) {
        Some(incoming) => parse_incoming(incoming)?,
        None => Incoming::default(),
    };
    let outgoing = match settings.field("outgoing").and_then(Value::as_struct) {
        Some(outgoing) => parse_outgoing(outgoing, config)?,
        None => Outgoing::default(),
    };
    Ok(ProxySettings { incoming, outgoing })
}

fn parse_incoming(incoming: &Struct) -> Result<Incoming, ValidationError> {
    // Presence of the endpoints field is meaningful on its own: it switches
    // ingress permission enforcement on even when the list is empty.
    let endpoints_field = incoming.field("endpoints");
    let permissions_enabled = endpoints_field.is_some();
    let endpoints = endpoints_field
        .and_then(Value::as_list)
        .map(|values| values.iter().map(parse_endpoint).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let unlisted_endpoints_policy =
        parse_unlisted_policy(incoming.field("unlistedEndpointsPolicy"), UnlistedPolicy::Log);

    let roles = incoming
        .field("roles")
        .and_then(Value::as_list)
        .map(|values| values.iter().filter_map(parse_role).collect())
        .unwrap_or_default();

    let rate_limit_endpoints = incoming
        .field("rateLimitEndpoints")
        .and_then(Value::as_list)
        .map(|values| {
            values.iter().map(parse_rate_limit_endpoint).collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    let health_check = incoming
        .field("healthCheck")
        .and_then(Value::as_struct)
        .map(parse_health_check)
        .unwrap_or_default();

    let timeout_policy = incoming
        .field("timeoutPolicy")
        .and_then(Value::as_struct)
        .map(parse_incoming_timeout_policy)
        .transpose()?
        .unwrap_or_default();

    Ok(Incoming {
        endpoints,
        permissions_enabled,
        unlisted_endpoints_policy,
        roles,
        rate_limit_endpoints,
        health_check,
        timeout_policy,
    })
}

fn parse_endpoint(value: &Value) -> Result<IncomingEndpoint, ValidationError> {
    let endpoint = value.as_struct().unwrap_or(EMPTY_STRUCT.get_or_init(Struct::default));
    let (path, path_matching_type) = parse_path_fields(endpoint)?;

    let methods = parse_string_set(endpoint.field("methods"));
    let clients = endpoint
        .field("clients")
        .and_then(Value::as_list)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(ClientWithSelector::decompose)
                .collect()
        })
        .unwrap_or_default();

    let unlisted_clients_policy =
        parse_unlisted_policy(endpoint.field("unlistedClientsPolicy"), UnlistedPolicy::Log);

    let oauth = endpoint.field("oauth").and_then(Value::as_struct).map(parse_oauth);

    Ok(IncomingEndpoint {
        path,
        path_matching_type,
        methods,
        clients,
        unlisted_clients_policy,
        oauth,
    })
}

fn parse_path_fields(endpoint: &Struct) -> Result<(String, PathMatchingType), ValidationError> {
    let mut declared = Vec::new();
    for (field, matching) in [
        ("path", PathMatchingType::Path),
        ("pathPrefix", PathMatchingType::PathPrefix),
        ("pathRegex", PathMatchingType::PathRegex),
    ] {
        if let Some(path) = endpoint.string_field(field) {
            declared.push((path.to_string(), matching));
        }
    }
    match declared.len() {
        0 => Err(ValidationError::no_path_field()),
        1 => Ok(declared.remove(0)),
        _ => Err(ValidationError::both_path_fields()),
    }
}

fn parse_unlisted_policy(value: Option<&Value>, default: UnlistedPolicy) -> UnlistedPolicy {
    match value.and_then(Value::as_str) {
        None => default,
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "log" => UnlistedPolicy::Log,
            "blockandlog" => UnlistedPolicy::BlockAndLog,
            other => {
                warn!(policy = other, "Unknown unlisted policy, using default");
                default
            }
        },
    }
}

fn parse_role(value: &Value) -> Option<Role> {
    let role = value.as_struct()?;
    let name = role.string_field("name")?.to_string();
    let clients = role
        .field("clients")
        .and_then(Value::as_list)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(ClientWithSelector::decompose)
                .collect()
        })
        .unwrap_or_default();
    Some(Role { name, clients })
}

fn parse_oauth(oauth: &Struct) -> OAuth {
    let provider = oauth.string_field("provider").unwrap_or_default().to_string();
    let policy = oauth.string_field("policy").and_then(|raw| match raw {
        "strict" => Some(OAuthPolicy::Strict),
        "allowMissing" => Some(OAuthPolicy::AllowMissing),
        "allowMissingOrFailed" => Some(OAuthPolicy::AllowMissingOrFailed),
        other => {
            warn!(policy = other, "Unknown OAuth policy, endpoint gets no OAuth principals");
            None
        }
    });
    OAuth { provider, verification: OAuthVerification::Offline, policy }
}

fn parse_rate_limit_endpoint(value: &Value) -> Result<RateLimitEndpoint, ValidationError> {
    let endpoint = value.as_struct().unwrap_or(EMPTY_STRUCT.get_or_init(Struct::default));
    let (path, path_matching_type) = parse_path_fields(endpoint)?;
    let methods = parse_string_set(endpoint.field("methods"));
    let rate_limit = endpoint.string_field("rateLimit").unwrap_or_default().to_string();
    Ok(RateLimitEndpoint { path, path_matching_type, methods, rate_limit })
}

fn parse_health_check(health_check: &Struct) -> HealthCheck {
    let defaults = HealthCheck::default();
    HealthCheck {
        path: health_check.string_field("path").unwrap_or_default().to_string(),
        cluster_name: health_check
            .string_field("clusterName")
            .map(str::to_string)
            .unwrap_or(defaults.cluster_name),
    }
}

fn parse_incoming_timeout_policy(
    timeout_policy: &Struct,
) -> Result<IncomingTimeoutPolicy, ValidationError> {
    Ok(IncomingTimeoutPolicy {
        idle_timeout: parse_duration(timeout_policy.field("idleTimeout"))?,
        response_timeout: parse_duration(timeout_policy.field("responseTimeout"))?,
        connection_idle_timeout: parse_duration(timeout_policy.field("connectionIdleTimeout"))?,
    })
}

fn parse_outgoing(outgoing: &Struct, config: &SnapshotConfig) -> Result<Outgoing, ValidationError> {
    let mut dependencies = Vec::new();
    let mut all_services_dependencies = false;

    if let Some(values) = outgoing.field("dependencies").and_then(Value::as_list) {
        for value in values {
            let dependency =
                value.as_struct().unwrap_or(EMPTY_STRUCT.get_or_init(Struct::default));
            let service = dependency.string_field("service");
            let domain = dependency.string_field("domain");
            let settings = parse_dependency_settings(dependency, config)?;

            match (service, domain) {
                (Some(service), None) => {
                    if service == config.outgoing_permissions.all_services_dependencies_value {
                        all_services_dependencies = true;
                    } else {
                        dependencies.push(Dependency::Service(ServiceDependency {
                            service: service.to_string(),
                            settings,
                        }));
                    }
                }
                (None, Some(domain)) => {
                    if !domain.starts_with("http://") && !domain.starts_with("https://") {
                        return Err(ValidationError::unsupported_protocol(domain));
                    }
                    dependencies.push(Dependency::Domain(DomainDependency {
                        domain: domain.to_string(),
                        settings,
                    }));
                }
                _ => return Err(ValidationError::service_or_domain_required()),
            }
        }
    }

    Ok(Outgoing::new(dependencies, all_services_dependencies))
}

fn parse_dependency_settings(
    dependency: &Struct,
    config: &SnapshotConfig,
) -> Result<DependencySettings, ValidationError> {
    let handle_internal_redirect = dependency
        .bool_field("handleInternalRedirect")
        .unwrap_or(config.egress.handle_internal_redirect);
    let rewrite_host_header = dependency.bool_field("rewriteHostHeader").unwrap_or(false);

    let timeout_policy = match dependency.field("timeoutPolicy").and_then(Value::as_struct) {
        Some(timeout_policy) => OutgoingTimeoutPolicy {
            idle_timeout: parse_duration(timeout_policy.field("idleTimeout"))?
                .unwrap_or_else(|| config.egress.idle_timeout()),
            request_timeout: parse_duration(timeout_policy.field("requestTimeout"))?
                .unwrap_or_else(|| config.egress.request_timeout()),
        },
        None => OutgoingTimeoutPolicy {
            idle_timeout: config.egress.idle_timeout(),
            request_timeout: config.egress.request_timeout(),
        },
    };

    let service_tag_preference = dependency
        .field("serviceTagPreference")
        .and_then(Value::as_list)
        .map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    Ok(DependencySettings {
        handle_internal_redirect,
        timeout_policy,
        rewrite_host_header,
        service_tag_preference,
    })
}

/// Parse a protobuf-style duration string (`"15s"`, fractional allowed).
/// Blank strings mean "not set"; numbers are a typed error because YAML and
/// JSON make that mistake easy.
fn parse_duration(value: Option<&Value>) -> Result<Option<Duration>, ValidationError> {
    let value = match value {
        Some(value) => value,
        None => return Ok(None),
    };
    match &value.kind {
        None | Some(Kind::NullValue(_)) => Ok(None),
        Some(Kind::NumberValue(_)) => Err(ValidationError::timeout_wrong_type()),
        Some(Kind::StringValue(raw)) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let seconds = trimmed
                .strip_suffix('s')
                .and_then(|digits| digits.parse::<f64>().ok())
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .ok_or_else(|| ValidationError::timeout_incorrect_format(trimmed))?;
            Ok(Some(Duration::from_secs_f64(seconds)))
        }
        Some(_) => Err(ValidationError::timeout_incorrect_format("not a string")),
    }
}

fn parse_string_set(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_list)
        .map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

static EMPTY_STRUCT: std::sync::OnceLock<Struct> = std::sync::OnceLock::new();

/// Field access over `google.protobuf.Struct` treating explicit nulls the
/// same as absent fields.
trait StructExt {
    fn field(&self, key: &str) -> Option<&Value>;

    fn string_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    fn bool_field(&self, key: &str) -> Option<bool> {
        self.field(key).and_then(Value::as_bool)
    }
}

impl StructExt for Struct {
    fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !matches!(value.kind, Some(Kind::NullValue(_)) | None))
    }
}

trait ValueExt {
    fn as_str(&self) -> Option<&str>;
    fn as_bool(&self) -> Option<bool>;
    fn as_struct(&self) -> Option<&Struct>;
    fn as_list(&self) -> Option<&[Value]>;
}

impl ValueExt for Value {
    fn as_str(&self) -> Option<&str> {
        match &self.kind {
            Some(Kind::StringValue(value)) => Some(value),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match &self.kind {
            Some(Kind::BoolValue(value)) => Some(*value),
            _ => None,
        }
    }

    fn as_struct(&self) -> Option<&Struct> {
        match &self.kind {
            Some(Kind::StructValue(value)) => Some(value),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<&[Value]> {
        match &self.kind {
            Some(Kind::ListValue(value)) => Some(&value.values),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) fn struct_from_json(json: serde_json::Value) -> Struct {
    fn convert(json: serde_json::Value) -> Value {
        use envoy_types::pb::google::protobuf::ListValue;
        let kind = match json {
            serde_json::Value::Null => Kind::NullValue(0),
            serde_json::Value::Bool(value) => Kind::BoolValue(value),
            serde_json::Value::Number(value) => {
                Kind::NumberValue(value.as_f64().unwrap_or_default())
            }
            serde_json::Value::String(value) => Kind::StringValue(value),
            serde_json::Value::Array(values) => Kind::ListValue(ListValue {
                values: values.into_iter().map(convert).collect(),
            }),
            serde_json::Value::Object(fields) => Kind::StructValue(Struct {
                fields: fields.into_iter().map(|(key, value)| (key, convert(value))).collect(),
            }),
        };
        Value { kind: Some(kind) }
    }

    match convert(json).kind {
        Some(Kind::StructValue(value)) => value,
        _ => Struct::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationErrorKind;
    use serde_json::json;

    fn parse(json: serde_json::Value) -> Result<NodeMetadata, ValidationError> {
        NodeMetadata::from_node_struct(&struct_from_json(json), &SnapshotConfig::default())
    }

    #[test]
    fn empty_metadata_parses_to_defaults() {
        let metadata = parse(json!({})).unwrap();
        assert_eq!(metadata.service_name, "");
        assert_eq!(metadata.communication_mode, CommunicationMode::Xds);
        assert!(!metadata.proxy_settings.incoming.permissions_enabled);
        assert!(metadata.proxy_settings.outgoing.service_dependencies().is_empty());
    }

    #[test]
    fn ads_flag_selects_communication_mode() {
        let metadata = parse(json!({"service_name": "echo", "ads": true})).unwrap();
        assert_eq!(metadata.communication_mode, CommunicationMode::Ads);
        assert_eq!(metadata.service_name, "echo");
    }

    #[test]
    fn endpoints_field_enables_permissions_even_when_empty() {
        let metadata =
            parse(json!({"proxy_settings": {"incoming": {"endpoints": []}}})).unwrap();
        assert!(metadata.proxy_settings.incoming.permissions_enabled);
        assert!(metadata.proxy_settings.incoming.endpoints.is_empty());

        let metadata = parse(json!({"proxy_settings": {"incoming": {}}})).unwrap();
        assert!(!metadata.proxy_settings.incoming.permissions_enabled);
    }

    #[test]
    fn parses_endpoint_with_clients_and_selectors() {
        let metadata = parse(json!({"proxy_settings": {"incoming": {"endpoints": [{
            "path": "/orders",
            "methods": ["POST", "GET"],
            "clients": ["billing", "fraud:batch", "!legacy"],
            "unlistedClientsPolicy": "blockAndLog",
        }]}}}))
        .unwrap();

        let endpoint = &metadata.proxy_settings.incoming.endpoints[0];
        assert_eq!(endpoint.path, "/orders");
        assert_eq!(endpoint.path_matching_type, PathMatchingType::Path);
        assert_eq!(endpoint.methods.len(), 2);
        assert_eq!(endpoint.clients[1], ClientWithSelector::with_selector("fraud", "batch"));
        assert!(endpoint.clients[2].negated);
        assert_eq!(endpoint.unlisted_clients_policy, UnlistedPolicy::BlockAndLog);
    }

    #[test]
    fn rejects_endpoint_with_both_path_fields() {
        let error = parse(json!({"proxy_settings": {"incoming": {"endpoints": [{
            "path": "/a", "pathPrefix": "/b"
        }]}}}))
        .unwrap_err();
        assert_eq!(error.kind, ValidationErrorKind::ExactlyOnePathField);
        assert_eq!(error.to_string(), "Precisely one of 'path' and 'pathPrefix' field is allowed");
    }

    #[test]
    fn rejects_endpoint_without_path_field() {
        let error = parse(json!({"proxy_settings": {"incoming": {"endpoints": [{
            "clients": ["billing"]
        }]}}}))
        .unwrap_err();
        assert_eq!(error.to_string(), "One of 'path' or 'pathPrefix' field is required");
    }

    #[test]
    fn rejects_dependency_with_neither_service_nor_domain() {
        let error = parse(json!({"proxy_settings": {"outgoing": {"dependencies": [{}]}}}))
            .unwrap_err();
        assert_eq!(error.kind, ValidationErrorKind::ExactlyOneDependencyField);
    }

    #[test]
    fn rejects_domain_with_unsupported_protocol() {
        let error = parse(json!({"proxy_settings": {"outgoing": {"dependencies": [
            {"domain": "ftp://domain.pl"}
        ]}}}))
        .unwrap_err();
        assert_eq!(error.kind, ValidationErrorKind::UnsupportedProtocol);
        assert!(error.message.contains("ftp://domain.pl"));
    }

    #[test]
    fn wildcard_dependency_sets_all_services_flag() {
        let metadata = parse(json!({"proxy_settings": {"outgoing": {"dependencies": [
            {"service": "*"}, {"service": "billing"}
        ]}}}))
        .unwrap();
        let outgoing = &metadata.proxy_settings.outgoing;
        assert!(outgoing.has_all_services_dependencies());
        assert_eq!(outgoing.service_dependencies().len(), 1);
        assert!(outgoing.contains_dependency_for_service("billing"));
    }

    #[test]
    fn dependency_timeouts_fall_back_to_configured_defaults() {
        let metadata = parse(json!({"proxy_settings": {"outgoing": {"dependencies": [
            {"service": "billing", "timeoutPolicy": {"requestTimeout": "5s"}}
        ]}}}))
        .unwrap();
        let settings = &metadata.proxy_settings.outgoing.service_dependencies()[0].settings;
        assert_eq!(settings.timeout_policy.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.timeout_policy.idle_timeout, Duration::from_secs(120));
    }

    #[test]
    fn rejects_numeric_timeout_with_typed_message() {
        let error = parse(json!({"proxy_settings": {"outgoing": {"dependencies": [
            {"service": "billing", "timeoutPolicy": {"requestTimeout": 5}}
        ]}}}))
        .unwrap_err();
        assert_eq!(error.kind, ValidationErrorKind::InvalidTimeoutFormat);
        assert_eq!(
            error.to_string(),
            "Timeout definition has number format but should be in string format and ends with 's'"
        );
    }

    #[test]
    fn blank_timeout_means_absent() {
        let metadata = parse(json!({"proxy_settings": {"incoming": {
            "timeoutPolicy": {"idleTimeout": " ", "responseTimeout": "0.5s"}
        }}}))
        .unwrap();
        let timeouts = &metadata.proxy_settings.incoming.timeout_policy;
        assert_eq!(timeouts.idle_timeout, None);
        assert_eq!(timeouts.response_timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn rejects_malformed_timeout_string() {
        let error = parse(json!({"proxy_settings": {"incoming": {
            "timeoutPolicy": {"idleTimeout": "10 minutes"}
        }}}))
        .unwrap_err();
        assert!(error.message.contains("10 minutes"));
    }

    #[test]
    fn parses_oauth_policy() {
        let metadata = parse(json!({"proxy_settings": {"incoming": {"endpoints": [{
            "pathPrefix": "/api",
            "oauth": {"provider": "oauth-provider", "policy": "allowMissingOrFailed"}
        }]}}}))
        .unwrap();
        let oauth = metadata.proxy_settings.incoming.endpoints[0].oauth.as_ref().unwrap();
        assert_eq!(oauth.provider, "oauth-provider");
        assert_eq!(oauth.policy, Some(OAuthPolicy::AllowMissingOrFailed));
    }

    #[test]
    fn parses_complete_listener_declaration() {
        let metadata = parse(json!({
            "ingress_host": "0.0.0.0", "ingress_port": 8080,
            "egress_host": "127.0.0.1", "egress_port": 8081,
            "use_remote_address": true,
        }))
        .unwrap();
        let listeners = metadata.listeners_config.unwrap();
        assert_eq!(listeners.ingress_port, 8080);
        assert_eq!(listeners.egress_host, "127.0.0.1");
        assert!(listeners.use_remote_address);
        assert!(!listeners.access_log_enabled);
    }

    #[tracing_test::traced_test]
    #[test]
    fn partial_or_invalid_listener_declaration_yields_none() {
        let partial = parse(json!({"ingress_host": "0.0.0.0", "ingress_port": 8080})).unwrap();
        assert_eq!(partial.listeners_config, None);
        assert!(logs_contain("Incomplete or malformed listener declaration"));

        let bad_port = parse(json!({
            "ingress_host": "0.0.0.0", "ingress_port": 70000,
            "egress_host": "127.0.0.1", "egress_port": 8081,
        }))
        .unwrap();
        assert_eq!(bad_port.listeners_config, None);

        let undeclared = parse(json!({"service_name": "echo"})).unwrap();
        assert_eq!(undeclared.listeners_config, None);
    }

    #[test]
    fn parses_roles_and_rate_limits() {
        let metadata = parse(json!({"proxy_settings": {"incoming": {
            "roles": [{"name": "team", "clients": ["a", "b:prod"]}],
            "rateLimitEndpoints": [{"pathPrefix": "/api", "rateLimit": "12/s"}]
        }}}))
        .unwrap();
        let incoming = &metadata.proxy_settings.incoming;
        assert_eq!(incoming.roles[0].name, "team");
        assert_eq!(incoming.roles[0].clients.len(), 2);
        assert_eq!(incoming.rate_limit_endpoints[0].rate_limit, "12/s");
        assert_eq!(
            incoming.rate_limit_endpoints[0].path_matching_type,
            PathMatchingType::PathPrefix
        );
    }
}
