//! Configuration structure for snapshot compilation.
//!
//! Field names follow the metadata contract the proxies already use, so the
//! YAML reads naturally next to proxy deployment manifests.

use crate::errors::{MeshplaneError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Root configuration for snapshot compilation and metadata validation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Reject proxies that do not declare a service name.
    pub require_service_name: bool,

    /// Communication modes this server is willing to serve.
    pub enabled_communication_modes: EnabledCommunicationModes,

    /// Incoming (ingress) permission compilation settings.
    #[validate(nested)]
    pub incoming_permissions: IncomingPermissionsConfig,

    /// Outgoing (egress) dependency settings.
    #[validate(nested)]
    pub outgoing_permissions: OutgoingPermissionsConfig,

    /// JWT / OAuth provider settings used by the JWT filter and the
    /// authorization policy compiler.
    pub jwt: JwtFilterConfig,

    /// Egress routing settings (service tags).
    pub routing: RoutingConfig,

    /// Status (health/infra) routes that are always allowed.
    pub status_routes: StatusRoutesConfig,

    /// Defaults applied to dependencies that declare no timeout policy.
    #[validate(nested)]
    pub egress: EgressConfig,

    /// Response compression filter settings.
    pub compression: CompressionConfig,
}

impl SnapshotConfig {
    /// Boot-time consistency checks beyond per-field validation.
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(MeshplaneError::from)?;

        if !self.enabled_communication_modes.ads && !self.enabled_communication_modes.xds {
            return Err(MeshplaneError::config(
                "At least one of the ADS and XDS communication modes must be enabled",
            ));
        }

        if !self.incoming_permissions.tls_authentication.san_uri_format.contains(SERVICE_NAME_TOKEN)
        {
            return Err(MeshplaneError::config(format!(
                "tls_authentication.san_uri_format must contain the '{}' placeholder",
                SERVICE_NAME_TOKEN
            )));
        }

        Ok(())
    }
}

/// Placeholder substituted with the client service name when deriving TLS
/// SAN URI principals.
pub const SERVICE_NAME_TOKEN: &str = "{service-name}";

/// Which discovery communication modes are served.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledCommunicationModes {
    pub ads: bool,
    pub xds: bool,
}

impl Default for EnabledCommunicationModes {
    fn default() -> Self {
        Self { ads: true, xds: true }
    }
}

/// Ingress permission compilation settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IncomingPermissionsConfig {
    /// Master switch. When disabled, incoming permission declarations are
    /// stripped during group classification and no RBAC filter is compiled.
    pub enabled: bool,

    /// TLS identity derivation for client principals.
    pub tls_authentication: TlsAuthenticationConfig,

    /// Request header carrying the caller-declared identity, surfaced into
    /// dynamic metadata for authorization logging.
    pub client_identity_header: String,

    /// Clients granted blanket access to every restricted policy in the
    /// enforced rules. Security-relevant; shadow rules never include them.
    pub clients_allowed_to_all_endpoints: Vec<String>,

    /// Services permitted to use the wildcard client in endpoint client lists.
    pub clients_allowed_to_use_wildcard: Vec<String>,

    /// Source-IP-based client authentication.
    pub source_ip_authentication: SourceIpAuthenticationConfig,

    /// Per-client secondary matching dimension (header refinement).
    /// Every key must also appear in one of the source IP sections; checked
    /// at compiler construction.
    pub selector_matching: BTreeMap<String, SelectorMatchingConfig>,

    /// When the unlisted-endpoints policy is LOG, also emit the aggregated
    /// logged-endpoints policy into the enforced rules so overlapping
    /// restricted paths cannot shadow logged ones.
    pub overlapping_paths_fix: bool,
}

impl Default for IncomingPermissionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tls_authentication: TlsAuthenticationConfig::default(),
            client_identity_header: "x-service-name".to_string(),
            clients_allowed_to_all_endpoints: Vec::new(),
            clients_allowed_to_use_wildcard: Vec::new(),
            source_ip_authentication: SourceIpAuthenticationConfig::default(),
            selector_matching: BTreeMap::new(),
            overlapping_paths_fix: false,
        }
    }
}

/// TLS identity settings used to derive authenticated principals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsAuthenticationConfig {
    /// SAN URI template; `{service-name}` is replaced with the client name.
    pub san_uri_format: String,

    /// Client names that expand to a wildcard SAN match instead of an exact
    /// one (fleet-level identities).
    pub san_uri_wildcard_clients: Vec<String>,
}

impl Default for TlsAuthenticationConfig {
    fn default() -> Self {
        Self {
            san_uri_format: format!("spiffe://{}", SERVICE_NAME_TOKEN),
            san_uri_wildcard_clients: Vec::new(),
        }
    }
}

/// Source-IP client authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourceIpAuthenticationConfig {
    /// Clients authenticated by the current endpoint IPs of their own
    /// service, materialized from the topology snapshot at compile time.
    pub ip_from_service_discovery: IpFromServiceDiscoveryConfig,

    /// Clients authenticated by statically configured CIDR ranges
    /// (`client name -> ["10.2.0.0/16", ...]`).
    pub ip_from_range: BTreeMap<String, Vec<String>>,
}

/// Clients whose principals are derived from service discovery.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IpFromServiceDiscoveryConfig {
    pub enabled_for_incoming_services: Vec<String>,
}

/// Secondary matching dimension for one client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SelectorMatchingConfig {
    /// Request header carrying the selector value; empty disables refinement.
    pub header: String,
}

/// Egress dependency settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutgoingPermissionsConfig {
    /// Master switch. When disabled, every proxy is classified as depending
    /// on all services (default-open fallback).
    pub enabled: bool,

    /// Sentinel service name meaning "depend on every known service".
    #[validate(length(min = 1, message = "Wildcard sentinel cannot be empty"))]
    pub all_services_dependencies_value: String,

    /// Services permitted to declare the wildcard dependency.
    pub services_allowed_to_use_wildcard: Vec<String>,
}

impl Default for OutgoingPermissionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            all_services_dependencies_value: "*".to_string(),
            services_allowed_to_use_wildcard: Vec::new(),
        }
    }
}

/// JWT filter and OAuth provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtFilterConfig {
    /// OAuth providers by name.
    pub providers: BTreeMap<String, OAuthProviderConfig>,

    /// Dynamic-metadata key under which the JWT filter stores the verified
    /// payload.
    pub payload_in_metadata: String,

    /// Token field that must be present for a STRICT policy to pass.
    pub field_required_in_token: String,
}

impl Default for JwtFilterConfig {
    fn default() -> Self {
        Self {
            providers: BTreeMap::new(),
            payload_in_metadata: "jwt".to_string(),
            field_required_in_token: "exp".to_string(),
        }
    }
}

/// One OAuth / JWT provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OAuthProviderConfig {
    /// Issuer URL placed in the compiled JWT provider.
    pub issuer: String,

    /// Remote JWKS endpoint.
    pub jwks_uri: String,

    /// Cluster serving the JWKS endpoint.
    pub cluster_name: String,

    /// Client name -> token claim whose value list must contain the
    /// endpoint-declared selector.
    pub matchings: BTreeMap<String, String>,
}

/// Egress routing settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    pub service_tags: ServiceTagsConfig,
}

/// Service-tag routing preference settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceTagsConfig {
    pub enabled: bool,

    /// Request header carrying the preferred tag.
    pub header: String,

    /// Endpoint-metadata key the tag is matched against.
    pub metadata_key: String,

    /// When set, every tag in a dependency's routing preference must carry
    /// this prefix.
    pub allowed_tag_prefix: Option<String>,
}

impl Default for ServiceTagsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header: "x-service-tag".to_string(),
            metadata_key: "tag".to_string(),
            allowed_tag_prefix: None,
        }
    }
}

/// Always-allowed status/infra routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusRoutesConfig {
    pub enabled: bool,
    pub endpoints: Vec<StatusEndpointConfig>,
}

impl Default for StatusRoutesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoints: vec![StatusEndpointConfig {
                path: "/status/".to_string(),
                match_kind: PathMatchKind::Prefix,
            }],
        }
    }
}

/// One status route pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEndpointConfig {
    pub path: String,
    #[serde(default)]
    pub match_kind: PathMatchKind,
}

/// Path matching flavor for configured routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathMatchKind {
    Exact,
    #[default]
    Prefix,
    Regex,
}

/// Defaults for dependencies without an explicit timeout policy.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EgressConfig {
    #[validate(range(min = 1, max = 3600, message = "Idle timeout must be between 1s and 1h"))]
    pub idle_timeout_seconds: u64,

    #[validate(range(min = 1, max = 3600, message = "Request timeout must be between 1s and 1h"))]
    pub request_timeout_seconds: u64,

    /// Follow upstream-issued internal redirects by default.
    pub handle_internal_redirect: bool,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: 120,
            request_timeout_seconds: 120,
            handle_internal_redirect: false,
        }
    }
}

impl EgressConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Response compression filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,

    /// Minimum response size worth compressing, in bytes.
    pub min_content_length: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self { enabled: false, min_content_length: 1024 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SnapshotConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_all_modes_disabled() {
        let mut config = SnapshotConfig::default();
        config.enabled_communication_modes = EnabledCommunicationModes { ads: false, xds: false };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_san_format_without_placeholder() {
        let mut config = SnapshotConfig::default();
        config.incoming_permissions.tls_authentication.san_uri_format =
            "spiffe://static".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_wildcard_sentinel() {
        let config = SnapshotConfig::default();
        assert_eq!(config.outgoing_permissions.all_services_dependencies_value, "*");
    }

    #[test]
    fn egress_defaults_as_durations() {
        let egress = EgressConfig::default();
        assert_eq!(egress.idle_timeout(), Duration::from_secs(120));
        assert_eq!(egress.request_timeout(), Duration::from_secs(120));
    }
}
