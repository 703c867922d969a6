//! JWT verification filter compiler.
//!
//! Verifies tokens against the configured OAuth providers and stores the
//! verified payload in dynamic metadata, where the authorization principals
//! read it. The filter itself never rejects a request for a missing or failed
//! token unless the endpoint declared a STRICT policy; enforcement beyond
//! that is the authorization filter's job.

use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

use envoy_types::pb::envoy::config::core::v3::{http_uri, HttpUri};
use envoy_types::pb::envoy::config::route::v3::{route_match, RouteMatch};
use envoy_types::pb::envoy::extensions::filters::http::jwt_authn::v3::{
    jwt_provider, jwt_requirement, requirement_rule, JwtProvider, JwtRequirement,
    JwtRequirementOrList, RemoteJwks, RequirementRule,
};
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::HttpFilter;
use envoy_types::pb::google::protobuf::{Duration, Empty};
use tracing::warn;

use crate::config::{OAuthProviderConfig, SnapshotConfig};
use crate::groups::Group;
use crate::metadata::{IncomingEndpoint, OAuthPolicy, PathMatchingType};

use super::{any_from_message, http_filter, JWT_FILTER_NAME};

pub const JWT_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.http.jwt_authn.v3.JwtAuthentication";

const JWKS_TIMEOUT: StdDuration = StdDuration::from_secs(1);
const JWKS_CACHE_DURATION: StdDuration = StdDuration::from_secs(300);

/// Wire-compatible mirror of `jwt_authn.v3.JwtAuthentication` with an
/// ordered provider map, keeping the encoded filter byte-stable across
/// recomputation.
#[derive(Clone, PartialEq, prost::Message)]
pub struct JwtAuthentication {
    #[prost(btree_map = "string, message", tag = "1")]
    pub providers: BTreeMap<String, JwtProvider>,
    #[prost(message, repeated, tag = "2")]
    pub rules: Vec<RequirementRule>,
}

pub struct JwtFilterFactory {
    providers: BTreeMap<String, JwtProvider>,
    provider_names: Vec<String>,
    enabled: bool,
}

impl JwtFilterFactory {
    pub fn new(config: &SnapshotConfig) -> Self {
        let providers: BTreeMap<String, JwtProvider> = config
            .jwt
            .providers
            .iter()
            .map(|(name, provider)| {
                (name.clone(), jwt_provider(provider, &config.jwt.payload_in_metadata))
            })
            .collect();
        Self {
            provider_names: providers.keys().cloned().collect(),
            providers,
            enabled: config.incoming_permissions.enabled,
        }
    }

    /// The JWT filter for a group, or `None` when no endpoint requires token
    /// verification or no providers are configured.
    pub fn filter(&self, group: &Group) -> Option<HttpFilter> {
        if !self.enabled
            || self.providers.is_empty()
            || !group.proxy_settings.incoming.permissions_enabled
        {
            return None;
        }
        let rules: Vec<RequirementRule> = group
            .proxy_settings
            .incoming
            .endpoints
            .iter()
            .filter_map(|endpoint| self.requirement_rule(endpoint))
            .collect();
        if rules.is_empty() {
            return None;
        }
        let config = JwtAuthentication { providers: self.providers.clone(), rules };
        Some(http_filter(JWT_FILTER_NAME, any_from_message(JWT_TYPE_URL, &config)))
    }

    fn requirement_rule(&self, endpoint: &IncomingEndpoint) -> Option<RequirementRule> {
        let oauth = endpoint.oauth.as_ref()?;
        if !self.provider_names.contains(&oauth.provider) {
            warn!(provider = %oauth.provider, path = %endpoint.path, "Unknown OAuth provider on endpoint; skipping JWT rule");
            return None;
        }
        let requirement = match oauth.policy {
            Some(OAuthPolicy::Strict) => provider_requirement(&oauth.provider),
            Some(OAuthPolicy::AllowMissing) => any_of_requirements(vec![
                provider_requirement(&oauth.provider),
                allow_missing_requirement(),
            ]),
            // Verification still runs so the payload lands in metadata, but
            // nothing is rejected here.
            Some(OAuthPolicy::AllowMissingOrFailed) | None => any_of_requirements(vec![
                provider_requirement(&oauth.provider),
                allow_missing_or_failed_requirement(),
            ]),
        };
        Some(RequirementRule {
            r#match: Some(path_match(endpoint)),
            requirement_type: Some(requirement_rule::RequirementType::Requires(requirement)),
        })
    }
}

fn jwt_provider(config: &OAuthProviderConfig, payload_in_metadata: &str) -> JwtProvider {
    JwtProvider {
        issuer: config.issuer.clone(),
        forward: true,
        payload_in_metadata: payload_in_metadata.to_string(),
        jwks_source_specifier: Some(jwt_provider::JwksSourceSpecifier::RemoteJwks(RemoteJwks {
            http_uri: Some(HttpUri {
                uri: config.jwks_uri.clone(),
                timeout: Some(duration(JWKS_TIMEOUT)),
                http_upstream_type: Some(http_uri::HttpUpstreamType::Cluster(
                    config.cluster_name.clone(),
                )),
            }),
            cache_duration: Some(duration(JWKS_CACHE_DURATION)),
            ..Default::default()
        })),
        ..Default::default()
    }
}

fn path_match(endpoint: &IncomingEndpoint) -> RouteMatch {
    let path_specifier = match endpoint.path_matching_type {
        PathMatchingType::Path => route_match::PathSpecifier::Path(endpoint.path.clone()),
        PathMatchingType::PathPrefix => route_match::PathSpecifier::Prefix(endpoint.path.clone()),
        PathMatchingType::PathRegex => route_match::PathSpecifier::SafeRegex(
            envoy_types::pb::envoy::r#type::matcher::v3::RegexMatcher {
                engine_type: Some(
                    envoy_types::pb::envoy::r#type::matcher::v3::regex_matcher::EngineType::GoogleRe2(
                        Default::default(),
                    ),
                ),
                regex: endpoint.path.clone(),
            },
        ),
    };
    RouteMatch { path_specifier: Some(path_specifier), ..Default::default() }
}

fn provider_requirement(provider: &str) -> JwtRequirement {
    JwtRequirement {
        requires_type: Some(jwt_requirement::RequiresType::ProviderName(provider.to_string())),
    }
}

fn allow_missing_requirement() -> JwtRequirement {
    JwtRequirement {
        requires_type: Some(jwt_requirement::RequiresType::AllowMissing(Empty::default())),
    }
}

fn allow_missing_or_failed_requirement() -> JwtRequirement {
    JwtRequirement {
        requires_type: Some(jwt_requirement::RequiresType::AllowMissingOrFailed(Empty::default())),
    }
}

fn any_of_requirements(requirements: Vec<JwtRequirement>) -> JwtRequirement {
    JwtRequirement {
        requires_type: Some(jwt_requirement::RequiresType::RequiresAny(JwtRequirementOrList {
            requirements,
        })),
    }
}

fn duration(value: StdDuration) -> Duration {
    Duration { seconds: value.as_secs() as i64, nanos: value.subsec_nanos() as i32 }
}
