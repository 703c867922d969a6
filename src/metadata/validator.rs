//! Policy validation of parsed node metadata.
//!
//! Runs after parsing, before group classification. Checks run in a fixed
//! order and the first failure rejects the connection; later checks may
//! assume earlier ones passed.

use regex::Regex;
use tracing::warn;

use crate::config::SnapshotConfig;
use crate::errors::ValidationError;

use super::{
    is_supported_http_method, CommunicationMode, NodeMetadata, UnlistedPolicy, WILDCARD_CLIENT,
};

const RATE_LIMIT_PATTERN: &str = r"^(0|[1-9][0-9]*)/[smh]$";

/// Validates parsed metadata against operator policy.
pub struct NodeMetadataValidator {
    config: SnapshotConfig,
    rate_limit_format: Regex,
}

impl NodeMetadataValidator {
    pub fn new(config: SnapshotConfig) -> Self {
        let rate_limit_format = Regex::new(RATE_LIMIT_PATTERN)
            .expect("RATE_LIMIT_PATTERN should be a valid regex pattern");
        Self { config, rate_limit_format }
    }

    pub fn validate(&self, metadata: &NodeMetadata) -> Result<(), ValidationError> {
        self.check_service_name(metadata)?;
        self.check_all_dependencies(metadata)?;
        self.check_service_tag_prefix(metadata)?;
        self.check_http_methods(metadata)?;
        self.check_wildcard_clients(metadata)?;
        self.check_rate_limits(metadata)?;
        self.check_communication_mode(metadata)?;
        self.warn_about_unprotected_endpoints(metadata);
        Ok(())
    }

    fn check_service_name(&self, metadata: &NodeMetadata) -> Result<(), ValidationError> {
        if self.config.require_service_name && metadata.service_name.is_empty() {
            return Err(ValidationError::service_name_required());
        }
        Ok(())
    }

    fn check_all_dependencies(&self, metadata: &NodeMetadata) -> Result<(), ValidationError> {
        if !self.config.outgoing_permissions.enabled {
            return Ok(());
        }
        if metadata.proxy_settings.outgoing.has_all_services_dependencies()
            && !self
                .config
                .outgoing_permissions
                .services_allowed_to_use_wildcard
                .contains(&metadata.service_name)
        {
            return Err(ValidationError::all_dependencies_not_allowed(&metadata.service_name));
        }
        Ok(())
    }

    fn check_service_tag_prefix(&self, metadata: &NodeMetadata) -> Result<(), ValidationError> {
        let prefix = match &self.config.routing.service_tags.allowed_tag_prefix {
            Some(prefix) => prefix,
            None => return Ok(()),
        };
        for dependency in metadata.proxy_settings.outgoing.service_dependencies() {
            let violating: Vec<String> = dependency
                .settings
                .service_tag_preference
                .iter()
                .filter(|tag| !tag.starts_with(prefix))
                .cloned()
                .collect();
            if !violating.is_empty() {
                return Err(ValidationError::service_tag_prefix_missing(
                    &metadata.service_name,
                    prefix,
                    &violating,
                ));
            }
        }
        Ok(())
    }

    fn check_http_methods(&self, metadata: &NodeMetadata) -> Result<(), ValidationError> {
        for endpoint in &metadata.proxy_settings.incoming.endpoints {
            for method in &endpoint.methods {
                if !is_supported_http_method(method) {
                    return Err(ValidationError::unknown_http_method(method));
                }
            }
        }
        Ok(())
    }

    fn check_wildcard_clients(&self, metadata: &NodeMetadata) -> Result<(), ValidationError> {
        for endpoint in &metadata.proxy_settings.incoming.endpoints {
            let uses_wildcard =
                endpoint.clients.iter().any(|client| client.name == WILDCARD_CLIENT);
            if !uses_wildcard {
                continue;
            }
            if endpoint.clients.len() > 1 {
                return Err(ValidationError::wildcard_mixed_with_others(
                    &metadata.service_name,
                    &endpoint.path,
                ));
            }
            if !self
                .config
                .incoming_permissions
                .clients_allowed_to_use_wildcard
                .contains(&metadata.service_name)
            {
                return Err(ValidationError::wildcard_not_allowed(
                    &metadata.service_name,
                    &endpoint.path,
                ));
            }
        }
        Ok(())
    }

    fn check_rate_limits(&self, metadata: &NodeMetadata) -> Result<(), ValidationError> {
        for endpoint in &metadata.proxy_settings.incoming.rate_limit_endpoints {
            if !self.rate_limit_format.is_match(&endpoint.rate_limit) {
                return Err(ValidationError::rate_limit_incorrect(&endpoint.rate_limit));
            }
        }
        Ok(())
    }

    fn check_communication_mode(&self, metadata: &NodeMetadata) -> Result<(), ValidationError> {
        let enabled = match metadata.communication_mode {
            CommunicationMode::Ads => self.config.enabled_communication_modes.ads,
            CommunicationMode::Xds => self.config.enabled_communication_modes.xds,
        };
        if !enabled {
            return Err(ValidationError::communication_mode_not_supported(
                &metadata.service_name,
                &metadata.communication_mode.to_string(),
            ));
        }
        Ok(())
    }

    /// An endpoint with no clients and a non-LOG unlisted policy denies all
    /// traffic. Legal, occasionally intended, usually a mistake.
    fn warn_about_unprotected_endpoints(&self, metadata: &NodeMetadata) {
        for endpoint in &metadata.proxy_settings.incoming.endpoints {
            if endpoint.clients.is_empty()
                && endpoint.unlisted_clients_policy != UnlistedPolicy::Log
            {
                warn!(
                    service = %metadata.service_name,
                    path = %endpoint.path,
                    "Endpoint defines no clients and blocks unlisted ones; all traffic will be denied"
                );
            }
        }
    }
}
