//! Mapping of validated metadata to groups.

use crate::config::SnapshotConfig;
use crate::metadata::NodeMetadata;

use super::{Group, GroupKind};

/// Classifies validated node metadata into a [`Group`].
///
/// Classification is deliberately lossy where configuration says a
/// declaration is irrelevant, so that proxies differing only in ignored
/// declarations share a group and a snapshot.
pub struct GroupClassifier {
    incoming_permissions_enabled: bool,
    outgoing_permissions_enabled: bool,
}

impl GroupClassifier {
    pub fn new(config: &SnapshotConfig) -> Self {
        Self {
            incoming_permissions_enabled: config.incoming_permissions.enabled,
            outgoing_permissions_enabled: config.outgoing_permissions.enabled,
        }
    }

    pub fn classify(&self, metadata: &NodeMetadata) -> Group {
        let proxy_settings = if self.incoming_permissions_enabled {
            metadata.proxy_settings.clone()
        } else {
            metadata.proxy_settings.with_incoming_permissions_disabled()
        };

        // With outgoing permissions disabled every proxy may reach every
        // service, so declared dependencies no longer narrow the snapshot.
        let kind = if !self.outgoing_permissions_enabled
            || metadata.proxy_settings.outgoing.has_all_services_dependencies()
        {
            GroupKind::AllServices
        } else {
            GroupKind::Services
        };

        Group {
            kind,
            communication_mode: metadata.communication_mode,
            service_name: metadata.service_name.clone(),
            discovery_service_name: metadata.discovery_service_name.clone(),
            proxy_settings,
            listeners_config: metadata.listeners_config.clone(),
        }
    }
}
