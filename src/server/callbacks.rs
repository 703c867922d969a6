//! Proxy connection callbacks.
//!
//! Called by the wire layer when a proxy stream opens. Parses and validates
//! the node metadata, classifies the proxy into its group and notifies the
//! updater; a rejected proxy gets the typed validation error back so the
//! transport can close the stream with a meaningful status.

use envoy_types::pb::google::protobuf::Struct;
use tracing::{info, warn};

use crate::config::SnapshotConfig;
use crate::errors::ValidationError;
use crate::groups::{Group, GroupClassifier};
use crate::metadata::{NodeMetadata, NodeMetadataValidator};
use crate::observability::SnapshotMetrics;

use super::{UpdateEvent, UpdateHandle};

pub struct StreamCallbacks {
    config: SnapshotConfig,
    validator: NodeMetadataValidator,
    classifier: GroupClassifier,
    handle: UpdateHandle,
    metrics: SnapshotMetrics,
}

impl StreamCallbacks {
    pub fn new(config: SnapshotConfig, handle: UpdateHandle) -> Self {
        Self {
            validator: NodeMetadataValidator::new(config.clone()),
            classifier: GroupClassifier::new(&config),
            config,
            handle,
            metrics: SnapshotMetrics::default(),
        }
    }

    /// Validate and classify a connecting proxy. On success the updater is
    /// told about the group and the group key is returned to the transport.
    pub fn on_proxy_connected(&self, node_metadata: &Struct) -> Result<Group, ValidationError> {
        let metadata = self.parse_and_validate(node_metadata).inspect_err(|error| {
            self.metrics.record_metadata_rejected(error.kind.code());
            warn!(code = error.kind.code(), reason = %error.message, "Rejecting proxy");
        })?;
        let group = self.classifier.classify(&metadata);
        info!(service = %group.service_name, "Proxy connected");
        self.handle.send(UpdateEvent::GroupAdded(group.clone()));
        Ok(group)
    }

    /// The wire layer removes the group's snapshot itself when the last
    /// proxy of a group disconnects; this only triggers version eviction.
    pub fn on_groups_changed(&self) {
        self.handle.send(UpdateEvent::GroupsChanged);
    }

    fn parse_and_validate(&self, node_metadata: &Struct) -> Result<NodeMetadata, ValidationError> {
        let metadata = NodeMetadata::from_node_struct(node_metadata, &self.config)?;
        self.validator.validate(&metadata)?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::parser::struct_from_json;
    use crate::server::{MemorySnapshotCache, SnapshotUpdater};
    use serde_json::json;
    use std::sync::Arc;

    fn callbacks() -> (StreamCallbacks, SnapshotUpdater<MemorySnapshotCache>) {
        let config = SnapshotConfig::default();
        let (updater, handle) =
            SnapshotUpdater::new(&config, Arc::new(MemorySnapshotCache::new()))
                .unwrap_or_else(|e| panic!("updater should build: {e}"));
        (StreamCallbacks::new(config, handle), updater)
    }

    #[test]
    fn valid_metadata_classifies_into_a_group() {
        let (callbacks, _updater) = callbacks();
        let node = struct_from_json(json!({
            "service_name": "echo",
            "proxy_settings": {
                "outgoing": {"dependencies": [{"service": "billing"}]}
            }
        }));
        let group = callbacks
            .on_proxy_connected(&node)
            .unwrap_or_else(|e| panic!("should classify: {e}"));
        assert_eq!(group.service_name, "echo");
    }

    #[test]
    fn invalid_metadata_is_rejected_with_the_typed_error() {
        let (callbacks, _updater) = callbacks();
        let node = struct_from_json(json!({
            "service_name": "echo",
            "proxy_settings": {
                "outgoing": {"dependencies": [{"service": "billing", "domain": "http://x.pl"}]}
            }
        }));
        let error = callbacks.on_proxy_connected(&node).unwrap_err();
        assert_eq!(error.kind.code(), "exactly_one_dependency_field");
    }
}
