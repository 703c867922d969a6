//! Per-group, per-resource-type snapshot versioning.
//!
//! Versions are opaque; proxies only compare them for equality. The engine
//! remembers a content hash per resource type and mints a fresh version only
//! when the encoded content actually changed, so byte-identical recomputation
//! never triggers proxy churn.

use dashmap::DashMap;
use prost::Message;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::groups::Group;
use crate::observability::SnapshotMetrics;

use super::resource::endpoints::hashable;
use super::{Cluster, ClusterLoadAssignment, Listener, RouteConfiguration};

/// Opaque version of one resource list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceVersion(String);

impl ResourceVersion {
    /// Sentinel version of an empty resource list.
    pub const EMPTY: &'static str = "empty";

    fn fresh() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    fn empty() -> Self {
        Self(Self::EMPTY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty_sentinel(&self) -> bool {
        self.0 == Self::EMPTY
    }
}

impl std::fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Versions of the four resource lists of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceVersions {
    pub clusters: ResourceVersion,
    pub endpoints: ResourceVersion,
    pub listeners: ResourceVersion,
    pub routes: ResourceVersion,
}

impl ResourceVersions {
    /// All four slots at the empty sentinel.
    pub fn sentinel() -> Self {
        Self {
            clusters: ResourceVersion::empty(),
            endpoints: ResourceVersion::empty(),
            listeners: ResourceVersion::empty(),
            routes: ResourceVersion::empty(),
        }
    }
}

type ContentHash = [u8; 32];

/// Remembered state of one group; hash is `None` for an empty list.
#[derive(Debug, Clone)]
struct VersionEntry {
    versions: ResourceVersions,
    hashes: [Option<ContentHash>; 4],
}

impl Default for VersionEntry {
    fn default() -> Self {
        Self { versions: ResourceVersions::sentinel(), hashes: [None; 4] }
    }
}

const RESOURCE_TYPE_NAMES: [&str; 4] = ["clusters", "endpoints", "listeners", "routes"];

/// The versioning engine. Cheap to share; one entry per live group.
///
/// Calls for the same group are serialized by the map's per-shard locking;
/// calls for distinct groups proceed in parallel.
#[derive(Debug, Default)]
pub struct SnapshotVersions {
    entries: DashMap<Group, VersionEntry>,
    metrics: SnapshotMetrics,
}

impl SnapshotVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the versions for the given resource lists, minting fresh ones
    /// only for the slots whose content changed since the last call for this
    /// group. Each slot is independent.
    pub fn versions(
        &self,
        group: &Group,
        clusters: &[Cluster],
        endpoints: &[ClusterLoadAssignment],
        listeners: &[Listener],
        routes: &[RouteConfiguration],
    ) -> ResourceVersions {
        // Load assignments carry HashMap-backed metadata whose encoding
        // order is not stable; hash their ordered mirrors instead.
        let endpoints: Vec<hashable::LoadAssignment> = endpoints.iter().map(Into::into).collect();
        let hashes = [
            hash_resources(clusters),
            hash_resources(&endpoints),
            hash_resources(listeners),
            hash_resources(routes),
        ];

        let mut entry = self.entries.entry(group.clone()).or_default();
        for (slot, hash) in hashes.into_iter().enumerate() {
            if entry.hashes[slot] == hash {
                continue;
            }
            let version = match hash {
                Some(_) => ResourceVersion::fresh(),
                None => ResourceVersion::empty(),
            };
            entry.hashes[slot] = hash;
            match slot {
                0 => entry.versions.clusters = version,
                1 => entry.versions.endpoints = version,
                2 => entry.versions.listeners = version,
                _ => entry.versions.routes = version,
            }
            self.metrics.record_version_bump(RESOURCE_TYPE_NAMES[slot]);
        }
        entry.versions.clone()
    }

    /// Drop version state for every group not in `groups`. After eviction a
    /// re-registering group gets fresh versions even for identical content.
    pub fn retain_groups(&self, groups: &[Group]) {
        self.entries.retain(|group, _| groups.contains(group));
        self.metrics.update_group_count(self.entries.len());
    }

    pub fn tracked_groups(&self) -> usize {
        self.entries.len()
    }
}

/// SHA-256 over the length-delimited encoding of the whole list; `None` for
/// an empty list so the sentinel version applies.
fn hash_resources<M: Message>(resources: &[M]) -> Option<ContentHash> {
    if resources.is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    for resource in resources {
        let encoded = resource.encode_to_vec();
        hasher.update((encoded.len() as u64).to_be_bytes());
        hasher.update(&encoded);
    }
    Some(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::GroupKind;
    use crate::metadata::{CommunicationMode, ProxySettings};

    fn group(name: &str) -> Group {
        Group {
            kind: GroupKind::Services,
            communication_mode: CommunicationMode::Ads,
            service_name: name.to_string(),
            discovery_service_name: None,
            proxy_settings: ProxySettings::default(),
            listeners_config: None,
        }
    }

    fn cluster(name: &str) -> Cluster {
        Cluster { name: name.to_string(), ..Default::default() }
    }

    /// Load assignment whose endpoint metadata holds two keys, so a fresh
    /// `HashMap` per call could encode them in either order.
    fn tagged_canary_assignment() -> ClusterLoadAssignment {
        use envoy_types::pb::envoy::config::core::v3::Metadata;
        use envoy_types::pb::envoy::config::endpoint::v3::{LbEndpoint, LocalityLbEndpoints};
        use envoy_types::pb::google::protobuf::{value, Struct, Value};
        use std::collections::HashMap;

        let mut fields = HashMap::new();
        fields.insert(
            "canary".to_string(),
            Value { kind: Some(value::Kind::StringValue("1".to_string())) },
        );
        fields.insert(
            "tag".to_string(),
            Value { kind: Some(value::Kind::StringValue("hardware:gpu".to_string())) },
        );
        let mut filter_metadata = HashMap::new();
        filter_metadata.insert("envoy.lb".to_string(), Struct { fields });
        ClusterLoadAssignment {
            cluster_name: "billing".to_string(),
            endpoints: vec![LocalityLbEndpoints {
                lb_endpoints: vec![LbEndpoint {
                    metadata: Some(Metadata { filter_metadata, ..Default::default() }),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn identical_content_keeps_versions() {
        let versions = SnapshotVersions::new();
        let group = group("echo");
        let clusters = vec![cluster("billing")];

        let first = versions.versions(&group, &clusters, &[], &[], &[]);
        let second = versions.versions(&group, &clusters, &[], &[], &[]);
        assert_eq!(first, second);
        assert!(!first.clusters.is_empty_sentinel());
    }

    #[test]
    fn slots_change_independently() {
        let versions = SnapshotVersions::new();
        let group = group("echo");

        let routes = vec![RouteConfiguration { name: "ingress".to_string(), ..Default::default() }];
        let first = versions.versions(&group, &[cluster("billing")], &[], &[], &routes);
        let second = versions.versions(&group, &[cluster("payments")], &[], &[], &routes);

        assert_ne!(first.clusters, second.clusters);
        assert_eq!(first.routes, second.routes);
        assert_eq!(first.endpoints, second.endpoints);
        assert_eq!(first.listeners, second.listeners);
    }

    #[test]
    fn multi_key_endpoint_metadata_hashes_stably() {
        let versions = SnapshotVersions::new();
        let group = group("echo");

        let first = versions.versions(&group, &[], &[tagged_canary_assignment()], &[], &[]);
        let second = versions.versions(&group, &[], &[tagged_canary_assignment()], &[], &[]);
        assert_eq!(first.endpoints, second.endpoints);
        assert!(!first.endpoints.is_empty_sentinel());
    }

    #[test]
    fn empty_lists_use_the_sentinel() {
        let versions = SnapshotVersions::new();
        let result = versions.versions(&group("echo"), &[], &[], &[], &[]);
        assert_eq!(result.clusters.as_str(), ResourceVersion::EMPTY);
        assert_eq!(result.routes.as_str(), ResourceVersion::EMPTY);
    }

    #[test]
    fn emptying_a_slot_returns_to_the_sentinel() {
        let versions = SnapshotVersions::new();
        let group = group("echo");

        let first = versions.versions(&group, &[cluster("billing")], &[], &[], &[]);
        assert!(!first.clusters.is_empty_sentinel());
        let second = versions.versions(&group, &[], &[], &[], &[]);
        assert!(second.clusters.is_empty_sentinel());
    }

    #[test]
    fn eviction_forgets_versions() {
        let versions = SnapshotVersions::new();
        let echo = group("echo");
        let other = group("other");
        let clusters = vec![cluster("billing")];

        let before = versions.versions(&echo, &clusters, &[], &[], &[]);
        versions.versions(&other, &clusters, &[], &[], &[]);
        versions.retain_groups(&[other.clone()]);
        assert_eq!(versions.tracked_groups(), 1);

        let after = versions.versions(&echo, &clusters, &[], &[], &[]);
        assert_ne!(before.clusters, after.clusters);
    }

    #[test]
    fn distinct_groups_version_independently() {
        let versions = SnapshotVersions::new();
        let clusters = vec![cluster("billing")];

        let echo = versions.versions(&group("echo"), &clusters, &[], &[], &[]);
        let other = versions.versions(&group("other"), &clusters, &[], &[], &[]);
        assert_ne!(echo.clusters, other.clusters);
    }
}
