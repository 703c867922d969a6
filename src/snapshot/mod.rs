//! Snapshot assembly: turning a group plus the current topology into the
//! four Envoy resource lists a proxy consumes, with per-resource-type
//! versioning.

pub mod assembler;
pub mod filters;
pub mod resource;
pub mod versions;

pub use assembler::SnapshotFactory;
pub use versions::{ResourceVersion, ResourceVersions, SnapshotVersions};

use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::endpoint::v3::ClusterLoadAssignment;
use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;

/// Immutable configuration state served to one group.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub clusters: Vec<Cluster>,
    pub endpoints: Vec<ClusterLoadAssignment>,
    pub listeners: Vec<Listener>,
    pub routes: Vec<RouteConfiguration>,
    pub versions: ResourceVersions,
}
