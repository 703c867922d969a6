//! Assembles one group's complete snapshot from one topology view.

use std::sync::Arc;

use crate::config::SnapshotConfig;
use crate::errors::Result;
use crate::groups::Group;
use crate::topology::GlobalSnapshot;

use super::filters::HttpFilterPipeline;
use super::resource::{ClusterFactory, EndpointFactory, ListenerFactory, RouteFactory};
use super::{Snapshot, SnapshotVersions};

pub struct SnapshotFactory {
    clusters: ClusterFactory,
    endpoints: EndpointFactory,
    routes: RouteFactory,
    listeners: ListenerFactory,
    pipeline: HttpFilterPipeline,
    versions: Arc<SnapshotVersions>,
}

impl SnapshotFactory {
    pub fn new(config: &SnapshotConfig, versions: Arc<SnapshotVersions>) -> Result<Self> {
        Ok(Self {
            clusters: ClusterFactory::new(config),
            endpoints: EndpointFactory::new(),
            routes: RouteFactory::new(config),
            listeners: ListenerFactory::new(),
            pipeline: HttpFilterPipeline::new(config)?,
            versions,
        })
    }

    /// Compute the snapshot for one group. All four resource lists come from
    /// the same topology snapshot so cross references (routes to clusters,
    /// clusters to load assignments) cannot disagree.
    pub fn snapshot(&self, group: &Group, topology: &GlobalSnapshot) -> Result<Snapshot> {
        let clusters = self.clusters.clusters(group, topology);
        let endpoints = self.endpoints.endpoints(group, topology);
        let routes = self.routes.routes(group, topology);
        let listeners = self.listeners.listeners(
            group,
            self.pipeline.ingress_filters(group, topology),
            self.pipeline.egress_filters(group),
        );

        let versions = self.versions.versions(group, &clusters, &endpoints, &listeners, &routes);
        Ok(Snapshot { clusters, endpoints, listeners, routes, versions })
    }
}
