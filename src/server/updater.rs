//! Snapshot update worker.
//!
//! One dedicated task consumes update events and recomputes snapshots, so
//! version bookkeeping for a group is never raced by concurrent passes. Each
//! pass reads exactly one topology snapshot; version eviction runs before
//! publishing so departed groups cannot resurrect stale versions.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::config::SnapshotConfig;
use crate::errors::Result;
use crate::groups::Group;
use crate::observability::SnapshotMetrics;
use crate::snapshot::{ResourceVersions, SnapshotFactory, SnapshotVersions};
use crate::topology::GlobalSnapshot;

use super::SnapshotCache;

/// Events driving snapshot recomputation.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// A proxy with a new classification connected.
    GroupAdded(Group),
    /// The discovery source produced a new topology view.
    TopologyChanged(Arc<GlobalSnapshot>),
    /// The set of connected groups shrank.
    GroupsChanged,
}

/// Notification published after a group's snapshot was stored.
#[derive(Debug, Clone)]
pub struct SnapshotPublished {
    pub group: Group,
    pub versions: ResourceVersions,
}

/// Cloneable handle for feeding events to the updater.
#[derive(Debug, Clone)]
pub struct UpdateHandle {
    events: mpsc::UnboundedSender<UpdateEvent>,
    published: broadcast::Sender<SnapshotPublished>,
}

impl UpdateHandle {
    pub fn send(&self, event: UpdateEvent) {
        // The updater outlives every sender; a send can only fail during
        // shutdown, when nobody cares about the event anymore.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotPublished> {
        self.published.subscribe()
    }
}

pub struct SnapshotUpdater<C: SnapshotCache> {
    cache: Arc<C>,
    factory: SnapshotFactory,
    versions: Arc<SnapshotVersions>,
    topology: Arc<GlobalSnapshot>,
    events: mpsc::UnboundedReceiver<UpdateEvent>,
    published: broadcast::Sender<SnapshotPublished>,
    metrics: SnapshotMetrics,
}

impl<C: SnapshotCache> SnapshotUpdater<C> {
    pub fn new(config: &SnapshotConfig, cache: Arc<C>) -> Result<(Self, UpdateHandle)> {
        let versions = Arc::new(SnapshotVersions::new());
        let factory = SnapshotFactory::new(config, Arc::clone(&versions))?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (published_tx, _) = broadcast::channel(128);
        let updater = Self {
            cache,
            factory,
            versions,
            topology: Arc::new(GlobalSnapshot::new()),
            events: events_rx,
            published: published_tx.clone(),
            metrics: SnapshotMetrics::default(),
        };
        Ok((updater, UpdateHandle { events: events_tx, published: published_tx }))
    }

    /// Consume events until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle_event(event);
        }
        debug!("Snapshot updater stopping; all event senders dropped");
    }

    fn handle_event(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::GroupAdded(group) => {
                // Force at least one snapshot for the new group even if the
                // topology has not changed since the last pass.
                self.publish(&group);
                self.evict_departed();
            }
            UpdateEvent::TopologyChanged(topology) => {
                self.topology = topology;
                self.refresh_all();
            }
            UpdateEvent::GroupsChanged => {
                // Surviving groups keep their snapshots and versions;
                // shrinking the group set only requires eviction.
                self.evict_departed();
            }
        }
    }

    fn refresh_all(&mut self) {
        self.evict_departed();
        for group in self.cache.groups() {
            self.publish(&group);
        }
    }

    fn evict_departed(&self) {
        self.versions.retain_groups(&self.cache.groups());
    }

    fn publish(&self, group: &Group) {
        match self.factory.snapshot(group, &self.topology) {
            Ok(snapshot) => {
                let versions = snapshot.versions.clone();
                self.cache.set_snapshot(group, snapshot);
                self.metrics.record_snapshot_update();
                let _ = self
                    .published
                    .send(SnapshotPublished { group: group.clone(), versions });
            }
            Err(error) => {
                warn!(service = %group.service_name, %error, "Snapshot computation failed; keeping previous snapshot");
            }
        }
    }
}
