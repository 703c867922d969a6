//! Snapshot storage keyed by group.

use dashmap::DashMap;

use crate::groups::Group;
use crate::snapshot::Snapshot;

/// What the updater needs from snapshot storage. The wire layer reads from
/// the same cache to serve watches.
pub trait SnapshotCache: Send + Sync {
    fn set_snapshot(&self, group: &Group, snapshot: Snapshot);
    fn snapshot(&self, group: &Group) -> Option<Snapshot>;
    fn remove(&self, group: &Group);
    fn groups(&self) -> Vec<Group>;
}

/// In-memory implementation for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotCache {
    snapshots: DashMap<Group, Snapshot>,
}

impl MemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotCache for MemorySnapshotCache {
    fn set_snapshot(&self, group: &Group, snapshot: Snapshot) {
        self.snapshots.insert(group.clone(), snapshot);
    }

    fn snapshot(&self, group: &Group) -> Option<Snapshot> {
        self.snapshots.get(group).map(|entry| entry.value().clone())
    }

    fn remove(&self, group: &Group) {
        self.snapshots.remove(group);
    }

    fn groups(&self) -> Vec<Group> {
        self.snapshots.iter().map(|entry| entry.key().clone()).collect()
    }
}
