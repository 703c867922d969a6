//! Discovery server adapter boundary.
//!
//! The wire transport is a consumer of this module, not part of it: it
//! connects proxies, feeds their node metadata to [`StreamCallbacks`], and
//! subscribes to published snapshots keyed by group.

mod cache;
mod callbacks;
mod updater;

pub use cache::{MemorySnapshotCache, SnapshotCache};
pub use callbacks::StreamCallbacks;
pub use updater::{SnapshotPublished, SnapshotUpdater, UpdateEvent, UpdateHandle};
