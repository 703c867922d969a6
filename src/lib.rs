//! # Meshplane
//!
//! Permission-aware control plane core for Envoy sidecar fleets. Connecting
//! proxies declare their identity, incoming endpoint permissions and outgoing
//! dependencies as node metadata; meshplane validates the declaration,
//! classifies the proxy into a configuration group and compiles a versioned
//! snapshot (clusters, endpoints, listeners, routes) per group, including the
//! RBAC authorization policies derived from the permission declarations.
//!
//! ## Core components
//!
//! - **Metadata parser & validator**: typed model of the proxy-declared
//!   document, with tenant-wide policy checks
//! - **Group classifier**: maps proxies to config-equivalence classes
//! - **Filter compilers**: authorization (RBAC with shadow rules), JWT
//!   verification, rate limiting, identity metadata, compression
//! - **Snapshot assembler & version engine**: per-group, per-resource-type
//!   content-hash versioning that avoids needless proxy churn
//! - **Server adapter**: cache, update worker and stream callbacks consumed
//!   by the wire transport
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meshplane::config::SnapshotConfig;
//! use meshplane::server::{MemorySnapshotCache, SnapshotUpdater, StreamCallbacks};
//!
//! # fn main() -> meshplane::Result<()> {
//! let config = SnapshotConfig::default();
//! let cache = Arc::new(MemorySnapshotCache::new());
//! let (updater, handle) = SnapshotUpdater::new(&config, cache)?;
//! let callbacks = StreamCallbacks::new(config, handle);
//! tokio::spawn(updater.run());
//! # let _ = callbacks;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod groups;
pub mod metadata;
pub mod observability;
pub mod server;
pub mod snapshot;
pub mod topology;

pub use errors::{MeshplaneError, Result};
pub use groups::{Group, GroupClassifier};
pub use snapshot::{Snapshot, SnapshotFactory, SnapshotVersions};
pub use topology::GlobalSnapshot;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
