//! Config-equivalence classes of connected proxies.
//!
//! Two proxies whose validated metadata classifies into the same [`Group`]
//! receive identical snapshots; the group is also the key of the version
//! store, so group identity is value identity.

mod classifier;

pub use classifier::GroupClassifier;

use crate::metadata::{CommunicationMode, ListenersConfig, ProxySettings};

/// Whether a group sees only its declared dependencies or the whole mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    /// Snapshot contains only resources for declared dependencies.
    Services,
    /// Snapshot contains resources for every known service.
    AllServices,
}

/// One config-equivalence class of proxies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group {
    pub kind: GroupKind,
    pub communication_mode: CommunicationMode,
    pub service_name: String,
    pub discovery_service_name: Option<String>,
    pub proxy_settings: ProxySettings,
    pub listeners_config: Option<ListenersConfig>,
}

impl Group {
    pub fn is_all_services(&self) -> bool {
        self.kind == GroupKind::AllServices
    }

    /// Identity used for discovery lookups of the group's own service.
    pub fn discovery_name(&self) -> &str {
        self.discovery_service_name.as_deref().unwrap_or(&self.service_name)
    }
}
