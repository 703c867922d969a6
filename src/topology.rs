//! Point-in-time view of every known service and its instances.
//!
//! Produced by the discovery source, consumed immutably by the snapshot
//! assembler. A single [`GlobalSnapshot`] backs all four resource types of a
//! snapshot so they cannot disagree about the topology.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One running instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceInstance {
    pub address: String,
    pub port: u32,
    /// Discovery tags, used for service-tag routing metadata.
    pub tags: BTreeSet<String>,
    /// Availability zone reported by discovery; `None` when the source does
    /// not track zones.
    pub zone: Option<String>,
    pub weight: u32,
    /// Canary instance, marked in endpoint metadata for canary routing.
    pub canary: bool,
}

impl ServiceInstance {
    pub fn new<S: Into<String>>(address: S, port: u32) -> Self {
        Self {
            address: address.into(),
            port,
            tags: BTreeSet::new(),
            zone: None,
            weight: 1,
            canary: false,
        }
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn in_zone<S: Into<String>>(mut self, zone: S) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn canary(mut self) -> Self {
        self.canary = true;
        self
    }
}

/// All instances of one service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceInstances {
    pub instances: Vec<ServiceInstance>,
}

/// Immutable mesh-wide topology. Shared between groups via `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlobalSnapshot {
    services: BTreeMap<String, ServiceInstances>,
    local_zone: Option<String>,
}

impl GlobalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zone this control plane serves. Instances in it keep load balancing
    /// priority 0; remote zones become failover priority.
    pub fn with_local_zone<S: Into<String>>(mut self, zone: S) -> Self {
        self.local_zone = Some(zone.into());
        self
    }

    pub fn local_zone(&self) -> Option<&str> {
        self.local_zone.as_deref()
    }

    pub fn with_service<S: Into<String>>(
        mut self,
        service: S,
        instances: Vec<ServiceInstance>,
    ) -> Self {
        self.services.insert(service.into(), ServiceInstances { instances });
        self
    }

    /// Service names in deterministic order.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn instances(&self, service: &str) -> Option<&ServiceInstances> {
        self.services.get(service)
    }

    /// Instance addresses of one service, for source-IP principal
    /// materialization. Deduplicated and sorted.
    pub fn addresses_of(&self, service: &str) -> Vec<&str> {
        let mut addresses: Vec<&str> = self
            .instances(service)
            .map(|instances| {
                instances.instances.iter().map(|instance| instance.address.as_str()).collect()
            })
            .unwrap_or_default();
        addresses.sort_unstable();
        addresses.dedup();
        addresses
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
