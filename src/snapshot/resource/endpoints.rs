//! Load assignment builders.
//!
//! Materializes one ClusterLoadAssignment per service cluster from the same
//! topology snapshot the cluster list was computed from. Instances are
//! grouped into one locality per zone; the zone the control plane serves
//! keeps priority 0 and remote zones become failover priority. Instance tags
//! and the canary marker land in `envoy.lb` metadata.

use std::collections::{BTreeMap, HashMap};

use envoy_types::pb::envoy::config::core::v3::{Locality, Metadata};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use envoy_types::pb::google::protobuf::{value, ListValue, Struct, UInt32Value, Value};

use crate::groups::Group;
use crate::topology::{GlobalSnapshot, ServiceInstance};

use super::clusters::socket_address;

const LB_METADATA_NAMESPACE: &str = "envoy.lb";
const TAG_METADATA_KEY: &str = "tag";
const CANARY_METADATA_KEY: &str = "canary";
const CANARY_METADATA_VALUE: &str = "1";

const LOCAL_PRIORITY: u32 = 0;
const REMOTE_PRIORITY: u32 = 1;

pub struct EndpointFactory;

impl EndpointFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn endpoints(
        &self,
        group: &Group,
        snapshot: &GlobalSnapshot,
    ) -> Vec<ClusterLoadAssignment> {
        self.service_names_for(group, snapshot)
            .into_iter()
            .filter_map(|service| {
                let instances = snapshot.instances(&service)?;
                Some(load_assignment(&service, &instances.instances, snapshot.local_zone()))
            })
            .collect()
    }

    fn service_names_for(&self, group: &Group, snapshot: &GlobalSnapshot) -> Vec<String> {
        if group.is_all_services()
            || group.proxy_settings.outgoing.has_all_services_dependencies()
        {
            return snapshot.service_names().map(String::from).collect();
        }
        group
            .proxy_settings
            .outgoing
            .service_dependencies()
            .iter()
            .map(|dep| dep.service.clone())
            .filter(|service| snapshot.has_service(service))
            .collect()
    }
}

impl Default for EndpointFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn load_assignment(
    service: &str,
    instances: &[ServiceInstance],
    local_zone: Option<&str>,
) -> ClusterLoadAssignment {
    let mut zones: BTreeMap<Option<&str>, Vec<&ServiceInstance>> = BTreeMap::new();
    for instance in instances {
        zones.entry(instance.zone.as_deref()).or_default().push(instance);
    }
    ClusterLoadAssignment {
        cluster_name: service.to_string(),
        endpoints: zones
            .into_iter()
            .map(|(zone, instances)| LocalityLbEndpoints {
                locality: zone.map(|zone| Locality {
                    zone: zone.to_string(),
                    ..Default::default()
                }),
                priority: zone_priority(zone, local_zone),
                lb_endpoints: instances.into_iter().map(lb_endpoint).collect(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// Unzoned instances count as local, as does every zone when the control
/// plane has no zone of its own.
fn zone_priority(zone: Option<&str>, local_zone: Option<&str>) -> u32 {
    match (zone, local_zone) {
        (Some(zone), Some(local_zone)) if zone != local_zone => REMOTE_PRIORITY,
        _ => LOCAL_PRIORITY,
    }
}

fn lb_endpoint(instance: &ServiceInstance) -> LbEndpoint {
    LbEndpoint {
        host_identifier: Some(lb_endpoint::HostIdentifier::Endpoint(Endpoint {
            address: Some(socket_address(&instance.address, instance.port)),
            ..Default::default()
        })),
        load_balancing_weight: Some(UInt32Value { value: instance.weight }),
        metadata: lb_metadata(instance),
        ..Default::default()
    }
}

/// `envoy.lb` metadata carrying the canary marker and the instance tags.
/// The version hasher never encodes these maps directly; see [`hashable`].
fn lb_metadata(instance: &ServiceInstance) -> Option<Metadata> {
    let mut fields = HashMap::new();
    if instance.canary {
        fields.insert(
            CANARY_METADATA_KEY.to_string(),
            Value { kind: Some(value::Kind::StringValue(CANARY_METADATA_VALUE.to_string())) },
        );
    }
    if !instance.tags.is_empty() {
        let tags = Value {
            kind: Some(value::Kind::ListValue(ListValue {
                values: instance
                    .tags
                    .iter()
                    .map(|tag| Value { kind: Some(value::Kind::StringValue(tag.clone())) })
                    .collect(),
            })),
        };
        fields.insert(TAG_METADATA_KEY.to_string(), tags);
    }
    if fields.is_empty() {
        return None;
    }
    let mut filter_metadata = HashMap::new();
    filter_metadata.insert(LB_METADATA_NAMESPACE.to_string(), Struct { fields });
    Some(Metadata { filter_metadata, ..Default::default() })
}

/// Byte-stable stand-ins for load assignments, used by the version hasher.
///
/// The generated `ClusterLoadAssignment` carries its endpoint metadata in
/// `HashMap` fields whose iteration order leaks into the encoded bytes, so
/// hashing the resource directly would mint spurious versions for identical
/// content. These mirrors hold the same field tags with `btree_map` maps and
/// cover exactly the fields the factory above populates.
pub(crate) mod hashable {
    use std::collections::BTreeMap;

    use envoy_types::pb::envoy::config::core::v3::Locality;
    use envoy_types::pb::envoy::config::endpoint::v3::{
        lb_endpoint, ClusterLoadAssignment, Endpoint,
    };
    use envoy_types::pb::google::protobuf::{UInt32Value, Value};

    #[derive(Clone, PartialEq, prost::Message)]
    pub(crate) struct LoadAssignment {
        #[prost(string, tag = "1")]
        cluster_name: String,
        #[prost(message, repeated, tag = "2")]
        endpoints: Vec<LocalityEndpoints>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    struct LocalityEndpoints {
        #[prost(message, optional, tag = "1")]
        locality: Option<Locality>,
        #[prost(message, repeated, tag = "2")]
        lb_endpoints: Vec<LbEndpoint>,
        #[prost(uint32, tag = "5")]
        priority: u32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    struct LbEndpoint {
        #[prost(message, optional, tag = "1")]
        endpoint: Option<Endpoint>,
        #[prost(message, optional, tag = "3")]
        metadata: Option<Metadata>,
        #[prost(message, optional, tag = "4")]
        load_balancing_weight: Option<UInt32Value>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    struct Metadata {
        #[prost(btree_map = "string, message", tag = "1")]
        filter_metadata: BTreeMap<String, OrderedStruct>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    struct OrderedStruct {
        #[prost(btree_map = "string, message", tag = "1")]
        fields: BTreeMap<String, Value>,
    }

    impl From<&ClusterLoadAssignment> for LoadAssignment {
        fn from(assignment: &ClusterLoadAssignment) -> Self {
            Self {
                cluster_name: assignment.cluster_name.clone(),
                endpoints: assignment
                    .endpoints
                    .iter()
                    .map(|group| LocalityEndpoints {
                        locality: group.locality.clone(),
                        lb_endpoints: group.lb_endpoints.iter().map(ordered_endpoint).collect(),
                        priority: group.priority,
                    })
                    .collect(),
            }
        }
    }

    fn ordered_endpoint(
        endpoint: &envoy_types::pb::envoy::config::endpoint::v3::LbEndpoint,
    ) -> LbEndpoint {
        LbEndpoint {
            endpoint: match &endpoint.host_identifier {
                Some(lb_endpoint::HostIdentifier::Endpoint(endpoint)) => Some(endpoint.clone()),
                _ => None,
            },
            metadata: endpoint.metadata.as_ref().map(|metadata| Metadata {
                filter_metadata: metadata
                    .filter_metadata
                    .iter()
                    .map(|(namespace, entries)| {
                        (
                            namespace.clone(),
                            OrderedStruct {
                                fields: entries
                                    .fields
                                    .iter()
                                    .map(|(key, value)| (key.clone(), value.clone()))
                                    .collect(),
                            },
                        )
                    })
                    .collect(),
            }),
            load_balancing_weight: endpoint.load_balancing_weight.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::GroupKind;
    use crate::metadata::{CommunicationMode, ProxySettings};

    fn all_services_group() -> Group {
        Group {
            kind: GroupKind::AllServices,
            communication_mode: CommunicationMode::Ads,
            service_name: "echo".to_string(),
            discovery_service_name: None,
            proxy_settings: ProxySettings::default(),
            listeners_config: None,
        }
    }

    fn lb_struct(endpoint: &LbEndpoint) -> &Struct {
        &endpoint.metadata.as_ref().unwrap().filter_metadata[LB_METADATA_NAMESPACE]
    }

    #[test]
    fn instances_become_lb_endpoints() {
        let snapshot = GlobalSnapshot::new().with_service(
            "billing",
            vec![
                ServiceInstance::new("10.0.0.1", 8080),
                ServiceInstance::new("10.0.0.2", 8080).with_tag("global"),
            ],
        );
        let assignments = EndpointFactory::new().endpoints(&all_services_group(), &snapshot);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].cluster_name, "billing");
        let endpoints = &assignments[0].endpoints[0].lb_endpoints;
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints[0].metadata.is_none());
        assert!(lb_struct(&endpoints[1]).fields.contains_key(TAG_METADATA_KEY));
    }

    #[test]
    fn zones_split_into_prioritized_localities() {
        let snapshot = GlobalSnapshot::new().with_local_zone("dc1").with_service(
            "billing",
            vec![
                ServiceInstance::new("10.1.0.1", 8080).in_zone("dc2"),
                ServiceInstance::new("10.0.0.1", 8080).in_zone("dc1"),
                ServiceInstance::new("10.0.0.2", 8080).in_zone("dc1"),
            ],
        );
        let assignments = EndpointFactory::new().endpoints(&all_services_group(), &snapshot);
        let localities = &assignments[0].endpoints;
        assert_eq!(localities.len(), 2);

        let local = localities
            .iter()
            .find(|group| group.locality.as_ref().map(|l| l.zone.as_str()) == Some("dc1"))
            .unwrap();
        assert_eq!(local.priority, 0);
        assert_eq!(local.lb_endpoints.len(), 2);

        let remote = localities
            .iter()
            .find(|group| group.locality.as_ref().map(|l| l.zone.as_str()) == Some("dc2"))
            .unwrap();
        assert_eq!(remote.priority, 1);
        assert_eq!(remote.lb_endpoints.len(), 1);
    }

    #[test]
    fn unzoned_instances_stay_at_priority_zero() {
        let snapshot = GlobalSnapshot::new()
            .with_service("billing", vec![ServiceInstance::new("10.0.0.1", 8080)]);
        let assignments = EndpointFactory::new().endpoints(&all_services_group(), &snapshot);
        let localities = &assignments[0].endpoints;
        assert_eq!(localities.len(), 1);
        assert!(localities[0].locality.is_none());
        assert_eq!(localities[0].priority, 0);
    }

    #[test]
    fn canary_instances_carry_the_marker() {
        let snapshot = GlobalSnapshot::new().with_service(
            "billing",
            vec![ServiceInstance::new("10.0.0.1", 8080).with_tag("hardware:gpu").canary()],
        );
        let assignments = EndpointFactory::new().endpoints(&all_services_group(), &snapshot);
        let fields = &lb_struct(&assignments[0].endpoints[0].lb_endpoints[0]).fields;
        assert_eq!(
            fields[CANARY_METADATA_KEY].kind,
            Some(value::Kind::StringValue(CANARY_METADATA_VALUE.to_string()))
        );
        assert!(fields.contains_key(TAG_METADATA_KEY));
    }

    #[test]
    fn empty_topology_yields_no_assignments() {
        let assignments =
            EndpointFactory::new().endpoints(&all_services_group(), &GlobalSnapshot::new());
        assert!(assignments.is_empty());
    }
}
