mod common;

use common::{LOCAL_EP, identity, manual_bridge, started_bridge};
use zigbee_bridge::BridgeError;
use zigbee_bridge::device::identity::MANUFACTURER_MAX;
use zigbee_bridge::device::{BasicIdentity, ClusterRole, EndpointPreset, access};
use zigbee_bridge::network::Role;
use zigbee_bridge::zcl::ids::{PROFILE_HA, cluster};
use zigbee_bridge::zcl::{AttrType, HostValue};

const VENDOR_CLUSTER: u16 = 0xFC01;

#[test]
fn test_define_requires_init() {
    let (_stack, bridge) = manual_bridge();
    assert!(matches!(
        bridge.define_preset_endpoint(LOCAL_EP, EndpointPreset::OnOffLight),
        Err(BridgeError::InvalidState(_))
    ));
    assert!(matches!(bridge.start(false), Err(BridgeError::InvalidState(_))));
}

#[test]
fn test_custom_attributes_share_one_server_cluster() {
    let (stack, bridge) = manual_bridge();
    bridge.init(Role::Router).unwrap();
    bridge.define_endpoint(10, 0xFFF0, PROFILE_HA).unwrap();
    bridge
        .add_custom_attribute(VENDOR_CLUSTER, 0x0000, AttrType::U8.tag(), access::READ_WRITE, 5)
        .unwrap();
    bridge
        .add_custom_attribute(VENDOR_CLUSTER, 0x0001, AttrType::S16.tag(), access::READ_ONLY, -40)
        .unwrap();
    bridge
        .add_custom_attribute(
            VENDOR_CLUSTER,
            0x0002,
            AttrType::Bool.tag(),
            access::READ_WRITE | access::REPORTING,
            1,
        )
        .unwrap();
    assert_eq!(bridge.register_device().unwrap(), Some(10));

    let endpoints = bridge.endpoints();
    assert_eq!(endpoints.len(), 1);
    let vendor: Vec<_> = endpoints[0]
        .clusters
        .iter()
        .filter(|c| c.id == VENDOR_CLUSTER)
        .collect();
    assert_eq!(vendor.len(), 1);
    assert_eq!(vendor[0].role, ClusterRole::Server);
    assert_eq!(vendor[0].attributes.len(), 3);
    assert_eq!(bridge.local_endpoints(), vec![10]);

    bridge.start(false).unwrap();
    assert_eq!(stack.registered_endpoints().map(|l| l.len()), Some(1));
    let value = bridge
        .get_attribute(10, VENDOR_CLUSTER, ClusterRole::Server, 0x0001)
        .unwrap();
    assert_eq!(value.to_host(), Some(HostValue::Signed(-40)));
}

#[test]
fn test_custom_attribute_rejections_leave_registry_unchanged() {
    let (_stack, bridge) = manual_bridge();
    bridge.init(Role::Router).unwrap();
    // not a vendor cluster
    assert!(matches!(
        bridge.add_custom_attribute(cluster::ON_OFF, 0, AttrType::U8.tag(), access::READ_ONLY, 0),
        Err(BridgeError::InvalidArgument(_))
    ));
    // value out of range for the declared type
    assert!(matches!(
        bridge.add_custom_attribute(VENDOR_CLUSTER, 0, AttrType::U8.tag(), access::READ_ONLY, 300),
        Err(BridgeError::InvalidArgument(_))
    ));
    assert!(matches!(
        bridge.add_custom_cluster(VENDOR_CLUSTER, 7),
        Err(BridgeError::InvalidArgument(_))
    ));

    bridge.define_endpoint(10, 0xFFF0, PROFILE_HA).unwrap();
    bridge.register_device().unwrap();
    assert!(
        bridge.endpoints()[0]
            .clusters
            .iter()
            .all(|c| c.id != VENDOR_CLUSTER)
    );
}

#[test]
fn test_register_is_idempotent_and_frozen_after_start() {
    let (_stack, bridge) = manual_bridge();
    bridge.init(Role::EndDevice).unwrap();
    assert!(matches!(
        bridge.register_device(),
        Err(BridgeError::InvalidState(_))
    ));
    bridge
        .define_preset_endpoint(LOCAL_EP, EndpointPreset::TemperatureSensor)
        .unwrap();
    assert_eq!(bridge.register_device().unwrap(), Some(LOCAL_EP));
    assert_eq!(bridge.register_device().unwrap(), None);

    // same endpoint id again
    bridge
        .define_preset_endpoint(LOCAL_EP, EndpointPreset::OnOffLight)
        .unwrap();
    assert!(matches!(
        bridge.register_device(),
        Err(BridgeError::InvalidArgument(_))
    ));

    bridge.start(false).unwrap();
    assert!(bridge.start(false).is_ok());
    assert!(matches!(
        bridge.define_preset_endpoint(2, EndpointPreset::OnOffLight),
        Err(BridgeError::InvalidState(_))
    ));
    assert!(matches!(
        bridge.register_device(),
        Err(BridgeError::InvalidState(_))
    ));
    assert!(matches!(
        bridge.clear_custom_clusters(),
        Err(BridgeError::InvalidState(_))
    ));
}

#[test]
fn test_two_endpoints_committed_together() {
    let (stack, bridge) = manual_bridge();
    bridge.init(Role::Router).unwrap();
    bridge
        .define_preset_endpoint(1, EndpointPreset::DimmableLight)
        .unwrap();
    bridge.register_device().unwrap();
    bridge
        .define_preset_endpoint(2, EndpointPreset::OnOffSwitch)
        .unwrap();
    bridge.register_device().unwrap();
    bridge.start(false).unwrap();

    let registered = stack.registered_endpoints().unwrap();
    let ids: Vec<u8> = registered.iter().map(|e| e.endpoint).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(bridge.local_endpoints(), vec![1, 2]);
}

#[test]
fn test_oversized_identity_keeps_previous() {
    let (_stack, bridge) = manual_bridge();
    bridge.init(Role::Router).unwrap();
    bridge
        .define_preset_endpoint(LOCAL_EP, EndpointPreset::OnOffLight)
        .unwrap();
    bridge
        .set_basic_identity(LOCAL_EP, identity("Acme", "Lamp-1"))
        .unwrap();

    let too_long = "x".repeat(MANUFACTURER_MAX + 1);
    assert!(matches!(
        BasicIdentity::parse(Some(&too_long), Some("Lamp-2"), None, None, None),
        Err(BridgeError::InvalidArgument(_))
    ));

    bridge.register_device().unwrap();
    let stored = bridge.get_basic_identity(LOCAL_EP).unwrap();
    assert_eq!(stored.manufacturer.as_bytes(), b"Acme");
    assert_eq!(stored.model.as_bytes(), b"Lamp-1");
}

#[test]
fn test_identity_read_back_from_stack_after_start() {
    let (_stack, bridge) = started_bridge(Role::Router, EndpointPreset::OnOffLight);
    let stored = bridge.get_basic_identity(LOCAL_EP).unwrap();
    assert_eq!(stored, identity("Acme", "Lamp-1"));
    assert!(matches!(
        bridge.get_basic_identity(0),
        Err(BridgeError::InvalidArgument(_))
    ));
}

#[test]
fn test_attribute_access_requires_local_endpoint() {
    let (_stack, bridge) = started_bridge(Role::Router, EndpointPreset::OnOffLight);
    assert!(matches!(
        bridge.get_attribute(9, cluster::ON_OFF, ClusterRole::Server, 0),
        Err(BridgeError::NotFound(_))
    ));
    assert!(matches!(
        bridge.set_attribute(
            LOCAL_EP,
            cluster::ON_OFF,
            ClusterRole::Server,
            0x7777,
            HostValue::Bool(true),
            false
        ),
        Err(BridgeError::NotFound(_))
    ));
}
