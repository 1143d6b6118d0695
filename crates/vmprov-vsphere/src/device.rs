//! VIM device JSON ⇄ network adapter model.
//!
//! The VI/JSON API tags every data object with `_typeName`; the concrete
//! ethernet card subtype and the backing kind are both read from it.

use crate::error::{ProvisionError, ProvisionResult};
use crate::types::*;

use serde_json::{json, Map, Value};

/// Ethernet card subtypes with no dedicated variant.
const GENERIC_ETHERNET_TYPES: &[&str] = &[
    "VirtualEthernetCard",
    "VirtualVmxnet",
    "VirtualVmxnet2",
    "VirtualVmxnet3Vrdma",
    "VirtualSriovEthernetCard",
];

const NETWORK_BACKING: &str = "VirtualEthernetCardNetworkBackingInfo";
const DV_PORT_BACKING: &str = "VirtualEthernetCardDistributedVirtualPortBackingInfo";

fn type_name(value: &Value) -> Option<&str> {
    value.get("_typeName").and_then(Value::as_str)
}

fn opt_string(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Classify a device; `None` when it is not an ethernet card.
pub fn classify(device: &Value) -> Option<AdapterVariant> {
    match type_name(device)? {
        "VirtualVmxnet3" => Some(AdapterVariant::Vmxnet3),
        "VirtualE1000" => Some(AdapterVariant::E1000),
        "VirtualE1000e" => Some(AdapterVariant::E1000e),
        "VirtualPCNet32" => Some(AdapterVariant::PcNet32),
        t if GENERIC_ETHERNET_TYPES.contains(&t) => Some(AdapterVariant::Generic),
        // Unknown subtype that still carries ethernet card state
        _ if device.get("addressType").is_some() => Some(AdapterVariant::Generic),
        _ => None,
    }
}

/// Parse a backing object.
pub fn parse_backing(backing: &Value) -> ProvisionResult<BackingDescriptor> {
    match type_name(backing) {
        Some(NETWORK_BACKING) => {
            let network = match backing.get("network") {
                Some(v) if !v.is_null() => Some(serde_json::from_value::<InventoryRef>(v.clone())?),
                _ => None,
            };
            Ok(BackingDescriptor::NetworkName {
                device_name: opt_string(backing, "deviceName").unwrap_or_default(),
                network,
                use_auto_detect: backing.get("useAutoDetect").and_then(Value::as_bool),
            })
        }
        Some(DV_PORT_BACKING) => {
            let port = backing.get("port").ok_or_else(|| {
                ProvisionError::parse("Distributed port backing without a 'port' connection")
            })?;
            Ok(BackingDescriptor::DistributedPort {
                switch_uuid: opt_string(port, "switchUuid").unwrap_or_default(),
                portgroup_key: opt_string(port, "portgroupKey").unwrap_or_default(),
                port_key: opt_string(port, "portKey"),
                connection_cookie: port
                    .get("connectionCookie")
                    .and_then(Value::as_i64)
                    .and_then(|c| i32::try_from(c).ok()),
            })
        }
        Some(other) => Ok(BackingDescriptor::Unrecognized {
            type_name: other.to_string(),
        }),
        None => Ok(BackingDescriptor::Unrecognized {
            type_name: "<untyped>".to_string(),
        }),
    }
}

/// Parse one device; `Ok(None)` when it is not an ethernet card.
pub fn parse_adapter(device: &Value) -> ProvisionResult<Option<NetworkAdapter>> {
    let Some(variant) = classify(device) else {
        return Ok(None);
    };
    let device_type = type_name(device).unwrap_or_default().to_string();

    let key = device
        .get("key")
        .and_then(Value::as_i64)
        .and_then(|k| i32::try_from(k).ok())
        .ok_or_else(|| ProvisionError::parse(format!("{device_type} device without a valid key")))?;

    let connectable = match device.get("connectable") {
        Some(v) if !v.is_null() => Some(serde_json::from_value::<Connectable>(v.clone())?),
        _ => None,
    };

    let backing = match device.get("backing") {
        Some(v) if !v.is_null() => Some(parse_backing(v)?),
        _ => None,
    };

    Ok(Some(NetworkAdapter {
        key,
        variant,
        device_type,
        label: device
            .get("deviceInfo")
            .and_then(|info| opt_string(info, "label")),
        address_type: opt_string(device, "addressType"),
        mac_address: opt_string(device, "macAddress"),
        connectable,
        backing,
    }))
}

/// Every ethernet card in a `config.hardware.device` list, in device order.
pub fn network_adapters(devices: &[Value]) -> ProvisionResult<Vec<NetworkAdapter>> {
    let mut adapters = Vec::new();
    for device in devices {
        if let Some(adapter) = parse_adapter(device)? {
            adapters.push(adapter);
        }
    }
    Ok(adapters)
}

/// Render a target backing. Only distributed port backings can be submitted.
pub fn backing_to_vim(backing: &BackingDescriptor) -> ProvisionResult<Value> {
    match backing {
        BackingDescriptor::DistributedPort {
            switch_uuid,
            portgroup_key,
            port_key,
            connection_cookie,
        } => {
            let mut port = Map::new();
            port.insert("_typeName".into(), json!("DistributedVirtualSwitchPortConnection"));
            port.insert("switchUuid".into(), json!(switch_uuid));
            port.insert("portgroupKey".into(), json!(portgroup_key));
            if let Some(k) = port_key {
                port.insert("portKey".into(), json!(k));
            }
            if let Some(c) = connection_cookie {
                port.insert("connectionCookie".into(), json!(c));
            }
            Ok(json!({
                "_typeName": DV_PORT_BACKING,
                "port": Value::Object(port),
            }))
        }
        other => Err(ProvisionError::unsupported_network(format!(
            "{} cannot be submitted as a target backing",
            other.type_name()
        ))),
    }
}

/// Render a `VirtualDeviceConfigSpec` for one edit instruction.
///
/// The device carries only key, backing, connectable and address type,
/// typed as the adapter's concrete variant.
pub fn edit_to_vim(edit: &DeviceEditInstruction) -> ProvisionResult<Value> {
    let adapter = &edit.device;
    let backing = adapter.backing.as_ref().ok_or_else(|| {
        ProvisionError::parse(format!("Edit for device {} has no backing", adapter.key))
    })?;

    let mut device = Map::new();
    device.insert("_typeName".into(), json!(adapter.variant.wire_name()));
    device.insert("key".into(), json!(adapter.key));
    device.insert("backing".into(), backing_to_vim(backing)?);
    if let Some(ref c) = adapter.connectable {
        let mut conn = serde_json::to_value(c)?;
        if let Value::Object(ref mut m) = conn {
            m.insert("_typeName".into(), json!("VirtualDeviceConnectInfo"));
        }
        device.insert("connectable".into(), conn);
    }
    if let Some(ref t) = adapter.address_type {
        device.insert("addressType".into(), json!(t));
    }

    Ok(json!({
        "_typeName": "VirtualDeviceConfigSpec",
        "operation": edit.operation.wire_name(),
        "device": Value::Object(device),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vmxnet3_on_vm_network() -> Value {
        json!({
            "_typeName": "VirtualVmxnet3",
            "key": 4000,
            "deviceInfo": { "_typeName": "Description", "label": "Network adapter 1", "summary": "VM Network" },
            "backing": {
                "_typeName": "VirtualEthernetCardNetworkBackingInfo",
                "deviceName": "VM Network",
                "network": { "_typeName": "ManagedObjectReference", "type": "Network", "value": "network-12" },
                "useAutoDetect": false
            },
            "connectable": {
                "_typeName": "VirtualDeviceConnectInfo",
                "startConnected": true,
                "allowGuestControl": true,
                "connected": false,
                "status": "untried"
            },
            "addressType": "assigned",
            "macAddress": "00:50:56:aa:bb:cc"
        })
    }

    #[test]
    fn parses_vmxnet3_with_network_backing() {
        let adapter = parse_adapter(&vmxnet3_on_vm_network()).unwrap().unwrap();
        assert_eq!(adapter.key, 4000);
        assert_eq!(adapter.variant, AdapterVariant::Vmxnet3);
        assert_eq!(adapter.label.as_deref(), Some("Network adapter 1"));
        assert_eq!(adapter.mac_address.as_deref(), Some("00:50:56:aa:bb:cc"));
        assert!(adapter.connectable.as_ref().unwrap().start_connected);
        match adapter.backing.unwrap() {
            BackingDescriptor::NetworkName { device_name, network, use_auto_detect } => {
                assert_eq!(device_name, "VM Network");
                assert_eq!(network.unwrap().id, "network-12");
                assert_eq!(use_auto_detect, Some(false));
            }
            other => panic!("unexpected backing {other:?}"),
        }
    }

    #[test]
    fn non_ethernet_devices_are_skipped() {
        let disk = json!({ "_typeName": "VirtualDisk", "key": 2000, "capacityInKB": 1024 });
        let ide = json!({ "_typeName": "VirtualIDEController", "key": 200 });
        let devices = vec![disk, ide, vmxnet3_on_vm_network()];
        let adapters = network_adapters(&devices).unwrap();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].key, 4000);
    }

    #[test]
    fn other_ethernet_subtypes_are_generic() {
        for t in ["VirtualVmxnet2", "VirtualSriovEthernetCard", "VirtualFutureNic"] {
            let dev = json!({ "_typeName": t, "key": 4001, "addressType": "generated" });
            assert_eq!(classify(&dev), Some(AdapterVariant::Generic), "{t}");
        }
    }

    #[test]
    fn ethernet_card_without_key_is_rejected() {
        let dev = json!({ "_typeName": "VirtualE1000", "addressType": "generated" });
        assert!(parse_adapter(&dev).is_err());
    }

    #[test]
    fn parses_distributed_port_backing() {
        let b = json!({
            "_typeName": "VirtualEthernetCardDistributedVirtualPortBackingInfo",
            "port": {
                "_typeName": "DistributedVirtualSwitchPortConnection",
                "switchUuid": "50 12 ab cd",
                "portgroupKey": "dvportgroup-33",
                "portKey": "17",
                "connectionCookie": 123456
            }
        });
        assert_eq!(
            parse_backing(&b).unwrap(),
            BackingDescriptor::DistributedPort {
                switch_uuid: "50 12 ab cd".into(),
                portgroup_key: "dvportgroup-33".into(),
                port_key: Some("17".into()),
                connection_cookie: Some(123456),
            }
        );
    }

    #[test]
    fn opaque_backing_is_unrecognized() {
        let b = json!({ "_typeName": "VirtualEthernetCardOpaqueNetworkBackingInfo", "opaqueNetworkId": "x" });
        assert_eq!(
            parse_backing(&b).unwrap(),
            BackingDescriptor::Unrecognized {
                type_name: "VirtualEthernetCardOpaqueNetworkBackingInfo".into()
            }
        );
    }

    #[test]
    fn edit_spec_keeps_variant_key_and_connectable() {
        let adapter = parse_adapter(&vmxnet3_on_vm_network()).unwrap().unwrap();
        let identity = PortGroupIdentity {
            switch_uuid: "uuid-1".into(),
            portgroup_key: "pg-1".into(),
        };
        let edit = DeviceEditInstruction {
            operation: DeviceOperation::Edit,
            device: adapter.with_backing(BackingDescriptor::distributed_port(&identity)),
            degraded: false,
        };
        let spec = edit_to_vim(&edit).unwrap();
        assert_eq!(spec["operation"], "edit");
        assert_eq!(spec["device"]["_typeName"], "VirtualVmxnet3");
        assert_eq!(spec["device"]["key"], 4000);
        assert_eq!(spec["device"]["addressType"], "assigned");
        assert_eq!(spec["device"]["connectable"]["startConnected"], true);
        assert_eq!(spec["device"]["connectable"]["_typeName"], "VirtualDeviceConnectInfo");
        assert_eq!(spec["device"]["backing"]["port"]["switchUuid"], "uuid-1");
        assert_eq!(spec["device"]["backing"]["port"]["portgroupKey"], "pg-1");
        assert!(spec["device"]["backing"]["port"].get("portKey").is_none());
        assert!(spec["device"].get("macAddress").is_none());
    }

    #[test]
    fn network_name_backing_cannot_be_submitted() {
        let backing = BackingDescriptor::NetworkName {
            device_name: "VM Network".into(),
            network: None,
            use_auto_detect: None,
        };
        let err = backing_to_vim(&backing).unwrap_err();
        assert_eq!(err.kind, crate::error::ProvisionErrorKind::UnsupportedNetworkKind);
    }
}
