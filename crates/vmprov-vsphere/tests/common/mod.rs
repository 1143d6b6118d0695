#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use vmprov_vsphere::error::{ProvisionError, ProvisionResult};
use vmprov_vsphere::types::*;
use vmprov_vsphere::InventoryApi;

pub fn r(kind: InventoryKind, id: &str) -> InventoryRef {
    InventoryRef::new(kind, id)
}

struct Named {
    datacenter: String,
    name: String,
    object: InventoryRef,
}

/// In-memory vCenter inventory.
///
/// Default lab: datacenter `DC1`, cluster `PRD` (root pool `resgroup-8`),
/// pool `gold`, datastore `ds01`, distributed port group `NET1`
/// (`uuid-1` / `pg-1`), standard network `VM Network`, template `T` at
/// `/DC1/vm/Templates/T` and folder `/DC1/vm/Apps`.
pub struct FakeInventory {
    datacenters: Vec<(String, InventoryRef)>,
    named: Vec<Named>,
    paths: HashMap<String, InventoryRef>,
    root_pools: HashMap<String, InventoryRef>,
    port_groups: HashMap<String, PortGroupConfig>,
    switch_uuids: HashMap<String, String>,
    devices: HashMap<String, Vec<Value>>,
    submit_error: Option<ProvisionError>,
    task_script: Mutex<VecDeque<TaskSnapshot>>,
    pub submitted: Mutex<Vec<CloneRequest>>,
    pub task_polls: Mutex<usize>,
}

impl FakeInventory {
    pub fn lab() -> Self {
        let mut fake = Self {
            datacenters: vec![("DC1".into(), r(InventoryKind::Datacenter, "datacenter-1"))],
            named: Vec::new(),
            paths: HashMap::new(),
            root_pools: HashMap::new(),
            port_groups: HashMap::new(),
            switch_uuids: HashMap::new(),
            devices: HashMap::new(),
            submit_error: None,
            task_script: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            task_polls: Mutex::new(0),
        };

        fake.add("DC1", InventoryKind::ClusterComputeResource, "PRD", "domain-c7");
        fake.root_pools
            .insert("domain-c7".into(), r(InventoryKind::ResourcePool, "resgroup-8"));
        fake.add("DC1", InventoryKind::ResourcePool, "gold", "resgroup-20");
        fake.add("DC1", InventoryKind::Datastore, "ds01", "datastore-5");
        fake.add("DC1", InventoryKind::DistributedVirtualPortgroup, "NET1", "dvportgroup-30");
        fake.port_groups.insert(
            "dvportgroup-30".into(),
            PortGroupConfig {
                key: "pg-1".into(),
                switch: Some(r(InventoryKind::VmwareDistributedVirtualSwitch, "dvs-2")),
            },
        );
        fake.switch_uuids.insert("dvs-2".into(), "uuid-1".into());
        fake.add("DC1", InventoryKind::Network, "VM Network", "network-12");
        fake.add("DC1", InventoryKind::OpaqueNetwork, "nsx-seg", "opaque-3");
        fake.add("DC1", InventoryKind::VirtualMachine, "T", "vm-10");
        fake.add_path("/DC1/vm/Templates/T", r(InventoryKind::VirtualMachine, "vm-10"));
        fake.add_path("/DC1/vm/Apps", r(InventoryKind::Folder, "group-v40"));
        fake.devices.insert(
            "vm-10".into(),
            vec![disk(2000), nic("VirtualVmxnet3", 4000, network_backing("VM Network"))],
        );
        fake.script_task(vec![
            snapshot(CloneTaskState::Running, Some(30)),
            success("vm-99"),
        ]);
        fake
    }

    pub fn add(&mut self, datacenter: &str, kind: InventoryKind, name: &str, id: &str) -> &mut Self {
        self.named.push(Named {
            datacenter: datacenter.into(),
            name: name.into(),
            object: r(kind, id),
        });
        self
    }

    pub fn add_path(&mut self, path: &str, object: InventoryRef) -> &mut Self {
        self.paths.insert(path.into(), object);
        self
    }

    pub fn set_devices(&mut self, vm_id: &str, devices: Vec<Value>) -> &mut Self {
        self.devices.insert(vm_id.into(), devices);
        self
    }

    pub fn set_port_group(&mut self, id: &str, config: PortGroupConfig) -> &mut Self {
        self.port_groups.insert(id.into(), config);
        self
    }

    pub fn fail_submission(&mut self, err: ProvisionError) -> &mut Self {
        self.submit_error = Some(err);
        self
    }

    pub fn script_task(&mut self, snapshots: Vec<TaskSnapshot>) -> &mut Self {
        *self.task_script.lock().unwrap() = snapshots.into();
        self
    }

    pub fn polls(&self) -> usize {
        *self.task_polls.lock().unwrap()
    }

    pub fn last_request(&self) -> Option<CloneRequest> {
        self.submitted.lock().unwrap().last().cloned()
    }

    fn datacenter_name(&self, dc: &InventoryRef) -> Option<&str> {
        self.datacenters
            .iter()
            .find(|(_, r)| r == dc)
            .map(|(n, _)| n.as_str())
    }
}

#[async_trait]
impl InventoryApi for FakeInventory {
    async fn find_datacenters(&self, name: &str) -> ProvisionResult<Vec<InventoryRef>> {
        Ok(self
            .datacenters
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn find_by_name(
        &self,
        datacenter: &InventoryRef,
        kind: InventoryKind,
        name: &str,
    ) -> ProvisionResult<Vec<InventoryRef>> {
        let dc = self.datacenter_name(datacenter).unwrap_or_default();
        Ok(self
            .named
            .iter()
            .filter(|n| n.datacenter == dc && n.name == name)
            .filter(|n| match kind {
                InventoryKind::Network => n.object.kind.is_network(),
                ref k => &n.object.kind == k,
            })
            .map(|n| n.object.clone())
            .collect())
    }

    async fn find_by_path(&self, path: &str) -> ProvisionResult<Option<InventoryRef>> {
        Ok(self.paths.get(path).cloned())
    }

    async fn cluster_root_pool(&self, cluster: &InventoryRef) -> ProvisionResult<InventoryRef> {
        self.root_pools
            .get(&cluster.id)
            .cloned()
            .ok_or_else(|| ProvisionError::not_found(format!("no root pool for {}", cluster.id)))
    }

    async fn port_group_config(&self, portgroup: &InventoryRef) -> ProvisionResult<PortGroupConfig> {
        self.port_groups
            .get(&portgroup.id)
            .cloned()
            .ok_or_else(|| ProvisionError::not_found(format!("no port group {}", portgroup.id)))
    }

    async fn switch_uuid(&self, switch: &InventoryRef) -> ProvisionResult<String> {
        self.switch_uuids
            .get(&switch.id)
            .cloned()
            .ok_or_else(|| ProvisionError::not_found(format!("no switch {}", switch.id)))
    }

    async fn vm_devices(&self, vm: &InventoryRef) -> ProvisionResult<Vec<Value>> {
        self.devices
            .get(&vm.id)
            .cloned()
            .ok_or_else(|| ProvisionError::not_found(format!("no VM {}", vm.id)))
    }

    async fn submit_clone(&self, request: &CloneRequest) -> ProvisionResult<InventoryRef> {
        if let Some(ref err) = self.submit_error {
            return Err(err.clone());
        }
        self.submitted.lock().unwrap().push(request.clone());
        Ok(r(InventoryKind::Task, "task-501"))
    }

    async fn task_info(&self, _task: &InventoryRef) -> ProvisionResult<TaskSnapshot> {
        *self.task_polls.lock().unwrap() += 1;
        self.task_script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProvisionError::transport("task polled after its terminal state"))
    }
}

// ── Device JSON builders ────────────────────────────────────────────

pub fn disk(key: i64) -> Value {
    json!({ "_typeName": "VirtualDisk", "key": key, "capacityInKB": 16777216 })
}

pub fn network_backing(device_name: &str) -> Value {
    json!({
        "_typeName": "VirtualEthernetCardNetworkBackingInfo",
        "deviceName": device_name,
        "network": { "_typeName": "ManagedObjectReference", "type": "Network", "value": "network-12" },
        "useAutoDetect": false
    })
}

pub fn nic(device_type: &str, key: i64, backing: Value) -> Value {
    json!({
        "_typeName": device_type,
        "key": key,
        "deviceInfo": { "_typeName": "Description", "label": format!("Network adapter {}", key - 3999), "summary": "" },
        "backing": backing,
        "connectable": {
            "_typeName": "VirtualDeviceConnectInfo",
            "startConnected": true,
            "allowGuestControl": true,
            "connected": false,
            "status": "untried"
        },
        "addressType": "generated",
        "macAddress": format!("00:50:56:00:00:{:02x}", key % 256)
    })
}

// ── Task snapshots ──────────────────────────────────────────────────

pub fn snapshot(state: CloneTaskState, progress: Option<u32>) -> TaskSnapshot {
    TaskSnapshot {
        state,
        progress,
        result: None,
        error: None,
    }
}

pub fn success(vm_id: &str) -> TaskSnapshot {
    TaskSnapshot {
        result: Some(json!({
            "_typeName": "ManagedObjectReference",
            "type": "VirtualMachine",
            "value": vm_id
        })),
        ..snapshot(CloneTaskState::Succeeded, Some(100))
    }
}

pub fn failed(localized: Option<&str>, fault_type: &str) -> TaskSnapshot {
    let mut raw = json!({
        "_typeName": "LocalizedMethodFault",
        "fault": { "_typeName": fault_type }
    });
    if let Some(msg) = localized {
        raw["localizedMessage"] = json!(msg);
    }
    TaskSnapshot {
        error: Some(TaskFault {
            localized_message: localized.map(str::to_string),
            fault_type: Some(fault_type.to_string()),
            fault_messages: Vec::new(),
            raw,
        }),
        ..snapshot(CloneTaskState::Failed, None)
    }
}
