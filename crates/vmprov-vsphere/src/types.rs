//! Shared types for inventory resolution, backing translation and cloning.

use crate::error::{ProvisionError, ProvisionResult};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for connecting to a vCenter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfig {
    /// vCenter hostname / IP (e.g. "vcenter.lab.local")
    pub host: String,
    /// Port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username (e.g. "administrator@vsphere.local")
    pub username: String,
    /// Password
    pub password: SecretString,
    /// Skip TLS certificate verification (self-signed labs)
    #[serde(default)]
    pub insecure: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// VI/JSON API release segment used in `/sdk/vim25/{release}`
    #[serde(default = "default_vim_release")]
    pub vim_release: String,
}

fn default_port() -> u16 { 443 }
fn default_timeout() -> u64 { 30 }
fn default_vim_release() -> String { "8.0.1.0".to_string() }

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 443,
            username: String::new(),
            password: SecretString::new(String::new()),
            insecure: false,
            timeout_secs: 30,
            vim_release: default_vim_release(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Inventory identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Managed-object type of an inventory reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InventoryKind {
    Datacenter,
    ClusterComputeResource,
    ResourcePool,
    Datastore,
    /// Standard-switch port group
    Network,
    DistributedVirtualPortgroup,
    OpaqueNetwork,
    VirtualMachine,
    Folder,
    DistributedVirtualSwitch,
    VmwareDistributedVirtualSwitch,
    Task,
    Other(String),
}

impl InventoryKind {
    /// VIM managed-object type name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Datacenter => "Datacenter",
            Self::ClusterComputeResource => "ClusterComputeResource",
            Self::ResourcePool => "ResourcePool",
            Self::Datastore => "Datastore",
            Self::Network => "Network",
            Self::DistributedVirtualPortgroup => "DistributedVirtualPortgroup",
            Self::OpaqueNetwork => "OpaqueNetwork",
            Self::VirtualMachine => "VirtualMachine",
            Self::Folder => "Folder",
            Self::DistributedVirtualSwitch => "DistributedVirtualSwitch",
            Self::VmwareDistributedVirtualSwitch => "VmwareDistributedVirtualSwitch",
            Self::Task => "Task",
            Self::Other(name) => name,
        }
    }

    pub fn from_type_name(name: &str) -> Self {
        match name {
            "Datacenter" => Self::Datacenter,
            "ClusterComputeResource" => Self::ClusterComputeResource,
            "ResourcePool" => Self::ResourcePool,
            "Datastore" => Self::Datastore,
            "Network" => Self::Network,
            "DistributedVirtualPortgroup" => Self::DistributedVirtualPortgroup,
            "OpaqueNetwork" => Self::OpaqueNetwork,
            "VirtualMachine" => Self::VirtualMachine,
            "Folder" => Self::Folder,
            "DistributedVirtualSwitch" => Self::DistributedVirtualSwitch,
            "VmwareDistributedVirtualSwitch" => Self::VmwareDistributedVirtualSwitch,
            "Task" => Self::Task,
            other => Self::Other(other.to_string()),
        }
    }

    /// Any kind a VM NIC can be attached to.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::DistributedVirtualPortgroup | Self::OpaqueNetwork
        )
    }

    /// Whether `actual` satisfies a lookup for `self`.
    pub fn accepts(&self, actual: &InventoryKind) -> bool {
        match self {
            Self::Network => actual.is_network(),
            Self::DistributedVirtualSwitch => matches!(
                actual,
                Self::DistributedVirtualSwitch | Self::VmwareDistributedVirtualSwitch
            ),
            _ => self == actual,
        }
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to one inventory object (a VIM managed-object reference).
///
/// Equality and hashing use the id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "MoRef", from = "MoRef")]
pub struct InventoryRef {
    pub kind: InventoryKind,
    pub id: String,
}

impl InventoryRef {
    pub fn new(kind: InventoryKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

impl PartialEq for InventoryRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InventoryRef {}

impl Hash for InventoryRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for InventoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Wire shape of a `ManagedObjectReference` in the VI/JSON API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MoRef {
    #[serde(rename = "_typeName", default = "mo_ref_type_name")]
    type_name: String,
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

fn mo_ref_type_name() -> String {
    "ManagedObjectReference".to_string()
}

impl From<InventoryRef> for MoRef {
    fn from(r: InventoryRef) -> Self {
        Self {
            type_name: mo_ref_type_name(),
            kind: r.kind.as_str().to_string(),
            value: r.id,
        }
    }
}

impl From<MoRef> for InventoryRef {
    fn from(m: MoRef) -> Self {
        Self {
            kind: InventoryKind::from_type_name(&m.kind),
            id: m.value,
        }
    }
}

/// A bare name or an absolute inventory path (`/DC/vm/folder/name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryPath {
    Name(String),
    Path(String),
}

impl InventoryPath {
    /// Anything starting with `/` is a path; everything else is a bare name.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with('/') {
            let path = trimmed.trim_end_matches('/');
            if path.is_empty() {
                Self::Path("/".to_string())
            } else {
                Self::Path(path.to_string())
            }
        } else {
            Self::Name(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Name(s) | Self::Path(s) => s,
        }
    }

    pub fn is_path(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    /// First path segment, i.e. the datacenter a path is rooted at.
    pub fn datacenter_segment(&self) -> Option<&str> {
        match self {
            Self::Path(p) => p.trim_start_matches('/').split('/').next().filter(|s| !s.is_empty()),
            Self::Name(_) => None,
        }
    }
}

impl fmt::Display for InventoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single datacenter every lookup of a run is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchScope {
    datacenter: InventoryRef,
    name: String,
}

impl SearchScope {
    pub(crate) fn new(datacenter: InventoryRef, name: impl Into<String>) -> Self {
        Self { datacenter, name: name.into() }
    }

    pub fn datacenter(&self) -> &InventoryRef {
        &self.datacenter
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path of a folder directly below the datacenter's VM folder.
    pub fn vm_folder_path(&self, folder: &str) -> String {
        format!("/{}/vm/{}", self.name, folder.trim_matches('/'))
    }

    /// Fail when `path` is rooted at a different datacenter.
    pub fn check_path(&self, path: &InventoryPath) -> ProvisionResult<()> {
        match path.datacenter_segment() {
            None if path.is_path() => Err(ProvisionError::invalid_path(format!(
                "Inventory path '{path}' does not name a datacenter"
            ))),
            Some(dc) if dc != self.name => Err(ProvisionError::invalid_path(format!(
                "Inventory path '{path}' is outside datacenter '{}'",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Network adapters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Concrete ethernet card subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterVariant {
    Vmxnet3,
    E1000,
    E1000e,
    PcNet32,
    /// Any other ethernet card; edited through the `VirtualEthernetCard` supertype.
    Generic,
}

impl AdapterVariant {
    /// VIM device type submitted in an edit spec.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Vmxnet3 => "VirtualVmxnet3",
            Self::E1000 => "VirtualE1000",
            Self::E1000e => "VirtualE1000e",
            Self::PcNet32 => "VirtualPCNet32",
            Self::Generic => "VirtualEthernetCard",
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Self::Generic)
    }
}

impl fmt::Display for AdapterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Vmxnet3 => "VMXNET3",
            Self::E1000 => "E1000",
            Self::E1000e => "E1000E",
            Self::PcNet32 => "PCNet32",
            Self::Generic => "Generic",
        };
        f.write_str(s)
    }
}

/// `VirtualDeviceConnectInfo` of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connectable {
    #[serde(default)]
    pub start_connected: bool,
    #[serde(default)]
    pub allow_guest_control: bool,
    #[serde(default)]
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_connect: Option<String>,
}

/// Connection descriptor attached to a network adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackingDescriptor {
    /// Standard port group, by network name.
    NetworkName {
        device_name: String,
        network: Option<InventoryRef>,
        use_auto_detect: Option<bool>,
    },
    /// Distributed switch port / port group.
    DistributedPort {
        switch_uuid: String,
        portgroup_key: String,
        port_key: Option<String>,
        connection_cookie: Option<i32>,
    },
    /// Any other backing type; never produced as a translation target.
    Unrecognized { type_name: String },
}

impl BackingDescriptor {
    /// Port-group level backing (no specific port, no cookie).
    pub fn distributed_port(identity: &PortGroupIdentity) -> Self {
        Self::DistributedPort {
            switch_uuid: identity.switch_uuid.clone(),
            portgroup_key: identity.portgroup_key.clone(),
            port_key: None,
            connection_cookie: None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::NetworkName { .. } => "VirtualEthernetCardNetworkBackingInfo",
            Self::DistributedPort { .. } => {
                "VirtualEthernetCardDistributedVirtualPortBackingInfo"
            }
            Self::Unrecognized { type_name } => type_name,
        }
    }
}

/// `{switch uuid, port group key}` of a distributed port group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortGroupIdentity {
    pub switch_uuid: String,
    pub portgroup_key: String,
}

/// One ethernet card of a VM.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkAdapter {
    /// Device key, unique within the VM's device list
    pub key: i32,
    pub variant: AdapterVariant,
    /// Wire type the device was read as (e.g. "VirtualVmxnet2")
    pub device_type: String,
    pub label: Option<String>,
    pub address_type: Option<String>,
    pub mac_address: Option<String>,
    pub connectable: Option<Connectable>,
    pub backing: Option<BackingDescriptor>,
}

impl NetworkAdapter {
    /// Same adapter, new backing.
    pub fn with_backing(&self, backing: BackingDescriptor) -> Self {
        Self {
            backing: Some(backing),
            ..self.clone()
        }
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unlabelled>")
    }
}

/// Port-group config of a distributed port group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortGroupConfig {
    pub key: String,
    pub switch: Option<InventoryRef>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Clone
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOperation {
    Edit,
}

impl DeviceOperation {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
        }
    }
}

/// Edit of one existing adapter; only the backing differs from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEditInstruction {
    pub operation: DeviceOperation,
    pub device: NetworkAdapter,
    /// Submitted through the generic supertype; vCenter may reject it.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub datastore: InventoryRef,
    pub resource_pool: InventoryRef,
}

/// Everything `CloneVM_Task` needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneRequest {
    pub source_template: InventoryRef,
    pub destination_folder: InventoryRef,
    pub name: String,
    pub placement: Placement,
    pub device_edits: Vec<DeviceEditInstruction>,
    power_on: bool,
    template: bool,
}

impl CloneRequest {
    /// The clone is always a powered-off, runnable VM (not a template).
    pub fn new(
        source_template: InventoryRef,
        destination_folder: InventoryRef,
        name: impl Into<String>,
        placement: Placement,
        device_edits: Vec<DeviceEditInstruction>,
    ) -> Self {
        Self {
            source_template,
            destination_folder,
            name: name.into(),
            placement,
            device_edits,
            power_on: false,
            template: false,
        }
    }

    pub fn power_on(&self) -> bool {
        self.power_on
    }

    pub fn is_template(&self) -> bool {
        self.template
    }
}

/// Lifecycle of the clone task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneTaskState {
    Submitted,
    Running,
    Succeeded,
    Failed,
}

impl CloneTaskState {
    /// Map a VIM `TaskInfoState` value.
    pub fn from_vim(state: &str) -> Option<Self> {
        match state {
            "queued" => Some(Self::Submitted),
            "running" => Some(Self::Running),
            "success" => Some(Self::Succeeded),
            "error" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Fault reported by a failed task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFault {
    pub localized_message: Option<String>,
    pub fault_type: Option<String>,
    pub fault_messages: Vec<String>,
    /// Raw `LocalizedMethodFault` JSON
    pub raw: serde_json::Value,
}

impl TaskFault {
    /// Fault type plus any fault messages, when vCenter supplied them.
    pub fn detail(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(ref t) = self.fault_type {
            parts.push(t.clone());
        }
        parts.extend(self.fault_messages.iter().cloned());
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(": "))
        }
    }
}

/// One poll of `Task.info`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub state: CloneTaskState,
    pub progress: Option<u32>,
    pub result: Option<serde_json::Value>,
    pub error: Option<TaskFault>,
}

/// Terminal result of a clone task.
#[derive(Debug, Clone, PartialEq)]
pub enum CloneOutcome {
    Success { new_vm: InventoryRef },
    Failure {
        message: String,
        platform_detail: Option<String>,
    },
}

impl CloneOutcome {
    /// `Failure` becomes an `OperationFailed` error.
    pub fn into_result(self) -> ProvisionResult<InventoryRef> {
        match self {
            Self::Success { new_vm } => Ok(new_vm),
            Self::Failure { message, platform_detail } => {
                Err(ProvisionError::operation(message, platform_detail).during("clone"))
            }
        }
    }
}
