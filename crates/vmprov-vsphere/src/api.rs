//! Typed RPC surface the core runs against.
//!
//! `VsphereClient` implements it over HTTP; tests substitute fakes / mocks.

use crate::error::ProvisionResult;
use crate::types::*;

use async_trait::async_trait;
use serde_json::Value;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Datacenters with this exact name, in platform order.
    async fn find_datacenters(&self, name: &str) -> ProvisionResult<Vec<InventoryRef>>;

    /// Objects of `kind` named `name` inside `datacenter`, in platform order.
    async fn find_by_name(
        &self,
        datacenter: &InventoryRef,
        kind: InventoryKind,
        name: &str,
    ) -> ProvisionResult<Vec<InventoryRef>>;

    /// Direct lookup of an absolute inventory path.
    async fn find_by_path(&self, path: &str) -> ProvisionResult<Option<InventoryRef>>;

    /// Root resource pool of a cluster.
    async fn cluster_root_pool(&self, cluster: &InventoryRef) -> ProvisionResult<InventoryRef>;

    /// Key and owning switch of a distributed port group.
    async fn port_group_config(&self, portgroup: &InventoryRef) -> ProvisionResult<PortGroupConfig>;

    /// `summary.uuid` of a distributed switch.
    async fn switch_uuid(&self, switch: &InventoryRef) -> ProvisionResult<String>;

    /// Raw `config.hardware.device` list of a VM.
    async fn vm_devices(&self, vm: &InventoryRef) -> ProvisionResult<Vec<Value>>;

    /// Start `CloneVM_Task`; returns the task reference.
    async fn submit_clone(&self, request: &CloneRequest) -> ProvisionResult<InventoryRef>;

    /// Current `Task.info`.
    async fn task_info(&self, task: &InventoryRef) -> ProvisionResult<TaskSnapshot>;
}
