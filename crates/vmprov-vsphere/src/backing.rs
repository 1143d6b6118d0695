//! Network backing translation onto a distributed port group.

use crate::api::InventoryApi;
use crate::cancel::guarded;
use crate::device;
use crate::error::{ProvisionError, ProvisionResult};
use crate::types::*;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Edit instructions for every ethernet card of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub identity: PortGroupIdentity,
    pub instructions: Vec<DeviceEditInstruction>,
}

impl Translation {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Device keys edited through the generic ethernet card supertype.
    pub fn degraded_keys(&self) -> Vec<i32> {
        self.instructions
            .iter()
            .filter(|i| i.degraded)
            .map(|i| i.device.key)
            .collect()
    }
}

/// Reads port group identities and template adapters.
pub struct BackingTranslator<'a> {
    api: &'a dyn InventoryApi,
    token: &'a CancellationToken,
}

impl<'a> BackingTranslator<'a> {
    pub fn new(api: &'a dyn InventoryApi, token: &'a CancellationToken) -> Self {
        Self { api, token }
    }

    /// `{switch uuid, port group key}` of a distributed port group.
    pub async fn port_group_identity(&self, network: &InventoryRef) -> ProvisionResult<PortGroupIdentity> {
        const STEP: &str = "translate network";
        if network.kind != InventoryKind::DistributedVirtualPortgroup {
            return Err(ProvisionError::unsupported_network(format!(
                "Network {} is a {}; only distributed port groups can be targeted",
                network.id, network.kind
            ))
            .during(STEP));
        }

        let config = guarded(self.token, STEP, self.api.port_group_config(network)).await?;
        let switch = config.switch.ok_or_else(|| {
            ProvisionError::missing_switch(format!(
                "Port group {} has no distributed switch in its config",
                network.id
            ))
            .during(STEP)
        })?;
        if !InventoryKind::DistributedVirtualSwitch.accepts(&switch.kind) {
            return Err(ProvisionError::missing_switch(format!(
                "Port group {} references {} instead of a distributed switch",
                network.id, switch
            ))
            .during(STEP));
        }

        let switch_uuid = guarded(self.token, STEP, self.api.switch_uuid(&switch)).await?;
        debug!(portgroup = %network.id, switch = %switch.id, %switch_uuid, key = %config.key, "Port group identity");

        Ok(PortGroupIdentity {
            switch_uuid,
            portgroup_key: config.key,
        })
    }

    /// Every ethernet card on a VM, in device order.
    pub async fn adapters(&self, vm: &InventoryRef) -> ProvisionResult<Vec<NetworkAdapter>> {
        const STEP: &str = "read template devices";
        let devices = guarded(self.token, STEP, self.api.vm_devices(vm)).await?;
        device::network_adapters(&devices).map_err(|e| e.during(STEP))
    }

    /// Identity of `network` plus one edit per adapter of `template`.
    pub async fn translate(
        &self,
        template: &InventoryRef,
        network: &InventoryRef,
    ) -> ProvisionResult<Translation> {
        let identity = self.port_group_identity(network).await?;
        let adapters = self.adapters(template).await?;
        let translation = rewire(&adapters, &identity);
        info!(
            template = %template.id,
            adapters = translation.len(),
            degraded = translation.degraded_keys().len(),
            "Network backings translated"
        );
        Ok(translation)
    }
}

/// Point every adapter at `identity`, keeping key, variant, address type
/// and connect info.
pub fn rewire(adapters: &[NetworkAdapter], identity: &PortGroupIdentity) -> Translation {
    let backing = BackingDescriptor::distributed_port(identity);
    let instructions = adapters
        .iter()
        .map(|adapter| {
            let degraded = adapter.variant.is_generic();
            if degraded {
                warn!(
                    key = adapter.key,
                    device_type = %adapter.device_type,
                    label = adapter.display_label(),
                    "Adapter type has no dedicated variant; editing it as a generic ethernet card, vCenter may reject the change"
                );
            }
            DeviceEditInstruction {
                operation: DeviceOperation::Edit,
                device: adapter.with_backing(backing.clone()),
                degraded,
            }
        })
        .collect();

    Translation {
        identity: identity.clone(),
        instructions,
    }
}
