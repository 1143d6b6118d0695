//! Read-only network adapter report for an existing VM.

use crate::api::InventoryApi;
use crate::cancel::guarded;
use crate::device;
use crate::error::ProvisionResult;
use crate::types::*;

use serde_json::Value;
use std::fmt::{self, Write as _};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One adapter plus its backing exactly as vCenter returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterReport {
    pub adapter: NetworkAdapter,
    pub raw_backing: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectReport {
    pub vm: InventoryRef,
    pub vm_name: String,
    pub adapters: Vec<AdapterReport>,
}

pub struct Inspector<'a> {
    api: &'a dyn InventoryApi,
    token: &'a CancellationToken,
}

impl<'a> Inspector<'a> {
    pub fn new(api: &'a dyn InventoryApi, token: &'a CancellationToken) -> Self {
        Self { api, token }
    }

    pub async fn inspect(&self, vm: &InventoryRef, vm_name: &str) -> ProvisionResult<InspectReport> {
        const STEP: &str = "inspect vm";
        let devices = guarded(self.token, STEP, self.api.vm_devices(vm)).await?;

        let mut adapters = Vec::new();
        for raw in &devices {
            if let Some(adapter) = device::parse_adapter(raw).map_err(|e| e.during(STEP))? {
                adapters.push(AdapterReport {
                    adapter,
                    raw_backing: raw.get("backing").filter(|b| !b.is_null()).cloned(),
                });
            }
        }
        info!(vm = %vm.id, devices = devices.len(), adapters = adapters.len(), "VM hardware read");

        Ok(InspectReport {
            vm: vm.clone(),
            vm_name: vm_name.to_string(),
            adapters,
        })
    }
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network adapters of VM '{}' ({}):", self.vm_name, self.vm.id)?;
        if self.adapters.is_empty() {
            return writeln!(f, "  No ethernet adapters found on VM '{}'.", self.vm_name);
        }
        for report in &self.adapters {
            f.write_str(&render_adapter(report))?;
        }
        Ok(())
    }
}

/// Text block for one adapter.
pub fn render_adapter(report: &AdapterReport) -> String {
    let a = &report.adapter;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  NIC Label: {}, Device Type: {} ({})",
        a.display_label(),
        a.device_type,
        a.variant
    );
    let _ = writeln!(out, "    AddressType: {}", a.address_type.as_deref().unwrap_or("<unset>"));
    if let Some(ref mac) = a.mac_address {
        let _ = writeln!(out, "    MAC Address: {mac}");
    }
    match a.connectable {
        Some(ref c) => {
            let _ = writeln!(
                out,
                "    Connectable: startConnected={} allowGuestControl={} connected={} status={}",
                c.start_connected,
                c.allow_guest_control,
                c.connected,
                c.status.as_deref().unwrap_or("<unset>")
            );
        }
        None => {
            let _ = writeln!(out, "    Connectable: nil");
        }
    }
    out.push_str(&render_backing(a.backing.as_ref(), report.raw_backing.as_ref()));
    out.push_str("    ----\n");
    out
}

/// Structured dump first, then per-kind fields, then an opaque notice.
pub fn render_backing(backing: Option<&BackingDescriptor>, raw: Option<&Value>) -> String {
    let Some(backing) = backing else {
        return "    BackingInfo: nil\n".to_string();
    };

    let mut out = String::new();
    let _ = writeln!(out, "    BackingInfo Type: {}", backing.type_name());

    if let Some(dump) = raw.filter(|r| r.is_object()).and_then(|r| serde_json::to_string_pretty(r).ok()) {
        let _ = writeln!(out, "    BackingInfo (JSON):");
        for line in dump.lines() {
            let _ = writeln!(out, "    {line}");
        }
        return out;
    }

    match backing {
        BackingDescriptor::NetworkName {
            device_name,
            network,
            use_auto_detect,
        } => {
            let _ = writeln!(out, "      DeviceName: {device_name}");
            match network {
                Some(n) => {
                    let _ = writeln!(out, "      Network MOR: {n} (Type: {}, Value: {})", n.kind, n.id);
                }
                None => {
                    let _ = writeln!(out, "      Network MOR: nil");
                }
            }
            let _ = writeln!(
                out,
                "      UseAutoDetect: {}",
                use_auto_detect.map_or("<unset>".to_string(), |v| v.to_string())
            );
        }
        BackingDescriptor::DistributedPort {
            switch_uuid,
            portgroup_key,
            port_key,
            connection_cookie,
        } => {
            let _ = writeln!(out, "      Port.SwitchUuid: {switch_uuid}");
            let _ = writeln!(out, "      Port.PortgroupKey: {portgroup_key}");
            let _ = writeln!(out, "      Port.PortKey: {}", port_key.as_deref().unwrap_or("<unset>"));
            let _ = writeln!(
                out,
                "      Port.ConnectionCookie: {}",
                connection_cookie.map_or("<unset>".to_string(), |c| c.to_string())
            );
        }
        BackingDescriptor::Unrecognized { type_name } => {
            let _ = writeln!(out, "    Unrecognized backing ({type_name}); no field rendering available");
        }
    }
    out
}
