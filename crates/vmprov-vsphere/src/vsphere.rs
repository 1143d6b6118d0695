//! vSphere HTTP client with session-based authentication.
//!
//! Two API families share one session:
//!
//! - **Automation REST** (`/api/...`): session create/delete and the
//!   name-filtered inventory listings used for bare-name lookups.
//! - **VI/JSON** (`/sdk/vim25/{release}/...`): inventory path search,
//!   managed-object property reads, `CloneVM_Task` and `Task.info`.

use crate::api::InventoryApi;
use crate::device;
use crate::error::{ProvisionError, ProvisionErrorKind, ProvisionResult};
use crate::types::*;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const SESSION_HEADER: &str = "vmware-api-session-id";

/// vSphere API client.
pub struct VsphereClient {
    client: Client,
    base_url: String,
    session_id: Option<String>,
    config: VsphereConfig,
}

impl VsphereClient {
    /// Build a new client from config (does NOT create a session yet).
    pub fn new(config: &VsphereConfig) -> ProvisionResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| ProvisionError::transport(format!("Failed to build HTTP client: {e}")))?;

        let base_url = format!("https://{}:{}", config.host, config.port);

        Ok(Self {
            client,
            base_url,
            session_id: None,
            config: config.clone(),
        })
    }

    /// Base URL for API calls.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether we have an active session.
    pub fn is_connected(&self) -> bool {
        self.session_id.is_some()
    }

    // ── Session management ──────────────────────────────────────────

    /// Create a new API session (POST /api/session).
    pub async fn login(&mut self) -> ProvisionResult<()> {
        let url = format!("{}/api/session", self.base_url);

        let resp = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.username,
                Some(self.config.password.expose_secret()),
            )
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ProvisionError::auth("Invalid credentials"));
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProvisionError::api(
                status.as_u16(),
                format!("Login failed: {body}"),
            ));
        }

        // Session ID comes back as a quoted JSON string
        let session_id: String = resp.json().await.map_err(|e| {
            ProvisionError::parse(format!("Failed to parse session response: {e}"))
        })?;

        self.session_id = Some(session_id);
        Ok(())
    }

    /// Delete the current session (DELETE /api/session). Best effort.
    ///
    /// Skipped once `token` is cancelled, and abandoned if it is cancelled
    /// while the request is in flight; the session then expires on vCenter.
    pub async fn logout(&mut self, token: &CancellationToken) {
        let Some(sid) = self.session_id.take() else {
            return;
        };
        if token.is_cancelled() {
            debug!("Run aborted, not closing the vCenter session");
            return;
        }

        let url = format!("{}/api/session", self.base_url);
        let request = self.client.delete(&url).header(SESSION_HEADER, sid).send();
        tokio::select! {
            biased;
            _ = token.cancelled() => debug!("Logout abandoned"),
            res = request => {
                if let Err(e) = res {
                    debug!(error = %e, "Logout failed");
                }
            }
        }
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    fn require_session(&self) -> ProvisionResult<&str> {
        self.session_id
            .as_deref()
            .ok_or_else(|| ProvisionError::auth("Not logged in: no active session"))
    }

    /// GET a JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ProvisionResult<T> {
        self.get_with_params(path, &[]).await
    }

    /// GET a JSON response with query params.
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> ProvisionResult<T> {
        let sid = self.require_session()?;
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let resp = self
            .client
            .get(&url)
            .header(SESSION_HEADER, sid)
            .query(params)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// POST with JSON body, return parsed response.
    pub async fn post<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ProvisionResult<T> {
        let sid = self.require_session()?;
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");
        let resp = self
            .client
            .post(&url)
            .header(SESSION_HEADER, sid)
            .json(body)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    // ── VI/JSON helpers ─────────────────────────────────────────────

    fn vim_path(&self, kind: &str, id: &str, tail: &str) -> String {
        format!("/sdk/vim25/{}/{kind}/{id}/{tail}", self.config.vim_release)
    }

    /// Read one property of a managed object.
    pub async fn vim_property<T: DeserializeOwned>(
        &self,
        mo: &InventoryRef,
        property: &str,
    ) -> ProvisionResult<T> {
        let path = self.vim_path(mo.kind.as_str(), &mo.id, property);
        self.get(&path).await
    }

    /// Invoke a method on a managed object.
    pub async fn vim_invoke<T: DeserializeOwned>(
        &self,
        mo: &InventoryRef,
        method: &str,
        body: &Value,
    ) -> ProvisionResult<T> {
        let path = self.vim_path(mo.kind.as_str(), &mo.id, method);
        self.post(&path, body).await
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn check_status(resp: Response) -> ProvisionResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn parse_response<T: DeserializeOwned>(resp: Response) -> ProvisionResult<T> {
        let text = resp.text().await.map_err(|e| {
            ProvisionError::transport(format!("Failed to read response body: {e}"))
        })?;

        if text.is_empty() {
            // Void / unset results come back with an empty body
            return serde_json::from_str("null").map_err(|e| {
                ProvisionError::parse(format!("Cannot deserialise empty response: {e}"))
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ProvisionError::parse(format!("JSON parse error: {e}; body: {}", truncate(&text, 500)))
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Human-readable text for an error body; VI/JSON faults become
/// `"<FaultType>: <message>"`.
fn fault_text(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return truncate(body, 500).to_string();
    };
    let fault_type = value.get("_typeName").and_then(Value::as_str);
    let message = value
        .get("localizedMessage")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| fault_messages(&value).into_iter().next());
    match (fault_type, message) {
        (Some(t), Some(m)) => format!("{t}: {m}"),
        (Some(t), None) => t.to_string(),
        (None, Some(m)) => m,
        (None, None) => truncate(body, 500).to_string(),
    }
}

/// `"<FaultType>: <fault messages>"` when `body` is a VI/JSON fault.
fn fault_detail(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    let fault_type = value.get("_typeName")?.as_str()?;
    let mut parts = vec![fault_type.to_string()];
    parts.extend(fault_messages(&value));
    Some(parts.join(": "))
}

/// Error for a non-success response.
fn status_error(status: StatusCode, body: &str) -> ProvisionError {
    let code = status.as_u16();
    let text = fault_text(body);

    let err = match status {
        StatusCode::UNAUTHORIZED => ProvisionError::auth(format!("Session expired or invalid: {text}")),
        StatusCode::FORBIDDEN => ProvisionError::new(
            ProvisionErrorKind::AccessDenied,
            format!("Access denied: {text}"),
        ),
        StatusCode::NOT_FOUND => ProvisionError::not_found(format!("Resource not found: {text}")),
        _ if text.starts_with("ManagedObjectNotFound") => ProvisionError::not_found(text),
        _ => ProvisionError::api(code, format!("API error {code}: {text}")),
    };
    ProvisionError {
        platform_detail: fault_detail(body),
        ..err
    }
}

fn fault_messages(fault: &Value) -> Vec<String> {
    fault
        .get("faultMessage")
        .and_then(Value::as_array)
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m.get("message").and_then(Value::as_str))
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// REST collection + id field for a name-filtered listing.
fn listing_endpoint(kind: &InventoryKind) -> ProvisionResult<(&'static str, &'static str)> {
    match kind {
        InventoryKind::Datacenter => Ok(("/api/vcenter/datacenter", "datacenter")),
        InventoryKind::ClusterComputeResource => Ok(("/api/vcenter/cluster", "cluster")),
        InventoryKind::ResourcePool => Ok(("/api/vcenter/resource-pool", "resource_pool")),
        InventoryKind::Datastore => Ok(("/api/vcenter/datastore", "datastore")),
        InventoryKind::Network => Ok(("/api/vcenter/network", "network")),
        InventoryKind::VirtualMachine => Ok(("/api/vcenter/vm", "vm")),
        other => Err(ProvisionError::config(format!(
            "Name lookup is not supported for {other}"
        ))),
    }
}

/// Inventory kind of a REST network summary `type`.
fn network_kind(rest_type: Option<&str>) -> InventoryKind {
    match rest_type {
        Some("DISTRIBUTED_PORTGROUP") => InventoryKind::DistributedVirtualPortgroup,
        Some("OPAQUE_NETWORK") => InventoryKind::OpaqueNetwork,
        _ => InventoryKind::Network,
    }
}

/// Turn a REST listing into references of `kind`.
fn listing_refs(kind: &InventoryKind, id_field: &str, items: &[Value]) -> Vec<InventoryRef> {
    items
        .iter()
        .filter_map(|item| {
            let id = item.get(id_field)?.as_str()?;
            let kind = match kind {
                InventoryKind::Network => network_kind(item.get("type").and_then(Value::as_str)),
                k => k.clone(),
            };
            Some(InventoryRef::new(kind, id))
        })
        .collect()
}

/// Root pool from `ClusterComputeResource.resourcePool`.
fn root_pool(cluster: &InventoryRef, value: &Value) -> ProvisionResult<InventoryRef> {
    if value.is_null() {
        return Err(ProvisionError::not_found(format!(
            "Cluster {} has no root resource pool",
            cluster.id
        )));
    }
    Ok(serde_json::from_value(value.clone())?)
}

/// Port group `key` plus the switch from `DistributedVirtualPortgroup.config`.
fn port_group(key: String, config: &Value) -> ProvisionResult<PortGroupConfig> {
    let switch = match config.get("distributedVirtualSwitch") {
        Some(v) if !v.is_null() => Some(serde_json::from_value::<InventoryRef>(v.clone())?),
        _ => None,
    };
    Ok(PortGroupConfig { key, switch })
}

/// `uuid` of a switch `summary`; never empty.
fn summary_uuid(switch: &InventoryRef, summary: &Value) -> ProvisionResult<String> {
    summary
        .get("uuid")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProvisionError::parse(format!("Switch {} summary has no uuid", switch.id)))
}

/// `hardware.device` of a VM `config`; a null config means the VM is unusable.
fn hardware_devices(vm: &InventoryRef, config: &Value) -> ProvisionResult<Vec<Value>> {
    if config.is_null() {
        return Err(ProvisionError::not_found(format!(
            "VM {} has no configuration (inaccessible or orphaned)",
            vm.id
        )));
    }
    Ok(config
        .pointer("/hardware/device")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// Body of `VirtualMachine.CloneVM_Task`.
pub fn clone_vm_body(request: &CloneRequest) -> ProvisionResult<Value> {
    let mut spec = json!({
        "_typeName": "VirtualMachineCloneSpec",
        "location": {
            "_typeName": "VirtualMachineRelocateSpec",
            "datastore": request.placement.datastore,
            "pool": request.placement.resource_pool,
        },
        "powerOn": request.power_on(),
        "template": request.is_template(),
    });

    if !request.device_edits.is_empty() {
        let changes = request
            .device_edits
            .iter()
            .map(device::edit_to_vim)
            .collect::<ProvisionResult<Vec<_>>>()?;
        spec["config"] = json!({
            "_typeName": "VirtualMachineConfigSpec",
            "deviceChange": changes,
        });
    }

    Ok(json!({
        "folder": request.destination_folder,
        "name": request.name,
        "spec": spec,
    }))
}

/// Parse a VI/JSON `TaskInfo`.
pub fn parse_task_info(info: &Value) -> ProvisionResult<TaskSnapshot> {
    let raw_state = info
        .get("state")
        .and_then(Value::as_str)
        .ok_or_else(|| ProvisionError::parse("TaskInfo without a state"))?;
    let state = CloneTaskState::from_vim(raw_state)
        .ok_or_else(|| ProvisionError::parse(format!("Unknown task state '{raw_state}'")))?;

    let error = match info.get("error") {
        Some(e) if !e.is_null() => {
            let fault = e.get("fault").unwrap_or(&Value::Null);
            Some(TaskFault {
                localized_message: e
                    .get("localizedMessage")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
                fault_type: fault.get("_typeName").and_then(Value::as_str).map(str::to_string),
                fault_messages: fault_messages(fault),
                raw: e.clone(),
            })
        }
        _ => None,
    };

    Ok(TaskSnapshot {
        state,
        progress: info
            .get("progress")
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok()),
        result: info.get("result").filter(|r| !r.is_null()).cloned(),
        error,
    })
}

#[async_trait]
impl InventoryApi for VsphereClient {
    async fn find_datacenters(&self, name: &str) -> ProvisionResult<Vec<InventoryRef>> {
        let (path, id_field) = listing_endpoint(&InventoryKind::Datacenter)?;
        let items: Vec<Value> = self
            .get_with_params(path, &[("names".into(), name.to_string())])
            .await?;
        Ok(listing_refs(&InventoryKind::Datacenter, id_field, &items))
    }

    async fn find_by_name(
        &self,
        datacenter: &InventoryRef,
        kind: InventoryKind,
        name: &str,
    ) -> ProvisionResult<Vec<InventoryRef>> {
        let (path, id_field) = listing_endpoint(&kind)?;
        let params = [
            ("names".to_string(), name.to_string()),
            ("datacenters".to_string(), datacenter.id.clone()),
        ];
        let items: Vec<Value> = self.get_with_params(path, &params).await?;
        Ok(listing_refs(&kind, id_field, &items))
    }

    async fn find_by_path(&self, path: &str) -> ProvisionResult<Option<InventoryRef>> {
        let search_index = InventoryRef::new(InventoryKind::Other("SearchIndex".into()), "SearchIndex");
        self.vim_invoke(
            &search_index,
            "FindByInventoryPath",
            &json!({ "inventoryPath": path }),
        )
        .await
    }

    async fn cluster_root_pool(&self, cluster: &InventoryRef) -> ProvisionResult<InventoryRef> {
        let pool: Value = self.vim_property(cluster, "resourcePool").await?;
        root_pool(cluster, &pool)
    }

    async fn port_group_config(&self, portgroup: &InventoryRef) -> ProvisionResult<PortGroupConfig> {
        let key: String = self.vim_property(portgroup, "key").await?;
        let config: Value = self.vim_property(portgroup, "config").await?;
        port_group(key, &config)
    }

    async fn switch_uuid(&self, switch: &InventoryRef) -> ProvisionResult<String> {
        let summary: Value = self.vim_property(switch, "summary").await?;
        summary_uuid(switch, &summary)
    }

    async fn vm_devices(&self, vm: &InventoryRef) -> ProvisionResult<Vec<Value>> {
        let config: Value = self.vim_property(vm, "config").await?;
        hardware_devices(vm, &config)
    }

    async fn submit_clone(&self, request: &CloneRequest) -> ProvisionResult<InventoryRef> {
        let body = clone_vm_body(request)?;
        self.vim_invoke(&request.source_template, "CloneVM_Task", &body).await
    }

    async fn task_info(&self, task: &InventoryRef) -> ProvisionResult<TaskSnapshot> {
        let info: Value = self.vim_property(task, "info").await?;
        parse_task_info(&info)
    }
}
