//! End-to-end runs: provision (resolve → translate → clone) and inspect.

use crate::api::InventoryApi;
use crate::backing::BackingTranslator;
use crate::clone::{CloneOrchestrator, DEFAULT_POLL_INTERVAL};
use crate::error::ProvisionResult;
use crate::inspect::{InspectReport, Inspector};
use crate::resolver::{AmbiguityPolicy, InventoryResolver};
use crate::types::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Already-parsed inputs of a provisioning run.
#[derive(Debug, Clone)]
pub struct CloneParams {
    pub datacenter: String,
    pub cluster: String,
    /// Bare name or `/DC/vm/...` path
    pub template: String,
    pub vm_name: String,
    pub datastore: String,
    pub network: String,
    /// `None` or blank selects the cluster's root pool
    pub resource_pool: Option<String>,
    /// Folder directly below the datacenter's VM folder
    pub folder: String,
    pub ambiguity: AmbiguityPolicy,
    pub poll_interval: Duration,
}

impl CloneParams {
    pub fn new(
        datacenter: impl Into<String>,
        cluster: impl Into<String>,
        template: impl Into<String>,
        vm_name: impl Into<String>,
        datastore: impl Into<String>,
        network: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            datacenter: datacenter.into(),
            cluster: cluster.into(),
            template: template.into(),
            vm_name: vm_name.into(),
            datastore: datastore.into(),
            network: network.into(),
            resource_pool: None,
            folder: folder.into(),
            ambiguity: AmbiguityPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTiming {
    pub step: String,
    pub elapsed_ms: u64,
}

/// Summary of a successful provisioning run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub vm: InventoryRef,
    pub vm_name: String,
    pub port_group: PortGroupIdentity,
    pub adapters_rewired: usize,
    pub degraded_adapters: Vec<i32>,
    pub timings: Vec<StepTiming>,
    pub started_at: DateTime<Utc>,
    pub total_ms: u64,
}

#[derive(Default)]
struct Timings(Vec<StepTiming>);

impl Timings {
    fn record(&mut self, step: &str, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(step, elapsed_ms, "Step done");
        self.0.push(StepTiming {
            step: step.to_string(),
            elapsed_ms,
        });
    }
}

/// Clone `params.template` into a new VM with every NIC on `params.network`.
pub async fn provision(
    api: &dyn InventoryApi,
    token: &CancellationToken,
    params: &CloneParams,
) -> ProvisionResult<ProvisionReport> {
    let started_at = Utc::now();
    let run = Instant::now();
    let mut timings = Timings::default();

    let t = Instant::now();
    let scoped = InventoryResolver::new(api, token, params.ambiguity)
        .establish(&params.datacenter)
        .await?;
    timings.record("datacenter", t);

    let t = Instant::now();
    let cluster = scoped.cluster(&params.cluster).await?;
    timings.record("cluster", t);

    let t = Instant::now();
    let pool = scoped
        .resource_pool(&cluster, params.resource_pool.as_deref())
        .await?;
    timings.record("resource pool", t);

    let t = Instant::now();
    let datastore = scoped.datastore(&params.datastore).await?;
    timings.record("datastore", t);

    let t = Instant::now();
    let network = scoped.network(&params.network).await?;
    timings.record("network", t);

    let t = Instant::now();
    let template = scoped.template(&params.template).await?;
    timings.record("template", t);

    let t = Instant::now();
    let folder = scoped.folder(&params.folder).await?;
    timings.record("folder", t);

    let t = Instant::now();
    let translation = BackingTranslator::new(api, token)
        .translate(&template, &network)
        .await?;
    timings.record("network translation", t);
    if translation.is_empty() {
        info!(template = %template.id, "Template has no ethernet adapters; cloning without device changes");
    }

    let degraded_adapters = translation.degraded_keys();
    let adapters_rewired = translation.len();
    let port_group = translation.identity.clone();

    let request = CloneRequest::new(
        template,
        folder,
        params.vm_name.clone(),
        Placement {
            datastore,
            resource_pool: pool,
        },
        translation.instructions,
    );

    let t = Instant::now();
    let outcome = CloneOrchestrator::new(api, token)
        .with_poll_interval(params.poll_interval)
        .run(&request)
        .await?;
    timings.record("clone", t);
    let vm = outcome.into_result()?;

    let total_ms = run.elapsed().as_millis() as u64;
    info!(vm = %vm.id, name = %params.vm_name, total_ms, "VM provisioned");

    Ok(ProvisionReport {
        vm,
        vm_name: params.vm_name.clone(),
        port_group,
        adapters_rewired,
        degraded_adapters,
        timings: timings.0,
        started_at,
        total_ms,
    })
}

/// Report the network adapters of an existing VM. Never mutates.
pub async fn inspect_vm(
    api: &dyn InventoryApi,
    token: &CancellationToken,
    datacenter: &str,
    vm_name: &str,
    ambiguity: AmbiguityPolicy,
) -> ProvisionResult<InspectReport> {
    let run = Instant::now();
    let scoped = InventoryResolver::new(api, token, ambiguity)
        .establish(datacenter)
        .await?;
    let vm = scoped.vm(vm_name).await?;
    let report = Inspector::new(api, token).inspect(&vm, vm_name).await?;
    info!(vm = %vm.id, elapsed_ms = run.elapsed().as_millis() as u64, "Inspection finished");
    Ok(report)
}
