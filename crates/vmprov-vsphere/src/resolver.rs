//! Inventory resolution: names and paths to `InventoryRef`s.
//!
//! Resolution is scoped to one datacenter. `InventoryResolver::establish`
//! is the only way to obtain a `ScopedResolver`, so no other lookup can
//! run before the datacenter is known.

use crate::api::InventoryApi;
use crate::cancel::guarded;
use crate::error::{ProvisionError, ProvisionResult};
use crate::types::*;

use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to do when a bare name matches more than one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Take the first match in platform order and log every candidate.
    #[default]
    FirstMatch,
    /// Fail with `Ambiguous`.
    Reject,
}

/// Resolver before the datacenter scope exists.
pub struct InventoryResolver<'a> {
    api: &'a dyn InventoryApi,
    token: &'a CancellationToken,
    policy: AmbiguityPolicy,
}

impl<'a> InventoryResolver<'a> {
    pub fn new(api: &'a dyn InventoryApi, token: &'a CancellationToken, policy: AmbiguityPolicy) -> Self {
        Self { api, token, policy }
    }

    /// Resolve the datacenter by name and open the search scope.
    pub async fn establish(self, datacenter: &str) -> ProvisionResult<ScopedResolver<'a>> {
        const STEP: &str = "resolve datacenter";
        let name = datacenter.trim().trim_matches('/');
        if name.is_empty() {
            return Err(ProvisionError::not_found("No datacenter name given").during(STEP));
        }

        let started = Instant::now();
        let found = guarded(self.token, STEP, self.api.find_datacenters(name)).await?;
        let dc = pick(self.policy, &InventoryKind::Datacenter, name, "the inventory", found)
            .map_err(|e| e.during(STEP))?;
        check_kind(&InventoryKind::Datacenter, &dc, name).map_err(|e| e.during(STEP))?;

        info!(
            datacenter = name,
            id = %dc.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Datacenter resolved"
        );

        Ok(ScopedResolver {
            api: self.api,
            token: self.token,
            policy: self.policy,
            scope: SearchScope::new(dc, name),
        })
    }
}

/// Resolver bound to one datacenter.
pub struct ScopedResolver<'a> {
    api: &'a dyn InventoryApi,
    token: &'a CancellationToken,
    policy: AmbiguityPolicy,
    scope: SearchScope,
}

impl<'a> ScopedResolver<'a> {
    pub fn scope(&self) -> &SearchScope {
        &self.scope
    }

    pub async fn cluster(&self, name: &str) -> ProvisionResult<InventoryRef> {
        self.lookup(
            InventoryKind::ClusterComputeResource,
            &InventoryPath::parse(name),
            "resolve cluster",
        )
        .await
    }

    /// Named pool, or the cluster's root pool when `name` is absent or blank.
    pub async fn resource_pool(
        &self,
        cluster: &InventoryRef,
        name: Option<&str>,
    ) -> ProvisionResult<InventoryRef> {
        const STEP: &str = "resolve resource pool";
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => {
                self.lookup(InventoryKind::ResourcePool, &InventoryPath::parse(n), STEP)
                    .await
            }
            None => {
                let pool = guarded(self.token, STEP, self.api.cluster_root_pool(cluster)).await?;
                check_kind(&InventoryKind::ResourcePool, &pool, &cluster.id)
                    .map_err(|e| e.during(STEP))?;
                debug!(cluster = %cluster.id, pool = %pool.id, "Using cluster root resource pool");
                Ok(pool)
            }
        }
    }

    pub async fn datastore(&self, name_or_path: &str) -> ProvisionResult<InventoryRef> {
        self.lookup(
            InventoryKind::Datastore,
            &InventoryPath::parse(name_or_path),
            "resolve datastore",
        )
        .await
    }

    /// Any network kind; the translator decides whether it is usable.
    pub async fn network(&self, name_or_path: &str) -> ProvisionResult<InventoryRef> {
        self.lookup(
            InventoryKind::Network,
            &InventoryPath::parse(name_or_path),
            "resolve network",
        )
        .await
    }

    pub async fn template(&self, name_or_path: &str) -> ProvisionResult<InventoryRef> {
        let path = InventoryPath::parse(name_or_path);
        if !path.is_path() {
            debug!(template = %path, "Template given by bare name; searching the whole datacenter");
        }
        self.lookup(InventoryKind::VirtualMachine, &path, "resolve template")
            .await
    }

    pub async fn vm(&self, name_or_path: &str) -> ProvisionResult<InventoryRef> {
        self.lookup(
            InventoryKind::VirtualMachine,
            &InventoryPath::parse(name_or_path),
            "resolve vm",
        )
        .await
    }

    /// Destination folder below the datacenter's VM folder. Always by path.
    pub async fn folder(&self, folder: &str) -> ProvisionResult<InventoryRef> {
        const STEP: &str = "resolve folder";
        if folder.trim().trim_matches('/').trim().is_empty() {
            return Err(ProvisionError::not_found("No Folder name given").during(STEP));
        }
        let path = InventoryPath::Path(self.scope.vm_folder_path(folder));
        self.lookup(InventoryKind::Folder, &path, STEP).await
    }

    async fn lookup(
        &self,
        kind: InventoryKind,
        path: &InventoryPath,
        step: &str,
    ) -> ProvisionResult<InventoryRef> {
        let started = Instant::now();
        let found = match path {
            InventoryPath::Path(p) => {
                self.scope.check_path(path).map_err(|e| e.during(step))?;
                guarded(self.token, step, self.api.find_by_path(p))
                    .await?
                    .ok_or_else(|| {
                        ProvisionError::not_found(format!("{kind} '{p}' not found")).during(step)
                    })?
            }
            InventoryPath::Name(n) => {
                if n.is_empty() {
                    return Err(ProvisionError::not_found(format!("No {kind} name given")).during(step));
                }
                let candidates = guarded(
                    self.token,
                    step,
                    self.api.find_by_name(self.scope.datacenter(), kind.clone(), n),
                )
                .await?;
                let where_ = format!("datacenter '{}'", self.scope.name());
                pick(self.policy, &kind, n, &where_, candidates).map_err(|e| e.during(step))?
            }
        };
        check_kind(&kind, &found, path.as_str()).map_err(|e| e.during(step))?;

        debug!(
            step,
            lookup = %path,
            id = %found.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resolved"
        );
        Ok(found)
    }
}

/// Apply the ambiguity policy to a candidate list in platform order.
fn pick(
    policy: AmbiguityPolicy,
    kind: &InventoryKind,
    name: &str,
    scope: &str,
    mut candidates: Vec<InventoryRef>,
) -> ProvisionResult<InventoryRef> {
    match candidates.len() {
        0 => Err(ProvisionError::not_found(format!(
            "{kind} '{name}' not found in {scope}"
        ))),
        1 => Ok(candidates.remove(0)),
        n => {
            let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
            match policy {
                AmbiguityPolicy::FirstMatch => {
                    warn!(
                        kind = %kind,
                        name,
                        candidates = ?ids,
                        "Name matched {n} objects; using the first"
                    );
                    Ok(candidates.remove(0))
                }
                AmbiguityPolicy::Reject => Err(ProvisionError::ambiguous(format!(
                    "{kind} '{name}' matches {n} objects in {scope}: {}",
                    ids.join(", ")
                ))),
            }
        }
    }
}

fn check_kind(wanted: &InventoryKind, found: &InventoryRef, lookup: &str) -> ProvisionResult<()> {
    if wanted.accepts(&found.kind) {
        Ok(())
    } else {
        Err(ProvisionError::not_found(format!(
            "'{lookup}' is a {} ({}), not a {wanted}",
            found.kind, found.id
        )))
    }
}
