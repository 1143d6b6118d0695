//! # vmprov – vSphere template provisioning
//!
//! Clones a VM template inside one datacenter and rewires every network
//! adapter of the clone onto a distributed port group, plus a read-only
//! adapter inspector.
//!
//! ## Modules
//!
//! - **types** — Inventory identities, adapter / backing model, clone request and task state
//! - **error** — Crate-specific error types
//! - **api** — `InventoryApi`, the RPC surface the core runs against
//! - **vsphere** — vSphere HTTP client (Automation REST + VI/JSON) with session auth
//! - **device** — VIM device JSON ⇄ adapter model
//! - **cancel** — Cancellable remote calls and poll sleeps
//! - **resolver** — Datacenter-scoped name / path resolution
//! - **backing** — Distributed port-group backing translation
//! - **clone** — `CloneVM_Task` submission and task polling
//! - **inspect** — Adapter report for an existing VM
//! - **workflow** — Provision and inspect runs with per-step timing

pub mod types;
pub mod error;
pub mod api;
pub mod vsphere;
pub mod device;
pub mod cancel;
pub mod resolver;
pub mod backing;
pub mod clone;
pub mod inspect;
pub mod workflow;

pub use api::InventoryApi;
pub use error::{ProvisionError, ProvisionErrorKind, ProvisionResult};
pub use resolver::AmbiguityPolicy;
pub use vsphere::VsphereClient;
pub use workflow::{inspect_vm, provision, CloneParams, ProvisionReport};
