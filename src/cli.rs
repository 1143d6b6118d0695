//! Command-line surface.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use vmprov_vsphere::{AmbiguityPolicy, CloneParams, ProvisionError, ProvisionErrorKind};

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_CANCELLED: u8 = 130;

/// Clone a vSphere template and attach every NIC of the clone to a
/// distributed port group, or inspect the NICs of an existing VM.
#[derive(Parser, Debug, Clone)]
#[command(name = "vmprov", version, about, long_about = None)]
pub struct Cli {
    /// Target datacenter
    #[arg(long)]
    pub datacenter: String,

    /// Target cluster
    #[arg(long, required_unless_present = "inspect_vm")]
    pub cluster: Option<String>,

    /// Template name, or its full inventory path (`/DC/vm/Folder/Template`, faster)
    #[arg(long, required_unless_present = "inspect_vm")]
    pub template: Option<String>,

    /// Name of the new virtual machine
    #[arg(long = "vm-name", required_unless_present = "inspect_vm")]
    pub vm_name: Option<String>,

    /// Target datastore
    #[arg(long, required_unless_present = "inspect_vm")]
    pub datastore: Option<String>,

    /// Distributed port group the clone's NICs are attached to
    #[arg(long, required_unless_present = "inspect_vm")]
    pub network: Option<String>,

    /// Resource pool (defaults to the cluster's root pool)
    #[arg(long = "resource-pool")]
    pub resource_pool: Option<String>,

    /// Folder below the datacenter's VM folder that receives the clone
    #[arg(long, required_unless_present = "inspect_vm")]
    pub folder: Option<String>,

    /// Only print the network configuration of this existing VM
    #[arg(long = "inspect-vm")]
    pub inspect_vm: Option<String>,

    /// Fail when a bare name matches several objects instead of taking the first
    #[arg(long = "strict-names")]
    pub strict_names: bool,

    /// Clone task poll interval in milliseconds
    #[arg(long = "poll-interval-ms", default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Abort the run after this many seconds (a started clone keeps running on vCenter)
    #[arg(long = "deadline-secs")]
    pub deadline_secs: Option<u64>,

    /// Read connection settings from this file instead of `./.env`
    #[arg(long = "env-file")]
    pub env_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long = "log-json")]
    pub log_json: bool,
}

/// What a run does.
#[derive(Debug, Clone)]
pub enum Mode {
    Provision(CloneParams),
    Inspect { datacenter: String, vm_name: String },
}

impl Cli {
    pub fn ambiguity(&self) -> AmbiguityPolicy {
        if self.strict_names {
            AmbiguityPolicy::Reject
        } else {
            AmbiguityPolicy::FirstMatch
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Inspect mode when `--inspect-vm` is non-empty, provisioning otherwise.
    pub fn mode(&self) -> Result<Mode, ProvisionError> {
        if let Some(vm) = self.inspect_vm.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            return Ok(Mode::Inspect {
                datacenter: self.datacenter.clone(),
                vm_name: vm.to_string(),
            });
        }

        let mut params = CloneParams::new(
            self.datacenter.clone(),
            required(&self.cluster, "--cluster")?,
            required(&self.template, "--template")?,
            required(&self.vm_name, "--vm-name")?,
            required(&self.datastore, "--datastore")?,
            required(&self.network, "--network")?,
            required(&self.folder, "--folder")?,
        );
        params.resource_pool = self.resource_pool.clone();
        params.ambiguity = self.ambiguity();
        params.poll_interval = Duration::from_millis(self.poll_interval_ms);
        Ok(Mode::Provision(params))
    }
}

fn required(value: &Option<String>, flag: &str) -> Result<String, ProvisionError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProvisionError::config(format!("{flag} must not be empty")))
}

/// Process exit code for a failed run.
pub fn exit_code(err: &ProvisionError) -> u8 {
    match err.kind {
        ProvisionErrorKind::ConfigError => EXIT_CONFIG,
        ProvisionErrorKind::Cancelled => EXIT_CANCELLED,
        _ => EXIT_FAILURE,
    }
}
