//! Clone submission and task tracking.
//!
//! `CloneVM_Task` is the one long-running call of a run. The orchestrator
//! submits it, polls `Task.info` until a terminal state and maps the result:
//!
//! - submission error: `SubmissionFailed`, no outcome
//! - task error: `CloneOutcome::Failure` with vCenter's message
//! - task success: `CloneOutcome::Success` if the result is one VM reference,
//!   `UnexpectedResultShape` otherwise
//!
//! The token is observed at every poll and every sleep. A cancelled wait
//! leaves the task running on vCenter.

use crate::api::InventoryApi;
use crate::cancel::{guarded, pause};
use crate::error::{ProvisionError, ProvisionResult};
use crate::types::*;

use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct CloneOrchestrator<'a> {
    api: &'a dyn InventoryApi,
    token: &'a CancellationToken,
    poll_interval: Duration,
}

impl<'a> CloneOrchestrator<'a> {
    pub fn new(api: &'a dyn InventoryApi, token: &'a CancellationToken) -> Self {
        Self {
            api,
            token,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start the clone task.
    pub async fn submit(&self, request: &CloneRequest) -> ProvisionResult<InventoryRef> {
        const STEP: &str = "submit clone";
        info!(
            name = %request.name,
            template = %request.source_template.id,
            folder = %request.destination_folder.id,
            datastore = %request.placement.datastore.id,
            pool = %request.placement.resource_pool.id,
            device_edits = request.device_edits.len(),
            "Submitting clone"
        );

        match guarded(self.token, STEP, self.api.submit_clone(request)).await {
            Ok(task) => {
                debug!(task = %task.id, "Clone task created");
                Ok(task)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => Err(ProvisionError {
                platform_detail: e.platform_detail.clone(),
                ..ProvisionError::submission(format!(
                    "Clone of '{}' could not be started ({:?}): {}",
                    request.name, e.kind, e.message
                ))
            }
            .during(STEP)),
        }
    }

    /// Poll `task` until it reaches a terminal state.
    pub async fn wait(&self, task: &InventoryRef) -> ProvisionResult<CloneOutcome> {
        const STEP: &str = "await clone";
        let started = Instant::now();
        let mut last_progress = None;

        loop {
            let snapshot = guarded(self.token, STEP, self.api.task_info(task)).await?;
            if snapshot.state.is_terminal() {
                info!(
                    task = %task.id,
                    state = ?snapshot.state,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Clone task finished"
                );
                return outcome(&snapshot).map_err(|e| e.during(STEP));
            }
            if snapshot.progress != last_progress {
                info!(task = %task.id, progress = ?snapshot.progress, "Clone in progress");
                last_progress = snapshot.progress;
            }
            pause(self.token, STEP, self.poll_interval).await?;
        }
    }

    /// Submit and wait.
    pub async fn run(&self, request: &CloneRequest) -> ProvisionResult<CloneOutcome> {
        let task = self.submit(request).await?;
        self.wait(&task).await
    }
}

/// Map a terminal snapshot to an outcome.
pub fn outcome(snapshot: &TaskSnapshot) -> ProvisionResult<CloneOutcome> {
    match snapshot.state {
        CloneTaskState::Failed => Ok(failure(snapshot)),
        CloneTaskState::Succeeded => {
            let result = snapshot.result.as_ref().unwrap_or(&Value::Null);
            Ok(CloneOutcome::Success {
                new_vm: single_vm(result)?,
            })
        }
        state => Err(ProvisionError::parse(format!(
            "Task is not finished (state {state:?})"
        ))),
    }
}

fn failure(snapshot: &TaskSnapshot) -> CloneOutcome {
    match snapshot.error {
        Some(ref fault) => CloneOutcome::Failure {
            message: fault
                .localized_message
                .clone()
                .unwrap_or_else(|| fault.raw.to_string()),
            platform_detail: fault.detail(),
        },
        None => CloneOutcome::Failure {
            message: "Clone task failed without error information".to_string(),
            platform_detail: None,
        },
    }
}

/// The result must be exactly one `VirtualMachine` reference.
fn single_vm(result: &Value) -> ProvisionResult<InventoryRef> {
    let is_mor = result.get("type").is_some_and(Value::is_string)
        && result.get("value").is_some_and(Value::is_string)
        && result
            .get("_typeName")
            .map_or(true, |t| t == "ManagedObjectReference");
    if !is_mor {
        return Err(ProvisionError::unexpected_result(format!(
            "Clone succeeded but returned {result} instead of a VM reference"
        )));
    }
    let vm: InventoryRef = serde_json::from_value(result.clone())?;
    if vm.kind != InventoryKind::VirtualMachine {
        return Err(ProvisionError::unexpected_result(format!(
            "Clone succeeded but returned a {} reference ({})",
            vm.kind, vm.id
        )));
    }
    Ok(vm)
}
