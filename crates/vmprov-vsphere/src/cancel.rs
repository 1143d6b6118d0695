//! Cancellation of remote calls.

use crate::error::{ProvisionError, ProvisionResult};

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `fut` unless `token` fires first. Errors are tagged with `step`.
pub async fn guarded<T, F>(token: &CancellationToken, step: &str, fut: F) -> ProvisionResult<T>
where
    F: Future<Output = ProvisionResult<T>>,
{
    if token.is_cancelled() {
        return Err(ProvisionError::cancelled("Aborted before the call was made").during(step));
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            Err(ProvisionError::cancelled("Aborted while waiting for vCenter").during(step))
        }
        res = fut => res.map_err(|e| e.during(step)),
    }
}

/// Sleep for `period`, returning early with `Cancelled` if the token fires.
pub async fn pause(token: &CancellationToken, step: &str, period: Duration) -> ProvisionResult<()> {
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            Err(ProvisionError::cancelled("Aborted while waiting for vCenter").during(step))
        }
        _ = tokio::time::sleep(period) => Ok(()),
    }
}
