//! Operator abort and deadline handling.
//!
//! Cancelling the token unwinds the run at the next remote call or poll
//! sleep. A clone task that vCenter already accepted keeps running.

use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Resolves on Ctrl+C or SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        biased;
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

/// Resolves after `deadline`, or never.
async fn wait_for_deadline(deadline: Option<Duration>) {
    match deadline {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}

/// Cancel `token` on a signal or when `deadline` elapses. The watcher
/// exits quietly once the token is cancelled by anyone else.
pub fn spawn_watchdog(token: CancellationToken, deadline: Option<Duration>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = wait_for_signal() => {
                warn!("Aborting; a clone task already submitted keeps running on vCenter");
            }
            _ = wait_for_deadline(deadline) => {
                warn!(deadline_secs = deadline.map(|d| d.as_secs()), "Deadline reached; aborting");
            }
        }
        token.cancel();
    })
}
