//! Signal-driven cancellation

use taskmark_tasks::CancellationToken;
use tracing::warn;

/// Cancel `cancel` when the process receives an interrupt or termination
/// signal. Running scripts then get the graceful termination sequence.
pub async fn cancel_on_signal(cancel: CancellationToken) {
    if wait_for_signal().await {
        warn!("Received termination signal, stopping running tasks");
        cancel.cancel();
    }
}

/// Returns false when no handler could be installed
#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut interrupt), Ok(mut terminate), Ok(mut hangup)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) else {
        warn!("Failed to install signal handlers, falling back to ctrl-c");
        return ctrl_c().await;
    };

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
        _ = hangup.recv() => {}
    }
    true
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    ctrl_c().await
}

async fn ctrl_c() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to listen for ctrl-c: {}", e);
            false
        }
    }
}
