//! Stop: turns process signals into root token cancellation.

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Waits for Ctrl+C or SIGTERM, then cancels `shutdown`. Returns early
/// if `shutdown` is cancelled some other way.
pub async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = shutdown.cancelled() => return,
        _ = ctrl_c => warn!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => warn!("Received SIGTERM, initiating graceful shutdown..."),
    }

    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_when_already_cancelled() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), shutdown_signal(shutdown))
            .await
            .expect("signal task should end once shutdown is cancelled");
    }
}
