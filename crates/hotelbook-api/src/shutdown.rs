//! Process shutdown signal.

use tracing::{info, warn};

/// Completes when the process receives Ctrl-C. Never completes if the
/// signal handler cannot be installed.
pub async fn signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
