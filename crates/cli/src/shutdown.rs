//! Signal-driven cancellation
//!
//! GitHub Actions cancels superseded runs (concurrency groups with
//! `cancel-in-progress`) by sending SIGINT then SIGTERM. Either one cancels
//! the root token so the controller stops at its next sleep.

use crate::errors::CliError;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancel `token` when SIGTERM or SIGINT is received
pub fn install_signal_handlers(token: CancellationToken) -> Result<(), CliError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| CliError::signal("SIGTERM", e))?;
        let mut sigint =
            signal(SignalKind::interrupt()).map_err(|e| CliError::signal("SIGINT", e))?;

        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, cancelling evaluation"),
                _ = sigint.recv() => info!("Received SIGINT, cancelling evaluation"),
                () = token.cancelled() => return,
            }
            token.cancel();
        });
    }

    #[cfg(windows)]
    {
        use tokio::signal::windows;

        let mut ctrl_c = windows::ctrl_c().map_err(|e| CliError::signal("Ctrl+C", e))?;
        let mut ctrl_break =
            windows::ctrl_break().map_err(|e| CliError::signal("Ctrl+Break", e))?;

        tokio::spawn(async move {
            tokio::select! {
                _ = ctrl_c.recv() => info!("Received Ctrl+C, cancelling evaluation"),
                _ = ctrl_break.recv() => info!("Received Ctrl+Break, cancelling evaluation"),
                () = token.cancelled() => return,
            }
            token.cancel();
        });
    }

    Ok(())
}
