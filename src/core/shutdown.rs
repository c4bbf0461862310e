//! # OS termination signals.
//!
//! A signal asks the current boot to stop gracefully; it never pulls the reset line.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`. **Elsewhere:** Ctrl-C.

use std::future;

/// Completes on the first termination signal.
///
/// If the listeners cannot be registered the failure is logged and the
/// future never completes, so the boot keeps running.
pub(crate) async fn shutdown_signal() {
    if let Err(err) = wait_for_signal().await {
        tracing::warn!(error = %err, "cannot listen for shutdown signals");
        future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
