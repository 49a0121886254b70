//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown
//! - A handler that cannot be installed is logged and never fires

use tokio::sync::mpsc;

use crate::config::watcher::reload_into;
use crate::config::{ConfigSources, MockConfig};

/// Resolve on SIGINT or SIGTERM, returning the signal's name.
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Re-fold `sources` on every SIGHUP and forward the result to `tx`.
#[cfg(unix)]
pub fn reload_on_hangup(
    sources: ConfigSources,
    tx: mpsc::UnboundedSender<MockConfig>,
) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received, reloading configuration");
            let sources = sources.clone();
            let tx = tx.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || reload_into(&sources, &tx)).await {
                tracing::error!(error = %e, "Reload task failed");
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn reload_on_hangup(
    _sources: ConfigSources,
    _tx: mpsc::UnboundedSender<MockConfig>,
) -> std::io::Result<()> {
    Ok(())
}
