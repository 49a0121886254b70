//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Start the metrics exporter, config watcher and signal handlers
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::watcher::ConfigWatcher;
use crate::config::{ConfigError, ConfigSources, ServerConfig};
use crate::http::MockServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::metrics;

/// Fatal error before or while serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start metrics exporter: {0}")]
    Metrics(String),

    #[error("failed to watch config files: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl StartupError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            StartupError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Bind the metadata listener.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, StartupError> {
    let addr = config.bind_address();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })
}

/// Run the server until SIGINT/SIGTERM.
pub async fn run_persistent(sources: ConfigSources) -> Result<(), StartupError> {
    let config = sources.load()?;
    tracing::info!(
        files = ?sources.files(),
        overrides = config.overrides.len(),
        endpoints = config.endpoints.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| StartupError::Metrics(format!("{e}")))?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
    }

    let server = MockServer::new(config.clone())?;
    let listener = bind(&config.server).await?;

    let (watcher, config_updates) = ConfigWatcher::new(sources.clone());
    signals::reload_on_hangup(sources.clone(), watcher.sender()).map_err(StartupError::Signal)?;
    let _watch_guard = if config.server.watch_config && !sources.files().is_empty() {
        Some(watcher.run()?)
    } else {
        None
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let signal = signals::shutdown_signal().await;
        trigger.trigger(signal);
    });

    server
        .run(listener, config_updates, server_shutdown)
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_conflict() {
        let held = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = held.local_addr().unwrap().port();

        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port,
            ..Default::default()
        };
        let err = bind(&config).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_bad_config_fails_before_bind() {
        let sources = ConfigSources {
            config_file: Some("/nonexistent/ec2-metadata-mock.toml".into()),
            ..Default::default()
        };
        let err = run_persistent(sources).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
