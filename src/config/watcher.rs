//! Configuration file watcher for hot reload.

use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::ConfigSources;
use crate::config::schema::MockConfig;

/// A watcher that monitors the config and override files for changes.
pub struct ConfigWatcher {
    sources: ConfigSources,
    update_tx: mpsc::UnboundedSender<MockConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(sources: ConfigSources) -> (Self, mpsc::UnboundedReceiver<MockConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (Self { sources, update_tx }, update_rx)
    }

    /// A sender that feeds the same channel, for reloads triggered elsewhere
    /// (SIGHUP).
    pub fn sender(&self) -> mpsc::UnboundedSender<MockConfig> {
        self.update_tx.clone()
    }

    /// Start watching the files in a background thread. The returned watcher
    /// must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let sources = self.sources.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(paths = ?event.paths, "Config file change detected, reloading...");
                        reload_into(&sources, &tx);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for path in self.sources.files() {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
        }

        tracing::info!(files = ?self.sources.files(), "Config watcher started");
        Ok(watcher)
    }
}

/// Re-fold the sources and forward the result. A failed reload keeps the
/// current configuration.
pub fn reload_into(sources: &ConfigSources, tx: &mpsc::UnboundedSender<MockConfig>) {
    match sources.load() {
        Ok(config) => {
            let _ = tx.send(config);
        }
        Err(e) => {
            tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
        }
    }
}
