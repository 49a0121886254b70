//! Background purge of expired tokens.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::token::TokenManager;

pub struct TokenSweeper {
    tokens: TokenManager,
    interval: Duration,
}

impl TokenSweeper {
    pub fn new(tokens: TokenManager, interval: Duration) -> Self {
        Self { tokens, interval }
    }

    /// Sweep on every tick until the shutdown signal fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Token sweeper starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.tokens.sweep();
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            remaining = self.tokens.active(),
                            "Swept expired tokens"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Token sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
