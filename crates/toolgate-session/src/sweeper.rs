//! Periodic eviction of idle sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::store::SessionStore;

/// Background task that sweeps a session store at a fixed interval,
/// independent of request traffic.
pub struct SessionSweeper {
    store: Arc<SessionStore>,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl SessionSweeper {
    /// Create a new sweeper.
    ///
    /// # Arguments
    ///
    /// * `store` - Store to sweep
    /// * `sweep_interval` - Time between sweeps (e.g. 1 hour)
    /// * `cancel_token` - Token to signal shutdown
    pub const fn new(
        store: Arc<SessionStore>,
        sweep_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            interval: sweep_interval,
            cancel_token,
        }
    }

    /// Spawn the sweep loop on the current runtime.
    ///
    /// The first sweep happens one interval after spawning. The task ends
    /// when the cancellation token fires.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        debug!(interval_secs = self.interval.as_secs(), "Starting session sweeper");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.store.sweep().await;
                    debug!(removed, "Session sweep tick");
                }
                () = self.cancel_token.cancelled() => {
                    debug!("Session sweeper cancelled");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{CredentialVault, EncryptionKey};

    fn store(idle: Duration) -> Arc<SessionStore> {
        let vault = Arc::new(CredentialVault::new(&EncryptionKey::generate()));
        Arc::new(SessionStore::new(vault, idle))
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let token = CancellationToken::new();
        let handle = SessionSweeper::new(store(Duration::from_secs(60)), Duration::from_secs(3600), token.clone())
            .spawn();
        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_evicts_after_tick() {
        let store = store(Duration::from_millis(20));
        let id = store.create().await;
        let token = CancellationToken::new();
        let handle =
            SessionSweeper::new(store.clone(), Duration::from_millis(50), token.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.touch(&id).await.is_none());

        token.cancel();
        handle.await.unwrap();
    }
}
