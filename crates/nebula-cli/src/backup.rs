use std::time::Duration;

use nebula_core::time::now_unix_ms;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::state::{SharedVault, Vault};

/// Write a favorites backup every `period` until `token` is cancelled.
/// The first backup happens one full period after start.
pub fn spawn_backup(vault: SharedVault, period: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let mut guard = vault.lock().await;
            let Vault { store, favorites } = &mut *guard;
            match favorites.backup(store, now_unix_ms()) {
                Ok(Some(b)) => tracing::debug!(count = b.count, "hourly backup"),
                Ok(None) => tracing::debug!("no favorites to back up"),
                Err(e) => tracing::warn!("favorites backup failed: {e}"),
            }
        }
        tracing::debug!("backup task stopped");
    })
}
