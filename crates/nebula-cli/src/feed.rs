//! Where fragments come from and where new ones go.
//!
//! A feed publishes full newest-first snapshots into a watch channel, so a
//! reader always holds one complete snapshot. Submission goes through the
//! same handle and is awaited by whoever submits, never by the renderer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nebula_core::{Fragment, Snapshot, SubmitError, prepare_submission};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::remote::RemoteFeed;
use crate::state::SharedVault;

/// How often the local log is re-read for fragments written by other processes.
pub const LOCAL_POLL: Duration = Duration::from_secs(2);

pub enum Feed {
    Local { vault: SharedVault, limit: usize },
    Remote(Arc<RemoteFeed>),
}

impl Feed {
    /// One snapshot, fetched now.
    pub async fn snapshot(&self) -> Result<Vec<Fragment>> {
        match self {
            Feed::Local { vault, limit } => {
                let vault = vault.lock().await;
                vault
                    .store
                    .recent_fragments(*limit)
                    .context("failed to read fragment log")
            }
            Feed::Remote(remote) => remote.snapshot().await,
        }
    }

    /// Keep `tx` updated until `token` is cancelled.
    pub fn subscribe(&self, tx: watch::Sender<Snapshot>, token: CancellationToken) -> JoinHandle<()> {
        match self {
            Feed::Local { vault, limit } => {
                poll_local(vault.clone(), *limit, LOCAL_POLL, Arc::new(tx), token)
            }
            Feed::Remote(remote) => remote.clone().subscribe(tx, token),
        }
    }

    /// Submit new content. Preconditions are checked before any I/O.
    pub async fn submit(&self, content: &str) -> Result<Fragment, SubmitError> {
        match self {
            Feed::Local { vault, .. } => {
                let vault = vault.lock().await;
                let identity = vault.store.identity().ok();
                let submission = prepare_submission(identity.as_ref(), content)?;
                vault
                    .store
                    .append_fragment(&submission.content, &submission.source)
                    .map_err(|e| SubmitError::Transport(e.to_string()))
            }
            Feed::Remote(remote) => remote.submit(content).await,
        }
    }
}

/// Re-read the log every `period` and publish the snapshot when it differs
/// from the current one.
pub fn poll_local(
    vault: SharedVault,
    limit: usize,
    period: Duration,
    tx: Arc<watch::Sender<Snapshot>>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let fresh = {
                let vault = vault.lock().await;
                vault.store.recent_fragments(limit)
            };
            match fresh {
                Ok(fragments) => {
                    tx.send_if_modified(|current| {
                        if **current == fragments {
                            false
                        } else {
                            *current = Arc::new(fragments);
                            true
                        }
                    });
                }
                // Keep the last snapshot; the next poll may succeed.
                Err(e) => tracing::warn!("local feed read failed: {e}"),
            }
        }
    })
}
