//! Client for a `nebula serve` instance.
//!
//! The anonymous session is bootstrapped at most once per process. The live
//! feed is an SSE stream of full snapshots; when it drops, the last snapshot
//! stays published and the client reconnects after a fixed delay.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use nebula_core::{Fragment, Identity, Snapshot, SubmitError, prepare_submission};
use serde::Deserialize;
use tokio::sync::{OnceCell, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const SESSION_HEADER: &str = "x-nebula-session";
pub const SNAPSHOT_EVENT: &str = "snapshot";
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
}

pub struct RemoteFeed {
    client: reqwest::Client,
    base: String,
    session: OnceCell<Identity>,
    reconnect_delay: Duration,
}

impl RemoteFeed {
    pub fn new(base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            session: OnceCell::new(),
            reconnect_delay: RECONNECT_DELAY,
        })
    }

    #[cfg(test)]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// The session, bootstrapping it on first call.
    pub async fn session(&self) -> Result<&Identity> {
        self.session
            .get_or_try_init(|| async {
                let resp: SessionResponse = self
                    .client
                    .post(self.url("/session"))
                    .send()
                    .await
                    .context("session bootstrap failed")?
                    .error_for_status()
                    .context("session bootstrap rejected")?
                    .json()
                    .await
                    .context("malformed session response")?;
                tracing::info!("connected to the collective");
                Ok::<_, anyhow::Error>(Identity::new(resp.token))
            })
            .await
    }

    pub async fn snapshot(&self) -> Result<Vec<Fragment>> {
        let fragments = self
            .client
            .get(self.url("/fragments"))
            .send()
            .await
            .context("failed to reach feed")?
            .error_for_status()
            .context("feed refused snapshot")?
            .json()
            .await
            .context("malformed snapshot")?;
        Ok(fragments)
    }

    /// Submit with whatever session exists right now. Call [`Self::session`]
    /// first; an unbootstrapped client is rejected without touching the network.
    pub async fn submit(&self, content: &str) -> Result<Fragment, SubmitError> {
        let identity = self.session.get();
        let submission = prepare_submission(identity, content)?;
        let token = identity
            .map(|id| id.token.clone())
            .ok_or(SubmitError::NotAuthenticated)?;

        let resp = self
            .client
            .post(self.url("/fragments"))
            .header(SESSION_HEADER, token)
            .json(&serde_json::json!({ "content": submission.content }))
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => resp
                .json()
                .await
                .map_err(|e| SubmitError::Transport(e.to_string())),
            reqwest::StatusCode::UNAUTHORIZED => Err(SubmitError::NotAuthenticated),
            reqwest::StatusCode::BAD_REQUEST => Err(SubmitError::EmptyContent),
            s => Err(SubmitError::Transport(format!("server answered {s}"))),
        }
    }

    /// Follow the SSE stream into `tx` until cancelled.
    pub fn subscribe(self: Arc<Self>, tx: watch::Sender<Snapshot>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    result = self.follow(&tx) => match result {
                        Ok(()) => tracing::warn!("feed stream ended, reconnecting"),
                        Err(e) => tracing::warn!("feed stream failed: {e:#}"),
                    },
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(self.reconnect_delay) => {}
                }
            }
            tracing::debug!("feed subscription stopped");
        })
    }

    async fn follow(&self, tx: &watch::Sender<Snapshot>) -> Result<()> {
        let resp = self
            .client
            .get(self.url("/fragments/stream"))
            .send()
            .await
            .context("failed to open feed stream")?;
        if !resp.status().is_success() {
            bail!("feed stream answered {}", resp.status());
        }

        let mut events = resp.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.context("broken event stream")?;
            if event.event != SNAPSHOT_EVENT {
                continue;
            }
            match serde_json::from_str::<Vec<Fragment>>(&event.data) {
                Ok(fragments) => {
                    tracing::debug!(count = fragments.len(), "snapshot received");
                    tx.send_replace(Arc::new(fragments));
                }
                Err(e) => tracing::warn!("skipping malformed snapshot: {e}"),
            }
        }
        Ok(())
    }
}
