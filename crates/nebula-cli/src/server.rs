//! HTTP fragment feed over the local log.
//!
//! Every write refreshes the newest-first snapshot and publishes it whole;
//! stream subscribers get the full snapshot on connect and after each change.
//! Writes by other processes sharing the database are picked up by polling.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use nebula_core::{Fragment, Identity, Snapshot, SubmitError, prepare_submission};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::feed::poll_local;
use crate::remote::{SESSION_HEADER, SNAPSHOT_EVENT};
use crate::state::SharedVault;

#[derive(Clone)]
pub struct FeedServer {
    vault: SharedVault,
    sessions: Arc<Mutex<HashSet<String>>>,
    snapshots: Arc<watch::Sender<Snapshot>>,
    limit: usize,
    shutdown: CancellationToken,
}

#[derive(Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
}

#[derive(Deserialize)]
pub struct NewFragment {
    pub content: String,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.1 }));
        (self.0, body).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        let status = match e {
            SubmitError::EmptyContent => StatusCode::BAD_REQUEST,
            SubmitError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            SubmitError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

impl FeedServer {
    pub async fn new(vault: SharedVault, limit: usize, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let initial = vault.lock().await.store.recent_fragments(limit)?;
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Ok(Self {
            vault,
            sessions: Arc::new(Mutex::new(HashSet::new())),
            snapshots: Arc::new(tx),
            limit,
            shutdown,
        })
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/session", post(create_session))
            .route("/fragments", get(list_fragments).post(submit_fragment))
            .route("/fragments/stream", get(stream_fragments))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.clone())
    }

    /// Keep the served snapshot current with the log until shutdown.
    pub fn spawn_log_poll(&self, period: Duration) -> JoinHandle<()> {
        poll_local(
            self.vault.clone(),
            self.limit,
            period,
            self.snapshots.clone(),
            self.shutdown.clone(),
        )
    }

    /// Fold the WAL back into the database file.
    pub async fn checkpoint_wal(&self) {
        let vault = self.vault.lock().await;
        if let Err(e) = vault.store.checkpoint_truncate() {
            tracing::warn!("WAL checkpoint failed: {e}");
        }
        tracing::info!("WAL checkpoint complete");
    }
}

async fn create_session(State(server): State<FeedServer>) -> Json<SessionToken> {
    let token = Uuid::new_v4().to_string();
    server.sessions.lock().await.insert(token.clone());
    tracing::debug!("anonymous session opened");
    Json(SessionToken { token })
}

async fn list_fragments(State(server): State<FeedServer>) -> Json<Vec<Fragment>> {
    let snapshot = server.snapshots.borrow().clone();
    Json(snapshot.as_ref().clone())
}

async fn submit_fragment(
    State(server): State<FeedServer>,
    headers: HeaderMap,
    Json(body): Json<NewFragment>,
) -> Result<(StatusCode, Json<Fragment>), ApiError> {
    let identity = {
        let sessions = server.sessions.lock().await;
        headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|token| sessions.contains(*token))
            .map(Identity::new)
    };
    let submission = prepare_submission(identity.as_ref(), &body.content)?;

    let vault = server.vault.lock().await;
    let fragment = vault
        .store
        .append_fragment(&submission.content, &submission.source)
        .map_err(|e| {
            tracing::error!("failed to append fragment: {e}");
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, "transmission failed".into())
        })?;
    match vault.store.recent_fragments(server.limit) {
        Ok(fresh) => {
            server.snapshots.send_replace(Arc::new(fresh));
        }
        Err(e) => tracing::error!("failed to refresh snapshot: {e}"),
    }
    tracing::info!(id = %fragment.id, "fragment received");
    Ok((StatusCode::CREATED, Json(fragment)))
}

async fn stream_fragments(
    State(server): State<FeedServer>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = server.snapshots.subscribe();
    let shutdown = server.shutdown.clone();

    let stream = async_stream::stream! {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            match Event::default().event(SNAPSHOT_EVENT).json_data(snapshot.as_ref()) {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::error!("failed to encode snapshot: {e}"),
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = rx.changed() => if changed.is_err() { break },
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
