//! Live-reload notification channel
//!
//! Watched tasks publish their name after a successful rebuild. Browsers long-poll
//! [`LIVERELOAD_PATH`] and receive the name of the next task that completes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

pub const LIVERELOAD_PATH: &str = "/__livereload";

#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<String>,
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new(16)
    }
}

impl LiveReload {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Announce a completed task; returns how many listeners were waiting
    pub fn notify(&self, task: &str) -> usize {
        let listeners = self.tx.send(task.to_string()).unwrap_or(0);
        debug!(task, listeners, "Live reload notification");
        listeners
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Router exposing the long-poll endpoint
    pub fn router(&self) -> Router {
        Router::new()
            .route(LIVERELOAD_PATH, get(poll))
            .with_state(self.clone())
    }
}

async fn poll(State(livereload): State<LiveReload>) -> Response {
    let mut rx = livereload.subscribe();
    loop {
        match rx.recv().await {
            Ok(task) => return task.into_response(),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return StatusCode::NO_CONTENT.into_response(),
        }
    }
}
